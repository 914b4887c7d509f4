//! `tracing` subscriber setup.
//!
//! Two layers are installed once, from `main`:
//!
//! - **stderr**, filtered by `RUST_LOG` when set, otherwise by `-v`
//!   (`error` by default, `info` with `-v`, `debug` with `-vv`).  The stage UI
//!   already covers the normal case, so stderr stays quiet unless asked.
//! - **log file**, append-only, always at `info`, no ANSI colours.  Written
//!   through a non-blocking `tracing-appender` worker whose [`WorkerGuard`]
//!   must stay alive until the process exits so buffered lines are flushed.

use std::{fs::OpenOptions, path::Path};

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default stderr directive for a given `-v` count.
pub fn stderr_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    }
}

/// Install the global subscriber.
///
/// Returns the file writer's guard when a log file is configured.
pub fn init(verbose: u8, log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let stderr_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(stderr_level(verbose).into()));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("creating log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(LevelFilter::INFO);
            (Some(layer), Some(guard))
        },
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .context("installing the tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quiet_by_default_louder_with_flags() {
        assert_eq!(stderr_level(0), LevelFilter::ERROR);
        assert_eq!(stderr_level(1), LevelFilter::INFO);
        assert_eq!(stderr_level(2), LevelFilter::DEBUG);
        assert_eq!(stderr_level(9), LevelFilter::DEBUG);
    }
}
