//! `db-backup`: dump a database, gzip it, ship it to Google Drive, prune old copies.
//!
//! # Overview
//!
//! One run produces one `<db>_backup_<YYYYmmdd_HHMMSS>.sql.gz` in the local
//! backup directory, uploads it to a Drive folder with a service account, and
//! then keeps only the newest `keep` backups of the database on both sides.
//! Settings come from `db-backup.toml`, a `.env` file, or the environment.
//!
//! # Usage
//!
//! ```text
//! db-backup                  # dump, upload, clean up
//! db-backup init             # scaffold a db-backup.toml in the current directory
//! db-backup list [--remote]  # show backups and which ones retention keeps
//! db-backup --print-config   # show resolved config (password redacted)
//! db-backup --no-upload      # local-only run
//! db-backup --no-cleanup     # skip retention
//! ```
//!
//! # Module layout
//!
//! | Module                   | Responsibility                                |
//! |--------------------------|-----------------------------------------------|
//! | [`cli`]                  | Argument types parsed by clap                 |
//! | [`config`]               | Layered config: TOML files, `.env`, env vars  |
//! | [`error`]                | Typed errors for config, dump, and remote     |
//! | [`logging`]              | tracing subscriber: stderr + log file         |
//! | [`runner`]               | Dump utility argument construction            |
//! | [`dump`]                 | Run the dump, gzip it, clean up partials      |
//! | [`artifact`]             | Artifact naming and local listing             |
//! | [`remote`]               | `RemoteStore` trait, lazy session, Drive      |
//! | [`retention`]            | Keep-newest-K pruning, local and remote       |
//! | [`workflow`]             | Dump → upload → cleanup orchestration         |
//! | [`ui`]                   | Spinner, stage lines, summary                 |
//! | [`commands::init`]       | `db-backup init` subcommand                   |
//! | [`commands::list`]       | `db-backup list` subcommand                   |
//! | [`commands::run`]        | Default backup workflow                       |

mod artifact;
mod cli;
mod commands;
mod config;
mod dump;
mod error;
mod logging;
mod remote;
mod retention;
mod runner;
mod ui;
mod workflow;

use std::path::Path;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Subcommand};
use config::{PartialConfig, parse_partial};
use tracing::error;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        // ── db-backup init ────────────────────────────────────────────────────
        Some(Subcommand::Init) => {
            commands::init::run(&cli.config)?;
        },

        // ── db-backup list ────────────────────────────────────────────────────
        Some(Subcommand::List { remote }) => {
            let cfg = load_config(&cli)?;
            // Dropping the guard flushes the file log.
            let _guard = logging::init(cli.verbose, cfg.log.file.as_deref())?;
            commands::list::run(&cfg, *remote)?;
        },

        // ── db-backup (default workflow) ──────────────────────────────────────
        None => {
            let cfg = load_config(&cli)?;

            if cli.print_config {
                println!("{cfg:#?}");
                return Ok(());
            }

            let _guard = logging::init(cli.verbose, cfg.log.file.as_deref())?;
            commands::run::run(&cli, &cfg)?;
        },
    }

    Ok(())
}

/// [`load_merged_config`], recording a failure in the log file as well.
fn load_config(cli: &Cli) -> Result<config::Config> {
    load_merged_config(&cli.config).inspect_err(|e| {
        let log_file = config::fallback_log_file(|k| std::env::var(k).ok());
        if let Ok(_guard) = logging::init(cli.verbose, log_file.as_deref()) {
            error!("configuration error: {e:#}");
        }
    })
}

/// Load configuration from every layer and resolve it.
///
/// 1. `~/.config/db-backup-rs/config.toml`: global defaults
/// 2. `local_path` (default: `./db-backup.toml`): per-project settings
/// 3. `.env` in the working directory, loaded into the environment
/// 4. process environment variables
///
/// Later layers win per field.  Every layer may be absent, but the merged
/// result must name the database, its credentials and the key file.
fn load_merged_config(local_path: &Path) -> Result<config::Config> {
    let global_path = dirs_next::config_dir().map(|d| d.join("db-backup-rs").join("config.toml"));

    let global: PartialConfig = global_path
        .as_deref()
        .and_then(|p| parse_partial(p).ok().flatten())
        .unwrap_or_default();

    let local: PartialConfig = if let Some(p) = parse_partial(local_path)? {
        p
    } else {
        eprintln!(
            "Warning: config file '{}' not found, reading settings from the environment.\n\
             Run 'db-backup init' to generate a starter config.",
            local_path.display()
        );
        PartialConfig::default()
    };

    // A missing .env is normal; existing environment variables are not overridden.
    dotenvy::dotenv().ok();
    let env = PartialConfig::from_env()?;

    Ok(global.merge(local).merge(env).resolve()?)
}
