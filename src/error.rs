//! Typed errors for the three failure classes.
//!
//! | Type          | Raised by                     | Effect on the run          |
//! |---------------|-------------------------------|----------------------------|
//! | [`ConfigError`] | config resolution at startup | fatal, nothing runs        |
//! | [`DumpError`]   | dump + compress               | fatal to the run           |
//! | [`RemoteError`] | upload and remote cleanup     | logged, run still succeeds |
//!
//! The binary boundary (`main` and the command handlers) wraps these in
//! `anyhow` with extra context.

use std::{io, path::PathBuf};

use thiserror::Error;

// ─── Configuration ────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required settings are absent (or empty).
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("{var} must be {expected}, got '{value}'")]
    Invalid {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("reading {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("parsing {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

// ─── Dump + compress ──────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum DumpError {
    #[error("the dump command is empty")]
    EmptyCommand,

    #[error("failed to spawn {program}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    /// The dump utility ran but exited non-zero.  `stderr` is what it printed.
    #[error("{program} exited with {status}: {stderr}")]
    Exited {
        program: String,
        status: String,
        stderr: String,
    },

    /// A same-second run already produced this file; it is left untouched.
    #[error("{} already exists", .path.display())]
    Exists { path: PathBuf },

    #[error("writing {}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("compressing {}", .path.display())]
    Compress {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ─── Remote storage ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("reading service account key {}", .path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid service account key {}", .path.display())]
    KeyFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("signing the token assertion")]
    Sign(#[from] jsonwebtoken::errors::Error),

    #[error("http request failed")]
    Http(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("{operation} failed with HTTP {status}: {body}")]
    Api {
        operation: &'static str,
        status: u16,
        body: String,
    },

    #[error("upload session response carried no Location header")]
    MissingUploadLocation,

    #[error("reading {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_lists_every_variable() {
        let err = ConfigError::Missing(vec!["DB_USER", "DB_NAME"]);
        assert_eq!(
            err.to_string(),
            "missing required configuration: DB_USER, DB_NAME"
        );
    }

    #[test]
    fn exited_includes_stderr() {
        let err = DumpError::Exited {
            program: "mysqldump".into(),
            status: "exit status: 2".into(),
            stderr: "Access denied for user 'bob'".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("mysqldump"));
        assert!(msg.contains("Access denied"));
    }

    #[test]
    fn api_error_names_operation_and_status() {
        let err = RemoteError::Api {
            operation: "delete",
            status: 404,
            body: "not found".into(),
        };
        assert_eq!(err.to_string(), "delete failed with HTTP 404: not found");
    }
}
