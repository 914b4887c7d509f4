//! Configuration types and loading logic.
//!
//! Settings come from up to four layers, lowest precedence first:
//!
//! 1. `~/.config/db-backup-rs/config.toml` (global defaults)
//! 2. the `--config` file (default `./db-backup.toml`)
//! 3. a `.env` file in the working directory (loaded into the environment)
//! 4. process environment variables (`DB_USER`, `DB_PASS`, …)
//!
//! Every layer deserialises into a [`PartialConfig`] where each field is
//! optional.  Layers are combined with [`PartialConfig::merge`] and turned into
//! a validated [`Config`] by [`PartialConfig::resolve`], which is where missing
//! required settings are reported.
//!
//! # File format
//!
//! ```toml
//! [database]
//! user         = "backup"
//! password     = "s3cret"
//! host         = "localhost"   # default
//! port         = 3306          # default
//! name         = "shop"
//! dump_command = "mysqldump"   # default
//!
//! [drive]
//! service_account_file = "/etc/db-backup/service-account.json"
//! folder_id            = "1AbC…"  # optional
//!
//! [backup]
//! dir            = "./backups"  # default
//! keep           = 7            # default
//! retention_days = 30           # read but not applied
//!
//! [log]
//! file = "db_backup.log"        # default; "" disables the log file
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// ─── Resolved config ──────────────────────────────────────────────────────────

/// Fully resolved, validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub drive: DriveConfig,
    pub backup: BackupConfig,
    pub log: LogConfig,
}

/// Connection parameters handed to the dump utility.
#[derive(Clone)]
pub struct DatabaseConfig {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Database name.  Doubles as the logical source name in artifact names.
    pub name: String,
    /// Program (plus optional leading arguments) used to produce the dump,
    /// e.g. `mysqldump` or `docker exec db mysqldump`.
    pub dump_command: String,
}

// Hand-written so `--print-config` and log lines never leak the password.
impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("dump_command", &self.dump_command)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct DriveConfig {
    /// Path to the Google service-account JSON key.
    pub service_account_file: PathBuf,
    /// Drive folder that uploads are placed in and cleanup is scoped to.
    pub folder_id: Option<String>,
}

/// Where artifacts live and how many survive cleanup.
#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub dir: PathBuf,
    /// Number of most recent artifacts to keep, locally and remotely.
    pub keep: usize,
    /// Parsed for compatibility; no cleanup pass consults it.
    pub retention_days: u32,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Append-only log file.  `None` disables file logging.
    pub file: Option<PathBuf>,
}

// ─── Partial layers ───────────────────────────────────────────────────────────

/// One configuration layer.  Absent fields defer to lower layers / defaults.
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialConfig {
    pub database: PartialDatabase,
    pub drive: PartialDrive,
    pub backup: PartialBackup,
    pub log: PartialLog,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialDatabase {
    pub user: Option<String>,
    pub password: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
    pub dump_command: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialDrive {
    pub service_account_file: Option<PathBuf>,
    pub folder_id: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialBackup {
    pub dir: Option<PathBuf>,
    pub keep: Option<usize>,
    pub retention_days: Option<u32>,
}

#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PartialLog {
    pub file: Option<PathBuf>,
}

// ─── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 3306;
pub const DEFAULT_DUMP_COMMAND: &str = "mysqldump";
pub const DEFAULT_BACKUP_DIR: &str = "./backups";
pub const DEFAULT_KEEP: usize = 7;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const DEFAULT_LOG_FILE: &str = "db_backup.log";

// ─── Merge / resolve ──────────────────────────────────────────────────────────

/// `Some("")` counts as unset, matching how shell-style env files are usually
/// written (`DB_PASS=`).
fn non_empty(v: Option<String>) -> Option<String> {
    v.filter(|s| !s.trim().is_empty())
}

impl PartialConfig {
    /// Overlay `other` on top of `self`; `other` wins field by field.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            database: PartialDatabase {
                user: other.database.user.or(self.database.user),
                password: other.database.password.or(self.database.password),
                host: other.database.host.or(self.database.host),
                port: other.database.port.or(self.database.port),
                name: other.database.name.or(self.database.name),
                dump_command: other.database.dump_command.or(self.database.dump_command),
            },
            drive: PartialDrive {
                service_account_file: other
                    .drive
                    .service_account_file
                    .or(self.drive.service_account_file),
                folder_id: other.drive.folder_id.or(self.drive.folder_id),
            },
            backup: PartialBackup {
                dir: other.backup.dir.or(self.backup.dir),
                keep: other.backup.keep.or(self.backup.keep),
                retention_days: other.backup.retention_days.or(self.backup.retention_days),
            },
            log: PartialLog {
                file: other.log.file.or(self.log.file),
            },
        }
    }

    /// Build a layer from environment-style variables.
    ///
    /// `lookup` is usually `|k| std::env::var(k).ok()`; tests pass a map so
    /// they never touch the real process environment.  Empty values are
    /// treated as unset.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| non_empty(lookup(k));

        Ok(Self {
            database: PartialDatabase {
                user: get("DB_USER"),
                password: get("DB_PASS"),
                host: get("DB_HOST"),
                port: parse_var("DB_PORT", get("DB_PORT"), "a port number")?,
                name: get("DB_NAME"),
                dump_command: get("DB_DUMP_COMMAND"),
            },
            drive: PartialDrive {
                service_account_file: get("GOOGLE_SERVICE_ACCOUNT_FILE").map(PathBuf::from),
                folder_id: get("GOOGLE_DRIVE_FOLDER_ID"),
            },
            backup: PartialBackup {
                dir: get("BACKUP_LOCAL_DIR").map(PathBuf::from),
                keep: parse_var("MAX_BACKUPS_TO_KEEP", get("MAX_BACKUPS_TO_KEEP"), "a count")?,
                retention_days: parse_var(
                    "BACKUP_RETENTION_DAYS",
                    get("BACKUP_RETENTION_DAYS"),
                    "a number of days",
                )?,
            },
            log: PartialLog {
                // Not passed through `non_empty`: an empty value is how the
                // file log is switched off.
                file: lookup("BACKUP_LOG_FILE").map(PathBuf::from),
            },
        })
    }

    /// Environment layer read from the real process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|k| std::env::var(k).ok())
    }

    /// Apply defaults and validate.
    ///
    /// Every missing required setting is collected so the error names all of
    /// them at once rather than one per attempt.
    pub fn resolve(self) -> Result<Config, ConfigError> {
        let db = self.database;
        let user = non_empty(db.user);
        let password = non_empty(db.password);
        let name = non_empty(db.name);
        let key_file = self
            .drive
            .service_account_file
            .filter(|p| !p.as_os_str().is_empty());

        let mut missing = Vec::new();
        if user.is_none() {
            missing.push("DB_USER");
        }
        if password.is_none() {
            missing.push("DB_PASS");
        }
        if name.is_none() {
            missing.push("DB_NAME");
        }
        if key_file.is_none() {
            missing.push("GOOGLE_SERVICE_ACCOUNT_FILE");
        }

        let (Some(user), Some(password), Some(name), Some(service_account_file)) =
            (user, password, name, key_file)
        else {
            return Err(ConfigError::Missing(missing));
        };

        let keep = self.backup.keep.unwrap_or(DEFAULT_KEEP);
        if keep == 0 {
            return Err(ConfigError::Invalid {
                var: "MAX_BACKUPS_TO_KEEP",
                value: keep.to_string(),
                expected: "at least 1",
            });
        }

        let dump_command = non_empty(db.dump_command).unwrap_or_else(|| DEFAULT_DUMP_COMMAND.into());

        Ok(Config {
            database: DatabaseConfig {
                user,
                password,
                host: non_empty(db.host).unwrap_or_else(|| DEFAULT_HOST.into()),
                port: db.port.unwrap_or(DEFAULT_PORT),
                name,
                dump_command,
            },
            drive: DriveConfig {
                service_account_file,
                folder_id: non_empty(self.drive.folder_id),
            },
            backup: BackupConfig {
                dir: self
                    .backup
                    .dir
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
                keep,
                retention_days: self
                    .backup
                    .retention_days
                    .unwrap_or(DEFAULT_RETENTION_DAYS),
            },
            log: LogConfig {
                file: match self.log.file {
                    Some(p) if p.as_os_str().is_empty() => None,
                    Some(p) => Some(p),
                    None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
                },
            },
        })
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    raw: Option<String>,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            value,
            expected,
        })
    })
    .transpose()
}

// ─── Loader ───────────────────────────────────────────────────────────────────

/// Read one TOML layer from `path`.
///
/// Returns `Ok(None)` when the file does not exist, so callers can decide
/// whether that deserves a warning.  Errors if the file exists but cannot be
/// read or is not valid TOML.
pub fn parse_partial(path: &Path) -> Result<Option<PartialConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str(&text)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Log file to use when the configuration cannot be resolved.
///
/// Follows `BACKUP_LOG_FILE` (empty disables it), else the default.  The
/// TOML layers are not consulted since they may be what failed.
pub fn fallback_log_file<F>(lookup: F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup("BACKUP_LOG_FILE") {
        Some(v) if v.is_empty() => None,
        Some(v) => Some(PathBuf::from(v)),
        None => Some(PathBuf::from(DEFAULT_LOG_FILE)),
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
