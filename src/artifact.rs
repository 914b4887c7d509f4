//! Backup artifact naming and local discovery.
//!
//! An artifact is one gzip-compressed dump named
//! `<source>_backup_<YYYYMMDD_HHMMSS>.sql.gz`, where `<source>` is the
//! database name.  The same name is used as the Drive file name, so the
//! pattern below is what both cleanup passes key on.

use std::{
    fs, io,
    path::{Path, PathBuf},
    time::SystemTime,
};

use chrono::{DateTime, Local};

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
pub const DUMP_SUFFIX: &str = ".sql";
pub const ARTIFACT_SUFFIX: &str = ".sql.gz";

/// `<source>_backup_`: every artifact of `source` starts with this.
pub fn name_prefix(source: &str) -> String {
    format!("{source}_backup_")
}

/// Name of the uncompressed dump written by the dump utility.
pub fn dump_file_name(source: &str, at: DateTime<Local>) -> String {
    format!(
        "{}{}{DUMP_SUFFIX}",
        name_prefix(source),
        at.format(TIMESTAMP_FORMAT)
    )
}

/// Whether `file_name` is an artifact of `source` (`<source>_backup_*.sql.gz`).
pub fn is_artifact_of(source: &str, file_name: &str) -> bool {
    file_name.starts_with(&name_prefix(source)) && file_name.ends_with(ARTIFACT_SUFFIX)
}

/// A compressed dump produced by this run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArtifact {
    pub name: String,
    pub path: PathBuf,
    /// Compressed size in bytes.
    pub size: u64,
    pub created: DateTime<Local>,
}

impl BackupArtifact {
    pub fn size_mb(&self) -> f64 {
        bytes_to_mb(self.size)
    }
}

/// An artifact found on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalEntry {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

#[allow(clippy::cast_precision_loss)]
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / (1024.0 * 1024.0)
}

/// All artifacts of `source` in `dir`, newest modification time first.
///
/// Ties are broken by name (descending) so the order is deterministic even on
/// filesystems with coarse mtimes.  A missing directory yields an empty list.
pub fn list_local(dir: &Path, source: &str) -> io::Result<Vec<LocalEntry>> {
    let read = match fs::read_dir(dir) {
        Ok(r) => r,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut entries = Vec::new();
    for entry in read {
        let entry = entry?;
        let Some(name) = entry.file_name().to_str().map(String::from) else {
            continue;
        };
        if !is_artifact_of(source, &name) {
            continue;
        }
        let meta = entry.metadata()?;
        if !meta.is_file() {
            continue;
        }
        entries.push(LocalEntry {
            name,
            path: entry.path(),
            size: meta.len(),
            modified: meta.modified()?,
        });
    }

    entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| b.name.cmp(&a.name)));
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn dump_name_has_second_resolution_timestamp() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(dump_file_name("shop", at), "shop_backup_20240309_070501.sql");
    }

    #[test]
    fn pattern_matching() {
        assert!(is_artifact_of("shop", "shop_backup_20240309_070501.sql.gz"));
        assert!(!is_artifact_of("shop", "shop_backup_20240309_070501.sql"));
        assert!(!is_artifact_of("shop", "shop2_backup_20240309_070501.sql.gz"));
        assert!(!is_artifact_of("shop", "notes.txt"));
    }

    #[test]
    fn list_local_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let got = list_local(&dir.path().join("nope"), "shop").unwrap();
        assert!(got.is_empty());
    }

    #[test]
    fn list_local_filters_and_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let names = [
            ("shop_backup_20240101_000000.sql.gz", 100),
            ("shop_backup_20240102_000000.sql.gz", 300),
            ("shop_backup_20240103_000000.sql.gz", 200),
            ("other_backup_20240104_000000.sql.gz", 400),
            ("shop_backup_20240105_000000.sql", 500),
        ];
        for (name, mtime) in names {
            let p = dir.path().join(name);
            fs::write(&p, b"x").unwrap();
            filetime::set_file_mtime(&p, filetime::FileTime::from_unix_time(mtime, 0)).unwrap();
        }

        let got: Vec<String> = list_local(dir.path(), "shop")
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(got, [
            "shop_backup_20240102_000000.sql.gz",
            "shop_backup_20240103_000000.sql.gz",
            "shop_backup_20240101_000000.sql.gz",
        ]);
    }

    #[test]
    fn size_in_megabytes() {
        assert!((bytes_to_mb(3 * 1024 * 1024) - 3.0).abs() < f64::EPSILON);
    }
}
