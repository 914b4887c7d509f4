//! Count-based retention.
//!
//! Both passes do the same thing: order a source's artifacts newest first and
//! delete everything after the first `keep`.  Local artifacts are ordered by
//! modification time, remote ones by creation time.
//!
//! A failure to delete one file is logged and the pass moves on to the next.

use std::{fs, io, path::Path};

use tracing::{info, warn};

use crate::{
    artifact,
    error::RemoteError,
    remote::{RemoteQuery, RemoteStore},
};

/// The tail of a newest-first list that falls outside the retention count.
pub fn expired<T>(newest_first: &[T], keep: usize) -> &[T] {
    newest_first.get(keep..).unwrap_or_default()
}

/// Delete all but the `keep` most recently modified artifacts of `source`.
///
/// Returns the names actually removed.  Errors only if the directory cannot
/// be listed.
pub fn prune_local(dir: &Path, source: &str, keep: usize) -> io::Result<Vec<String>> {
    let entries = artifact::list_local(dir, source)?;
    let mut removed = Vec::new();

    for old in expired(&entries, keep) {
        match fs::remove_file(&old.path) {
            Ok(()) => {
                info!(artifact = %old.name, "removed old local backup");
                removed.push(old.name.clone());
            },
            Err(e) => warn!(artifact = %old.name, error = %e, "could not remove old local backup"),
        }
    }

    Ok(removed)
}

/// Delete all but the `keep` most recently created remote records matching
/// `query`.
///
/// Records whose name does not match the artifact pattern exactly are
/// ignored.  The provider is asked for newest-first order, but the list is
/// re-sorted here so the guarantee does not depend on it.  Errors only if
/// listing fails.
pub fn prune_remote(
    store: &dyn RemoteStore,
    query: &RemoteQuery,
    keep: usize,
) -> Result<Vec<String>, RemoteError> {
    let mut records = store.list(query)?;
    records.retain(|r| query.matches(&r.name));
    records.sort_by(|a, b| b.created.cmp(&a.created));

    let mut removed = Vec::new();
    for old in expired(&records, keep) {
        match store.delete(&old.id) {
            Ok(()) => {
                info!(name = %old.name, id = %old.id, "removed old remote backup");
                removed.push(old.name.clone());
            },
            Err(e) => warn!(name = %old.name, id = %old.id, error = %e, "could not remove old remote backup"),
        }
    }

    Ok(removed)
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::{cell::RefCell, path::PathBuf};

    use chrono::{TimeZone, Utc};
    use filetime::{FileTime, set_file_mtime};

    use super::*;
    use crate::remote::RemoteRecord;

    // ── expired ───────────────────────────────────────────────────────────────

    #[test]
    fn expired_is_the_tail_after_keep() {
        assert_eq!(expired(&[5, 4, 3, 2, 1], 2), &[3, 2, 1]);
    }

    #[test]
    fn nothing_expires_when_under_the_limit() {
        assert!(expired(&[2, 1], 2).is_empty());
        assert!(expired(&[1], 7).is_empty());
        assert!(expired::<u8>(&[], 3).is_empty());
    }

    // ── prune_local ───────────────────────────────────────────────────────────

    /// Write `count` artifacts of `shop`, artifact `i` with mtime `1000 + i`.
    fn seed(dir: &Path, count: i64) -> Vec<PathBuf> {
        (0..count)
            .map(|i| {
                let p = dir.join(format!("shop_backup_2024010{i}_000000.sql.gz"));
                fs::write(&p, b"x").unwrap();
                set_file_mtime(&p, FileTime::from_unix_time(1000 + i, 0)).unwrap();
                p
            })
            .collect()
    }

    #[test]
    fn keeps_exactly_the_newest_k() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seed(dir.path(), 5);

        let removed = prune_local(dir.path(), "shop", 3).unwrap();

        assert_eq!(removed.len(), 2);
        assert!(!paths[0].exists());
        assert!(!paths[1].exists());
        assert!(paths[2].exists() && paths[3].exists() && paths[4].exists());
    }

    #[test]
    fn ordering_is_by_mtime_not_name() {
        let dir = tempfile::tempdir().unwrap();
        let paths = seed(dir.path(), 3);
        // Make the alphabetically first file the newest.
        set_file_mtime(&paths[0], FileTime::from_unix_time(9999, 0)).unwrap();

        prune_local(dir.path(), "shop", 1).unwrap();

        assert!(paths[0].exists());
        assert!(!paths[1].exists());
        assert!(!paths[2].exists());
    }

    #[test]
    fn other_sources_and_stray_files_are_untouched() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), 3);
        let other = dir.path().join("billing_backup_20240101_000000.sql.gz");
        let stray = dir.path().join("notes.txt");
        fs::write(&other, b"x").unwrap();
        fs::write(&stray, b"x").unwrap();

        prune_local(dir.path(), "shop", 1).unwrap();

        assert!(other.exists());
        assert!(stray.exists());
    }

    // ── prune_remote ──────────────────────────────────────────────────────────

    /// In-memory store returning records in whatever order they were given.
    struct Listing {
        records: Vec<RemoteRecord>,
        deleted: RefCell<Vec<String>>,
        fail_delete: Option<&'static str>,
    }

    impl RemoteStore for Listing {
        fn upload(&self, _: &Path, _: &str, _: Option<&str>) -> Result<RemoteRecord, RemoteError> {
            unreachable!("retention never uploads")
        }

        fn list(&self, _: &RemoteQuery) -> Result<Vec<RemoteRecord>, RemoteError> {
            Ok(self.records.clone())
        }

        fn delete(&self, id: &str) -> Result<(), RemoteError> {
            if self.fail_delete == Some(id) {
                return Err(RemoteError::Api {
                    operation: "delete",
                    status: 500,
                    body: String::new(),
                });
            }
            self.deleted.borrow_mut().push(id.to_string());
            Ok(())
        }
    }

    fn record(id: &str, day: u32) -> RemoteRecord {
        RemoteRecord {
            id: id.into(),
            name: format!("shop_backup_202401{day:02}_000000.sql.gz"),
            created: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            size: None,
        }
    }

    #[test]
    fn remote_keeps_two_of_five_deleting_the_three_oldest() {
        // Deliberately shuffled: ordering must come from creation time.
        let store = Listing {
            records: vec![
                record("d3", 3),
                record("d5", 5),
                record("d1", 1),
                record("d4", 4),
                record("d2", 2),
            ],
            deleted: RefCell::default(),
            fail_delete: None,
        };

        let removed =
            prune_remote(&store, &RemoteQuery::for_source("shop", None), 2).unwrap();

        assert_eq!(removed.len(), 3);
        let mut deleted = store.deleted.borrow().clone();
        deleted.sort();
        assert_eq!(deleted, ["d1", "d2", "d3"]);
    }

    #[test]
    fn remote_lookalikes_are_neither_counted_nor_deleted() {
        let mut lookalike = record("x", 1);
        lookalike.name = "shop_backup_20240101_000000.sql.gz.bak".into();
        let mut other_db = record("y", 2);
        other_db.name = "myshop_backup_20240102_000000.sql.gz".into();
        let store = Listing {
            records: vec![record("d3", 3), lookalike, other_db, record("d4", 4)],
            deleted: RefCell::default(),
            fail_delete: None,
        };

        let removed =
            prune_remote(&store, &RemoteQuery::for_source("shop", None), 1).unwrap();

        assert_eq!(removed, ["shop_backup_20240103_000000.sql.gz"]);
        assert_eq!(*store.deleted.borrow(), ["d3"]);
    }

    #[test]
    fn remote_delete_failure_does_not_stop_the_pass() {
        let store = Listing {
            records: vec![record("d3", 3), record("d2", 2), record("d1", 1)],
            deleted: RefCell::default(),
            fail_delete: Some("d2"),
        };

        let removed =
            prune_remote(&store, &RemoteQuery::for_source("shop", None), 1).unwrap();

        assert_eq!(removed, ["shop_backup_20240101_000000.sql.gz"]);
        assert_eq!(*store.deleted.borrow(), ["d1"]);
    }
}
