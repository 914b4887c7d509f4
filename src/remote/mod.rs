//! Remote storage seam.
//!
//! The workflow only sees [`RemoteStore`].  [`drive`] implements it for
//! Google Drive; tests implement it in memory.
//!
//! A store is obtained through a [`Connector`] owned by a [`RemoteSession`].
//! The session connects on first use and keeps the store for the rest of the
//! process, which is what lets cleanup know whether a remote pass is possible
//! at all.

pub mod auth;
pub mod drive;

use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::{artifact, error::RemoteError};

/// A provider-side file mirroring an uploaded artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRecord {
    pub id: String,
    pub name: String,
    pub created: DateTime<Utc>,
    pub size: Option<u64>,
}

/// Which remote files belong to a source.
///
/// Matches non-trashed files whose name contains `name_prefix` and
/// `name_suffix`, optionally restricted to one parent folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteQuery {
    pub name_prefix: String,
    pub name_suffix: String,
    pub folder_id: Option<String>,
}

impl RemoteQuery {
    pub fn for_source(source: &str, folder_id: Option<&str>) -> Self {
        Self {
            name_prefix: artifact::name_prefix(source),
            name_suffix: artifact::ARTIFACT_SUFFIX.to_string(),
            folder_id: folder_id.map(String::from),
        }
    }

    /// Exact name check.  Drive's `name contains` is a fuzzy match, so
    /// listings are filtered through this before anything is counted.
    pub fn matches(&self, name: &str) -> bool {
        name.starts_with(&self.name_prefix) && name.ends_with(&self.name_suffix)
    }
}

pub trait RemoteStore {
    /// Upload the file at `path` as `name`, inside `folder_id` when given.
    fn upload(
        &self,
        path: &Path,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<RemoteRecord, RemoteError>;

    /// Files matching `query`, newest creation time first.
    fn list(&self, query: &RemoteQuery) -> Result<Vec<RemoteRecord>, RemoteError>;

    fn delete(&self, id: &str) -> Result<(), RemoteError>;
}

/// Opens an authenticated [`RemoteStore`].
pub trait Connector {
    fn connect(&self) -> Result<Box<dyn RemoteStore>, RemoteError>;
}

impl<F> Connector for F
where
    F: Fn() -> Result<Box<dyn RemoteStore>, RemoteError>,
{
    fn connect(&self) -> Result<Box<dyn RemoteStore>, RemoteError> {
        self()
    }
}

/// Lazily connected remote store, one per process.
pub struct RemoteSession {
    connector: Box<dyn Connector>,
    store: Option<Box<dyn RemoteStore>>,
}

impl RemoteSession {
    pub fn new(connector: Box<dyn Connector>) -> Self {
        Self {
            connector,
            store: None,
        }
    }

    /// The store, connecting first if this is the first call.
    ///
    /// A failed attempt leaves the session unconnected.
    pub fn connect(&mut self) -> Result<&dyn RemoteStore, RemoteError> {
        let store = match self.store.take() {
            Some(store) => store,
            None => {
                info!("opening remote storage session");
                let store = self.connector.connect()?;
                info!("remote storage session ready");
                store
            },
        };
        Ok(&**self.store.insert(store))
    }

    /// The store if a previous [`RemoteSession::connect`] succeeded.
    pub fn active(&self) -> Option<&dyn RemoteStore> {
        self.store.as_deref()
    }
}
