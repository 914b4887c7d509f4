//! Google Drive v3 implementation of [`RemoteStore`].
//!
//! Only three endpoints are used:
//!
//! | Operation | Request                                                        |
//! |-----------|----------------------------------------------------------------|
//! | upload    | `POST /upload/drive/v3/files?uploadType=resumable`, then `PUT` |
//! | list      | `GET /drive/v3/files?q=…&orderBy=createdTime desc`             |
//! | delete    | `DELETE /drive/v3/files/{id}`                                  |
//!
//! Uploads use the resumable protocol: the first request carries the JSON
//! metadata and returns a session URI in `Location`, the second streams the
//! file body to it.  The body is sent in one piece and never resumed.

use std::{
    fs::File,
    path::{Path, PathBuf},
    time::Duration,
};

use chrono::{DateTime, Utc};
use reqwest::{
    blocking::{Client, Response},
    header::{CONTENT_TYPE, LOCATION},
};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::{Connector, RemoteQuery, RemoteRecord, RemoteStore, auth::ServiceAccountKey};
use crate::error::RemoteError;

/// Per-file access: the service account only sees files it created.
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";
pub const GOOGLE_API_BASE: &str = "https://www.googleapis.com";
pub const GZIP_MIME: &str = "application/gzip";

const FILE_FIELDS: &str = "id,name,size,createdTime";
const LIST_FIELDS: &str = "nextPageToken,files(id,name,size,createdTime)";
const PAGE_SIZE: &str = "1000";

// ─── Connector ────────────────────────────────────────────────────────────────

/// Builds a [`DriveClient`] from a service-account key file.
#[derive(Debug, Clone)]
pub struct DriveConnector {
    key_file: PathBuf,
    api_base: String,
}

impl DriveConnector {
    pub fn new(key_file: impl Into<PathBuf>) -> Self {
        Self {
            key_file: key_file.into(),
            api_base: GOOGLE_API_BASE.into(),
        }
    }

    /// Point at a different API host.
    #[cfg(test)]
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    pub fn connect_drive(&self) -> Result<DriveClient, RemoteError> {
        let key = ServiceAccountKey::from_file(&self.key_file)?;
        // A large dump may take minutes to PUT; the request runs until it
        // finishes or the connection fails.
        let http = Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .timeout(None::<Duration>)
            .build()?;
        let token = key.fetch_token(&http, DRIVE_SCOPE)?;
        info!(client = %key.client_email, "authenticated with Google Drive");
        Ok(DriveClient {
            http,
            token,
            api_base: self.api_base.trim_end_matches('/').to_string(),
        })
    }
}

impl Connector for DriveConnector {
    fn connect(&self) -> Result<Box<dyn RemoteStore>, RemoteError> {
        Ok(Box::new(self.connect_drive()?))
    }
}

// ─── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFile {
    id: String,
    name: String,
    created_time: DateTime<Utc>,
    /// int64 fields arrive as JSON strings.
    #[serde(default)]
    size: Option<String>,
}

impl From<DriveFile> for RemoteRecord {
    fn from(f: DriveFile) -> Self {
        Self {
            id: f.id,
            name: f.name,
            created: f.created_time,
            size: f.size.and_then(|s| s.parse().ok()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

// ─── Query language ───────────────────────────────────────────────────────────

/// Drive string literals are single-quoted with backslash escapes.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Render `q` in Drive's search syntax.
pub fn build_query(q: &RemoteQuery) -> String {
    let mut s = format!(
        "name contains {} and name contains {}",
        quote(&q.name_prefix),
        quote(&q.name_suffix)
    );
    if let Some(folder) = &q.folder_id {
        s.push_str(&format!(" and {} in parents", quote(folder)));
    }
    s.push_str(" and trashed = false");
    s
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// An authenticated Drive session.
pub struct DriveClient {
    http: Client,
    token: String,
    api_base: String,
}

fn check(resp: Response, operation: &'static str) -> Result<Response, RemoteError> {
    let status = resp.status();
    if status.is_success() {
        Ok(resp)
    } else {
        Err(RemoteError::Api {
            operation,
            status: status.as_u16(),
            body: resp.text().unwrap_or_default(),
        })
    }
}

impl RemoteStore for DriveClient {
    fn upload(
        &self,
        path: &Path,
        name: &str,
        folder_id: Option<&str>,
    ) -> Result<RemoteRecord, RemoteError> {
        let io_err = |source| RemoteError::Io {
            path: path.to_path_buf(),
            source,
        };
        let file = File::open(path).map_err(io_err)?;
        let len = file.metadata().map_err(io_err)?.len();

        let mut metadata = json!({ "name": name, "mimeType": GZIP_MIME });
        if let Some(folder) = folder_id {
            metadata["parents"] = json!([folder]);
        }

        let init = self
            .http
            .post(format!("{}/upload/drive/v3/files", self.api_base))
            .query(&[("uploadType", "resumable"), ("fields", FILE_FIELDS)])
            .bearer_auth(&self.token)
            .header("X-Upload-Content-Type", GZIP_MIME)
            .header("X-Upload-Content-Length", len.to_string())
            .json(&metadata)
            .send()?;
        let init = check(init, "upload session")?;

        let session_uri = init
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .ok_or(RemoteError::MissingUploadLocation)?
            .to_string();
        debug!(%session_uri, bytes = len, "streaming upload body");

        let resp = self
            .http
            .put(&session_uri)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, GZIP_MIME)
            .body(file)
            .send()?;
        let created: DriveFile = check(resp, "upload")?.json()?;
        Ok(created.into())
    }

    fn list(&self, query: &RemoteQuery) -> Result<Vec<RemoteRecord>, RemoteError> {
        let q = build_query(query);
        debug!(%q, "listing Drive files");

        let url = format!("{}/drive/v3/files", self.api_base);
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self.http.get(&url).bearer_auth(&self.token).query(&[
                ("q", q.as_str()),
                ("orderBy", "createdTime desc"),
                ("fields", LIST_FIELDS),
                ("pageSize", PAGE_SIZE),
                ("spaces", "drive"),
            ]);
            if let Some(token) = &page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let page: FileList = check(req.send()?, "list")?.json()?;
            records.extend(page.files.into_iter().map(RemoteRecord::from));

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(records)
    }

    fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let resp = self
            .http
            .delete(format!("{}/drive/v3/files/{id}", self.api_base))
            .bearer_auth(&self.token)
            .send()?;
        check(resp, "delete")?;
        Ok(())
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::io::Write;

    use mockito::{Matcher, Mock, ServerGuard};

    use super::*;
    use crate::remote::test_support::key_json;

    /// A mock server with a working token endpoint, plus a key file for it.
    struct Fixture {
        server: ServerGuard,
        _token: Mock,
        _dir: tempfile::TempDir,
        key_file: PathBuf,
    }

    impl Fixture {
        fn new() -> Self {
            let mut server = mockito::Server::new();
            let token = server
                .mock("POST", "/token")
                .with_status(200)
                .with_header("content-type", "application/json")
                .with_body(r#"{"access_token":"ya29.test","expires_in":3599}"#)
                .create();
            let dir = tempfile::tempdir().unwrap();
            let key_file = dir.path().join("sa.json");
            std::fs::write(&key_file, key_json(&format!("{}/token", server.url()))).unwrap();
            Self {
                server,
                _token: token,
                _dir: dir,
                key_file,
            }
        }

        fn client(&self) -> DriveClient {
            DriveConnector::new(&self.key_file)
                .with_api_base(self.server.url())
                .connect_drive()
                .unwrap()
        }
    }

    fn file_json(id: &str, name: &str, created: &str) -> serde_json::Value {
        json!({ "id": id, "name": name, "createdTime": created, "size": "7" })
    }

    // ── build_query ───────────────────────────────────────────────────────────

    #[test]
    fn query_without_folder() {
        let q = RemoteQuery::for_source("shop", None);
        assert_eq!(
            build_query(&q),
            "name contains 'shop_backup_' and name contains '.sql.gz' and trashed = false"
        );
    }

    #[test]
    fn query_with_folder() {
        let q = RemoteQuery::for_source("shop", Some("folder-1"));
        assert_eq!(
            build_query(&q),
            "name contains 'shop_backup_' and name contains '.sql.gz' \
             and 'folder-1' in parents and trashed = false"
        );
    }

    #[test]
    fn query_escapes_quotes() {
        let q = RemoteQuery::for_source("o'brien", None);
        assert!(build_query(&q).starts_with(r"name contains 'o\'brien_backup_'"));
    }

    // ── connect ───────────────────────────────────────────────────────────────

    #[test]
    fn connect_fails_without_key_file() {
        let err = DriveConnector::new("/nonexistent/sa.json")
            .connect()
            .err()
            .expect("connect should fail");
        assert!(matches!(err, RemoteError::KeyFile { .. }));
    }

    // ── upload ────────────────────────────────────────────────────────────────

    #[test]
    fn upload_uses_resumable_session() {
        let mut fx = Fixture::new();
        let session_uri = format!("{}/upload/session/abc", fx.server.url());

        let init = fx
            .server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::UrlEncoded("uploadType".into(), "resumable".into()))
            .match_header("authorization", "Bearer ya29.test")
            .match_body(Matcher::PartialJson(json!({
                "name": "shop_backup_20240309_070501.sql.gz",
                "mimeType": "application/gzip",
                "parents": ["folder-1"],
            })))
            .with_status(200)
            .with_header("location", &session_uri)
            .create();
        let put = fx
            .server
            .mock("PUT", "/upload/session/abc")
            .match_body("payload")
            .with_status(200)
            .with_body(
                file_json("f1", "shop_backup_20240309_070501.sql.gz", "2024-03-09T07:05:02.000Z")
                    .to_string(),
            )
            .create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("shop_backup_20240309_070501.sql.gz");
        std::fs::write(&path, "payload").unwrap();

        let record = fx
            .client()
            .upload(&path, "shop_backup_20240309_070501.sql.gz", Some("folder-1"))
            .unwrap();

        assert_eq!(record.id, "f1");
        assert_eq!(record.size, Some(7));
        init.assert();
        put.assert();
    }

    #[test]
    fn upload_without_location_header_fails() {
        let mut fx = Fixture::new();
        let _init = fx
            .server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        std::fs::write(&path, "payload").unwrap();

        let err = fx.client().upload(&path, "a.sql.gz", None).unwrap_err();
        assert!(matches!(err, RemoteError::MissingUploadLocation));
    }

    #[test]
    fn upload_api_error_is_reported() {
        let mut fx = Fixture::new();
        let _init = fx
            .server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(403)
            .with_body("storageQuotaExceeded")
            .create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        std::fs::write(&path, "payload").unwrap();

        let err = fx.client().upload(&path, "a.sql.gz", None).unwrap_err();
        assert!(matches!(err, RemoteError::Api { status: 403, .. }));
    }

    #[test]
    fn slow_upload_is_not_cut_off() {
        let mut fx = Fixture::new();
        let session_uri = format!("{}/upload/session/slow", fx.server.url());
        let _init = fx
            .server
            .mock("POST", "/upload/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(200)
            .with_header("location", &session_uri)
            .create();
        // Longer than reqwest's default 30s total timeout for blocking clients.
        let _put = fx
            .server
            .mock("PUT", "/upload/session/slow")
            .with_status(200)
            .with_chunked_body(|w| {
                std::thread::sleep(Duration::from_secs(32));
                w.write_all(
                    file_json("f9", "a.sql.gz", "2024-01-01T00:00:00Z")
                        .to_string()
                        .as_bytes(),
                )
            })
            .create();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.sql.gz");
        std::fs::write(&path, "payload").unwrap();

        let record = fx.client().upload(&path, "a.sql.gz", None).unwrap();
        assert_eq!(record.id, "f9");
    }

    // ── list ──────────────────────────────────────────────────────────────────

    #[test]
    fn list_follows_page_tokens() {
        let mut fx = Fixture::new();
        let query = RemoteQuery::for_source("shop", Some("folder-1"));

        // First page: the query string ends at `spaces`, i.e. no pageToken yet.
        let first = fx
            .server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("q".into(), build_query(&query)),
                Matcher::UrlEncoded("orderBy".into(), "createdTime desc".into()),
                Matcher::Regex("spaces=drive$".into()),
            ]))
            .with_status(200)
            .with_body(
                json!({
                    "nextPageToken": "p2",
                    "files": [file_json("c", "shop_backup_3.sql.gz", "2024-01-03T00:00:00Z")],
                })
                .to_string(),
            )
            .create();
        let second = fx
            .server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::UrlEncoded("pageToken".into(), "p2".into()))
            .with_status(200)
            .with_body(
                json!({
                    "files": [
                        file_json("b", "shop_backup_2.sql.gz", "2024-01-02T00:00:00Z"),
                        file_json("a", "shop_backup_1.sql.gz", "2024-01-01T00:00:00Z"),
                    ],
                })
                .to_string(),
            )
            .create();

        let records = fx.client().list(&query).unwrap();
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["c", "b", "a"]);
        first.assert();
        second.assert();
    }

    #[test]
    fn list_error_names_operation() {
        let mut fx = Fixture::new();
        let _list = fx
            .server
            .mock("GET", "/drive/v3/files")
            .match_query(Matcher::Any)
            .with_status(500)
            .create();

        let err = fx
            .client()
            .list(&RemoteQuery::for_source("shop", None))
            .unwrap_err();
        assert!(matches!(err, RemoteError::Api { operation: "list", status: 500, .. }));
    }

    // ── delete ────────────────────────────────────────────────────────────────

    #[test]
    fn delete_by_id() {
        let mut fx = Fixture::new();
        let del = fx
            .server
            .mock("DELETE", "/drive/v3/files/f1")
            .match_header("authorization", "Bearer ya29.test")
            .with_status(204)
            .create();

        fx.client().delete("f1").unwrap();
        del.assert();
    }
}
