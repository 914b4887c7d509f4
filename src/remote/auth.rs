//! Google service-account authentication.
//!
//! The key file's private key signs a short-lived RS256 JWT which is traded at
//! the key's `token_uri` for an OAuth2 access token
//! (the "JWT bearer" grant).  The token is used as-is for the rest of the run;
//! a single backup finishes well inside its one-hour lifetime.

use std::path::Path;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RemoteError;

pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime requested for the assertion; Google caps it at one hour.
const ASSERTION_TTL_SECS: i64 = 3600;

/// The fields of a service-account JSON key this crate needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub private_key_id: Option<String>,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    DEFAULT_TOKEN_URI.into()
}

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    iss: String,
    scope: String,
    aud: String,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, RemoteError> {
        let text = std::fs::read_to_string(path).map_err(|source| RemoteError::KeyFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| RemoteError::KeyFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Signed assertion for `scope`, issued at `now` (unix seconds).
    pub fn assertion(&self, scope: &str, now: i64) -> Result<String, RemoteError> {
        let claims = Claims {
            iss: self.client_email.clone(),
            scope: scope.to_string(),
            aud: self.token_uri.clone(),
            iat: now,
            exp: now + ASSERTION_TTL_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid.clone_from(&self.private_key_id);
        let key = EncodingKey::from_rsa_pem(self.private_key.as_bytes())?;
        Ok(jsonwebtoken::encode(&header, &claims, &key)?)
    }

    /// Exchange a fresh assertion for an access token.
    pub fn fetch_token(&self, http: &Client, scope: &str) -> Result<String, RemoteError> {
        let assertion = self.assertion(scope, chrono::Utc::now().timestamp())?;
        debug!(token_uri = %self.token_uri, client = %self.client_email, "requesting access token");

        let resp = http
            .post(&self.token_uri)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
            .send()?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RemoteError::Api {
                operation: "token exchange",
                status: status.as_u16(),
                body: resp.text().unwrap_or_default(),
            });
        }

        Ok(resp.json::<TokenResponse>()?.access_token)
    }
}
