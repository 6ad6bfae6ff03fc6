//! Google Drive client: folder listing and file metadata.
//!
//! Authenticates as a service account. The key file's private key signs an
//! RS256 JWT assertion which is exchanged for a short-lived access token; the
//! token is cached until a minute before it expires.
//!
//! Both trait implementations fail soft: listing returns an empty list and
//! metadata returns `"N/A"` values on any error, including a missing or
//! unreadable key file.

use std::path::Path;

use async_trait::async_trait;
use autopost_core::config::AutopostConfig;
use autopost_core::contract::{FileMetadata, MetadataFetcher, SourceFile, SourceLister, NOT_AVAILABLE};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::http::snippet;

const FILES_ENDPOINT: &str = "https://www.googleapis.com/drive/v3/files";
const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DRIVE_READONLY_SCOPE: &str = "https://www.googleapis.com/auth/drive.readonly";
const LIST_FIELDS: &str = "nextPageToken, files(id, name, mimeType, size)";
const TOKEN_LIFETIME_SECS: i64 = 3600;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// The fields of a service-account key file this client needs.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    pub fn from_file(path: &Path) -> Result<Self, BoxError> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    fn token_uri(&self) -> &str {
        self.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI)
    }
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

fn assertion_claims(key: &ServiceAccountKey, now: DateTime<Utc>) -> Claims<'_> {
    let iat = now.timestamp();
    Claims {
        iss: &key.client_email,
        scope: DRIVE_READONLY_SCOPE,
        aud: key.token_uri(),
        iat,
        exp: iat + TOKEN_LIFETIME_SECS,
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
}

fn default_expires_in() -> i64 {
    TOKEN_LIFETIME_SECS
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_after: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileList {
    #[serde(default)]
    files: Vec<SourceFile>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileFields {
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Drive v3 query selecting the non-trashed children of a folder.
pub fn folder_query(folder_id: &str) -> String {
    let escaped = folder_id.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}' in parents and trashed=false")
}

pub struct DriveClient {
    http: reqwest::Client,
    key: Option<ServiceAccountKey>,
    token: Mutex<Option<CachedToken>>,
}

impl DriveClient {
    /// Loads the service-account key named in the config. Problems are
    /// logged and leave the client without credentials.
    pub fn from_config(config: &AutopostConfig, http: reqwest::Client) -> Self {
        let key = match &config.drive.service_account_path {
            None => {
                info!("No service account configured, Drive access disabled");
                None
            }
            Some(path) if !path.exists() => {
                error!(path = %path.display(), "Service account file does not exist");
                None
            }
            Some(path) => match ServiceAccountKey::from_file(path) {
                Ok(key) => {
                    info!(client_email = %key.client_email, "Loaded Drive service account");
                    Some(key)
                }
                Err(e) => {
                    error!(error = ?e, path = %path.display(), "Failed to load service account key");
                    None
                }
            },
        };
        Self::new(http, key)
    }

    pub fn new(http: reqwest::Client, key: Option<ServiceAccountKey>) -> Self {
        Self {
            http,
            key,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, BoxError> {
        let key = self
            .key
            .as_ref()
            .ok_or("Drive service account not configured")?;

        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Utc::now() < token.refresh_after {
                return Ok(token.value.clone());
            }
        }

        let claims = assertion_claims(key, Utc::now());
        let signing_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &signing_key)?;

        let resp = self
            .http
            .post(key.token_uri())
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(format!("token exchange failed ({status}): {}", snippet(&body, 200)).into());
        }
        let token: TokenResponse = resp.json().await?;
        debug!(expires_in = token.expires_in, "Obtained Drive access token");

        *cached = Some(CachedToken {
            value: token.access_token.clone(),
            refresh_after: Utc::now() + Duration::seconds((token.expires_in - 60).max(0)),
        });
        Ok(token.access_token)
    }

    async fn try_list(&self, folder_id: &str, page_size: u32) -> Result<Vec<SourceFile>, BoxError> {
        let token = self.access_token().await?;
        let query = folder_query(folder_id);
        let page_size = page_size.to_string();
        let mut files = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = vec![
                ("q", query.as_str()),
                ("fields", LIST_FIELDS),
                ("pageSize", page_size.as_str()),
                ("orderBy", "createdTime desc"),
            ];
            if let Some(t) = page_token.as_deref() {
                params.push(("pageToken", t));
            }

            let resp = self
                .http
                .get(FILES_ENDPOINT)
                .bearer_auth(&token)
                .query(&params)
                .send()
                .await?;
            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(format!("files.list failed ({status}): {}", snippet(&body, 200)).into());
            }

            let page: FileList = resp.json().await?;
            files.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(files)
    }

    async fn try_metadata(&self, file_id: &str) -> Result<FileMetadata, BoxError> {
        let token = self.access_token().await?;
        let resp = self
            .http
            .get(format!("{FILES_ENDPOINT}/{file_id}"))
            .bearer_auth(&token)
            .query(&[("fields", "size,mimeType")])
            .send()
            .await?
            .error_for_status()?;
        let fields: FileFields = resp.json().await?;
        Ok(FileMetadata {
            size: fields.size.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            mime_type: fields.mime_type.unwrap_or_else(|| NOT_AVAILABLE.to_string()),
        })
    }
}

#[async_trait]
impl SourceLister for DriveClient {
    async fn list_files(&self, folder_id: &str, page_size: Option<u32>) -> Vec<SourceFile> {
        if folder_id.is_empty() {
            error!("No Drive folder id given");
            return Vec::new();
        }
        match self.try_list(folder_id, page_size.unwrap_or(1000)).await {
            Ok(files) => {
                info!(count = files.len(), folder_id, "Listed files from Drive folder");
                files
            }
            Err(e) => {
                error!(error = %e, folder_id, "Failed to list Drive files");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl MetadataFetcher for DriveClient {
    async fn fetch_metadata(&self, file_id: &str) -> FileMetadata {
        match self.try_metadata(file_id).await {
            Ok(meta) => meta,
            Err(e) => {
                warn!(error = %e, file_id, "Failed to fetch Drive metadata");
                FileMetadata::unavailable()
            }
        }
    }
}
