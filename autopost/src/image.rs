//! Downloads preview images into temporary files.

use async_trait::async_trait;
use autopost_core::contract::ImageFetcher;
use tempfile::NamedTempFile;
use tracing::{debug, error};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn try_fetch(&self, url: &str) -> Result<NamedTempFile, BoxError> {
        let resp = self.http.get(url).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("image download returned {status}").into());
        }
        let bytes = resp.bytes().await?;

        let file = write_temp(&bytes, url_extension(url)).await?;
        debug!(url, bytes = bytes.len(), path = %file.path().display(), "Downloaded image");
        Ok(file)
    }
}

/// Write `bytes` to a new temporary file ending in `suffix`.
async fn write_temp(bytes: &[u8], suffix: &str) -> std::io::Result<NamedTempFile> {
    let file = tempfile::Builder::new()
        .prefix("autopost-")
        .suffix(suffix)
        .tempfile()?;
    tokio::fs::write(file.path(), bytes).await?;
    Ok(file)
}

/// Extension of the URL's last path segment including the dot, or `""`.
pub fn url_extension(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let last = path.rsplit('/').next().unwrap_or(path);
    match last.rfind('.') {
        Some(idx) if idx > 0 => &last[idx..],
        _ => "",
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_image(&self, url: &str) -> Option<NamedTempFile> {
        if url.is_empty() {
            error!("Image fetch called without a URL");
            return None;
        }
        match self.try_fetch(url).await {
            Ok(file) => Some(file),
            Err(e) => {
                error!(error = %e, url, "Failed to download image");
                None
            }
        }
    }
}
