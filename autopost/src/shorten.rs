//! exe.io link shortener.

use async_trait::async_trait;
use autopost_core::contract::LinkShortener;
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::http::snippet;

const ENDPOINT: &str = "https://exe.io/api";

#[derive(Debug, Default, Deserialize)]
struct ShortenResponse {
    #[serde(default, rename = "shortenedUrl")]
    shortened_url: Option<String>,
    #[serde(default)]
    short: Option<String>,
}

impl ShortenResponse {
    fn short_url(self) -> Option<String> {
        self.shortened_url
            .filter(|s| !s.is_empty())
            .or(self.short.filter(|s| !s.is_empty()))
    }
}

pub struct ExeIoClient {
    http: reqwest::Client,
    api_key: Option<String>,
    endpoint: String,
}

impl ExeIoClient {
    pub fn new(http: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            http,
            api_key,
            endpoint: ENDPOINT.to_string(),
        }
    }

    async fn try_shorten(&self, api_key: &str, long_url: &str) -> Result<Option<String>, reqwest::Error> {
        let resp = self
            .http
            .get(&self.endpoint)
            .query(&[("api", api_key), ("url", long_url)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = snippet(&body, 200), "exe.io returned an error");
            return Ok(None);
        }
        let parsed: ShortenResponse = resp.json().await?;
        Ok(parsed.short_url())
    }
}

#[async_trait]
impl LinkShortener for ExeIoClient {
    async fn shorten(&self, long_url: &str) -> String {
        let Some(api_key) = self.api_key.as_deref() else {
            warn!("EXE_IO_API_KEY not set, keeping the original URL");
            return long_url.to_string();
        };

        match self.try_shorten(api_key, long_url).await {
            Ok(Some(short)) => {
                debug!(long_url, short = %short, "Shortened URL");
                short
            }
            Ok(None) => {
                error!(long_url, "exe.io response had no short URL");
                long_url.to_string()
            }
            Err(e) => {
                error!(error = %e, long_url, "Failed to shorten URL");
                long_url.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_shortened_url_then_short() {
        let r: ShortenResponse =
            serde_json::from_str(r#"{"status":"success","shortenedUrl":"https://exe.io/a"}"#).unwrap();
        assert_eq!(r.short_url().as_deref(), Some("https://exe.io/a"));

        let r: ShortenResponse =
            serde_json::from_str(r#"{"shortenedUrl":"","short":"https://exe.io/b"}"#).unwrap();
        assert_eq!(r.short_url().as_deref(), Some("https://exe.io/b"));

        let r: ShortenResponse = serde_json::from_str(r#"{"status":"error"}"#).unwrap();
        assert_eq!(r.short_url(), None);
    }

    #[tokio::test]
    async fn missing_key_returns_original() {
        let client = ExeIoClient::new(reqwest::Client::new(), None);
        let url = "https://drive.google.com/uc?id=f1&export=download";
        assert_eq!(client.shorten(url).await, url);
    }
}
