//! WordPress REST client (`/wp-json/wp/v2`).
//!
//! Requests use HTTP basic auth with an application password when both user
//! and password are configured. Every failure is logged and surfaces as `None`.

use std::path::Path;

use async_trait::async_trait;
use autopost_core::config::AutopostConfig;
use autopost_core::contract::{MediaRef, NewPost, PublishTiming, PublishedPost, Publisher};
use chrono::{DateTime, Utc};
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::http::snippet;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// JSON body of `POST /posts`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PostBody<'a> {
    pub title: &'a str,
    pub content: &'a str,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_media: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_gmt: Option<String>,
}

impl<'a> PostBody<'a> {
    pub fn build(post: &'a NewPost, now: DateTime<Utc>) -> Self {
        let (status, date_gmt) = match PublishTiming::resolve(post.publish_date, now) {
            PublishTiming::Now => ("publish", None),
            PublishTiming::Backdated(at) => ("publish", Some(wp_date(at))),
            PublishTiming::Future(at) => ("future", Some(wp_date(at))),
        };
        Self {
            title: &post.title,
            content: &post.content,
            status,
            featured_media: post.featured_media.map(|m| m.0),
            date_gmt,
        }
    }
}

/// WordPress expects `date_gmt` without an offset suffix.
fn wp_date(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S").to_string()
}

#[derive(Debug, Deserialize)]
struct CreatedPost {
    id: i64,
    #[serde(default)]
    link: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
struct CreatedMedia {
    id: i64,
}

/// MIME type for an upload, from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}

pub struct WordPressClient {
    http: reqwest::Client,
    api_base: String,
    user: Option<String>,
    password: Option<String>,
}

impl WordPressClient {
    pub fn from_config(config: &AutopostConfig, http: reqwest::Client) -> Self {
        Self {
            http,
            api_base: config.wp_api_base(),
            user: config.wordpress.user.clone(),
            password: config.wordpress.password.clone(),
        }
    }

    fn url(&self, path: &str) -> Option<String> {
        if self.api_base.is_empty() {
            error!("WP_SITE_URL not configured");
            return None;
        }
        Some(format!("{}/{path}", self.api_base))
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        match (&self.user, &self.password) {
            (Some(user), Some(password)) => req.basic_auth(user, Some(password)),
            _ => req,
        }
    }

    async fn try_create(&self, url: &str, body: &PostBody<'_>) -> Result<Option<CreatedPost>, BoxError> {
        let resp = self.authed(self.http.post(url)).json(body).send().await?;
        let status = resp.status();
        if status.as_u16() == 200 || status.as_u16() == 201 {
            return Ok(Some(resp.json().await?));
        }
        let text = resp.text().await.unwrap_or_default();
        error!(%status, body = snippet(&text, 300), "WordPress rejected post");
        Ok(None)
    }

    async fn try_upload(&self, url: &str, file_path: &Path) -> Result<Option<CreatedMedia>, BoxError> {
        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload.bin");

        let resp = self
            .authed(self.http.post(url))
            .header(CONTENT_DISPOSITION, format!("attachment; filename={file_name}"))
            .header(CONTENT_TYPE, content_type_for(file_path))
            .body(bytes)
            .send()
            .await?;
        let status = resp.status();
        if status.as_u16() == 200 || status.as_u16() == 201 {
            return Ok(Some(resp.json().await?));
        }
        let text = resp.text().await.unwrap_or_default();
        error!(%status, path = %file_path.display(), body = snippet(&text, 200), "WordPress rejected media upload");
        Ok(None)
    }

    /// Set the attachment's alt text. Failure leaves the media usable.
    async fn set_alt_text(&self, media: MediaRef, alt_text: &str) {
        let Some(url) = self.url(&format!("media/{}", media.0)) else {
            return;
        };
        let result = self
            .authed(self.http.post(&url))
            .json(&serde_json::json!({ "alt_text": alt_text }))
            .send()
            .await
            .and_then(|r| r.error_for_status());
        if let Err(e) = result {
            warn!(error = %e, media_id = media.0, "Failed to set media alt text");
        }
    }
}

#[async_trait]
impl Publisher for WordPressClient {
    async fn upload_media(&self, file_path: &Path, alt_text: &str) -> Option<MediaRef> {
        if !file_path.exists() {
            error!(path = %file_path.display(), "Media file to upload does not exist");
            return None;
        }
        let url = self.url("media")?;

        let media = match self.try_upload(&url, file_path).await {
            Ok(Some(created)) => MediaRef(created.id),
            Ok(None) => return None,
            Err(e) => {
                error!(error = %e, path = %file_path.display(), "Media upload failed");
                return None;
            }
        };
        info!(path = %file_path.display(), media_id = media.0, "Uploaded media");

        if !alt_text.is_empty() {
            self.set_alt_text(media, alt_text).await;
        }
        Some(media)
    }

    async fn create_post(&self, post: NewPost) -> Option<PublishedPost> {
        let url = self.url("posts")?;
        let body = PostBody::build(&post, Utc::now());

        match self.try_create(&url, &body).await {
            Ok(Some(created)) => {
                info!(post_id = created.id, status = %created.status, link = %created.link, "Created post");
                Some(PublishedPost {
                    id: created.id,
                    link: created.link,
                    status: created.status,
                })
            }
            Ok(None) => None,
            Err(e) => {
                error!(error = %e, title = %post.title, "Post creation failed");
                None
            }
        }
    }
}
