#![allow(unused)]

//! # contract: interfaces to the outside world
//!
//! The pipeline talks to five collaborators: a source lister (the cloud
//! folder), three enrichment services (link shortener, describer, metadata
//! fetcher), an image fetcher and a publisher (the CMS). Each one is a trait
//! defined here together with the plain data it exchanges.
//!
//! ## Contract
//! - Enrichment calls never fail across this boundary. An implementor catches
//!   every error, logs it and returns the documented fallback value.
//! - The source lister returns an empty list on any error.
//! - The publisher and image fetcher signal failure with `None`.
//!
//! ## Mocking & Testing
//! - Every trait is annotated for `mockall`; the mocks are exported under the
//!   default `test-export-mocks` feature so integration tests can use them.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::{automock, predicate::*};
use serde::{Deserialize, Serialize};

/// Sentinel used by metadata fetchers when a value is unknown.
pub const NOT_AVAILABLE: &str = "N/A";

/// A file descriptor as returned by the source lister.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    /// Size in bytes, as a decimal string. Folders and native docs have none.
    #[serde(default)]
    pub size: Option<String>,
}

impl SourceFile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            mime_type: None,
            size: None,
        }
    }
}

/// Size and MIME type of a file, with [`NOT_AVAILABLE`] for unknown values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: String,
    pub mime_type: String,
}

impl FileMetadata {
    pub fn unavailable() -> Self {
        Self {
            size: NOT_AVAILABLE.to_string(),
            mime_type: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Identifier of an uploaded media attachment on the publishing target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef(pub i64);

/// Everything needed to create one post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub title: String,
    /// Rendered HTML body.
    pub content: String,
    pub featured_media: Option<MediaRef>,
    /// A future date schedules the post instead of publishing it now.
    pub publish_date: Option<DateTime<Utc>>,
}

/// Confirmation returned by the publisher after a post was created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedPost {
    pub id: i64,
    pub link: String,
    /// Remote status, e.g. `publish` or `future`.
    pub status: String,
}

/// Lists candidate files in a folder-like resource.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait SourceLister: Send + Sync {
    /// List the files directly inside `folder_id`, paginating internally.
    /// Returns an empty list on any error.
    async fn list_files(&self, folder_id: &str, page_size: Option<u32>) -> Vec<SourceFile>;
}

/// Turns a long URL into a short one.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait LinkShortener: Send + Sync {
    /// Returns the shortened URL, or `long_url` unchanged on failure.
    async fn shorten(&self, long_url: &str) -> String;
}

/// Generates a short description of a file from its name.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Describer: Send + Sync {
    /// Returns a one-sentence description, or an empty string on failure.
    async fn describe(&self, file_name: &str) -> String;
}

/// Looks up size and MIME type of a file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait MetadataFetcher: Send + Sync {
    /// Returns [`FileMetadata::unavailable`] on failure.
    async fn fetch_metadata(&self, file_id: &str) -> FileMetadata;
}

/// Downloads a remote image into a temporary file.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// The temporary file is removed when the returned handle is dropped.
    async fn fetch_image(&self, url: &str) -> Option<tempfile::NamedTempFile>;
}

/// Creates posts and media on the content-management system.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Upload a local file as a media attachment. An empty `alt_text` leaves
    /// the attachment's alt text unset. `None` on any failure.
    async fn upload_media(&self, file_path: &Path, alt_text: &str) -> Option<MediaRef>;

    /// Create a post. `None` on any failure.
    async fn create_post(&self, post: NewPost) -> Option<PublishedPost>;
}

/// How the publisher should time a post, relative to `now`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishTiming {
    /// Publish immediately with the server's clock.
    Now,
    /// Publish immediately, backdated to the given UTC instant.
    Backdated(DateTime<Utc>),
    /// Schedule for the given UTC instant.
    Future(DateTime<Utc>),
}

impl PublishTiming {
    pub fn resolve(publish_date: Option<DateTime<Utc>>, now: DateTime<Utc>) -> Self {
        match publish_date {
            None => PublishTiming::Now,
            Some(date) if date > now => PublishTiming::Future(date),
            Some(date) => PublishTiming::Backdated(date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn timing_without_date_publishes_now() {
        assert_eq!(PublishTiming::resolve(None, Utc::now()), PublishTiming::Now);
    }

    #[test]
    fn timing_with_future_date_is_scheduled() {
        let now = Utc::now();
        let later = now + Duration::minutes(5);
        assert_eq!(
            PublishTiming::resolve(Some(later), now),
            PublishTiming::Future(later)
        );
    }

    #[test]
    fn timing_with_past_or_current_date_is_immediate() {
        let now = Utc::now();
        let earlier = now - Duration::hours(1);
        assert_eq!(
            PublishTiming::resolve(Some(earlier), now),
            PublishTiming::Backdated(earlier)
        );
        assert_eq!(
            PublishTiming::resolve(Some(now), now),
            PublishTiming::Backdated(now)
        );
    }
}
