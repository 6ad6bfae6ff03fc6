//! File-to-post pipeline: list → check ledger → enrich → publish → record.
//!
//! One call to [`Pipeline::run_once`] walks the files of one folder in the
//! order the lister returns them. Files the ledger already knows as published
//! are skipped; every other file is attempted exactly once. A failure on one
//! file is logged and reported, and the run moves on to the next file.
//!
//! # Modes
//! - [`Mode::Immediate`]: publish now, then record as published.
//! - [`Mode::Queue`]: record the file as pending; nothing is published and no
//!   later run drains the queue.
//! - [`Mode::Scheduled`]: publish with a date `now + offset` so the CMS
//!   schedules the post, then record it with that date and as published.
//!
//! # Collaborators
//! All external calls go through the traits in [`crate::contract`]. Enrichment
//! calls cannot fail; they hand back a degraded value instead. Only template
//! rendering and the final publish call can fail a file.
//!
//! # Status
//! Each file produces a [`StatusUpdate`], logged and, when a channel is
//! attached with [`Pipeline::with_status_channel`], sent to whoever renders
//! progress.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::category::Category;
use crate::config::AutopostConfig;
use crate::contract::{
    Describer, ImageFetcher, LinkShortener, MediaRef, MetadataFetcher, NewPost, PublishedPost,
    Publisher, SourceFile, SourceLister,
};
use crate::error::PipelineError;
use crate::ledger::Ledger;
use crate::template::{PostContext, PostTemplate};

/// Canonical direct-download URL for a Drive file.
pub fn download_link(file_id: &str) -> String {
    format!("https://drive.google.com/uc?id={file_id}&export=download")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Immediate,
    Queue,
    Scheduled,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Immediate => "immediate",
            Mode::Queue => "queue",
            Mode::Scheduled => "scheduled",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "immediate" | "batch" => Ok(Mode::Immediate),
            "queue" => Ok(Mode::Queue),
            "scheduled" | "schedule" => Ok(Mode::Scheduled),
            other => Err(format!(
                "unknown mode {other:?}, expected immediate, queue or scheduled"
            )),
        }
    }
}

/// The external collaborators one run needs.
#[derive(Clone, Copy)]
pub struct Services<'a> {
    pub lister: &'a dyn SourceLister,
    pub shortener: &'a dyn LinkShortener,
    pub describer: &'a dyn Describer,
    pub metadata: &'a dyn MetadataFetcher,
    pub images: &'a dyn ImageFetcher,
    pub publisher: &'a dyn Publisher,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Skipped,
    Queued,
    Published {
        post_id: i64,
        scheduled_for: Option<DateTime<Utc>>,
    },
    Failed(String),
}

/// Progress line for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    /// 1-based position in the listing.
    pub index: usize,
    pub total: usize,
    pub file_id: String,
    pub file_name: String,
    pub outcome: FileOutcome,
}

impl fmt::Display for StatusUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}/{}] ", self.index, self.total)?;
        match &self.outcome {
            FileOutcome::Skipped => write!(f, "skipped (already published): {}", self.file_name),
            FileOutcome::Queued => write!(f, "queued: {}", self.file_name),
            FileOutcome::Published {
                post_id,
                scheduled_for: None,
            } => write!(f, "published: {} (post {post_id})", self.file_name),
            FileOutcome::Published {
                post_id,
                scheduled_for: Some(at),
            } => write!(
                f,
                "scheduled: {} (post {post_id}) for {}",
                self.file_name,
                at.format("%Y-%m-%d %H:%M UTC")
            ),
            FileOutcome::Failed(reason) => write!(f, "failed: {} ({reason})", self.file_name),
        }
    }
}

/// Summary of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub mode: Mode,
    pub files: Vec<StatusUpdate>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|s| pred(&s.outcome)).count()
    }

    pub fn published(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Published { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped))
    }

    pub fn queued(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Queued))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed(_)))
    }
}

pub struct Pipeline<'a> {
    services: Services<'a>,
    ledger: &'a Ledger,
    template: &'a PostTemplate,
    config: &'a AutopostConfig,
    status: Option<UnboundedSender<StatusUpdate>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        services: Services<'a>,
        ledger: &'a Ledger,
        template: &'a PostTemplate,
        config: &'a AutopostConfig,
    ) -> Self {
        Self {
            services,
            ledger,
            template,
            config,
            status: None,
        }
    }

    /// Also send every status update to `tx`. A closed receiver is ignored.
    pub fn with_status_channel(mut self, tx: UnboundedSender<StatusUpdate>) -> Self {
        self.status = Some(tx);
        self
    }

    /// Process every file in `folder_id` once. Expects an initialised ledger.
    pub async fn run_once(&self, mode: Mode, folder_id: &str) -> RunReport {
        let span = info_span!("run_once", %mode, folder_id);
        self.run_inner(mode, folder_id).instrument(span).await
    }

    async fn run_inner(&self, mode: Mode, folder_id: &str) -> RunReport {
        let mut report = RunReport {
            mode,
            files: Vec::new(),
        };

        let files = self
            .services
            .lister
            .list_files(folder_id, Some(self.config.drive.page_size))
            .await;
        if files.is_empty() {
            warn!("No files found in source folder");
            return report;
        }
        info!(count = files.len(), "Listed source files");

        let total = files.len();
        for (i, file) in files.iter().enumerate() {
            let outcome = self.process_file(mode, file).await;
            let update = StatusUpdate {
                index: i + 1,
                total,
                file_id: file.id.clone(),
                file_name: file.name.clone(),
                outcome,
            };
            self.emit(&update);
            report.files.push(update);
        }

        info!(
            published = report.published(),
            queued = report.queued(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Run finished"
        );
        report
    }

    async fn process_file(&self, mode: Mode, file: &SourceFile) -> FileOutcome {
        if self.ledger.is_processed(&file.id) {
            debug!(file_id = %file.id, file_name = %file.name, "Skipping, already published");
            return FileOutcome::Skipped;
        }

        match mode {
            Mode::Queue => {
                self.ledger.track(&file.id, &file.name, None);
                FileOutcome::Queued
            }
            Mode::Immediate => self.publish_and_record(file, None).await,
            Mode::Scheduled => match self.config.schedule_time(Utc::now()) {
                Some(at) => self.publish_and_record(file, Some(at)).await,
                None => {
                    let e = PipelineError::ScheduleOutOfRange {
                        minutes: self.config.schedule_offset_minutes,
                    };
                    error!(error = %e, file_id = %file.id, file_name = %file.name, "Cannot schedule file");
                    FileOutcome::Failed(e.to_string())
                }
            },
        }
    }

    async fn publish_and_record(
        &self,
        file: &SourceFile,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> FileOutcome {
        match self.enrich_and_publish(file, scheduled_for).await {
            Ok(post) => {
                self.ledger.track(&file.id, &file.name, scheduled_for);
                self.ledger.mark_published(&file.id);
                info!(file_id = %file.id, file_name = %file.name, post_id = post.id, link = %post.link, "Published");
                FileOutcome::Published {
                    post_id: post.id,
                    scheduled_for,
                }
            }
            Err(e) => {
                error!(error = %e, file_id = %file.id, file_name = %file.name, "Failed to publish file");
                FileOutcome::Failed(e.to_string())
            }
        }
    }

    async fn enrich_and_publish(
        &self,
        file: &SourceFile,
        publish_date: Option<DateTime<Utc>>,
    ) -> Result<PublishedPost, PipelineError> {
        let long_link = download_link(&file.id);
        let short_link = self.services.shortener.shorten(&long_link).await;
        let description = self.services.describer.describe(&file.name).await;
        let metadata = self.services.metadata.fetch_metadata(&file.id).await;

        let category = Category::from_file_name(&file.name);
        let featured_media = self.upload_preview(category, &file.name).await;

        let content = self.template.render(&PostContext {
            file_name: &file.name,
            brief_description: &description,
            download_link: &short_link,
            download_label: category.download_label(),
            file_metadata: &metadata,
        })?;

        self.services
            .publisher
            .create_post(NewPost {
                title: file.name.clone(),
                content,
                featured_media,
                publish_date,
            })
            .await
            .ok_or(PipelineError::PublishRejected)
    }

    /// Upload the category's fallback image. `None` means "publish without one".
    async fn upload_preview(&self, category: Category, file_name: &str) -> Option<MediaRef> {
        let site = &self.config.wordpress.site_url;
        if site.is_empty() {
            warn!("No site URL configured, publishing without preview image");
            return None;
        }
        let url = format!("{site}/{}", category.fallback_image(&self.config.images));

        let Some(image) = self.services.images.fetch_image(&url).await else {
            warn!(%url, "Could not fetch preview image");
            return None;
        };
        let media = self
            .services
            .publisher
            .upload_media(image.path(), file_name)
            .await;
        if media.is_none() {
            warn!(%url, "Preview image upload failed");
        }
        media
    }

    fn emit(&self, update: &StatusUpdate) {
        info!(status = %update, "File processed");
        if let Some(tx) = &self.status {
            let _ = tx.send(update.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn download_link_embeds_file_id() {
        assert_eq!(
            download_link("f1"),
            "https://drive.google.com/uc?id=f1&export=download"
        );
    }

    #[test]
    fn mode_parses_new_and_legacy_names() {
        assert_eq!("immediate".parse::<Mode>().unwrap(), Mode::Immediate);
        assert_eq!("batch".parse::<Mode>().unwrap(), Mode::Immediate);
        assert_eq!("Queue".parse::<Mode>().unwrap(), Mode::Queue);
        assert_eq!("schedule".parse::<Mode>().unwrap(), Mode::Scheduled);
        assert_eq!(" scheduled ".parse::<Mode>().unwrap(), Mode::Scheduled);
        assert!("later".parse::<Mode>().is_err());
    }

    #[test]
    fn status_lines_are_human_readable() {
        let mut update = StatusUpdate {
            index: 2,
            total: 5,
            file_id: "f1".into(),
            file_name: "x.bin".into(),
            outcome: FileOutcome::Skipped,
        };
        assert_eq!(update.to_string(), "[2/5] skipped (already published): x.bin");

        update.outcome = FileOutcome::Failed("publisher returned no confirmation".into());
        assert_eq!(
            update.to_string(),
            "[2/5] failed: x.bin (publisher returned no confirmation)"
        );

        update.outcome = FileOutcome::Published {
            post_id: 42,
            scheduled_for: None,
        };
        assert_eq!(update.to_string(), "[2/5] published: x.bin (post 42)");
    }
}
