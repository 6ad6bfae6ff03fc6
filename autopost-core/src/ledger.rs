//! SQLite-backed publication ledger.
//!
//! One row per source file, keyed by the file id. The ledger only ever
//! inserts rows and flips them to published; it never deletes.
//!
//! Every public operation fails soft: errors are logged and mapped to a safe
//! default (no-op, `false`, empty list). A broken ledger therefore degrades to
//! "a file might be processed again", never to an aborted run.
//!
//! A fresh connection is opened per operation, so a `Ledger` is just a path
//! and can be shared freely.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, error, info};

use crate::error::LedgerError;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS scheduled_posts (
    file_id TEXT PRIMARY KEY,
    file_name TEXT NOT NULL,
    scheduled_date TEXT NULL,
    published INTEGER NOT NULL DEFAULT 0,
    published_at TEXT NULL
);
";

/// A full ledger row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub file_id: String,
    pub file_name: String,
    pub scheduled_date: Option<DateTime<Utc>>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
}

/// A row that has not been published yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingPost {
    pub file_id: String,
    pub file_name: String,
    pub scheduled_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Ledger {
    path: PathBuf,
}

impl Ledger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Create the database file and table if missing. Safe to call on every start.
    pub fn initialize(&self) {
        match self.try_initialize() {
            Ok(()) => info!(path = %self.path.display(), "Ledger initialised"),
            Err(e) => error!(error = ?e, path = %self.path.display(), "Failed to initialise ledger"),
        }
    }

    /// Record a newly discovered file. An existing row is left untouched.
    pub fn track(&self, file_id: &str, file_name: &str, scheduled_date: Option<DateTime<Utc>>) {
        match self.try_track(file_id, file_name, scheduled_date) {
            Ok(0) => debug!(file_id, file_name, "Already tracked, keeping existing entry"),
            Ok(_) => debug!(file_id, file_name, ?scheduled_date, "Tracked new file"),
            Err(e) => error!(error = ?e, file_id, "Failed to track file"),
        }
    }

    /// Flag a tracked file as published. Does nothing for unknown ids.
    pub fn mark_published(&self, file_id: &str) {
        match self.try_mark_published(file_id, Utc::now()) {
            Ok(0) => debug!(file_id, "mark_published matched no unpublished entry"),
            Ok(_) => info!(file_id, "Marked as published"),
            Err(e) => error!(error = ?e, file_id, "Failed to mark file as published"),
        }
    }

    /// True iff the file has a row with `published = 1`. Errors count as `false`.
    pub fn is_processed(&self, file_id: &str) -> bool {
        self.try_is_processed(file_id).unwrap_or_else(|e| {
            error!(error = ?e, file_id, "Failed to check processed state, assuming unprocessed");
            false
        })
    }

    /// Unpublished rows ordered by scheduled date, unscheduled rows first.
    pub fn pending_posts(&self) -> Vec<PendingPost> {
        self.try_pending_posts().unwrap_or_else(|e| {
            error!(error = ?e, "Failed to read pending posts");
            Vec::new()
        })
    }

    /// The full row for `file_id`, if any.
    pub fn entry(&self, file_id: &str) -> Option<LedgerEntry> {
        self.try_entry(file_id).unwrap_or_else(|e| {
            error!(error = ?e, file_id, "Failed to read ledger entry");
            None
        })
    }

    fn connect(&self) -> Result<Connection, LedgerError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(conn)
    }

    fn try_initialize(&self) -> Result<(), LedgerError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.connect()?.execute_batch(SCHEMA)?;
        Ok(())
    }

    fn try_track(
        &self,
        file_id: &str,
        file_name: &str,
        scheduled_date: Option<DateTime<Utc>>,
    ) -> Result<usize, LedgerError> {
        let changed = self.connect()?.execute(
            "INSERT OR IGNORE INTO scheduled_posts (file_id, file_name, scheduled_date, published)
             VALUES (?1, ?2, ?3, 0)",
            params![file_id, file_name, scheduled_date.map(encode_timestamp)],
        )?;
        Ok(changed)
    }

    fn try_mark_published(&self, file_id: &str, now: DateTime<Utc>) -> Result<usize, LedgerError> {
        // Only unpublished rows, so the first publication time sticks.
        let changed = self.connect()?.execute(
            "UPDATE scheduled_posts SET published = 1, published_at = ?2
             WHERE file_id = ?1 AND published = 0",
            params![file_id, encode_timestamp(now)],
        )?;
        Ok(changed)
    }

    fn try_is_processed(&self, file_id: &str) -> Result<bool, LedgerError> {
        let published: Option<i64> = self
            .connect()?
            .query_row(
                "SELECT published FROM scheduled_posts WHERE file_id = ?1",
                [file_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(published == Some(1))
    }

    fn try_pending_posts(&self) -> Result<Vec<PendingPost>, LedgerError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            "SELECT file_id, file_name, scheduled_date FROM scheduled_posts
             WHERE published = 0
             ORDER BY scheduled_date ASC, rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
            ))
        })?;

        let mut pending = Vec::new();
        for row in rows {
            let (file_id, file_name, scheduled_date) = row?;
            pending.push(PendingPost {
                file_id,
                file_name,
                scheduled_date: decode_optional(scheduled_date)?,
            });
        }
        Ok(pending)
    }

    fn try_entry(&self, file_id: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let raw = self
            .connect()?
            .query_row(
                "SELECT file_id, file_name, scheduled_date, published, published_at
                 FROM scheduled_posts WHERE file_id = ?1",
                [file_id],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, Option<String>>(2)?,
                        row.get::<_, i64>(3)?,
                        row.get::<_, Option<String>>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((file_id, file_name, scheduled_date, published, published_at)) = raw else {
            return Ok(None);
        };
        Ok(Some(LedgerEntry {
            file_id,
            file_name,
            scheduled_date: decode_optional(scheduled_date)?,
            published: published == 1,
            published_at: decode_optional(published_at)?,
        }))
    }
}

/// Fixed-width RFC 3339 so that text order is time order.
fn encode_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn decode_optional(value: Option<String>) -> Result<Option<DateTime<Utc>>, LedgerError> {
    value
        .map(|v| {
            DateTime::parse_from_rfc3339(&v)
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|source| LedgerError::Timestamp { value: v, source })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn timestamps_encode_with_fixed_width() {
        let a = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::milliseconds(7);
        assert_eq!(encode_timestamp(a), "2025-01-02T03:04:05.000Z");
        assert!(encode_timestamp(a) < encode_timestamp(b));
    }

    #[test]
    fn decode_roundtrips_and_rejects_garbage() {
        let ts = Utc.with_ymd_and_hms(2024, 12, 31, 23, 59, 59).unwrap();
        let decoded = decode_optional(Some(encode_timestamp(ts))).unwrap();
        assert_eq!(decoded, Some(ts));
        assert_eq!(decode_optional(None).unwrap(), None);
        assert!(decode_optional(Some("yesterday".into())).is_err());
    }

    #[test]
    fn operations_on_unreachable_path_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let ledger = Ledger::new(blocker.join("ledger.sqlite3"));
        ledger.initialize();
        ledger.track("a", "a.bin", None);
        ledger.mark_published("a");
        assert!(!ledger.is_processed("a"));
        assert!(ledger.pending_posts().is_empty());
        assert!(ledger.entry("a").is_none());
    }
}
