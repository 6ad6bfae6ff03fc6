//! Error types used inside the core crate.
//!
//! None of these escape the public ledger or pipeline API: ledger operations
//! log and fall back to a safe default, and the pipeline turns a per-file
//! error into a `Failed` outcome. They exist so the internal `try_*` helpers
//! can use `?` and so log lines carry a precise cause.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid timestamp {value:?} in ledger: {source}")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template syntax: {0}")]
    Syntax(String),

    #[error("template render: {0}")]
    Render(String),

    #[error("failed to read template {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("publisher returned no confirmation")]
    PublishRejected,

    #[error("schedule offset of {minutes} minutes is out of range")]
    ScheduleOutOfRange { minutes: i64 },
}
