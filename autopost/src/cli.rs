/// # autopost CLI
///
/// Command parsing and orchestration for the `autopost` binary. The pipeline,
/// ledger and templates live in `autopost-core`; this module wires them to the
/// concrete HTTP clients and prints progress.
///
/// ## Commands
/// - `run`: one pass over the Drive folder in the chosen mode.
/// - `pending`: list ledger entries not yet published.
/// - `status`: show the ledger entry of one file id.
/// - `init-db`: create the ledger schema.
///
/// Logs go to stderr; status lines and command output go to stdout.
use std::path::PathBuf;

use anyhow::{Context, Result};
use autopost_core::config::AutopostConfig;
use autopost_core::ledger::{Ledger, LedgerEntry};
use autopost_core::pipeline::{Mode, Pipeline, RunReport, Services, StatusUpdate};
use autopost_core::template::PostTemplate;
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;

use crate::describe::OpenRouterClient;
use crate::drive::DriveClient;
use crate::http::build_client;
use crate::image::HttpImageFetcher;
use crate::load_config::load_config;
use crate::shorten::ExeIoClient;
use crate::wordpress::WordPressClient;

/// Publish files from a Google Drive folder as WordPress posts.
#[derive(Parser)]
#[clap(
    name = "autopost",
    version,
    about = "Publish Drive folder files as WordPress posts, tracking each file in a local ledger"
)]
pub struct Cli {
    /// Optional YAML config file; environment variables override it
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process every file of the Drive folder once
    Run {
        /// immediate, queue or scheduled
        #[clap(long, default_value = "immediate")]
        mode: Mode,
        /// Drive folder id, overriding GOOGLE_DRIVE_FOLDER_ID
        #[clap(long)]
        folder: Option<String>,
    },
    /// List files tracked but not yet published
    Pending,
    /// Show the ledger entry for one file
    Status {
        /// Drive file id
        file_id: String,
    },
    /// Create the ledger database if needed
    InitDb,
}

/// Async entrypoint shared by `main` and the integration tests.
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config(cli.config.as_deref())?;
    config.trace_loaded();
    config.validate();

    let ledger = Ledger::new(config.database_path.clone());

    match cli.command {
        Commands::Run { mode, folder } => run_pipeline(&config, &ledger, mode, folder).await,
        Commands::Pending => {
            ledger.initialize();
            print_pending(&ledger);
            Ok(())
        }
        Commands::Status { file_id } => {
            ledger.initialize();
            match ledger.entry(&file_id) {
                Some(entry) => print_entry(&entry),
                None => println!("No ledger entry for {file_id}"),
            }
            Ok(())
        }
        Commands::InitDb => {
            ledger.initialize();
            println!("Ledger ready at {}", ledger.path().display());
            Ok(())
        }
    }
}

async fn run_pipeline(
    config: &AutopostConfig,
    ledger: &Ledger,
    mode: Mode,
    folder: Option<String>,
) -> Result<()> {
    let Some(folder_id) = folder.or_else(|| config.drive.folder_id.clone()) else {
        tracing::error!(command = "run", "No Drive folder id; set GOOGLE_DRIVE_FOLDER_ID or pass --folder");
        return Ok(());
    };

    let template = match &config.template_path {
        Some(path) => PostTemplate::load(path)
            .with_context(|| format!("Failed to load post template {}", path.display()))?,
        None => PostTemplate::builtin(),
    };

    ledger.initialize();

    let http = build_client(config.http_timeout()).context("Failed to build HTTP client")?;
    let drive = DriveClient::from_config(config, http.clone());
    let shortener = ExeIoClient::new(http.clone(), config.shortener.api_key.clone());
    let describer = OpenRouterClient::new(http.clone(), &config.describer);
    let images = HttpImageFetcher::new(http.clone());
    let publisher = WordPressClient::from_config(config, http);

    let services = Services {
        lister: &drive,
        shortener: &shortener,
        describer: &describer,
        metadata: &drive,
        images: &images,
        publisher: &publisher,
    };

    let (tx, rx) = mpsc::unbounded_channel();
    let printer = tokio::spawn(print_status(rx));

    tracing::info!(command = "run", %mode, folder_id = %folder_id, "Starting run");
    let report = Pipeline::new(services, ledger, &template, config)
        .with_status_channel(tx)
        .run_once(mode, &folder_id)
        .await;

    // The pipeline owned the sender, so the printer drains and exits.
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "Status printer task ended abnormally");
    }
    print_summary(&report);
    Ok(())
}

async fn print_status(mut rx: mpsc::UnboundedReceiver<StatusUpdate>) {
    while let Some(update) = rx.recv().await {
        println!("{update}");
    }
}

fn print_summary(report: &RunReport) {
    if report.files.is_empty() {
        println!("No files to process.");
        return;
    }
    println!(
        "Done ({}): {} published, {} queued, {} skipped, {} failed",
        report.mode,
        report.published(),
        report.queued(),
        report.skipped(),
        report.failed()
    );
}

fn print_pending(ledger: &Ledger) {
    let pending = ledger.pending_posts();
    if pending.is_empty() {
        println!("No pending posts.");
        return;
    }
    for post in pending {
        println!(
            "{}\t{}\t{}",
            post.file_id,
            post.file_name,
            fmt_date(post.scheduled_date)
        );
    }
}

fn print_entry(entry: &LedgerEntry) {
    println!("file_id:        {}", entry.file_id);
    println!("file_name:      {}", entry.file_name);
    println!("scheduled_date: {}", fmt_date(entry.scheduled_date));
    println!("published:      {}", entry.published);
    println!("published_at:   {}", fmt_date(entry.published_at));
}

fn fmt_date(date: Option<DateTime<Utc>>) -> String {
    date.map(|d| d.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}
