use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Runtime configuration, built once at startup and passed by reference.
///
/// The static part can come from YAML; secrets are never read from the file
/// and are injected from the environment by the CLI's config loader.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutopostConfig {
    pub wordpress: WordPressConfig,
    pub drive: DriveConfig,
    pub shortener: ShortenerConfig,
    pub describer: DescriberConfig,
    pub images: ImageConfig,
    pub http_timeout_secs: u64,
    pub schedule_offset_minutes: i64,
    pub database_path: PathBuf,
    /// `None` selects the built-in post template.
    pub template_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WordPressConfig {
    pub site_url: String,
    pub user: Option<String>,
    #[serde(skip)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    pub service_account_path: Option<PathBuf>,
    pub folder_id: Option<String>,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortenerConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriberConfig {
    #[serde(skip)]
    pub api_key: Option<String>,
    pub model: String,
}

/// Site-relative paths of the per-category fallback preview images.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub boardview: String,
    pub schematic: String,
}

impl Default for AutopostConfig {
    fn default() -> Self {
        Self {
            wordpress: WordPressConfig::default(),
            drive: DriveConfig::default(),
            shortener: ShortenerConfig::default(),
            describer: DescriberConfig::default(),
            images: ImageConfig::default(),
            http_timeout_secs: 15,
            schedule_offset_minutes: 5,
            database_path: PathBuf::from("autopost.sqlite3"),
            template_path: None,
        }
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            service_account_path: None,
            folder_id: None,
            page_size: 1000,
        }
    }
}

impl Default for DescriberConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "openai/gpt-3.5-turbo".to_string(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            boardview: "wp-content/uploads/boardview-default.jpg".to_string(),
            schematic: "wp-content/uploads/schematic-default.jpg".to_string(),
        }
    }
}

/// Largest accepted schedule offset in either direction: ten years.
pub const MAX_SCHEDULE_OFFSET_MINUTES: i64 = 10 * 366 * 24 * 60;

impl AutopostConfig {
    /// Base of the WordPress REST API, empty when no site is configured.
    pub fn wp_api_base(&self) -> String {
        if self.wordpress.site_url.is_empty() {
            String::new()
        } else {
            format!("{}/wp-json/wp/v2", self.wordpress.site_url)
        }
    }

    /// `None` when the offset does not fit in a duration.
    pub fn schedule_offset(&self) -> Option<chrono::Duration> {
        chrono::Duration::try_minutes(self.schedule_offset_minutes)
    }

    /// `now` plus the schedule offset, or `None` past the calendar's range.
    pub fn schedule_time(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        self.schedule_offset()
            .and_then(|offset| now.checked_add_signed(offset))
    }

    pub fn schedule_offset_in_range(&self) -> bool {
        self.schedule_offset_minutes.unsigned_abs() <= MAX_SCHEDULE_OFFSET_MINUTES as u64
    }

    pub fn http_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.http_timeout_secs)
    }

    /// Log missing settings and return the names of the critical ones.
    ///
    /// Nothing here aborts startup: features without their settings degrade.
    pub fn validate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.wordpress.site_url.is_empty() {
            missing.push("WP_SITE_URL");
        }
        if !self.schedule_offset_in_range() {
            missing.push("DEFAULT_SCHEDULE_OFFSET_MINUTES");
        }
        if self.drive.service_account_path.is_none() {
            warn!("GOOGLE_SERVICE_ACCOUNT_JSON_PATH not set; Drive listing is disabled");
        }
        if self.wordpress.user.is_none() || self.wordpress.password.is_none() {
            warn!("WP_USER/WP_PASSWORD not set; WordPress calls will be unauthenticated");
        }
        if self.shortener.api_key.is_none() {
            warn!("EXE_IO_API_KEY not set; download links will not be shortened");
        }
        if self.describer.api_key.is_none() {
            warn!("OPENROUTER_API_KEY not set; descriptions will be empty");
        }
        if !missing.is_empty() {
            error!(missing = ?missing, "Critical configuration missing");
        }
        missing
    }

    pub fn trace_loaded(&self) {
        info!(
            wp_api_base = %self.wp_api_base(),
            folder_id = self.drive.folder_id.as_deref().unwrap_or("<unset>"),
            database = %self.database_path.display(),
            timeout_secs = self.http_timeout_secs,
            schedule_offset_minutes = self.schedule_offset_minutes,
            "Loaded configuration"
        );
        debug!(
            page_size = self.drive.page_size,
            model = %self.describer.model,
            template = ?self.template_path,
            "Configuration details"
        );
    }
}
