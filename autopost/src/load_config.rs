/// `load_config` module: builds the runtime [`AutopostConfig`] from an optional
/// YAML file and the process environment.
///
/// # Precedence
/// 1. Built-in defaults.
/// 2. The YAML file given with `--config`, for non-secret settings only.
///    Secret fields are skipped by the deserializer even when present.
/// 3. Environment variables (a `.env` file is loaded by `main` beforehand).
///    Empty values count as unset.
///
/// # Errors
/// An unreadable or malformed file, or a malformed numeric variable, is an
/// `anyhow::Error` surfaced at the CLI boundary. Missing settings are not
/// errors here; [`AutopostConfig::validate`] reports them.
use anyhow::{Context, Result};
use autopost_core::config::{AutopostConfig, MAX_SCHEDULE_OFFSET_MINUTES};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{error, info};

pub fn load_config(path: Option<&Path>) -> Result<AutopostConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => {
            info!("No config file given, starting from defaults");
            AutopostConfig::default()
        }
    };

    apply_env(&mut config, |key| std::env::var(key).ok())?;
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<AutopostConfig> {
    info!(config_path = ?path, "Loading configuration from file");

    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path,
                e
            ));
        }
    };

    match serde_yaml::from_str::<AutopostConfig>(&content) {
        Ok(config) => {
            info!(config_path = ?path, "Parsed config YAML successfully");
            Ok(config)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}

/// Overlay environment values onto `config`. `lookup` is `std::env::var` in
/// production and a map in tests.
pub fn apply_env<F>(config: &mut AutopostConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(v) = get("WP_SITE_URL") {
        config.wordpress.site_url = v;
    }
    config.wordpress.site_url = normalize_site_url(&config.wordpress.site_url);
    if let Some(v) = get("WP_USER") {
        config.wordpress.user = Some(v);
    }
    if let Some(v) = get("WP_PASSWORD") {
        config.wordpress.password = Some(v);
    }

    if let Some(v) = get("GOOGLE_SERVICE_ACCOUNT_JSON_PATH") {
        config.drive.service_account_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("GOOGLE_DRIVE_FOLDER_ID") {
        config.drive.folder_id = Some(v);
    }
    if let Some(v) = get("DRIVE_PAGE_SIZE") {
        config.drive.page_size = parse_var("DRIVE_PAGE_SIZE", &v)?;
    }

    if let Some(v) = get("EXE_IO_API_KEY") {
        config.shortener.api_key = Some(v);
    }
    if let Some(v) = get("OPENROUTER_API_KEY") {
        config.describer.api_key = Some(v);
    }
    if let Some(v) = get("OPENROUTER_MODEL") {
        config.describer.model = v;
    }

    if let Some(v) = get("HTTP_TIMEOUT_SECONDS") {
        config.http_timeout_secs = parse_var("HTTP_TIMEOUT_SECONDS", &v)?;
    }
    if let Some(v) = get("DEFAULT_SCHEDULE_OFFSET_MINUTES") {
        config.schedule_offset_minutes = parse_var("DEFAULT_SCHEDULE_OFFSET_MINUTES", &v)?;
    }
    if !config.schedule_offset_in_range() {
        anyhow::bail!(
            "DEFAULT_SCHEDULE_OFFSET_MINUTES must be within ±{MAX_SCHEDULE_OFFSET_MINUTES}, got {}",
            config.schedule_offset_minutes
        );
    }
    if let Some(v) = get("DATABASE_PATH") {
        config.database_path = PathBuf::from(v);
    }
    if let Some(v) = get("TEMPLATE_PATH") {
        config.template_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("DEFAULT_BOARDVIEW_IMAGE_URL") {
        config.images.boardview = v;
    }
    if let Some(v) = get("DEFAULT_SCHEMATIC_IMAGE_URL") {
        config.images.schematic = v;
    }

    Ok(())
}

fn parse_var<T>(key: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .parse::<T>()
        .with_context(|| format!("{key} must be a number, got {value:?}"))
}

/// Trim whitespace and trailing slashes so paths can be appended with `/`.
pub fn normalize_site_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_defaults() {
        let mut cfg = AutopostConfig::default();
        apply_env(
            &mut cfg,
            lookup(&[
                ("WP_SITE_URL", "https://example.com/"),
                ("WP_PASSWORD", "secret"),
                ("HTTP_TIMEOUT_SECONDS", "30"),
                ("DEFAULT_SCHEDULE_OFFSET_MINUTES", "60"),
                ("DATABASE_PATH", "/tmp/ledger.sqlite3"),
                ("GOOGLE_DRIVE_FOLDER_ID", "folder-1"),
            ]),
        )
        .unwrap();

        assert_eq!(cfg.wordpress.site_url, "https://example.com");
        assert_eq!(cfg.wordpress.password.as_deref(), Some("secret"));
        assert_eq!(cfg.http_timeout_secs, 30);
        assert_eq!(cfg.schedule_offset_minutes, 60);
        assert_eq!(cfg.database_path, PathBuf::from("/tmp/ledger.sqlite3"));
        assert_eq!(cfg.drive.folder_id.as_deref(), Some("folder-1"));
        assert_eq!(cfg.drive.page_size, 1000, "Untouched settings keep defaults");
    }

    #[test]
    fn empty_values_count_as_unset() {
        let mut cfg = AutopostConfig::default();
        apply_env(&mut cfg, lookup(&[("EXE_IO_API_KEY", "  "), ("DRIVE_PAGE_SIZE", "")]))
            .unwrap();
        assert!(cfg.shortener.api_key.is_none());
        assert_eq!(cfg.drive.page_size, 1000);
    }

    #[test]
    fn malformed_numbers_are_errors() {
        let mut cfg = AutopostConfig::default();
        let err = apply_env(&mut cfg, lookup(&[("HTTP_TIMEOUT_SECONDS", "soon")])).unwrap_err();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECONDS"));
    }

    #[test]
    fn out_of_range_schedule_offset_is_rejected() {
        let mut cfg = AutopostConfig::default();
        let err = apply_env(
            &mut cfg,
            lookup(&[("DEFAULT_SCHEDULE_OFFSET_MINUTES", "1000000000000")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("DEFAULT_SCHEDULE_OFFSET_MINUTES"));

        let mut cfg = AutopostConfig::default();
        cfg.schedule_offset_minutes = i64::MIN;
        assert!(apply_env(&mut cfg, lookup(&[])).is_err(), "YAML values are checked too");
    }

    #[test]
    fn site_url_is_normalized() {
        assert_eq!(normalize_site_url(" https://a.b/// "), "https://a.b");
        assert_eq!(normalize_site_url(""), "");
    }
}
