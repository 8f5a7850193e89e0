//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$GMAIL_DL_CONFIG` (environment variable)
//! 2. `~/.config/gmail-attachment-dl/config.toml` (Linux)
//!    `~/Library/Application Support/gmail-attachment-dl/config.toml` (macOS)
//!    `%APPDATA%\gmail-attachment-dl\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags and their environment variables override file values.
//! The merged result is frozen into [`RunOptions`] before the run starts.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{DownloadError, Result};
use crate::filter::FilterCriteria;
use crate::naming::NamingPolicy;

/// Date format accepted for `date_from` / `date_to` (Gmail search syntax).
pub const DATE_FORMAT: &str = "%Y/%m/%d";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging settings.
    pub general: GeneralConfig,
    /// Credential locations.
    pub auth: AuthConfig,
    /// What to search for and where to put it.
    pub download: DownloadConfig,
    /// Subject and filename filters.
    pub filter: FilterConfig,
    /// Output layout and fallback rendering.
    pub output: OutputConfig,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Directory for `gmail_downloader.log`. Defaults to the cache directory.
    pub log_dir: Option<PathBuf>,
}

/// Credential locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Stored OAuth2 token (authorized-user JSON).
    pub token_file: PathBuf,
    /// OAuth2 client secrets downloaded from the Google Cloud console.
    pub credentials_file: PathBuf,
}

/// Search and download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Root directory for all artifacts.
    pub download_path: PathBuf,
    /// Gmail search query.
    pub search_query: String,
    /// Upper bound on messages processed per run.
    pub max_messages: usize,
    /// Only messages on or after this date (`YYYY/MM/DD`).
    pub date_from: Option<String>,
    /// Only messages before this date (`YYYY/MM/DD`).
    pub date_to: Option<String>,
    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,
}

/// Filter expressions (case-insensitive regular expressions).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub subject_regex: Option<String>,
    pub filename_regex: Option<String>,
}

/// Output layout and fallback rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Put each message's files under `{subject}_{id}/`.
    pub group_by_subject: bool,
    /// Render the message body when a message yields no attachments.
    pub save_body_if_no_attachment: bool,
    /// Format of the rendered body.
    pub body_format: BodyFormat,
}

/// Format of the rendered message body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BodyFormat {
    /// PDF via `wkhtmltopdf`.
    #[default]
    Pdf,
    /// Standalone HTML file.
    Html,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_file: PathBuf::from("token.json"),
            credentials_file: PathBuf::from("credentials.json"),
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_path: PathBuf::from("./downloads"),
            search_query: "has:attachment".to_string(),
            max_messages: 100,
            date_from: None,
            date_to: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            group_by_subject: true,
            save_body_if_no_attachment: false,
            body_format: BodyFormat::Pdf,
        }
    }
}

// ── Load / save ─────────────────────────────────────────────────

/// Load configuration from the standard location.
///
/// Returns `Ok(None)` when no file exists. Runs before logging is set up, so
/// the caller reports the outcome once the subscriber is installed.
pub fn load_config() -> Result<Option<(PathBuf, Config)>> {
    let Some(path) = config_file_path() else {
        return Ok(None);
    };
    if !path.exists() {
        return Ok(None);
    }
    let config = read_config_file(&path)?;
    Ok(Some((path, config)))
}

/// Read and parse one TOML configuration file.
pub fn read_config_file(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| DownloadError::io(path, e))?;
    toml::from_str(&contents).map_err(|e| DownloadError::InvalidConfig {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("GMAIL_DL_CONFIG") {
        return Some(PathBuf::from(env_path));
    }
    dirs::config_dir().map(|d| d.join("gmail-attachment-dl").join("config.toml"))
}

/// Return the directory for the log file.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gmail-attachment-dl")
}

// ── Run options ─────────────────────────────────────────────────

/// Validate a `YYYY/MM/DD` date. Invalid or blank values are dropped with a warning.
pub fn validate_date(field: &str, value: Option<&str>) -> Option<NaiveDate> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;
    match NaiveDate::parse_from_str(value, DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::warn!(
                field,
                value,
                error = %e,
                "Ignoring invalid date, expected YYYY/MM/DD"
            );
            None
        }
    }
}

/// Append `after:` / `before:` terms for the valid dates to `base`.
pub fn build_query(base: &str, date_from: Option<NaiveDate>, date_to: Option<NaiveDate>) -> String {
    let mut terms: Vec<String> = Vec::new();
    let base = base.trim();
    if !base.is_empty() {
        terms.push(base.to_string());
    }
    if let Some(from) = date_from {
        terms.push(format!("after:{}", from.format(DATE_FORMAT)));
    }
    if let Some(to) = date_to {
        terms.push(format!("before:{}", to.format(DATE_FORMAT)));
    }
    terms.join(" ")
}

/// Everything the orchestrator needs, fixed for the lifetime of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    /// Final Gmail query, date terms included.
    pub query: String,
    pub max_messages: usize,
    pub filters: FilterCriteria,
    pub naming: NamingPolicy,
    pub save_body_if_no_attachment: bool,
    pub request_timeout: Duration,
}

impl RunOptions {
    /// Freeze a merged configuration into run options.
    pub fn from_config(config: &Config) -> Self {
        let date_from = validate_date("date_from", config.download.date_from.as_deref());
        let date_to = validate_date("date_to", config.download.date_to.as_deref());
        if let (Some(from), Some(to)) = (date_from, date_to) {
            if from > to {
                tracing::warn!(%from, %to, "date_from is after date_to, no messages will match");
            }
        }

        Self {
            output_dir: config.download.download_path.clone(),
            query: build_query(&config.download.search_query, date_from, date_to),
            max_messages: config.download.max_messages,
            filters: FilterCriteria::new(
                config.filter.subject_regex.as_deref(),
                config.filter.filename_regex.as_deref(),
            ),
            naming: NamingPolicy::new(config.output.group_by_subject),
            save_body_if_no_attachment: config.output.save_body_if_no_attachment,
            request_timeout: Duration::from_secs(config.download.request_timeout_secs.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = Config::default();
        assert_eq!(cfg.download.search_query, "has:attachment");
        assert_eq!(cfg.download.max_messages, 100);
        assert_eq!(cfg.download.download_path, PathBuf::from("./downloads"));
        assert!(cfg.output.group_by_subject);
        assert!(!cfg.output.save_body_if_no_attachment);
        assert_eq!(cfg.output.body_format, BodyFormat::Pdf);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut cfg = Config::default();
        cfg.filter.subject_regex = Some("invoice".into());
        cfg.output.body_format = BodyFormat::Html;
        let toml_str = toml::to_string_pretty(&cfg).expect("serialize");
        let parsed: Config = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.filter.subject_regex.as_deref(), Some("invoice"));
        assert_eq!(parsed.output.body_format, BodyFormat::Html);
        assert_eq!(parsed.download.max_messages, cfg.download.max_messages);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let partial = r#"
[download]
max_messages = 25
date_from = "2024/01/01"

[output]
body_format = "html"
"#;
        let cfg: Config = toml::from_str(partial).expect("parse partial");
        assert_eq!(cfg.download.max_messages, 25);
        assert_eq!(cfg.download.date_from.as_deref(), Some("2024/01/01"));
        assert_eq!(cfg.output.body_format, BodyFormat::Html);
        // Other fields use defaults
        assert_eq!(cfg.download.search_query, "has:attachment");
        assert!(cfg.output.group_by_subject);
    }

    #[test]
    fn test_read_config_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[filter]\nsubject_regex = \"invoice\"\n").unwrap();
        let cfg = read_config_file(&path).unwrap();
        assert_eq!(cfg.filter.subject_regex.as_deref(), Some("invoice"));
        assert_eq!(cfg.download.max_messages, 100);
    }

    #[test]
    fn test_read_config_file_reports_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[download]\nmax_messages = \"many\"\n").unwrap();
        match read_config_file(&path) {
            Err(DownloadError::InvalidConfig { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_date() {
        assert_eq!(
            validate_date("date_from", Some("2024/02/29")),
            NaiveDate::from_ymd_opt(2024, 2, 29)
        );
        assert_eq!(validate_date("date_from", Some("2023/02/29")), None);
        assert_eq!(validate_date("date_from", Some("2024-01-01")), None);
        assert_eq!(validate_date("date_from", Some("  ")), None);
        assert_eq!(validate_date("date_from", None), None);
    }

    #[test]
    fn test_build_query() {
        let from = NaiveDate::from_ymd_opt(2024, 1, 5);
        let to = NaiveDate::from_ymd_opt(2024, 3, 1);
        assert_eq!(
            build_query("has:attachment", from, to),
            "has:attachment after:2024/01/05 before:2024/03/01"
        );
        assert_eq!(build_query("", from, None), "after:2024/01/05");
        assert_eq!(build_query(" from:boss ", None, None), "from:boss");
    }

    #[test]
    fn test_run_options_drop_invalid_date_independently() {
        let mut cfg = Config::default();
        cfg.download.date_from = Some("not a date".into());
        cfg.download.date_to = Some("2024/12/31".into());
        let options = RunOptions::from_config(&cfg);
        assert_eq!(options.query, "has:attachment before:2024/12/31");
        assert!(options.naming.group_by_subject);
        assert!(!options.filters.subject.is_active());
    }
}
