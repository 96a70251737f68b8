//! Application settings.
//!
//! Settings come from an optional JSON file (camelCase keys) and are then
//! overridden by environment variables:
//!
//! | Variable                     | Setting                  |
//! |------------------------------|--------------------------|
//! | `GEMINI_API_KEY`             | Gemini API key           |
//! | `GEMINI_MODEL`               | Gemini model             |
//! | `GOOGLE_ADS_DEVELOPER_TOKEN` | Ads developer token      |
//! | `GOOGLE_ADS_MCC_ID`          | Ads manager account id   |
//! | `GOOGLE_ADS_ACCESS_TOKEN`    | Ads OAuth token (env only) |
//!
//! Secrets are held as `SecretString` and redacted from `Debug`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ads::client::AdsSettings;
use crate::ads::forecast::ForecastOptions;
use crate::error::AppError;
use crate::gemini::client::{GeminiSettings, DEFAULT_TIMEOUT_SECS};
use crate::jobs::monitor::{DEFAULT_FILTER_DAYS, DEFAULT_POLL_INTERVAL};
use crate::requests::chunker::ChunkSize;
use crate::requests::locale::LocaleCatalog;
use crate::requests::prompt::PromptTemplates;
use crate::results::atomic_writer::write_atomic;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_FORECAST_DELAY_MS: u64 = 1_000;
pub const DEFAULT_FORECAST_CONCURRENCY: usize = 1;

// ─────────────────────────────────────────────────────────────────────────────
// AppConfig
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<SecretString>,
    pub model: String,
    pub google_ads_developer_token: Option<SecretString>,
    /// Stored without dashes.
    pub google_ads_mcc_id: Option<String>,
    /// Never written to the settings file.
    pub google_ads_access_token: Option<SecretString>,
    pub poll_interval_secs: u64,
    /// `None` shows every job.
    pub job_filter_days: Option<u32>,
    pub http_timeout_secs: u64,
    pub forecast_delay_ms: u64,
    pub forecast_max_concurrent: usize,
    pub prompts_dir: Option<PathBuf>,
    pub locales_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            google_ads_developer_token: None,
            google_ads_mcc_id: None,
            google_ads_access_token: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            job_filter_days: Some(DEFAULT_FILTER_DAYS),
            http_timeout_secs: DEFAULT_TIMEOUT_SECS,
            forecast_delay_ms: DEFAULT_FORECAST_DELAY_MS,
            forecast_max_concurrent: DEFAULT_FORECAST_CONCURRENCY,
            prompts_dir: None,
            locales_file: None,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |s: &Option<SecretString>| s.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("AppConfig")
            .field("gemini_api_key", &redact(&self.gemini_api_key))
            .field("model", &self.model)
            .field("google_ads_developer_token", &redact(&self.google_ads_developer_token))
            .field("google_ads_mcc_id", &self.google_ads_mcc_id)
            .field("google_ads_access_token", &redact(&self.google_ads_access_token))
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("job_filter_days", &self.job_filter_days)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("forecast_delay_ms", &self.forecast_delay_ms)
            .field("forecast_max_concurrent", &self.forecast_max_concurrent)
            .field("prompts_dir", &self.prompts_dir)
            .field("locales_file", &self.locales_file)
            .finish()
    }
}

/// On-disk form. A `jobFilterDays` of 0 shows every job.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    gemini_api_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_ads_developer_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    google_ads_mcc_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_interval_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    job_filter_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    http_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forecast_delay_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forecast_max_concurrent: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prompts_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    locales_file: Option<PathBuf>,
}

fn secret(value: Option<String>) -> Option<SecretString> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(SecretString::from)
}

fn normalize_mcc(value: &str) -> Option<String> {
    let id: String = value.chars().filter(|c| *c != '-' && !c.is_whitespace()).collect();
    (!id.is_empty()).then_some(id)
}

impl From<StoredConfig> for AppConfig {
    fn from(stored: StoredConfig) -> Self {
        let defaults = AppConfig::default();
        AppConfig {
            gemini_api_key: secret(stored.gemini_api_key),
            model: stored
                .model
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .unwrap_or(defaults.model),
            google_ads_developer_token: secret(stored.google_ads_developer_token),
            google_ads_mcc_id: stored.google_ads_mcc_id.as_deref().and_then(normalize_mcc),
            google_ads_access_token: None,
            poll_interval_secs: stored
                .poll_interval_secs
                .filter(|s| *s > 0)
                .unwrap_or(defaults.poll_interval_secs),
            job_filter_days: match stored.job_filter_days {
                Some(0) => None,
                Some(days) => Some(days),
                None => defaults.job_filter_days,
            },
            http_timeout_secs: stored
                .http_timeout_secs
                .filter(|s| *s > 0)
                .unwrap_or(defaults.http_timeout_secs),
            forecast_delay_ms: stored.forecast_delay_ms.unwrap_or(defaults.forecast_delay_ms),
            forecast_max_concurrent: stored
                .forecast_max_concurrent
                .filter(|n| *n > 0)
                .unwrap_or(defaults.forecast_max_concurrent),
            prompts_dir: stored.prompts_dir,
            locales_file: stored.locales_file,
        }
    }
}

impl From<&AppConfig> for StoredConfig {
    fn from(config: &AppConfig) -> Self {
        StoredConfig {
            gemini_api_key: config
                .gemini_api_key
                .as_ref()
                .map(|k| k.expose_secret().to_string()),
            model: Some(config.model.clone()),
            google_ads_developer_token: config
                .google_ads_developer_token
                .as_ref()
                .map(|t| t.expose_secret().to_string()),
            google_ads_mcc_id: config.google_ads_mcc_id.clone(),
            poll_interval_secs: Some(config.poll_interval_secs),
            job_filter_days: Some(config.job_filter_days.unwrap_or(0)),
            http_timeout_secs: Some(config.http_timeout_secs),
            forecast_delay_ms: Some(config.forecast_delay_ms),
            forecast_max_concurrent: Some(config.forecast_max_concurrent),
            prompts_dir: config.prompts_dir.clone(),
            locales_file: config.locales_file.clone(),
        }
    }
}

impl AppConfig {
    /// Loads `path` (if given and present) and applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut config = match path {
            Some(path) if path.exists() => Self::from_file(path)?,
            Some(path) => {
                debug!("[CONFIG] {} not found, using defaults", path.display());
                Self::default()
            }
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, AppError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        info!("[CONFIG] Loaded settings from {}", path.display());
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let stored: StoredConfig = serde_json::from_str(json)
            .map_err(|e| AppError::InvalidInput(format!("Invalid settings file: {}", e)))?;
        Ok(stored.into())
    }

    /// Overrides credentials from `lookup` (normally `std::env::var`).
    /// Blank values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY") {
            self.gemini_api_key = secret(Some(key));
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.model = model.trim().to_string();
        }
        if let Some(token) = get("GOOGLE_ADS_DEVELOPER_TOKEN") {
            self.google_ads_developer_token = secret(Some(token));
        }
        if let Some(mcc) = get("GOOGLE_ADS_MCC_ID") {
            self.google_ads_mcc_id = normalize_mcc(&mcc);
        }
        if let Some(token) = get("GOOGLE_ADS_ACCESS_TOKEN") {
            self.google_ads_access_token = secret(Some(token));
        }
    }

    /// Writes the settings file atomically. The Ads access token is not saved.
    pub fn save(&self, path: &Path) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(&StoredConfig::from(self))
            .map_err(|e| AppError::Internal(format!("Failed to encode settings: {}", e)))?;
        write_atomic(path, json.as_bytes())?;
        info!("[CONFIG] Saved settings to {}", path.display());
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Derived settings
    // ─────────────────────────────────────────────────────────────────────────

    pub fn gemini_settings(&self) -> GeminiSettings {
        GeminiSettings {
            api_key: self.gemini_api_key.clone(),
            model: Some(self.model.clone()),
            timeout_secs: self.http_timeout_secs,
            ..GeminiSettings::default()
        }
    }

    pub fn ads_settings(&self) -> AdsSettings {
        AdsSettings {
            developer_token: self.google_ads_developer_token.clone(),
            mcc_id: self.google_ads_mcc_id.clone(),
            timeout_secs: self.http_timeout_secs,
            ..AdsSettings::default()
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn forecast_options(&self) -> ForecastOptions {
        ForecastOptions {
            chunk_size: ChunkSize::Metrics.as_usize(),
            max_concurrent: self.forecast_max_concurrent,
            chunk_delay: Duration::from_millis(self.forecast_delay_ms),
        }
    }

    /// Built-in templates, overridden per file from `prompts_dir`.
    pub fn prompt_templates(&self) -> Result<PromptTemplates, AppError> {
        match &self.prompts_dir {
            Some(dir) => PromptTemplates::load_dir(dir),
            None => Ok(PromptTemplates::default()),
        }
    }

    /// Built-in locales, or the JSON array in `locales_file`.
    pub fn locale_catalog(&self) -> Result<LocaleCatalog, AppError> {
        match &self.locales_file {
            Some(path) => LocaleCatalog::from_json(&std::fs::read_to_string(path)?),
            None => Ok(LocaleCatalog::default()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
