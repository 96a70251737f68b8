//! Application state shared by the command layer.
//!
//! Created once at startup and passed by reference.

use std::sync::Arc;

use secrecy::SecretString;
use tokio::sync::RwLock;

use crate::ads::client::{AdsClient, StaticTokenProvider, TokenProvider};
use crate::config::AppConfig;
use crate::error::AppError;
use crate::gemini::client::GeminiClient;
use crate::jobs::monitor::JobMonitor;
use crate::requests::locale::LocaleCatalog;
use crate::requests::prompt::PromptTemplates;

// ─────────────────────────────────────────────────────────────────────────────
// Application State
// ─────────────────────────────────────────────────────────────────────────────

pub struct AppState {
    /// Current settings. Credential changes must go through
    /// [`AppState::update_credentials`] so the client sees them.
    pub config: RwLock<AppConfig>,
    pub client: Arc<GeminiClient>,
    pub monitor: JobMonitor<GeminiClient>,
    pub prompts: PromptTemplates,
    pub locales: LocaleCatalog,
}

impl AppState {
    /// Builds the client, monitor, templates and locale catalog from `config`.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let client = Arc::new(GeminiClient::new(config.gemini_settings())?);
        let monitor = JobMonitor::new(
            Arc::clone(&client),
            config.poll_interval(),
            config.job_filter_days,
        );
        let prompts = config.prompt_templates()?;
        let locales = config.locale_catalog()?;

        Ok(Self {
            config: RwLock::new(config),
            client,
            monitor,
            prompts,
            locales,
        })
    }

    /// Replaces the Gemini key and model in both the settings and the client.
    pub async fn update_credentials(&self, api_key: Option<SecretString>, model: String) {
        let mut config = self.config.write().await;
        config.gemini_api_key = api_key.clone();
        config.model = model.clone();
        self.client.update_credentials(api_key, Some(model)).await;
    }

    /// Builds an Ads client using the configured access token.
    pub async fn ads_client(&self) -> Result<AdsClient, AppError> {
        let config = self.config.read().await;
        let tokens: Arc<dyn TokenProvider> =
            Arc::new(StaticTokenProvider::new(config.google_ads_access_token.clone()));
        AdsClient::new(config.ads_settings(), tokens)
    }
}
