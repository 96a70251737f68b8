//! Google Ads keyword-planning client.
//!
//! Two endpoints are used: `generateKeywordHistoricalMetrics` for forecasts
//! and `generateKeywordIdeas` for keyword expansion. Authentication is an
//! OAuth bearer token from a [`TokenProvider`] plus the developer token and
//! manager (MCC) account id from settings.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::AppError;

pub(crate) type BoxFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, AppError>> + Send + 'a>>;

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

pub const GOOGLE_ADS_API_BASE_URL: &str = "https://googleads.googleapis.com/v21";

const CLIENT_USER_AGENT: &str = "bucketlocale/0.1.0";

const KEYWORD_PLAN_NETWORK: &str = "GOOGLE_SEARCH";

/// English.
pub const DEFAULT_IDEA_LANGUAGE: &str = "languageConstants/1000";

/// United States.
pub const DEFAULT_IDEA_GEO_TARGET: &str = "geoTargetConstants/2840";

// ─────────────────────────────────────────────────────────────────────────────
// Metrics
// ─────────────────────────────────────────────────────────────────────────────

/// Historical search metrics for one keyword. Values are kept as the API
/// returns them (decimal strings and enum names).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordMetrics {
    pub keyword: String,
    pub avg_monthly_searches: String,
    pub competition: String,
    pub competition_index: String,
    pub low_top_of_page_bid: String,
    pub high_top_of_page_bid: String,
}

impl KeywordMetrics {
    /// Metrics used when the API has nothing for `keyword`.
    pub fn placeholder(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            avg_monthly_searches: "0".to_string(),
            competition: "UNKNOWN".to_string(),
            competition_index: "0".to_string(),
            low_top_of_page_bid: "0".to_string(),
            high_top_of_page_bid: "0".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HistoricalMetricsResponse {
    #[serde(default)]
    results: Vec<HistoricalMetricsResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HistoricalMetricsResult {
    text: String,
    #[serde(default)]
    keyword_metrics: Option<RawKeywordMetrics>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawKeywordMetrics {
    avg_monthly_searches: Option<String>,
    competition: Option<String>,
    competition_index: Option<String>,
    low_top_of_page_bid_micros: Option<String>,
    high_top_of_page_bid_micros: Option<String>,
}

impl RawKeywordMetrics {
    fn into_metrics(self, keyword: String) -> KeywordMetrics {
        let or = |value: Option<String>, fallback: &str| {
            value
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| fallback.to_string())
        };
        KeywordMetrics {
            keyword,
            avg_monthly_searches: or(self.avg_monthly_searches, "0"),
            competition: or(self.competition, "UNKNOWN"),
            competition_index: or(self.competition_index, "0"),
            low_top_of_page_bid: or(self.low_top_of_page_bid_micros, "0"),
            high_top_of_page_bid: or(self.high_top_of_page_bid_micros, "0"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct KeywordIdeasResponse {
    #[serde(default)]
    results: Vec<KeywordIdeaResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeywordIdeaResult {
    text: String,
    #[serde(default)]
    keyword_idea_metrics: Option<RawKeywordMetrics>,
}

/// Seed for keyword idea generation. A landing page switches the request to
/// the combined keyword-and-URL seed.
#[derive(Debug, Clone, Default)]
pub struct IdeaSeed {
    pub keywords: Vec<String>,
    pub page_url: Option<String>,
    /// Language constant resource name; English when `None`.
    pub language: Option<String>,
    /// Geo target constant resource names; United States when empty.
    pub geo_targets: Vec<String>,
}

impl IdeaSeed {
    fn to_body(&self) -> serde_json::Value {
        let geo_targets: Vec<&str> = if self.geo_targets.is_empty() {
            vec![DEFAULT_IDEA_GEO_TARGET]
        } else {
            self.geo_targets.iter().map(String::as_str).collect()
        };
        let mut body = serde_json::json!({
            "language": self.language.as_deref().filter(|l| !l.is_empty()).unwrap_or(DEFAULT_IDEA_LANGUAGE),
            "geoTargetConstants": geo_targets,
            "includeAdultKeywords": false,
            "keywordPlanNetwork": KEYWORD_PLAN_NETWORK,
        });
        match self.page_url.as_deref().filter(|u| !u.trim().is_empty()) {
            Some(url) => {
                body["keywordAndUrlSeed"] =
                    serde_json::json!({ "url": url.trim(), "keywords": self.keywords });
            }
            None => body["keywordSeed"] = serde_json::json!({ "keywords": self.keywords }),
        }
        body
    }
}

#[derive(Debug, Deserialize)]
struct AdsErrorBody {
    error: AdsErrorDetail,
}

#[derive(Debug, Deserialize)]
struct AdsErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Capabilities
// ─────────────────────────────────────────────────────────────────────────────

/// Supplies an OAuth access token for the Ads API.
pub trait TokenProvider: Send + Sync {
    fn get_token(&self) -> BoxFut<'_, SecretString>;
}

/// A token obtained elsewhere (environment, CLI flag).
pub struct StaticTokenProvider {
    token: Option<SecretString>,
}

impl StaticTokenProvider {
    pub fn new(token: Option<SecretString>) -> Self {
        Self { token }
    }
}

impl TokenProvider for StaticTokenProvider {
    fn get_token(&self) -> BoxFut<'_, SecretString> {
        Box::pin(async move {
            self.token
                .as_ref()
                .filter(|t| !t.expose_secret().trim().is_empty())
                .map(|t| SecretString::from(t.expose_secret().trim().to_string()))
                .ok_or(AppError::NotAuthenticated)
        })
    }
}

/// Source of historical metrics for one chunk of keywords.
pub trait HistoricalMetricsSource: Send + Sync {
    fn fetch_metrics<'a>(&'a self, keywords: &'a [String]) -> BoxFut<'a, Vec<KeywordMetrics>>;
}

// ─────────────────────────────────────────────────────────────────────────────
// AdsClient
// ─────────────────────────────────────────────────────────────────────────────

/// Developer credentials and endpoint for [`AdsClient`].
#[derive(Clone)]
pub struct AdsSettings {
    pub developer_token: Option<SecretString>,
    /// Manager account id; dashes are ignored.
    pub mcc_id: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for AdsSettings {
    fn default() -> Self {
        Self {
            developer_token: None,
            mcc_id: None,
            base_url: GOOGLE_ADS_API_BASE_URL.to_string(),
            timeout_secs: crate::gemini::client::DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for AdsSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdsSettings")
            .field("developer_token", &self.developer_token.as_ref().map(|_| "[REDACTED]"))
            .field("mcc_id", &self.mcc_id)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

pub struct AdsClient {
    http: reqwest::Client,
    settings: AdsSettings,
    tokens: Arc<dyn TokenProvider>,
}

impl AdsClient {
    pub fn new(settings: AdsSettings, tokens: Arc<dyn TokenProvider>) -> Result<Self, AppError> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings,
            tokens,
        })
    }

    fn customer_id(&self) -> Result<String, AppError> {
        let id: String = self
            .settings
            .mcc_id
            .as_deref()
            .unwrap_or_default()
            .chars()
            .filter(|c| *c != '-' && !c.is_whitespace())
            .collect();
        if id.is_empty() {
            return Err(AppError::NotConfigured(
                "Google Ads MCC ID must be configured in settings".into(),
            ));
        }
        Ok(id)
    }

    fn developer_token(&self) -> Result<String, AppError> {
        self.settings
            .developer_token
            .as_ref()
            .map(|t| t.expose_secret().trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or_else(|| {
                AppError::NotConfigured("Google Ads developer token must be configured in settings".into())
            })
    }

    /// Fetches historical metrics for `keywords` in one call.
    pub async fn keyword_historical_metrics(
        &self,
        keywords: &[String],
    ) -> Result<Vec<KeywordMetrics>, AppError> {
        let body = serde_json::json!({
            "keywords": keywords,
            "keywordPlanNetwork": KEYWORD_PLAN_NETWORK,
        });
        let parsed: HistoricalMetricsResponse = self
            .post("generateKeywordHistoricalMetrics", &body, keywords.len())
            .await?;

        Ok(parsed
            .results
            .into_iter()
            .map(|r| r.keyword_metrics.unwrap_or_default().into_metrics(r.text))
            .collect())
    }

    /// Expands `seed` into keyword ideas. Ideas the API returns without
    /// metrics are dropped.
    pub async fn generate_keyword_ideas(&self, seed: &IdeaSeed) -> Result<Vec<KeywordMetrics>, AppError> {
        let parsed: KeywordIdeasResponse = self
            .post("generateKeywordIdeas", &seed.to_body(), seed.keywords.len())
            .await?;

        let total = parsed.results.len();
        let ideas: Vec<KeywordMetrics> = parsed
            .results
            .into_iter()
            .filter_map(|r| r.keyword_idea_metrics.map(|m| m.into_metrics(r.text)))
            .collect();
        info!("[ADS] {} keyword ideas ({} without metrics dropped)", ideas.len(), total - ideas.len());
        Ok(ideas)
    }

    async fn post<T: DeserializeOwned>(
        &self,
        operation: &str,
        body: &serde_json::Value,
        keyword_count: usize,
    ) -> Result<T, AppError> {
        let customer_id = self.customer_id()?;
        let developer_token = self.developer_token()?;
        let access_token = self.tokens.get_token().await?;

        let url = format!(
            "{}/customers/{}:{}",
            self.settings.base_url.trim_end_matches('/'),
            customer_id,
            operation
        );

        let start = Instant::now();
        let result = self
            .http
            .post(&url)
            .bearer_auth(access_token.expose_secret())
            .header("developer-token", developer_token.as_str())
            .header("login-customer-id", customer_id.as_str())
            .json(body)
            .send()
            .await;
        let duration_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(response) => response,
            Err(_) => {
                warn!("[ADS] POST {} FAILED {}ms", operation, duration_ms);
                return Err(AppError::ConnectionFailed(
                    "Connection to Google Ads API failed".to_string(),
                ));
            }
        };

        let status = response.status();
        info!(
            "[ADS] POST {} {} {}ms ({} keywords)",
            operation,
            status.as_u16(),
            duration_ms,
            keyword_count
        );

        if status == StatusCode::UNAUTHORIZED {
            return Err(AppError::NotAuthenticated);
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AppError::Remote {
                status: status.as_u16(),
                message: ads_error_message(&text, status),
            });
        }

        response.json().await.map_err(|e| AppError::Remote {
            status: status.as_u16(),
            message: format!("Unexpected Google Ads response: {}", e),
        })
    }
}

impl HistoricalMetricsSource for AdsClient {
    fn fetch_metrics<'a>(&'a self, keywords: &'a [String]) -> BoxFut<'a, Vec<KeywordMetrics>> {
        Box::pin(self.keyword_historical_metrics(keywords))
    }
}

fn ads_error_message(body: &str, status: StatusCode) -> String {
    match serde_json::from_str::<AdsErrorBody>(body) {
        Ok(parsed) if !parsed.error.message.is_empty() => format!(
            "Google Ads API error: {} (Status: {})",
            parsed.error.message, parsed.error.status
        ),
        _ => format!(
            "HTTP {} {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown error")
        ),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
