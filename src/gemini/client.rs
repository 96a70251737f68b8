//! Gemini HTTP client with key handling and safe logging.
//!
//! # Security
//!
//! - The API key travels only in the `x-goog-api-key` header
//! - Keys, prompts and response bodies are never logged
//! - Transport errors are reported without the URL

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{info, warn};
use url::Url;

use crate::error::AppError;
use crate::gemini::types::{
    BatchRequest, Content, GenerateContentRequest, GenerateContentResponse, GenerationConfig,
    Job, JsonSchema, ListJobsPage, Part,
};

// ─────────────────────────────────────────────────────────────────────────────
// Constants
// ─────────────────────────────────────────────────────────────────────────────

/// Base URL of the generative-language REST API.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Base URL for downloading batch result files.
pub const GEMINI_DOWNLOAD_BASE_URL: &str =
    "https://generativelanguage.googleapis.com/download/v1beta";

const CLIENT_USER_AGENT: &str = "bucketlocale/0.1.0";

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Page size requested when listing batches.
const LIST_PAGE_SIZE: u32 = 1000;

// ─────────────────────────────────────────────────────────────────────────────
// GeminiSettings
// ─────────────────────────────────────────────────────────────────────────────

/// Endpoint, credential and model used by [`GeminiClient`].
#[derive(Clone)]
pub struct GeminiSettings {
    pub api_key: Option<SecretString>,
    pub model: Option<String>,
    pub base_url: String,
    pub download_base_url: String,
    pub timeout_secs: u64,
}

impl Default for GeminiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            base_url: GEMINI_API_BASE_URL.to_string(),
            download_base_url: GEMINI_DOWNLOAD_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl std::fmt::Debug for GeminiSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiSettings")
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("download_base_url", &self.download_base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Validated per-call view of the settings.
struct CallContext {
    api_key: String,
    model: String,
    base_url: String,
    download_base_url: String,
}

/// Error body returned by Google APIs: `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// GeminiClient
// ─────────────────────────────────────────────────────────────────────────────

/// Thread-safe HTTP client for the Gemini batch and generation endpoints.
///
/// Settings sit behind a `RwLock` so the key or model can be changed at
/// runtime without rebuilding the client.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    settings: Arc<RwLock<GeminiSettings>>,
}

impl GeminiClient {
    /// # Errors
    ///
    /// Returns `AppError::Internal` if the HTTP client fails to initialize.
    pub fn new(settings: GeminiSettings) -> Result<Self, AppError> {
        let http = build_http_client(settings.timeout_secs)?;
        Ok(Self {
            http,
            settings: Arc::new(RwLock::new(settings)),
        })
    }

    /// Replaces the API key and model (e.g. after the settings file changed).
    pub async fn update_credentials(&self, api_key: Option<SecretString>, model: Option<String>) {
        let mut guard = self.settings.write().await;
        guard.api_key = api_key;
        guard.model = model;
    }

    async fn context(&self) -> Result<CallContext, AppError> {
        let settings = self.settings.read().await;

        let api_key = settings
            .api_key
            .as_ref()
            .map(|k| k.expose_secret().trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::NotConfigured("Gemini API key is not configured".into()))?;

        let model = settings
            .model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| AppError::NotConfigured("Gemini model is not configured".into()))?
            .to_string();

        Ok(CallContext {
            api_key,
            model,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            download_base_url: settings.download_base_url.trim_end_matches('/').to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates a batch job from `requests`.
    pub async fn batch_generate_content(
        &self,
        requests: &[BatchRequest],
        display_name: &str,
    ) -> Result<Job, AppError> {
        let ctx = self.context().await?;
        let url = build_url(&ctx.base_url, &format!("models/{}:batchGenerateContent", ctx.model))?;
        let body = serde_json::json!({
            "batch": {
                "display_name": display_name,
                "input_config": {
                    "requests": {
                        "requests": requests,
                    }
                }
            }
        });

        info!(
            "[GEMINI] Submitting batch '{}' with {} requests",
            display_name,
            requests.len()
        );
        let job: Job = self.request_json(Method::POST, url, Some(body), &ctx).await?;
        info!("[GEMINI] Created batch {}", redact_id(&job.name));
        Ok(job)
    }

    /// Lists all batch jobs, following page tokens.
    pub async fn list_batches(&self) -> Result<Vec<Job>, AppError> {
        let ctx = self.context().await?;
        let mut jobs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut url = build_url(&ctx.base_url, "batches")?;
            {
                let mut query = url.query_pairs_mut();
                query.append_pair("pageSize", &LIST_PAGE_SIZE.to_string());
                if let Some(token) = &page_token {
                    query.append_pair("pageToken", token);
                }
            }

            let page: ListJobsPage = self.request_json(Method::GET, url, None, &ctx).await?;
            jobs.extend(page.operations);

            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        Ok(jobs)
    }

    /// Fetches one job by its full resource name (`batches/...`).
    pub async fn get_batch(&self, name: &str) -> Result<Job, AppError> {
        let ctx = self.context().await?;
        let url = build_url(&ctx.base_url, name)?;
        self.request_json(Method::GET, url, None, &ctx).await
    }

    /// Requests cancellation of a running job.
    pub async fn cancel_batch(&self, name: &str) -> Result<(), AppError> {
        let ctx = self.context().await?;
        let url = build_url(&ctx.base_url, &format!("{}:cancel", name))?;
        self.send(Method::POST, url, None, &ctx).await?;
        info!("[GEMINI] Cancel requested for {}", redact_id(name));
        Ok(())
    }

    /// Deletes a job.
    pub async fn delete_batch(&self, name: &str) -> Result<(), AppError> {
        let ctx = self.context().await?;
        let url = build_url(&ctx.base_url, name)?;
        self.send(Method::DELETE, url, None, &ctx).await?;
        info!("[GEMINI] Deleted {}", redact_id(name));
        Ok(())
    }

    /// Downloads a result file (`files/...`) as raw JSONL text.
    pub async fn download_batch_results(&self, file_name: &str) -> Result<String, AppError> {
        let ctx = self.context().await?;
        let mut url = build_url(&ctx.download_base_url, &format!("{}:download", file_name))?;
        url.query_pairs_mut().append_pair("alt", "media");

        let response = self.send(Method::GET, url, None, &ctx).await?;
        response
            .text()
            .await
            .map_err(|_| AppError::ConnectionFailed("Failed to read batch results".to_string()))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Direct generation
    // ─────────────────────────────────────────────────────────────────────────

    /// Generates a single response and returns the text of its first part.
    ///
    /// With a schema the response MIME type is JSON, otherwise plain text.
    pub async fn generate_content(
        &self,
        prompt: &str,
        schema: Option<&JsonSchema>,
    ) -> Result<String, AppError> {
        let ctx = self.context().await?;
        let url = build_url(&ctx.base_url, &format!("models/{}:generateContent", ctx.model))?;

        let mime = if schema.is_some() { "application/json" } else { "text/plain" };
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: prompt.to_string() }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: mime.to_string(),
                response_schema: schema.cloned(),
            },
        };
        let body = serde_json::to_value(&body)
            .map_err(|e| AppError::Internal(format!("Failed to encode request: {}", e)))?;

        let response: GenerateContentResponse =
            self.request_json(Method::POST, url, Some(body), &ctx).await?;

        response.first_text().map(str::to_string).ok_or_else(|| AppError::Remote {
            status: 200,
            message: "Invalid response structure from API".to_string(),
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        ctx: &CallContext,
    ) -> Result<T, AppError> {
        let response = self.send(method, url, body, ctx).await?;
        let text = response
            .text()
            .await
            .map_err(|_| AppError::ConnectionFailed("Failed to read response body".to_string()))?;
        serde_json::from_str(&text).map_err(|e| AppError::Remote {
            status: 200,
            message: format!("Unexpected response format: {}", e),
        })
    }

    /// Executes a request with timing, logging and error mapping.
    ///
    /// Non-2xx responses become `AppError::Remote`.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
        ctx: &CallContext,
    ) -> Result<reqwest::Response, AppError> {
        let start = Instant::now();
        let path = url.path().to_string();

        let mut request = self
            .http
            .request(method.clone(), url.as_str())
            .header(API_KEY_HEADER, ctx.api_key.as_str());
        if let Some(body) = &body {
            request = request.json(body);
        }

        let result = request.send().await;
        let duration_ms = start.elapsed().as_millis();

        let response = match result {
            Ok(response) => response,
            Err(_) => {
                warn!("[GEMINI] {} {} FAILED {}ms", method, path, duration_ms);
                return Err(AppError::ConnectionFailed(
                    "Connection to Gemini API failed".to_string(),
                ));
            }
        };

        let status = response.status();
        info!(
            "[GEMINI] {} {} {} {}ms",
            method,
            path,
            status.as_u16(),
            duration_ms
        );

        if !status.is_success() {
            return Err(parse_error_response(response, status).await);
        }
        Ok(response)
    }
}

/// Maps a non-2xx response to `AppError::Remote`.
///
/// The message is `error.message` from a JSON body, else the raw body, else
/// the status line.
async fn parse_error_response(response: reqwest::Response, status: StatusCode) -> AppError {
    let body = response.text().await.unwrap_or_default();
    AppError::Remote {
        status: status.as_u16(),
        message: error_message_from_body(&body, status),
    }
}

fn error_message_from_body(body: &str, status: StatusCode) -> String {
    if let Ok(parsed) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = parsed.error.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }
    if !body.trim().is_empty() {
        return body.trim().to_string();
    }
    format!(
        "HTTP {} {}",
        status.as_u16(),
        status.canonical_reason().unwrap_or("Unknown error")
    )
}

/// Joins `base` and `path` textually.
///
/// Resource paths contain `:` (`models/x:batchGenerateContent`), which
/// `Url::join` would read as a scheme.
fn build_url(base: &str, path: &str) -> Result<Url, AppError> {
    let raw = format!("{}/{}", base, path.trim_start_matches('/'));
    Url::parse(&raw).map_err(|_| AppError::Internal(format!("Invalid API path: {}", path)))
}

/// Redacts a resource name for logging (shows first 16 chars).
pub(crate) fn redact_id(id: &str) -> String {
    match id.char_indices().nth(16) {
        Some((idx, _)) => format!("{}...", &id[..idx]),
        None => id.to_string(),
    }
}

fn build_http_client(timeout_secs: u64) -> Result<reqwest::Client, AppError> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

    reqwest::Client::builder()
        .default_headers(headers)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
