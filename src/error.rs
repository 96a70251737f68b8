use serde::Serialize;
use thiserror::Error;

/// Patterns (lowercase) that indicate sensitive data not safe for UI display.
/// Used by `contains_sensitive()` for case-insensitive matching.
pub(crate) const SENSITIVE_PATTERNS: &[&str] = &[
    "bearer ",
    "x-goog-api-key",
    "api_key",
    "apikey",
    "access_token",
    "developer-token",
    "authorization:",
];

/// Returns true if the message contains any sensitive pattern (case-insensitive).
fn contains_sensitive(msg: &str) -> bool {
    let lower = msg.to_ascii_lowercase();
    SENSITIVE_PATTERNS.iter().any(|p| lower.contains(p))
}

/// Sanitizes a message for UI display.
/// If sensitive content is detected, returns the fallback instead.
fn sanitize_message(msg: &str, fallback: &str) -> String {
    if contains_sensitive(msg) {
        fallback.into()
    } else {
        msg.to_string()
    }
}

/// User-friendly error presentation for the frontend.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorPresentation {
    pub title: String,
    pub message: String,
    pub action: Option<String>,
}

/// Application-wide error type.
#[derive(Debug, Error)]
pub enum AppError {
    // ── Configuration ─────────────────────────────────────────────────────────
    #[error("Not configured: {0}")]
    NotConfigured(String),

    // ── Input ─────────────────────────────────────────────────────────────────
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ── Remote ────────────────────────────────────────────────────────────────
    #[error("Remote error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // ── Batch jobs ────────────────────────────────────────────────────────────
    #[error("Batch job {0} has not finished yet")]
    JobNotReady(String),

    #[error("Batch job {job_name} failed: {message}")]
    JobFailed { job_name: String, message: String },

    // ── Output ────────────────────────────────────────────────────────────────
    #[error("CSV error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(String),

    // ── Generic fallback ──────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Converts the error into a user-friendly presentation suitable for UI display.
    /// Never leaks API keys, tokens, or sensitive URL parameters.
    pub fn to_presentation(&self) -> ErrorPresentation {
        match self {
            // ── Configuration ─────────────────────────────────────────────────
            AppError::NotConfigured(what) => ErrorPresentation {
                title: "Missing Configuration".into(),
                message: sanitize_message(what, "A required setting is missing."),
                action: Some("Open settings and fill in the missing value".into()),
            },

            // ── Input ─────────────────────────────────────────────────────────
            AppError::InvalidInput(msg) => ErrorPresentation {
                title: "Invalid Input".into(),
                message: sanitize_message(msg, "The request could not be built from the given input."),
                action: Some("Check the selected keywords and options".into()),
            },

            // ── Remote ────────────────────────────────────────────────────────
            AppError::Remote { status, message } => ErrorPresentation {
                title: "Service Error".into(),
                message: format!(
                    "The service responded with HTTP {}: {}",
                    status,
                    sanitize_message(message, "the request was rejected.")
                ),
                action: None,
            },

            AppError::NotAuthenticated => ErrorPresentation {
                title: "Not Signed In".into(),
                message: "You need to sign in with Google to continue.".into(),
                action: Some("Sign in again".into()),
            },

            AppError::ConnectionFailed(_) => ErrorPresentation {
                title: "Connection Failed".into(),
                message: "Could not reach the service. Please check your internet connection.".into(),
                action: Some("Check network and retry".into()),
            },

            // ── Batch jobs ────────────────────────────────────────────────────
            AppError::JobNotReady(_) => ErrorPresentation {
                title: "Job Still Running".into(),
                message: "Results are only available once the batch job has finished.".into(),
                action: Some("Wait for the job to complete".into()),
            },

            AppError::JobFailed { job_name: _, message } => ErrorPresentation {
                title: "Batch Job Failed".into(),
                message: sanitize_message(message, "The batch job failed."),
                action: Some("Review the error and submit the job again".into()),
            },

            // ── Output ────────────────────────────────────────────────────────
            AppError::Csv(msg) => ErrorPresentation {
                title: "CSV Error".into(),
                message: format!("Could not produce the CSV output: {}", msg),
                action: None,
            },

            AppError::Io(_) => ErrorPresentation {
                title: "File Error".into(),
                message: "The file could not be read or written.".into(),
                action: Some("Check the path and permissions".into()),
            },

            // ── Generic ───────────────────────────────────────────────────────
            AppError::Internal(_) => ErrorPresentation {
                title: "Unexpected Error".into(),
                message: "Something went wrong. Please try again.".into(),
                action: Some("Try again".into()),
            },
        }
    }
}

// Allow AppError to be handed to the UI layer as its presentation
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.to_presentation().serialize(serializer)
    }
}

impl From<csv::Error> for AppError {
    fn from(e: csv::Error) -> Self {
        AppError::Csv(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Returns all AppError variants for exhaustive testing.
    fn all_variants() -> Vec<AppError> {
        vec![
            AppError::NotConfigured("Gemini API key is not configured".into()),
            AppError::InvalidInput("No locales provided".into()),
            AppError::Remote { status: 400, message: "bad schema".into() },
            AppError::NotAuthenticated,
            AppError::ConnectionFailed("timeout".into()),
            AppError::JobNotReady("batches/abc".into()),
            AppError::JobFailed { job_name: "batches/abc".into(), message: "quota".into() },
            AppError::Csv("bad utf-8".into()),
            AppError::Io("permission denied".into()),
            AppError::Internal("something broke".into()),
        ]
    }

    #[test]
    fn all_variants_have_nonempty_title_and_message() {
        for variant in all_variants() {
            let presentation = variant.to_presentation();
            assert!(
                !presentation.title.trim().is_empty(),
                "Empty title for {:?}",
                variant
            );
            assert!(
                !presentation.message.trim().is_empty(),
                "Empty message for {:?}",
                variant
            );
        }
    }

    #[test]
    fn configuration_errors_point_to_settings() {
        let presentation =
            AppError::NotConfigured("Gemini model is not configured".into()).to_presentation();
        let action = presentation.action.expect("config error should have action");
        assert!(action.to_lowercase().contains("settings"));
        assert!(presentation.message.contains("model"));
    }

    #[test]
    fn remote_error_carries_status() {
        let presentation = AppError::Remote {
            status: 429,
            message: "Resource has been exhausted".into(),
        }
        .to_presentation();
        assert!(presentation.message.contains("429"));
        assert!(presentation.message.contains("exhausted"));
    }

    #[test]
    fn serialization_produces_valid_json_with_required_fields() {
        for variant in all_variants() {
            let json = serde_json::to_string(&variant)
                .unwrap_or_else(|_| panic!("Failed to serialize {:?}", variant));

            let parsed: serde_json::Value = serde_json::from_str(&json)
                .unwrap_or_else(|_| panic!("Failed to parse JSON for {:?}", variant));

            assert!(parsed.get("title").is_some(), "{:?} missing 'title'", variant);
            assert!(parsed.get("message").is_some(), "{:?} missing 'message'", variant);
            assert!(parsed.get("action").is_some(), "{:?} missing 'action'", variant);
        }
    }

    #[test]
    fn no_secret_leakage_in_presentation() {
        let test_cases: Vec<(&str, AppError)> = vec![
            ("Remote", AppError::Remote {
                status: 403,
                message: "API_KEY_INVALID x-goog-api-key=AIza123".into(),
            }),
            ("InvalidInput", AppError::InvalidInput("Bearer ya29.token".into())),
            ("JobFailed", AppError::JobFailed {
                job_name: "batches/1".into(),
                message: "access_token expired".into(),
            }),
            ("NotConfigured", AppError::NotConfigured("developer-token abc".into())),
        ];

        for (label, variant) in test_cases {
            let presentation = variant.to_presentation();
            let output_lower = format!(
                "{} {} {}",
                presentation.title,
                presentation.message,
                presentation.action.as_deref().unwrap_or("")
            )
            .to_ascii_lowercase();

            for pattern in SENSITIVE_PATTERNS {
                assert!(
                    !output_lower.contains(pattern),
                    "{} presentation contains sensitive pattern {}",
                    label,
                    pattern
                );
            }
        }
    }
}
