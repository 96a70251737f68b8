//! Wire types for the Gemini generative-content and batch endpoints.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ─────────────────────────────────────────────────────────────────────────────
// Response schema descriptor
// ─────────────────────────────────────────────────────────────────────────────

/// Primitive and container types understood by the structured-output schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SchemaType {
    Array,
    Object,
    String,
    Number,
}

/// JSON schema descriptor attached to a request to force structured output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonSchema {
    #[serde(rename = "type")]
    pub kind: SchemaType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, JsonSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<JsonSchema>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
}

impl JsonSchema {
    fn of(kind: SchemaType) -> Self {
        Self {
            kind,
            properties: None,
            items: None,
            required: None,
            enum_values: None,
        }
    }

    pub fn string() -> Self {
        Self::of(SchemaType::String)
    }

    pub fn number() -> Self {
        Self::of(SchemaType::Number)
    }

    /// A STRING restricted to the given values.
    pub fn string_enum(values: Vec<String>) -> Self {
        Self {
            enum_values: Some(values),
            ..Self::of(SchemaType::String)
        }
    }

    pub fn array_of(items: JsonSchema) -> Self {
        Self {
            items: Some(Box::new(items)),
            ..Self::of(SchemaType::Array)
        }
    }

    pub fn object(properties: BTreeMap<String, JsonSchema>, required: Vec<String>) -> Self {
        Self {
            properties: Some(properties),
            required: Some(required),
            ..Self::of(SchemaType::Object)
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Batch request
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub response_mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_schema: Option<JsonSchema>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub key: String,
}

/// One sub-request of a batch: the prompt, its output schema and the
/// reassembly key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub request: GenerateContentRequest,
    pub metadata: RequestMetadata,
}

impl BatchRequest {
    /// Builds a JSON-output request carrying `prompt` as a single text part.
    pub fn new(prompt: String, schema: JsonSchema, key: String) -> Self {
        Self {
            request: GenerateContentRequest {
                contents: vec![Content {
                    role: None,
                    parts: vec![Part { text: prompt }],
                }],
                generation_config: GenerationConfig {
                    response_mime_type: "application/json".to_string(),
                    response_schema: Some(schema),
                },
            },
            metadata: RequestMetadata { key },
        }
    }

    pub fn key(&self) -> &str {
        &self.metadata.key
    }

    pub fn prompt(&self) -> &str {
        self.request
            .contents
            .first()
            .and_then(|c| c.parts.first())
            .map(|p| p.text.as_str())
            .unwrap_or("")
    }

    pub fn schema(&self) -> Option<&JsonSchema> {
        self.request.generation_config.response_schema.as_ref()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Job (long-running batch operation)
// ─────────────────────────────────────────────────────────────────────────────

/// Progress counters reported by the batch service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub successful_request_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_request_count: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pending_request_count: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_stats: Option<BatchStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// Container of inline responses, `response.inlinedResponses.inlinedResponses[]`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlinedResponses {
    #[serde(default)]
    pub inlined_responses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlined_responses: Option<InlinedResponses>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub responses_file: Option<String>,
}

/// A batch job as reported by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JobMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<JobResponse>,
}

impl Job {
    pub fn display_name(&self) -> Option<&str> {
        self.metadata.as_ref()?.display_name.as_deref()
    }

    pub fn state(&self) -> Option<&str> {
        self.metadata.as_ref()?.state.as_deref()
    }

    /// Creation time, or `None` when absent or unparseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.metadata.as_ref()?.create_time.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }

    pub fn is_terminal(&self) -> bool {
        self.done
    }
}

/// One page of `GET batches`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListJobsPage {
    #[serde(default, alias = "batches")]
    pub operations: Vec<Job>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Direct generation response
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
}

impl GenerateContentResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .as_ref()?
            .parts
            .first()
            .map(|p| p.text.as_str())
    }
}
