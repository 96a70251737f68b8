//! Extraction of response fragments from finished batch jobs.
//!
//! A finished job carries its per-request responses either inline
//! (`response.inlinedResponses.inlinedResponses[]`) or in a JSONL results
//! file. Both hold entries of the same shape:
//!
//! ```json
//! {"key": "...", "response": {"candidates": [{"content": {"parts": [{"text": "..."}]}}]}}
//! ```
//!
//! The key may also sit under `metadata.key`. Entries that carry an `error`
//! or have no text are skipped.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::gemini::types::Job;

/// The text of one sub-request response together with its request key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseFragment {
    pub key: Option<String>,
    pub text: String,
}

impl ResponseFragment {
    pub fn new(key: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            key: key.map(str::to_string),
            text: text.into(),
        }
    }

    /// Reads one response entry. Returns `None` for error entries and entries
    /// without text.
    pub fn from_entry(entry: &Value) -> Option<Self> {
        let key = entry
            .get("key")
            .or_else(|| entry.pointer("/metadata/key"))
            .and_then(Value::as_str)
            .map(str::to_string);

        if let Some(error) = entry.get("error").filter(|e| !e.is_null()) {
            warn!(
                "[MERGE] Request {} failed: {}",
                key.as_deref().unwrap_or("unknown key"),
                error
            );
            return None;
        }

        let text = entry
            .pointer("/response/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)?;

        Some(Self {
            key,
            text: text.to_string(),
        })
    }
}

/// Parses a downloaded JSONL results file into fragments.
///
/// Blank lines are ignored; lines that are not JSON, carry an error or lack
/// text are logged and skipped.
pub fn parse_batch_output(raw: &str) -> Vec<ResponseFragment> {
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(n, line)| match serde_json::from_str::<Value>(line) {
            Ok(entry) => {
                let fragment = ResponseFragment::from_entry(&entry);
                if fragment.is_none() {
                    debug!("[MERGE] Results line {} has no usable response", n + 1);
                }
                fragment
            }
            Err(e) => {
                warn!("[MERGE] Results line {} is not valid JSON: {}", n + 1, e);
                None
            }
        })
        .collect()
}

/// Strips a leading ```` ```json ```` and a trailing ```` ``` ```` fence.
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text;
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest.trim_start();
    }
    if let Some(rest) = body.trim_end().strip_suffix("```") {
        body = rest;
    }
    body
}

/// Where a finished job's responses live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutput {
    Inline(Vec<ResponseFragment>),
    File(String),
    Empty,
}

impl JobOutput {
    pub fn from_job(job: &Job) -> Self {
        let Some(response) = job.response.as_ref() else {
            return JobOutput::Empty;
        };

        if let Some(inline) = response
            .inlined_responses
            .as_ref()
            .filter(|r| !r.inlined_responses.is_empty())
        {
            let fragments = inline
                .inlined_responses
                .iter()
                .filter_map(ResponseFragment::from_entry)
                .collect();
            return JobOutput::Inline(fragments);
        }

        match response.responses_file.as_deref() {
            Some(file) if !file.is_empty() => JobOutput::File(file.to_string()),
            _ => JobOutput::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::types::{InlinedResponses, JobResponse};
    use serde_json::json;

    fn entry(key: &str, text: &str) -> Value {
        json!({
            "key": key,
            "response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}
        })
    }

    #[test]
    fn test_from_entry_reads_key_and_text() {
        let fragment = ResponseFragment::from_entry(&entry("MX_0", "[]")).unwrap();
        assert_eq!(fragment, ResponseFragment::new(Some("MX_0"), "[]"));
    }

    #[test]
    fn test_from_entry_reads_metadata_key() {
        let value = json!({
            "metadata": {"key": "classification_2"},
            "response": {"candidates": [{"content": {"parts": [{"text": "x"}]}}]}
        });
        let fragment = ResponseFragment::from_entry(&value).unwrap();
        assert_eq!(fragment.key.as_deref(), Some("classification_2"));
    }

    #[test]
    fn test_from_entry_skips_errors_and_missing_text() {
        let errored = json!({"key": "a", "error": {"code": 13, "message": "internal"}});
        assert!(ResponseFragment::from_entry(&errored).is_none());

        let empty = json!({"key": "a", "response": {"candidates": []}});
        assert!(ResponseFragment::from_entry(&empty).is_none());
    }

    #[test]
    fn test_from_entry_without_key() {
        let value = json!({"response": {"candidates": [{"content": {"parts": [{"text": "t"}]}}]}});
        let fragment = ResponseFragment::from_entry(&value).unwrap();
        assert!(fragment.key.is_none());
    }

    #[test]
    fn test_parse_batch_output_skips_bad_lines() {
        let raw = format!(
            "{}\nnot json\n\n{}\n{}\n",
            entry("MX_0", "[1]"),
            json!({"key": "MX_1", "error": {"message": "quota"}}),
            entry("MX_2", "[2]")
        );
        let fragments = parse_batch_output(&raw);
        let keys: Vec<&str> = fragments.iter().filter_map(|f| f.key.as_deref()).collect();
        assert_eq!(keys, vec!["MX_0", "MX_2"]);
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n[1]\n```"), "[1]\n");
        assert_eq!(strip_code_fence("```json [1]```  \n"), "[1]");
        assert_eq!(strip_code_fence("[1]"), "[1]");
        assert_eq!(strip_code_fence("```python\n[1]\n```"), "```python\n[1]\n");
    }

    fn job_with(response: Option<JobResponse>) -> Job {
        Job {
            name: "batches/x".into(),
            done: true,
            metadata: None,
            error: None,
            response,
        }
    }

    #[test]
    fn test_job_output_inline() {
        let job = job_with(Some(JobResponse {
            inlined_responses: Some(InlinedResponses {
                inlined_responses: vec![entry("classification_0", "[]"), json!({"error": {}})],
            }),
            responses_file: None,
        }));
        assert_eq!(
            JobOutput::from_job(&job),
            JobOutput::Inline(vec![ResponseFragment::new(Some("classification_0"), "[]")])
        );
    }

    #[test]
    fn test_job_output_file_and_empty() {
        let job = job_with(Some(JobResponse {
            inlined_responses: None,
            responses_file: Some("files/batch-out".into()),
        }));
        assert_eq!(JobOutput::from_job(&job), JobOutput::File("files/batch-out".into()));

        assert_eq!(JobOutput::from_job(&job_with(None)), JobOutput::Empty);
        assert_eq!(
            JobOutput::from_job(&job_with(Some(JobResponse::default()))),
            JobOutput::Empty
        );
    }
}
