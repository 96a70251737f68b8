//! Result retrieval and export commands.
//!
//! A finished job's responses are collected (inline or from the results
//! file), merged according to the job's task and serialized to CSV.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::info;

use crate::error::AppError;
use crate::gemini::batch::BatchOps;
use crate::gemini::client::redact_id;
use crate::gemini::types::Job;
use crate::requests::TaskKind;
use crate::results::atomic_writer::write_atomic;
use crate::results::fragments::{parse_batch_output, JobOutput, ResponseFragment};
use crate::results::merger::{merge_fragments, MergeMode, MergedTable};

/// Merged output of one job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResults {
    pub job_name: String,
    pub mode: MergeMode,
    pub fragment_count: usize,
    pub table: MergedTable,
    pub csv: String,
}

/// Picks `explicit` or infers the mode from the job's display name.
pub fn resolve_mode(job: &Job, explicit: Option<MergeMode>) -> Result<MergeMode, AppError> {
    if let Some(mode) = explicit {
        return Ok(mode);
    }
    job.display_name()
        .and_then(TaskKind::from_display_name)
        .map(TaskKind::merge_mode)
        .ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Cannot tell which task job {} ran; pass the merge mode explicitly",
                job.name
            ))
        })
}

/// Reads the response fragments of a finished job.
pub async fn collect_fragments<B>(api: &B, job: &Job) -> Result<Vec<ResponseFragment>, AppError>
where
    B: BatchOps + ?Sized,
{
    match JobOutput::from_job(job) {
        JobOutput::Inline(fragments) => Ok(fragments),
        JobOutput::File(file) => {
            let raw = api.download_raw(&file).await?;
            Ok(parse_batch_output(&raw))
        }
        JobOutput::Empty => {
            info!("[JOBS] Job {} has no responses", redact_id(&job.name));
            Ok(Vec::new())
        }
    }
}

/// Fetches a job and merges its output.
///
/// # Errors
///
/// - `AppError::JobNotReady` if the job is still running
/// - `AppError::JobFailed` if the job finished with an error
/// - `AppError::InvalidInput` if no mode is given and none can be inferred
pub async fn fetch_job_results<B>(
    api: &B,
    name: &str,
    mode: Option<MergeMode>,
) -> Result<JobResults, AppError>
where
    B: BatchOps + ?Sized,
{
    let job = api.get(name).await?;
    if !job.done {
        return Err(AppError::JobNotReady(job.name));
    }
    if let Some(error) = &job.error {
        return Err(AppError::JobFailed {
            job_name: job.name.clone(),
            message: error.message.clone(),
        });
    }

    let mode = resolve_mode(&job, mode)?;
    let fragments = collect_fragments(api, &job).await?;
    let table = merge_fragments(&fragments, mode);
    let csv = table.to_csv()?;

    Ok(JobResults {
        job_name: job.name,
        mode,
        fragment_count: fragments.len(),
        table,
        csv,
    })
}

/// Like [`fetch_job_results`], then writes the CSV to `path` atomically.
pub async fn export_job_results<B>(
    api: &B,
    name: &str,
    mode: Option<MergeMode>,
    path: &Path,
) -> Result<(JobResults, PathBuf), AppError>
where
    B: BatchOps + ?Sized,
{
    let results = fetch_job_results(api, name, mode).await?;
    let written = write_atomic(path, results.csv.as_bytes())?;
    info!(
        "[MERGE] Exported {} rows to {}",
        results.table.rows.len(),
        written.display()
    );
    Ok((results, written))
}

/// Merges a downloaded JSONL results file.
pub fn merge_results_file(path: &Path, mode: MergeMode) -> Result<MergedTable, AppError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(merge_fragments(&parse_batch_output(&raw), mode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::batch::fake::FakeBatch;
    use crate::gemini::types::{InlinedResponses, JobError, JobMetadata, JobResponse};
    use serde_json::{json, Value};
    use tempfile::TempDir;

    fn entry(key: &str, text: &str) -> Value {
        json!({
            "key": key,
            "response": {"candidates": [{"content": {"parts": [{"text": text}]}}]}
        })
    }

    fn job(name: &str, display_name: &str, done: bool) -> Job {
        Job {
            name: name.into(),
            done,
            metadata: Some(JobMetadata {
                display_name: Some(display_name.into()),
                ..JobMetadata::default()
            }),
            error: None,
            response: None,
        }
    }

    fn api_with(jobs: Vec<Job>) -> FakeBatch {
        let api = FakeBatch::default();
        {
            let mut map = api.jobs.lock().unwrap();
            for job in jobs {
                map.insert(job.name.clone(), job);
            }
        }
        api
    }

    #[tokio::test]
    async fn test_inline_results_use_inferred_mode() {
        let mut finished = job("batches/a", "localize_2kw_MX", true);
        finished.response = Some(JobResponse {
            inlined_responses: Some(InlinedResponses {
                inlined_responses: vec![
                    entry("es_MX_0", r#"[{"Original_Term":"shoe","Localized_Term_MX":"zapato"}]"#),
                    entry("es_MX_1", r#"[{"Original_Term":"hat","Localized_Term_MX":"sombrero"}]"#),
                ],
            }),
            responses_file: None,
        });
        let api = api_with(vec![finished]);

        let results = fetch_job_results(&api, "batches/a", None).await.unwrap();

        assert_eq!(results.mode, MergeMode::Localize);
        assert_eq!(results.fragment_count, 2);
        assert_eq!(
            results.csv,
            "\"Original_Term\",\"Localized_Term_MX\"\n\"shoe\",\"zapato\"\n\"hat\",\"sombrero\""
        );
    }

    #[tokio::test]
    async fn test_results_file_is_downloaded() {
        let mut finished = job("batches/b", "classify_1kw", true);
        finished.response = Some(JobResponse {
            inlined_responses: None,
            responses_file: Some("files/out".into()),
        });
        let api = api_with(vec![finished]);
        api.files.lock().unwrap().insert(
            "files/out".into(),
            format!(
                "{}\n",
                entry("classification_0", r#"[{"Keyword":"running shoes","Intent":"Buy"}]"#)
            ),
        );

        let results = fetch_job_results(&api, "batches/b", None).await.unwrap();

        assert_eq!(results.mode, MergeMode::Classify);
        assert_eq!(results.table.headers, vec!["Keyword", "Intent"]);
        assert_eq!(results.table.rows, vec![vec!["running shoes", "Buy"]]);
    }

    #[tokio::test]
    async fn test_running_job_is_not_ready() {
        let api = api_with(vec![job("batches/c", "classify_1kw", false)]);
        let result = fetch_job_results(&api, "batches/c", None).await;
        assert!(matches!(result, Err(AppError::JobNotReady(ref n)) if n == "batches/c"));
    }

    #[tokio::test]
    async fn test_failed_job_reports_error() {
        let mut failed = job("batches/d", "classify_1kw", true);
        failed.error = Some(JobError {
            code: 8,
            message: "quota exhausted".into(),
        });
        let api = api_with(vec![failed]);

        match fetch_job_results(&api, "batches/d", None).await {
            Err(AppError::JobFailed { job_name, message }) => {
                assert_eq!(job_name, "batches/d");
                assert_eq!(message, "quota exhausted");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_display_name_needs_explicit_mode() {
        let api = api_with(vec![job("batches/e", "my batch", true)]);

        let result = fetch_job_results(&api, "batches/e", None).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let results = fetch_job_results(&api, "batches/e", Some(MergeMode::Validate))
            .await
            .unwrap();
        assert_eq!(results.csv, "\"Original_Term\"");
    }

    #[tokio::test]
    async fn test_export_writes_csv() {
        let mut finished = job("batches/f", "validate_1kw_US", true);
        finished.response = Some(JobResponse {
            inlined_responses: Some(InlinedResponses {
                inlined_responses: vec![entry(
                    "US_0",
                    r#"[{"Original_Term":"hat","Localized_Term_US":"cap","Localization_Rank":4}]"#,
                )],
            }),
            responses_file: None,
        });
        let api = api_with(vec![finished]);
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.csv");

        let (results, written) = export_job_results(&api, "batches/f", None, &path)
            .await
            .unwrap();

        assert_eq!(written, path);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), results.csv);
        assert!(results.csv.contains("\"Localization_Rank_US\""));
    }

    #[test]
    fn test_merge_results_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.jsonl");
        std::fs::write(
            &path,
            format!(
                "{}\nnot json\n",
                entry("es_MX_0", r#"```json
[{"Original_Term":"shoe","Localized_Term_MX":"zapato"}]
```"#)
            ),
        )
        .unwrap();

        let table = merge_results_file(&path, MergeMode::Localize).unwrap();
        assert_eq!(table.rows, vec![vec!["shoe", "zapato"]]);
    }
}
