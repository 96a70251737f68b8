//! Batch submission commands.
//!
//! Each command builds the requests for one task and submits them as a
//! single batch job, returning the created job.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::AppError;
use crate::gemini::batch::BatchOps;
use crate::gemini::types::Job;
use crate::requests::classify::{build_classification_batch, Category};
use crate::requests::locale::{Locale, LocaleCatalog};
use crate::requests::localize::build_localization_batch;
use crate::requests::prompt::PromptTemplate;
use crate::requests::validate::{build_validation_batch, KeywordPair};
use crate::requests::BatchSubmission;

/// Submits an already built batch.
pub async fn submit_batch<B>(api: &B, submission: &BatchSubmission) -> Result<Job, AppError>
where
    B: BatchOps + ?Sized,
{
    let job = api
        .submit(&submission.requests, &submission.display_name)
        .await?;
    info!(
        "[JOBS] Started {} job '{}' ({} requests)",
        submission.kind.prefix(),
        submission.display_name,
        submission.requests.len()
    );
    Ok(job)
}

pub async fn start_localization<B>(
    api: &B,
    keywords: &[String],
    locales: &[Locale],
    template: &PromptTemplate,
) -> Result<Job, AppError>
where
    B: BatchOps + ?Sized,
{
    let submission = build_localization_batch(keywords, locales, template)?;
    submit_batch(api, &submission).await
}

pub async fn start_classification<B>(
    api: &B,
    keywords: &[String],
    categories: &[Category],
    template: &PromptTemplate,
) -> Result<Job, AppError>
where
    B: BatchOps + ?Sized,
{
    let submission = build_classification_batch(keywords, categories, template)?;
    submit_batch(api, &submission).await
}

/// `groups` maps a localized column name (`Localized_Term_US`) to the
/// keyword pairs to validate for that country.
pub async fn start_validation<B>(
    api: &B,
    groups: &BTreeMap<String, Vec<KeywordPair>>,
    catalog: &LocaleCatalog,
    template: &PromptTemplate,
) -> Result<Job, AppError>
where
    B: BatchOps + ?Sized,
{
    let submission = build_validation_batch(groups, catalog, template)?;
    submit_batch(api, &submission).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::batch::fake::FakeBatch;
    use crate::requests::classify::Classification;
    use serde_json::{json, Value};

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw{}", i)).collect()
    }

    fn template() -> PromptTemplate {
        PromptTemplate::new("{language} {country} {chunk_list} {classification_rules} {term_list}")
    }

    #[tokio::test]
    async fn test_start_localization_submits_cross_product() {
        let api = FakeBatch::default();
        let locales = vec![Locale::new("es", "MX"), Locale::new("es", "ES")];

        let job = start_localization(&api, &keywords(450), &locales, &template())
            .await
            .unwrap();

        assert_eq!(job.name, "batches/new");
        let submitted = api.submitted.lock().unwrap().clone();
        assert_eq!(submitted, vec![("localize_450kw_MX-ES".to_string(), 6)]);
    }

    #[tokio::test]
    async fn test_start_classification_one_request_per_chunk() {
        let api = FakeBatch::default();
        let categories = vec![Category {
            name: "Intent".into(),
            classifications: vec![Classification {
                name: "Buy".into(),
                description: "purchase".into(),
            }],
        }];

        start_classification(&api, &keywords(201), &categories, &template())
            .await
            .unwrap();

        let submitted = api.submitted.lock().unwrap().clone();
        assert_eq!(submitted, vec![("classify_201kw".to_string(), 2)]);
    }

    #[tokio::test]
    async fn test_start_validation_skips_unknown_countries() {
        let api = FakeBatch::default();
        let pair = |term: &str| -> KeywordPair {
            match json!({"Original_Term": term, "Localized_Term_US": term}) {
                Value::Object(map) => map,
                _ => unreachable!(),
            }
        };
        let mut groups = BTreeMap::new();
        groups.insert("Localized_Term_US".to_string(), vec![pair("a"), pair("b")]);
        groups.insert("Localized_Term_ZZ".to_string(), vec![pair("c")]);

        start_validation(&api, &groups, &LocaleCatalog::default(), &template())
            .await
            .unwrap();

        let submitted = api.submitted.lock().unwrap().clone();
        assert_eq!(submitted, vec![("validate_2kw_US-ZZ".to_string(), 1)]);
    }

    #[tokio::test]
    async fn test_invalid_input_submits_nothing() {
        let api = FakeBatch::default();

        let result = start_localization(&api, &keywords(3), &[], &template()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let result = start_classification(&api, &[], &[], &template()).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        assert!(api.submitted.lock().unwrap().is_empty());
    }
}
