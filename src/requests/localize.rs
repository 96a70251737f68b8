//! Localization batch construction.

use std::collections::BTreeMap;

use tracing::info;

use crate::error::AppError;
use crate::gemini::types::{BatchRequest, JsonSchema};
use crate::requests::chunker::{chunk, ChunkSize};
use crate::requests::key::RequestKey;
use crate::requests::locale::Locale;
use crate::requests::prompt::PromptTemplate;
use crate::requests::{BatchSubmission, TaskKind};

/// Output schema: array of `{Original_Term, Localized_Term_{country}}`.
fn localization_schema(country: &str) -> JsonSchema {
    let localized = format!("Localized_Term_{}", country);
    let mut properties = BTreeMap::new();
    properties.insert("Original_Term".to_string(), JsonSchema::string());
    properties.insert(localized.clone(), JsonSchema::string());
    JsonSchema::array_of(JsonSchema::object(
        properties,
        vec!["Original_Term".to_string(), localized],
    ))
}

/// Builds one request per (locale, chunk), locale-major.
///
/// Every request uses the schema of the first locale's country, so a batch
/// spanning several countries asks each of them for the first country's
/// column name.
///
/// # Errors
///
/// `AppError::InvalidInput` if `keywords` or `locales` is empty, or a JSON
/// encoding of a chunk fails.
pub fn build_localization_batch(
    keywords: &[String],
    locales: &[Locale],
    template: &PromptTemplate,
) -> Result<BatchSubmission, AppError> {
    let first = locales
        .first()
        .ok_or_else(|| AppError::InvalidInput("No locales provided for localization".into()))?;
    if keywords.is_empty() {
        return Err(AppError::InvalidInput("No keywords provided for localization".into()));
    }

    let schema = localization_schema(&first.country);
    let chunks = chunk(keywords, ChunkSize::Prompt.as_usize())?;

    let mut requests = Vec::with_capacity(locales.len() * chunks.len());
    for locale in locales {
        for (index, chunk) in chunks.iter().enumerate() {
            let chunk_list = serde_json::to_string(chunk)
                .map_err(|e| AppError::InvalidInput(format!("Failed to encode chunk: {}", e)))?;
            let prompt = template.render(&[
                ("language", locale.language.as_str()),
                ("country", locale.country.as_str()),
                ("chunk_list", chunk_list.as_str()),
            ]);
            let key = RequestKey::Localize {
                language: locale.language.clone(),
                country: locale.country.clone(),
                chunk: index,
            };
            requests.push(BatchRequest::new(prompt, schema.clone(), key.to_string()));
        }
    }

    let countries: Vec<&str> = locales.iter().map(|l| l.country.as_str()).collect();
    let display_name = format!("localize_{}kw_{}", keywords.len(), countries.join("-"));

    info!(
        "[REQUESTS] Built {} localization requests ({} keywords, {} locales)",
        requests.len(),
        keywords.len(),
        locales.len()
    );

    Ok(BatchSubmission {
        kind: TaskKind::Localize,
        display_name,
        requests,
    })
}
