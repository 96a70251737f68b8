//! Validation batch construction.
//!
//! Input is grouped by the localized column it came from
//! (`Localized_Term_US` → rows of `{Original_Term, Localized_Term_US}`); the
//! target country is the last `_` segment of that column name.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::error::AppError;
use crate::gemini::types::{BatchRequest, JsonSchema};
use crate::requests::chunker::{chunk, ChunkSize};
use crate::requests::key::RequestKey;
use crate::requests::locale::LocaleCatalog;
use crate::requests::prompt::PromptTemplate;
use crate::requests::{BatchSubmission, TaskKind};

/// A row to validate: `Original_Term` plus the localized column, and possibly
/// a previous rank and justification.
pub type KeywordPair = serde_json::Map<String, serde_json::Value>;

fn country_of(column: &str) -> &str {
    column.rsplit('_').next().unwrap_or(column)
}

fn validation_schema(column: &str) -> JsonSchema {
    let mut properties = BTreeMap::new();
    properties.insert("Original_Term".to_string(), JsonSchema::string());
    properties.insert(column.to_string(), JsonSchema::string());
    properties.insert("Localization_Rank".to_string(), JsonSchema::number());
    properties.insert("Justification".to_string(), JsonSchema::string());
    JsonSchema::array_of(JsonSchema::object(
        properties,
        vec!["Original_Term".to_string(), column.to_string()],
    ))
}

/// Builds one request per (column group, chunk).
///
/// Groups whose country is not in `catalog` are skipped.
///
/// # Errors
///
/// `AppError::InvalidInput` if no request could be built.
pub fn build_validation_batch(
    groups: &BTreeMap<String, Vec<KeywordPair>>,
    catalog: &LocaleCatalog,
    template: &PromptTemplate,
) -> Result<BatchSubmission, AppError> {
    let mut requests = Vec::new();

    for (column, pairs) in groups {
        let country = country_of(column);
        let Some(locale) = catalog.by_country(country) else {
            debug!("[REQUESTS] No locale for country '{}', skipping {}", country, column);
            continue;
        };

        let schema = validation_schema(column);
        for (index, chunk) in chunk(pairs, ChunkSize::Prompt.as_usize())?.iter().enumerate() {
            let term_list = serde_json::to_string(chunk)
                .map_err(|e| AppError::InvalidInput(format!("Failed to encode chunk: {}", e)))?;
            let prompt = template.render(&[
                ("language", locale.language.as_str()),
                ("country", locale.country.as_str()),
                ("term_list", term_list.as_str()),
            ]);
            let key = RequestKey::Validate {
                country: country.to_string(),
                chunk: index,
            };
            requests.push(BatchRequest::new(prompt, schema.clone(), key.to_string()));
        }
    }

    if requests.is_empty() {
        return Err(AppError::InvalidInput("No valid data provided for validation".into()));
    }

    let countries: Vec<&str> = groups.keys().map(|c| country_of(c)).collect();
    let keyword_count = groups.values().next().map(Vec::len).unwrap_or(0);
    let display_name = format!("validate_{}kw_{}", keyword_count, countries.join("-"));

    info!(
        "[REQUESTS] Built {} validation requests ({} groups)",
        requests.len(),
        groups.len()
    );

    Ok(BatchSubmission {
        kind: TaskKind::Validate,
        display_name,
        requests,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::requests::locale::Locale;
    use serde_json::json;

    fn pair(original: &str, column: &str, localized: &str) -> KeywordPair {
        let mut map = KeywordPair::new();
        map.insert("Original_Term".into(), json!(original));
        map.insert(column.into(), json!(localized));
        map
    }

    fn catalog() -> LocaleCatalog {
        LocaleCatalog::new(vec![Locale::new("Spanish", "MX"), Locale::new("English", "US")])
    }

    #[test]
    fn test_requests_keyed_by_country_and_chunk() {
        let mut groups = BTreeMap::new();
        groups.insert(
            "Localized_Term_MX".to_string(),
            (0..250).map(|i| pair(&format!("t{}", i), "Localized_Term_MX", "x")).collect(),
        );
        groups.insert(
            "Localized_Term_US".to_string(),
            vec![pair("shoe", "Localized_Term_US", "sneaker")],
        );

        let template = PromptTemplate::new("{language}/{country}");
        let batch = build_validation_batch(&groups, &catalog(), &template).unwrap();

        let keys: Vec<&str> = batch.requests.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["MX_0", "MX_1", "US_0"]);
        assert_eq!(batch.requests[0].prompt(), "Spanish/MX");
        assert_eq!(batch.requests[2].prompt(), "English/US");
        assert_eq!(batch.display_name, "validate_250kw_MX-US");

        for request in &batch.requests {
            let decoded = RequestKey::parse_validate(request.key()).unwrap();
            assert!(matches!(decoded, RequestKey::Validate { .. }));
        }
    }

    #[test]
    fn test_schema_requires_column_and_allows_rank() {
        let mut groups = BTreeMap::new();
        groups.insert(
            "Localized_Term_US".to_string(),
            vec![pair("shoe", "Localized_Term_US", "sneaker")],
        );
        let batch =
            build_validation_batch(&groups, &catalog(), &PromptTemplate::new("x")).unwrap();
        let value = serde_json::to_value(batch.requests[0].schema().unwrap()).unwrap();

        assert_eq!(value["items"]["required"], json!(["Original_Term", "Localized_Term_US"]));
        assert_eq!(value["items"]["properties"]["Localization_Rank"], json!({"type": "NUMBER"}));
        assert_eq!(value["items"]["properties"]["Justification"], json!({"type": "STRING"}));
    }

    #[test]
    fn test_term_list_is_json() {
        let mut groups = BTreeMap::new();
        groups.insert(
            "Localized_Term_US".to_string(),
            vec![pair("shoe", "Localized_Term_US", "sneaker")],
        );
        let batch =
            build_validation_batch(&groups, &catalog(), &PromptTemplate::new("{term_list}"))
                .unwrap();
        let parsed: serde_json::Value = serde_json::from_str(batch.requests[0].prompt()).unwrap();
        assert_eq!(
            parsed,
            json!([{"Original_Term": "shoe", "Localized_Term_US": "sneaker"}])
        );
    }

    #[test]
    fn test_unknown_country_is_skipped() {
        let mut groups = BTreeMap::new();
        groups.insert("Localized_Term_ZZ".to_string(), vec![pair("a", "Localized_Term_ZZ", "b")]);
        groups.insert("Localized_Term_MX".to_string(), vec![pair("a", "Localized_Term_MX", "b")]);

        let batch =
            build_validation_batch(&groups, &catalog(), &PromptTemplate::new("x")).unwrap();
        let keys: Vec<&str> = batch.requests.iter().map(|r| r.key()).collect();
        assert_eq!(keys, vec!["MX_0"]);
    }

    #[test]
    fn test_no_requests_is_error() {
        let mut groups = BTreeMap::new();
        groups.insert("Localized_Term_ZZ".to_string(), vec![pair("a", "Localized_Term_ZZ", "b")]);
        let result = build_validation_batch(&groups, &catalog(), &PromptTemplate::new("x"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));

        let empty = BTreeMap::new();
        let result = build_validation_batch(&empty, &catalog(), &PromptTemplate::new("x"));
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
