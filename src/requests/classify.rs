//! Classification batch construction and category suggestions.

use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::gemini::client::GeminiClient;
use crate::gemini::types::{BatchRequest, JsonSchema};
use crate::requests::chunker::{chunk, ChunkSize};
use crate::requests::key::RequestKey;
use crate::requests::prompt::PromptTemplate;
use crate::requests::{BatchSubmission, TaskKind};

/// Keywords sampled when asking the model for classification suggestions.
const SUGGESTION_SAMPLE_SIZE: usize = 100;

/// One allowed value of a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub name: String,
    pub description: String,
}

/// A classification dimension, e.g. `Intent` with `Buy` / `Research`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub classifications: Vec<Classification>,
}

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, AppError> {
    serde_json::to_string(value)
        .map_err(|e| AppError::InvalidInput(format!("Failed to encode prompt value: {}", e)))
}

fn classification_schema(categories: &[Category]) -> JsonSchema {
    let mut properties = BTreeMap::new();
    properties.insert("Keyword".to_string(), JsonSchema::string());
    let mut required = vec!["Keyword".to_string()];

    for category in categories {
        let values = category
            .classifications
            .iter()
            .map(|c| c.name.clone())
            .collect();
        properties.insert(category.name.clone(), JsonSchema::string_enum(values));
        required.push(category.name.clone());
    }

    JsonSchema::array_of(JsonSchema::object(properties, required))
}

/// Builds one request per keyword chunk.
///
/// # Errors
///
/// `AppError::InvalidInput` if `keywords` or `categories` is empty.
pub fn build_classification_batch(
    keywords: &[String],
    categories: &[Category],
    template: &PromptTemplate,
) -> Result<BatchSubmission, AppError> {
    if categories.is_empty() {
        return Err(AppError::InvalidInput("No classifications provided".into()));
    }
    if keywords.is_empty() {
        return Err(AppError::InvalidInput("No keywords provided for classification".into()));
    }

    let schema = classification_schema(categories);
    let rules = encode(categories)?;

    let requests = chunk(keywords, ChunkSize::Prompt.as_usize())?
        .iter()
        .enumerate()
        .map(|(index, chunk)| {
            let chunk_list = encode(chunk)?;
            let prompt = template.render(&[
                ("chunk_list", chunk_list.as_str()),
                ("classification_rules", rules.as_str()),
            ]);
            let key = RequestKey::Classify { chunk: index };
            Ok(BatchRequest::new(prompt, schema.clone(), key.to_string()))
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    info!(
        "[REQUESTS] Built {} classification requests ({} keywords, {} categories)",
        requests.len(),
        keywords.len(),
        categories.len()
    );

    Ok(BatchSubmission {
        kind: TaskKind::Classify,
        display_name: format!("classify_{}kw", keywords.len()),
        requests,
    })
}

/// Asks the model for candidate classifications based on a random sample of
/// up to 100 keywords.
pub async fn suggest_classifications(
    client: &GeminiClient,
    keywords: &[String],
    template: &PromptTemplate,
) -> Result<Vec<Classification>, AppError> {
    let mut sample: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sample.shuffle(&mut rand::thread_rng());
    sample.truncate(SUGGESTION_SAMPLE_SIZE);

    let keyword_list = encode(&sample.join(", "))?;
    let prompt = template.render(&[("keyword_list", keyword_list.as_str())]);

    let mut properties = BTreeMap::new();
    properties.insert("name".to_string(), JsonSchema::string());
    properties.insert("description".to_string(), JsonSchema::string());
    let schema = JsonSchema::array_of(JsonSchema::object(
        properties,
        vec!["name".to_string(), "description".to_string()],
    ));

    let text = client.generate_content(&prompt, Some(&schema)).await?;
    serde_json::from_str(&text).map_err(|e| AppError::Remote {
        status: 200,
        message: format!("Unexpected suggestion payload: {}", e),
    })
}
