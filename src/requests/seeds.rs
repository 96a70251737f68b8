//! Seed keyword generation from a company / vertical brief.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AppError;
use crate::gemini::client::GeminiClient;
use crate::gemini::types::JsonSchema;
use crate::requests::prompt::PromptTemplate;

/// Brief describing what to generate keywords for.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SeedKeywordForm {
    pub company_name: String,
    pub vertical_name: String,
    /// Free text, usually comma separated.
    pub seed_keywords: String,
    pub product_landing_page: String,
    pub user_intents: Vec<String>,
    pub company_description: Option<String>,
    pub vertical_description: Option<String>,
    /// One landing page per line.
    pub competitor_landing_pages: Option<String>,
    pub negative_keywords: Option<String>,
}

fn section(value: &Option<String>, render: impl FnOnce(&str) -> String) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => render(v),
        _ => String::new(),
    }
}

/// Collapses runs of blank lines into one and trims the result.
fn collapse_blank_lines(text: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut previous_blank = false;
    for line in text.lines() {
        let blank = line.trim().is_empty();
        if blank && previous_blank {
            continue;
        }
        out.push(if blank { "" } else { line });
        previous_blank = blank;
    }
    out.join("\n").trim().to_string()
}

/// Fills the keyword-generation template. Optional sections vanish entirely
/// when their field is empty.
pub fn render_seed_prompt(form: &SeedKeywordForm, template: &PromptTemplate) -> String {
    let intents = if form.user_intents.is_empty() {
        "all types".to_string()
    } else {
        form.user_intents.join(", ")
    };
    let company = section(&form.company_description, |v| {
        format!("- Company/Product Description: {}", v)
    });
    let vertical = section(&form.vertical_description, |v| {
        format!("- Vertical/Product Description: {}", v)
    });
    let competition = section(&form.competitor_landing_pages, |v| {
        format!(
            "- Key Competitor Landing Pages (analyze for competitive keywords):\n  {}",
            v.replace('\n', "\n  ")
        )
    });
    let negatives = section(&form.negative_keywords, |v| {
        format!("- Negative Keywords to Avoid: {}", v)
    });

    let rendered = template.render(&[
        ("company_name", form.company_name.as_str()),
        ("vertical_name", form.vertical_name.as_str()),
        ("seed_keywords_str", form.seed_keywords.as_str()),
        ("product_landing_page", form.product_landing_page.as_str()),
        ("target_intents", intents.as_str()),
        ("company_description_section", company.as_str()),
        ("vertical_description_section", vertical.as_str()),
        ("competition_section", competition.as_str()),
        ("negative_keywords_section", negatives.as_str()),
    ]);
    collapse_blank_lines(&rendered)
}

/// Asks the model for seed keywords matching `form`.
///
/// # Errors
///
/// `AppError::InvalidInput` when neither a company nor seed keywords are
/// given; remote errors from the client; `AppError::Remote` when the model
/// output is not a JSON array of strings.
pub async fn generate_seed_keywords(
    client: &GeminiClient,
    form: &SeedKeywordForm,
    template: &PromptTemplate,
) -> Result<Vec<String>, AppError> {
    if form.company_name.trim().is_empty() && form.seed_keywords.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "A company name or seed keywords are required".to_string(),
        ));
    }

    let prompt = render_seed_prompt(form, template);
    let schema = JsonSchema::array_of(JsonSchema::string());
    let text = client.generate_content(&prompt, Some(&schema)).await?;

    let keywords: Vec<String> = serde_json::from_str(&text).map_err(|e| AppError::Remote {
        status: 200,
        message: format!("Unexpected keyword payload: {}", e),
    })?;
    let keywords: Vec<String> = keywords
        .into_iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();
    info!("[GEMINI] Generated {} seed keywords", keywords.len());
    Ok(keywords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::client::GeminiSettings;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn form() -> SeedKeywordForm {
        SeedKeywordForm {
            company_name: "Acme".into(),
            vertical_name: "Footwear".into(),
            seed_keywords: "running shoes, trail shoes".into(),
            product_landing_page: "https://acme.test/shoes".into(),
            ..SeedKeywordForm::default()
        }
    }

    #[test]
    fn test_empty_sections_are_removed() {
        let template = PromptTemplate::new(
            "Company: {company_name}\n{company_description_section}\n\n{negative_keywords_section}\nIntents: {target_intents}\n",
        );
        assert_eq!(
            render_seed_prompt(&form(), &template),
            "Company: Acme\n\nIntents: all types"
        );
    }

    #[test]
    fn test_filled_sections_are_rendered() {
        let template = PromptTemplate::new(
            "{target_intents}\n{competition_section}\n{negative_keywords_section}",
        );
        let form = SeedKeywordForm {
            user_intents: vec!["Transactional".into(), "Informational".into()],
            competitor_landing_pages: Some("https://a.test\nhttps://b.test".into()),
            negative_keywords: Some("free".into()),
            ..form()
        };
        assert_eq!(
            render_seed_prompt(&form, &template),
            "Transactional, Informational\n\
             - Key Competitor Landing Pages (analyze for competitive keywords):\n  https://a.test\n  https://b.test\n\
             - Negative Keywords to Avoid: free"
        );
    }

    #[tokio::test]
    async fn test_generate_requests_string_array() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/models/test-model:generateContent"))
            .and(body_partial_json(json!({
                "generation_config": {
                    "response_mime_type": "application/json",
                    "response_schema": {"type": "ARRAY", "items": {"type": "STRING"}}
                }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{"content": {"parts": [{"text": "[\"running shoes\", \" \", \"best trail shoes\"]"}]}}]
            })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = GeminiClient::new(GeminiSettings {
            api_key: Some(SecretString::from("k".to_string())),
            model: Some("test-model".into()),
            base_url: mock_server.uri(),
            download_base_url: mock_server.uri(),
            timeout_secs: 5,
        })
        .unwrap();

        let keywords = generate_seed_keywords(&client, &form(), &PromptTemplate::new("{company_name}"))
            .await
            .unwrap();
        assert_eq!(keywords, vec!["running shoes", "best trail shoes"]);
    }

    #[tokio::test]
    async fn test_empty_brief_is_rejected() {
        let client = GeminiClient::new(GeminiSettings::default()).unwrap();
        let result =
            generate_seed_keywords(&client, &SeedKeywordForm::default(), &PromptTemplate::new("x")).await;
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }
}
