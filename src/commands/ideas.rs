//! Keyword generation: model-written seeds expanded through Google Ads.

use serde::Serialize;
use tracing::info;

use crate::ads::client::{AdsClient, IdeaSeed, KeywordMetrics};
use crate::error::AppError;
use crate::gemini::client::GeminiClient;
use crate::requests::prompt::PromptTemplate;
use crate::requests::seeds::{generate_seed_keywords, SeedKeywordForm};

/// `generateKeywordIdeas` accepts at most 20 seed keywords.
pub const MAX_IDEA_SEEDS: usize = 20;

/// Targeting for the idea request; empty values fall back to English / US.
#[derive(Debug, Clone, Default)]
pub struct IdeaTargeting {
    pub language: Option<String>,
    pub geo_targets: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedKeywords {
    pub seeds: Vec<String>,
    pub ideas: Vec<KeywordMetrics>,
}

/// Generates seeds from `form`, then asks Google Ads for ideas around them,
/// seeded with the form's landing page when one is given.
pub async fn generate_keywords(
    gemini: &GeminiClient,
    ads: &AdsClient,
    form: &SeedKeywordForm,
    targeting: &IdeaTargeting,
    template: &PromptTemplate,
) -> Result<GeneratedKeywords, AppError> {
    let mut seeds = generate_seed_keywords(gemini, form, template).await?;
    if seeds.is_empty() {
        return Err(AppError::Remote {
            status: 200,
            message: "The model returned no seed keywords".to_string(),
        });
    }
    seeds.truncate(MAX_IDEA_SEEDS);

    let landing_page = form.product_landing_page.trim();
    let seed = IdeaSeed {
        keywords: seeds.clone(),
        page_url: (!landing_page.is_empty()).then(|| landing_page.to_string()),
        language: targeting.language.clone(),
        geo_targets: targeting.geo_targets.clone(),
    };
    let ideas = ads.generate_keyword_ideas(&seed).await?;
    info!("[ADS] {} seeds expanded into {} ideas", seeds.len(), ideas.len());

    Ok(GeneratedKeywords { seeds, ideas })
}
