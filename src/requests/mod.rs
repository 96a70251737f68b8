//! Chunking, prompt rendering and batch request construction.

pub mod chunker;
pub mod classify;
pub mod key;
pub mod locale;
pub mod localize;
pub mod prompt;
pub mod seeds;
pub mod validate;

use serde::Serialize;

use crate::gemini::types::BatchRequest;
use crate::results::merger::MergeMode;

pub use chunker::{chunk, ChunkSize};
pub use classify::{build_classification_batch, suggest_classifications, Category, Classification};
pub use key::RequestKey;
pub use locale::{Locale, LocaleCatalog};
pub use localize::build_localization_batch;
pub use prompt::{PromptTemplate, PromptTemplates};
pub use seeds::{generate_seed_keywords, SeedKeywordForm};
pub use validate::{build_validation_batch, KeywordPair};

/// The three batch tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Localize,
    Classify,
    Validate,
}

impl TaskKind {
    /// Display-name prefix used when submitting a job of this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            TaskKind::Localize => "localize",
            TaskKind::Classify => "classify",
            TaskKind::Validate => "validate",
        }
    }

    /// Recovers the task of a listed job from its display name.
    pub fn from_display_name(display_name: &str) -> Option<Self> {
        [TaskKind::Localize, TaskKind::Classify, TaskKind::Validate]
            .into_iter()
            .find(|kind| {
                display_name
                    .strip_prefix(kind.prefix())
                    .is_some_and(|rest| rest.starts_with('_'))
            })
    }

    pub fn merge_mode(self) -> MergeMode {
        match self {
            TaskKind::Localize => MergeMode::Localize,
            TaskKind::Classify => MergeMode::Classify,
            TaskKind::Validate => MergeMode::Validate,
        }
    }
}

/// A fully built batch, ready to submit.
#[derive(Debug, Clone, Serialize)]
pub struct BatchSubmission {
    pub kind: TaskKind,
    pub display_name: String,
    pub requests: Vec<BatchRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_from_display_name() {
        assert_eq!(
            TaskKind::from_display_name("localize_2kw_MX-ES"),
            Some(TaskKind::Localize)
        );
        assert_eq!(
            TaskKind::from_display_name("classify_10kw"),
            Some(TaskKind::Classify)
        );
        assert_eq!(
            TaskKind::from_display_name("validate_5kw_US"),
            Some(TaskKind::Validate)
        );
        assert_eq!(TaskKind::from_display_name("localized_2kw"), None);
        assert_eq!(TaskKind::from_display_name("my batch"), None);
    }

    #[test]
    fn test_task_kind_merge_mode() {
        assert_eq!(TaskKind::Localize.merge_mode(), MergeMode::Localize);
        assert_eq!(TaskKind::Classify.merge_mode(), MergeMode::Classify);
        assert_eq!(TaskKind::Validate.merge_mode(), MergeMode::Validate);
    }
}
