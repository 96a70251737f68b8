//! Prompt templates with `{placeholder}` markers.
//!
//! Rendering is plain textual find/replace of every `{name}` occurrence, one
//! placeholder after another. There is no escaping: a substituted value that
//! itself contains `{other}` may be rewritten when `other` is substituted later.

use std::path::Path;

use crate::error::AppError;

const LOCALIZATION_FILE: &str = "keyword_localization.txt";
const CLASSIFICATION_FILE: &str = "keyword_classification.txt";
const VALIDATION_FILE: &str = "validation.txt";
const CLASS_GENERATION_FILE: &str = "class_generation.txt";
const KEYWORD_GENERATION_FILE: &str = "keyword_generation.txt";

/// A prompt template string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate(String);

impl PromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitutes each `(name, value)` pair, in order, for every `{name}`.
    pub fn render(&self, replacements: &[(&str, &str)]) -> String {
        let mut prompt = self.0.clone();
        for (name, value) in replacements {
            let marker = format!("{{{}}}", name);
            prompt = prompt.replace(&marker, value);
        }
        prompt
    }
}

/// The full set of templates used by the request builders.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    pub localization: PromptTemplate,
    pub classification: PromptTemplate,
    pub validation: PromptTemplate,
    pub class_generation: PromptTemplate,
    pub keyword_generation: PromptTemplate,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            localization: PromptTemplate::new(include_str!("../../prompts/keyword_localization.txt")),
            classification: PromptTemplate::new(include_str!("../../prompts/keyword_classification.txt")),
            validation: PromptTemplate::new(include_str!("../../prompts/validation.txt")),
            class_generation: PromptTemplate::new(include_str!("../../prompts/class_generation.txt")),
            keyword_generation: PromptTemplate::new(include_str!("../../prompts/keyword_generation.txt")),
        }
    }
}

impl PromptTemplates {
    /// Loads templates from `dir`, falling back to the built-in text for any
    /// file that is not present.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Io` if a template file exists but cannot be read.
    pub fn load_dir(dir: &Path) -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            localization: load_or(dir, LOCALIZATION_FILE, defaults.localization)?,
            classification: load_or(dir, CLASSIFICATION_FILE, defaults.classification)?,
            validation: load_or(dir, VALIDATION_FILE, defaults.validation)?,
            class_generation: load_or(dir, CLASS_GENERATION_FILE, defaults.class_generation)?,
            keyword_generation: load_or(dir, KEYWORD_GENERATION_FILE, defaults.keyword_generation)?,
        })
    }
}

fn load_or(dir: &Path, file: &str, fallback: PromptTemplate) -> Result<PromptTemplate, AppError> {
    let path = dir.join(file);
    if !path.is_file() {
        return Ok(fallback);
    }
    let text = std::fs::read_to_string(&path)
        .map_err(|e| AppError::Io(format!("Failed to read template {}: {}", path.display(), e)))?;
    Ok(PromptTemplate::new(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_replaces_every_occurrence() {
        let template = PromptTemplate::new("{a} and {a} then {b}");
        let rendered = template.render(&[("a", "x"), ("b", "y")]);
        assert_eq!(rendered, "x and x then y");
    }

    #[test]
    fn test_render_leaves_unknown_markers() {
        let template = PromptTemplate::new("{known} {unknown}");
        assert_eq!(template.render(&[("known", "v")]), "v {unknown}");
    }

    #[test]
    fn test_render_is_sequential_not_escaped() {
        // A value containing a later marker gets substituted on the later pass.
        let template = PromptTemplate::new("{first}|{second}");
        let rendered = template.render(&[("first", "{second}"), ("second", "2")]);
        assert_eq!(rendered, "2|2");

        // An earlier marker inside a later value is left alone.
        let rendered = template.render(&[("second", "{first}"), ("first", "1")]);
        assert_eq!(rendered, "1|1");
        let rendered = template.render(&[("first", "1"), ("second", "{first}")]);
        assert_eq!(rendered, "1|{first}");
    }

    #[test]
    fn test_default_templates_have_markers() {
        let templates = PromptTemplates::default();
        assert!(templates.localization.as_str().contains("{chunk_list}"));
        assert!(templates.localization.as_str().contains("{country}"));
        assert!(templates.classification.as_str().contains("{classification_rules}"));
        assert!(templates.validation.as_str().contains("{term_list}"));
        assert!(templates.class_generation.as_str().contains("{keyword_list}"));
        assert!(templates.keyword_generation.as_str().contains("{seed_keywords_str}"));
    }

    #[test]
    fn test_load_dir_overrides_present_files_only() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(LOCALIZATION_FILE), "custom {chunk_list}").unwrap();

        let templates = PromptTemplates::load_dir(dir.path()).unwrap();
        assert_eq!(templates.localization.as_str(), "custom {chunk_list}");
        assert_eq!(templates.validation, PromptTemplates::default().validation);
    }
}
