//! Request keys: the reassembly identity attached to every batch sub-request.
//!
//! Keys are the only thing that survives the round trip through the batch
//! service, so each variant renders to a string that
//! [`RequestKey::parse_localize`], [`RequestKey::parse_validate`] or
//! [`RequestKey::parse_classify`] can take apart again.

use std::fmt;

/// Reassembly key of one sub-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKey {
    /// `{language}_{country}_{chunk}`
    Localize {
        language: String,
        country: String,
        chunk: usize,
    },
    /// `classification_{chunk}`
    Classify { chunk: usize },
    /// `{country}_{chunk}`
    Validate { country: String, chunk: usize },
}

impl RequestKey {
    /// Decodes a localization key.
    ///
    /// The chunk index is the last segment and the country the one before it;
    /// everything in front is the language, which may itself contain `_`.
    pub fn parse_localize(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('_').collect();
        if parts.len() < 3 {
            return None;
        }
        let chunk = parts[parts.len() - 1].parse().ok()?;
        let country = parts[parts.len() - 2];
        let language = parts[..parts.len() - 2].join("_");
        if country.is_empty() || language.is_empty() {
            return None;
        }
        Some(RequestKey::Localize {
            language,
            country: country.to_string(),
            chunk,
        })
    }

    /// Decodes a validation key: trailing chunk index, country in front.
    pub fn parse_validate(key: &str) -> Option<Self> {
        let (country, chunk) = key.rsplit_once('_')?;
        let chunk = chunk.parse().ok()?;
        if country.is_empty() {
            return None;
        }
        Some(RequestKey::Validate {
            country: country.to_string(),
            chunk,
        })
    }

    /// Decodes a classification key.
    pub fn parse_classify(key: &str) -> Option<Self> {
        let chunk = key.strip_prefix("classification_")?.parse().ok()?;
        Some(RequestKey::Classify { chunk })
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKey::Localize {
                language,
                country,
                chunk,
            } => write!(f, "{}_{}_{}", language, country, chunk),
            RequestKey::Classify { chunk } => write!(f, "classification_{}", chunk),
            RequestKey::Validate { country, chunk } => write!(f, "{}_{}", country, chunk),
        }
    }
}
