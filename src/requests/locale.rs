//! Target locales and the built-in locale catalog.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A language/country pair a keyword set can be localized into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

impl Locale {
    pub fn new(language: impl Into<String>, country: impl Into<String>) -> Self {
        Self {
            language: language.into(),
            country: country.into(),
        }
    }

    /// Selection value, e.g. `es_MX`.
    pub fn value(&self) -> String {
        format!("{}_{}", self.language, self.country)
    }

    /// Display label, e.g. `es (MX)`.
    pub fn label(&self) -> String {
        format!("{} ({})", self.language, self.country)
    }
}

const BUILTIN_LOCALES: &[(&str, &str)] = &[
    ("en", "US"),
    ("en", "GB"),
    ("en", "AU"),
    ("en", "CA"),
    ("en", "IN"),
    ("es", "ES"),
    ("es", "MX"),
    ("es", "AR"),
    ("es", "CO"),
    ("fr", "FR"),
    ("de", "DE"),
    ("it", "IT"),
    ("nl", "NL"),
    ("pt", "BR"),
    ("pt", "PT"),
    ("pl", "PL"),
    ("sv", "SE"),
    ("tr", "TR"),
    ("ja", "JP"),
    ("ko", "KR"),
    ("zh", "CN"),
    ("zh", "TW"),
    ("id", "ID"),
    ("th", "TH"),
    ("vi", "VN"),
    ("ar", "SA"),
    ("hi", "IN"),
];

/// Ordered list of known locales.
#[derive(Debug, Clone)]
pub struct LocaleCatalog {
    locales: Vec<Locale>,
}

impl Default for LocaleCatalog {
    fn default() -> Self {
        Self {
            locales: BUILTIN_LOCALES
                .iter()
                .map(|(language, country)| Locale::new(*language, *country))
                .collect(),
        }
    }
}

impl LocaleCatalog {
    pub fn new(locales: Vec<Locale>) -> Self {
        Self { locales }
    }

    /// Parses a catalog from a JSON array of `{language, country}` objects.
    pub fn from_json(json: &str) -> Result<Self, AppError> {
        let locales: Vec<Locale> = serde_json::from_str(json)
            .map_err(|e| AppError::InvalidInput(format!("Invalid locale catalog: {}", e)))?;
        Ok(Self { locales })
    }

    pub fn all(&self) -> &[Locale] {
        &self.locales
    }

    /// First locale whose country matches, in catalog order.
    pub fn by_country(&self, country: &str) -> Option<&Locale> {
        self.locales.iter().find(|l| l.country == country)
    }

    /// Looks up a locale by its selection value (`{language}_{country}`).
    pub fn by_value(&self, value: &str) -> Option<&Locale> {
        self.locales.iter().find(|l| l.value() == value)
    }
}
