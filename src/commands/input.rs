//! Parsing of user-supplied keyword, locale and validation inputs.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::AppError;
use crate::requests::locale::{Locale, LocaleCatalog};
use crate::requests::validate::KeywordPair;

const UTF8_BOM: char = '\u{feff}';

const ORIGINAL_TERM: &str = "Original_Term";
const LOCALIZED_PREFIX: &str = "Localized_Term_";

/// One keyword per line; blank lines are dropped, order and duplicates kept.
pub fn parse_keywords(text: &str) -> Vec<String> {
    text.trim_start_matches(UTF8_BOM)
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Resolves `{language}_{country}` selections against the catalog.
///
/// Values missing from the catalog are accepted as long as they split into a
/// language and a country.
pub fn resolve_locales(catalog: &LocaleCatalog, values: &[String]) -> Result<Vec<Locale>, AppError> {
    values
        .iter()
        .map(|value| {
            if let Some(locale) = catalog.by_value(value) {
                return Ok(locale.clone());
            }
            match value.rsplit_once('_') {
                Some((language, country)) if !language.is_empty() && !country.is_empty() => {
                    Ok(Locale::new(language, country))
                }
                _ => Err(AppError::InvalidInput(format!(
                    "Locale '{}' must look like language_COUNTRY (e.g. es_MX)",
                    value
                ))),
            }
        })
        .collect()
}

/// Groups a localized CSV (as produced by a localization merge) into
/// validation input: one group per `Localized_Term_{country}` column, holding
/// `{Original_Term, column}` pairs for rows where that column is filled.
pub fn validation_groups_from_csv(
    text: &str,
) -> Result<BTreeMap<String, Vec<KeywordPair>>, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.trim_start_matches(UTF8_BOM).as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let term_index = headers
        .iter()
        .position(|h| h == ORIGINAL_TERM)
        .ok_or_else(|| AppError::InvalidInput(format!("Missing '{}' column", ORIGINAL_TERM)))?;
    let columns: Vec<(usize, &String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(LOCALIZED_PREFIX))
        .collect();
    if columns.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "No '{}*' columns to validate",
            LOCALIZED_PREFIX
        )));
    }

    let mut groups: BTreeMap<String, Vec<KeywordPair>> = BTreeMap::new();
    for record in reader.records() {
        let record = record?;
        let term = record.get(term_index).unwrap_or_default().trim();
        if term.is_empty() {
            continue;
        }
        for (index, column) in &columns {
            let localized = record.get(*index).unwrap_or_default().trim();
            if localized.is_empty() {
                continue;
            }
            let mut pair = KeywordPair::new();
            pair.insert(ORIGINAL_TERM.to_string(), Value::String(term.to_string()));
            pair.insert((*column).clone(), Value::String(localized.to_string()));
            groups.entry((*column).clone()).or_default().push(pair);
        }
    }

    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keywords() {
        let keywords = parse_keywords("\u{feff}shoe\n\n  hat \r\nshoe\n");
        assert_eq!(keywords, vec!["shoe", "hat", "shoe"]);
    }

    #[test]
    fn test_resolve_locales() {
        let catalog = LocaleCatalog::default();
        let locales = resolve_locales(&catalog, &["es_MX".into(), "pt_BR".into()]).unwrap();
        assert_eq!(locales[0], Locale::new("es", "MX"));
        assert_eq!(locales[1].country, "BR");

        let result = resolve_locales(&catalog, &["spanish".into()]);
        assert!(matches!(result, Err(AppError::InvalidInput(_))));
    }

    #[test]
    fn test_validation_groups_from_merged_csv() {
        let csv = "\"Original_Term\",\"Localized_Term_MX\",\"Localized_Term_US\"\n\
                   \"shoe\",\"zapato\",\"\"\n\
                   \"hat\",\"sombrero\",\"cap\"\n\
                   \"\",\"x\",\"y\"";

        let groups = validation_groups_from_csv(csv).unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups["Localized_Term_MX"].len(), 2);
        let us = &groups["Localized_Term_US"];
        assert_eq!(us.len(), 1);
        assert_eq!(us[0]["Original_Term"], "hat");
        assert_eq!(us[0]["Localized_Term_US"], "cap");
    }

    #[test]
    fn test_validation_input_needs_columns() {
        assert!(matches!(
            validation_groups_from_csv("Keyword\nshoe"),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            validation_groups_from_csv("Original_Term,Other\nshoe,x"),
            Err(AppError::InvalidInput(_))
        ));
    }
}
