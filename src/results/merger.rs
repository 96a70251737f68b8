//! Merge engine: many independent JSON fragments in, one wide table out.
//!
//! Localize and validate pivot on `Original_Term`; each fragment contributes
//! the columns of one country. Classify appends rows as they come.
//!
//! A fragment that cannot be parsed or whose key cannot be decoded is logged
//! and skipped. Nothing it would have contributed is applied, and every other
//! fragment is unaffected.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::requests::key::RequestKey;
use crate::results::csv_output;
use crate::results::fragments::{strip_code_fence, ResponseFragment};

const ORIGINAL_TERM: &str = "Original_Term";
const KEYWORD: &str = "Keyword";
const LOCALIZED_PREFIX: &str = "Localized_Term_";

/// How fragments are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeMode {
    Localize,
    Validate,
    Classify,
}

impl fmt::Display for MergeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MergeMode::Localize => "localize",
            MergeMode::Validate => "validate",
            MergeMode::Classify => "classify",
        };
        f.write_str(name)
    }
}

impl FromStr for MergeMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "localize" | "localization" => Ok(MergeMode::Localize),
            "validate" | "validation" => Ok(MergeMode::Validate),
            "classify" | "classification" => Ok(MergeMode::Classify),
            other => Err(AppError::InvalidInput(format!("Unknown merge mode: {}", other))),
        }
    }
}

/// Merged output: a header row and data rows of equal width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MergedTable {
    /// Serializes to the quoted, `\n`-joined CSV form.
    pub fn to_csv(&self) -> Result<String, AppError> {
        csv_output::to_csv_string(&self.headers, &self.rows)
    }
}

/// Why a fragment was dropped.
#[derive(Debug, Error)]
enum FragmentError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("payload is not a JSON array")]
    NotArray,
    #[error("missing request key")]
    MissingKey,
    #[error("undecodable request key")]
    BadKey,
}

/// Stringifies a JSON cell: null → empty, strings verbatim, anything else
/// as JSON text.
fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_items(fragment: &ResponseFragment) -> Result<Vec<Value>, FragmentError> {
    match serde_json::from_str::<Value>(strip_code_fence(&fragment.text))? {
        Value::Array(items) => Ok(items),
        _ => Err(FragmentError::NotArray),
    }
}

fn skip(fragment: &ResponseFragment, error: &FragmentError) {
    warn!(
        "[MERGE] Skipping fragment {}: {}. Raw text: {}",
        fragment.key.as_deref().unwrap_or("unknown key"),
        error,
        fragment.text
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Pivot (localize / validate)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
struct PivotTable {
    index: HashMap<String, usize>,
    rows: Vec<(String, HashMap<String, String>)>,
    countries: BTreeSet<String>,
}

impl PivotTable {
    fn row(&mut self, term: &str) -> &mut HashMap<String, String> {
        let idx = match self.index.get(term) {
            Some(&idx) => idx,
            None => {
                self.rows.push((term.to_string(), HashMap::new()));
                self.index.insert(term.to_string(), self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx].1
    }

    fn apply(&mut self, item: &Map<String, Value>, key_country: Option<&str>) {
        let term = item.get(ORIGINAL_TERM).map(cell_text).unwrap_or_default();
        if term.is_empty() {
            debug!("[MERGE] Row without {} skipped", ORIGINAL_TERM);
            return;
        }

        let localized = item
            .iter()
            .find(|(name, _)| name.starts_with(LOCALIZED_PREFIX));

        let mut cells = Vec::new();
        let mut country = None;
        if let Some((name, value)) = localized {
            let c = match key_country {
                Some(c) => c.to_string(),
                None => name[LOCALIZED_PREFIX.len()..].to_string(),
            };
            if !c.is_empty() {
                cells.push((format!("{}{}", LOCALIZED_PREFIX, c), cell_text(value)));
                if key_country.is_some() {
                    if let Some(rank) = item.get("Localization_Rank").filter(|v| !v.is_null()) {
                        cells.push((format!("Localization_Rank_{}", c), cell_text(rank)));
                    }
                    if let Some(just) = item.get("Justification").filter(|v| !v.is_null()) {
                        cells.push((format!("Justification_{}", c), cell_text(just)));
                    }
                }
                country = Some(c);
            }
        }

        let row = self.row(&term);
        for (column, value) in cells {
            row.insert(column, value);
        }
        if let Some(c) = country {
            self.countries.insert(c);
        }
    }

    fn into_table(self, with_validation: bool) -> MergedTable {
        let mut headers = vec![ORIGINAL_TERM.to_string()];
        for country in &self.countries {
            headers.push(format!("{}{}", LOCALIZED_PREFIX, country));
            if with_validation {
                headers.push(format!("Localization_Rank_{}", country));
                headers.push(format!("Justification_{}", country));
            }
        }

        let rows = self
            .rows
            .into_iter()
            .map(|(term, cells)| {
                let mut row = Vec::with_capacity(headers.len());
                row.push(term);
                row.extend(
                    headers[1..]
                        .iter()
                        .map(|h| cells.get(h).cloned().unwrap_or_default()),
                );
                row
            })
            .collect();

        MergedTable { headers, rows }
    }
}

fn merge_pivot(fragments: &[ResponseFragment], mode: MergeMode) -> MergedTable {
    let validating = mode == MergeMode::Validate;
    let mut table = PivotTable::default();

    for fragment in fragments {
        let items = match parse_items(fragment) {
            Ok(items) => items,
            Err(e) => {
                skip(fragment, &e);
                continue;
            }
        };

        let key_country = match decode_key(fragment, validating) {
            Ok(country) => country,
            Err(e) => {
                skip(fragment, &e);
                continue;
            }
        };

        for item in &items {
            match item.as_object() {
                Some(object) => table.apply(object, key_country.as_deref()),
                None => debug!("[MERGE] Non-object row skipped"),
            }
        }
    }

    table.into_table(validating)
}

/// Checks the fragment key. For validation, returns the country it names.
fn decode_key(
    fragment: &ResponseFragment,
    validating: bool,
) -> Result<Option<String>, FragmentError> {
    let key = fragment.key.as_deref().ok_or(FragmentError::MissingKey)?;
    if validating {
        match RequestKey::parse_validate(key) {
            Some(RequestKey::Validate { country, .. }) => Ok(Some(country)),
            _ => Err(FragmentError::BadKey),
        }
    } else {
        RequestKey::parse_localize(key)
            .map(|_| None)
            .ok_or(FragmentError::BadKey)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Append (classify)
// ─────────────────────────────────────────────────────────────────────────────

fn merge_append(fragments: &[ResponseFragment]) -> MergedTable {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    let mut rows: Vec<Map<String, Value>> = Vec::new();

    for fragment in fragments {
        let items = match parse_items(fragment) {
            Ok(items) => items,
            Err(e) => {
                skip(fragment, &e);
                continue;
            }
        };

        for item in items {
            match item {
                Value::Object(object) => {
                    columns.extend(object.keys().cloned());
                    rows.push(object);
                }
                _ => debug!("[MERGE] Non-object row skipped"),
            }
        }
    }

    let mut headers = vec![KEYWORD.to_string()];
    headers.extend(columns.into_iter().filter(|c| c != KEYWORD));

    let rows = rows
        .iter()
        .map(|row| {
            headers
                .iter()
                .map(|h| row.get(h).map(cell_text).unwrap_or_default())
                .collect()
        })
        .collect();

    MergedTable { headers, rows }
}

// ─────────────────────────────────────────────────────────────────────────────
// Public API
// ─────────────────────────────────────────────────────────────────────────────

/// Merges fragments into a table according to `mode`.
pub fn merge_fragments(fragments: &[ResponseFragment], mode: MergeMode) -> MergedTable {
    let table = match mode {
        MergeMode::Localize | MergeMode::Validate => merge_pivot(fragments, mode),
        MergeMode::Classify => merge_append(fragments),
    };
    info!(
        "[MERGE] Merged {} fragments into {} rows x {} columns ({})",
        fragments.len(),
        table.rows.len(),
        table.headers.len(),
        mode
    );
    table
}

/// Merges fragments and serializes the result to CSV.
pub fn merge_results(fragments: &[ResponseFragment], mode: MergeMode) -> Result<String, AppError> {
    merge_fragments(fragments, mode).to_csv()
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
