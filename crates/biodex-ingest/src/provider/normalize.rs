//! Normalization of provider hits into canonical records
//!
//! Provider documents are not uniform: the same logical field appears under
//! different names depending on whether the hit is a study or a project, and
//! values may be strings, numbers or arrays. Each logical field has an alias
//! list tried in order; the first non-empty value wins.

use biodex_common::types::{MAX_DESCRIPTION_CHARS, MAX_TITLE_CHARS};
use biodex_common::{DatasetRecord, DatasetType, DATASET_SOURCE};
use serde_json::{Map, Value};

use super::error::ProviderError;

pub const TITLE_ALIASES: &[&str] = &["Study Title", "Project Title", "title", "name"];
pub const ORGANISM_ALIASES: &[&str] = &["organism", "Organism", "Study Organism"];
pub const ASSAY_TYPE_ALIASES: &[&str] = &[
    "Study Assay Technology Type",
    "Assay Technology Type",
    "assay_type",
    "Study Assay Measurement Type",
];
pub const DESCRIPTION_ALIASES: &[&str] =
    &["Study Description", "Project Description", "description"];

pub const DEFAULT_TITLE: &str = "Untitled dataset";

/// Keyword groups checked in order; first match decides the type.
const CLASSIFICATION_RULES: &[(&[&str], DatasetType)] = &[
    (&["rna", "transcriptom"], DatasetType::Transcriptomics),
    (&["protein", "proteom"], DatasetType::Proteomics),
    (&["metabol"], DatasetType::Metabolomics),
    (&["environ", "microstructure"], DatasetType::Environmental),
];

/// Classify a dataset from its raw assay-type text.
pub fn classify(assay_type: Option<&str>) -> DatasetType {
    let Some(text) = assay_type else {
        return DatasetType::Genomics;
    };
    let text = text.to_lowercase();

    CLASSIFICATION_RULES
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| text.contains(k)))
        .map(|(_, ty)| *ty)
        .unwrap_or(DatasetType::Genomics)
}

/// Truncate to at most `max` characters without splitting a code point.
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

fn value_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_text)
            .collect::<Vec<_>>()
            .join(", "),
        _ => return None,
    };

    (!text.is_empty()).then_some(text)
}

/// First non-empty value among `aliases`.
pub fn first_text(doc: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| doc.get(*alias))
        .find_map(value_text)
}

/// Build a canonical record from one provider document.
pub fn normalize_hit(doc: &Map<String, Value>) -> DatasetRecord {
    let title = first_text(doc, TITLE_ALIASES).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let assay_type = first_text(doc, ASSAY_TYPE_ALIASES);
    let description = first_text(doc, DESCRIPTION_ALIASES).unwrap_or_default();

    DatasetRecord {
        source: DATASET_SOURCE.to_string(),
        dataset_type: classify(assay_type.as_deref()),
        title: truncate_chars(&title, MAX_TITLE_CHARS),
        organism: first_text(doc, ORGANISM_ALIASES),
        assay_type,
        description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
    }
}

/// Locate the hit documents in a provider response body.
///
/// Accepts the search envelope (`hits.hits[]._source`) or a bare array of
/// documents. Hits that are not objects are skipped.
pub fn hit_documents(body: &Value) -> Result<Vec<&Map<String, Value>>, ProviderError> {
    let hits = match body {
        Value::Array(items) => items,
        Value::Object(_) => body
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(Value::as_array)
            .ok_or_else(|| ProviderError::Decode("missing hits.hits array".to_string()))?,
        _ => {
            return Err(ProviderError::Decode(
                "expected a JSON object or array".to_string(),
            ))
        }
    };

    Ok(hits
        .iter()
        .filter_map(|hit| hit.get("_source").unwrap_or(hit).as_object())
        .collect())
}

/// Normalize a full response body, keeping at most `limit` records.
pub fn records_from_response(body: &Value, limit: usize) -> Result<Vec<DatasetRecord>, ProviderError> {
    Ok(hit_documents(body)?
        .into_iter()
        .take(limit)
        .map(normalize_hit)
        .collect())
}
