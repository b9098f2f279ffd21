//! Search filters and provider query encoding

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Search term used when none (or a blank one) is given.
pub const DEFAULT_SEARCH_TERM: &str = "space biology";

/// Page size used when no limit is given.
pub const DEFAULT_LIMIT: u32 = 10;

/// Dataset category selector sent as the provider's `type` parameter.
pub const DEFAULT_DATASET_CATEGORY: &str = "cgene";

/// Provider facet names for the optional filter pairs.
pub const ORGANISM_FIELD: &str = "organism";
pub const ASSAY_TYPE_FIELD: &str = "Study Assay Technology Type";
pub const PROJECT_TYPE_FIELD: &str = "Project Type";

/// Parameters for one provider search page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    pub search_term: Option<String>,
    pub limit: u32,
    pub organism: Option<String>,
    pub assay_type: Option<String>,
    pub project_type: Option<String>,

    /// Carried for provenance; the provider search has no date facet.
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            search_term: None,
            limit: DEFAULT_LIMIT,
            organism: None,
            assay_type: None,
            project_type: None,
            date_from: None,
            date_to: None,
        }
    }
}

impl SearchFilters {
    pub fn new(search_term: impl Into<String>) -> Self {
        Self {
            search_term: Some(search_term.into()),
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_organism(mut self, organism: impl Into<String>) -> Self {
        self.organism = Some(organism.into());
        self
    }

    pub fn with_assay_type(mut self, assay_type: impl Into<String>) -> Self {
        self.assay_type = Some(assay_type.into());
        self
    }

    /// The term actually sent to the provider
    pub fn effective_term(&self) -> &str {
        self.search_term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SEARCH_TERM)
    }

    /// Facet filters as `(field, value)` pairs, in a fixed order.
    pub fn facet_pairs(&self) -> Vec<(&'static str, &str)> {
        [
            (ORGANISM_FIELD, self.organism.as_deref()),
            (ASSAY_TYPE_FIELD, self.assay_type.as_deref()),
            (PROJECT_TYPE_FIELD, self.project_type.as_deref()),
        ]
        .into_iter()
        .filter_map(|(field, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| (field, v))
        })
        .collect()
    }

    /// Encode as provider query parameters.
    ///
    /// Facets are sent as parallel repeated `ffield` / `fvalue` parameters;
    /// the provider pairs them up by position.
    pub fn query_pairs(&self, category: &str) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("term", self.effective_term().to_string()),
            ("from", "0".to_string()),
            ("size", self.limit.to_string()),
            ("type", category.to_string()),
        ];

        for (field, value) in self.facet_pairs() {
            pairs.push(("ffield", field.to_string()));
            pairs.push(("fvalue", value.to_string()));
        }

        pairs
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_term_falls_back_to_default() {
        let filters = SearchFilters::new("   ");
        assert_eq!(filters.effective_term(), DEFAULT_SEARCH_TERM);
        assert_eq!(SearchFilters::default().effective_term(), DEFAULT_SEARCH_TERM);
    }

    #[test]
    fn test_query_pairs_without_facets() {
        let pairs = SearchFilters::new("microgravity")
            .with_limit(5)
            .query_pairs(DEFAULT_DATASET_CATEGORY);

        assert_eq!(
            pairs,
            vec![
                ("term", "microgravity".to_string()),
                ("from", "0".to_string()),
                ("size", "5".to_string()),
                ("type", "cgene".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_with_facets_are_parallel() {
        let pairs = SearchFilters::new("bone loss")
            .with_organism("Mus musculus")
            .with_assay_type("RNA Sequencing (RNA-Seq)")
            .query_pairs(DEFAULT_DATASET_CATEGORY);

        let fields: Vec<_> = pairs.iter().filter(|(k, _)| *k == "ffield").map(|(_, v)| v.as_str()).collect();
        let values: Vec<_> = pairs.iter().filter(|(k, _)| *k == "fvalue").map(|(_, v)| v.as_str()).collect();

        assert_eq!(fields, vec![ORGANISM_FIELD, ASSAY_TYPE_FIELD]);
        assert_eq!(values, vec!["Mus musculus", "RNA Sequencing (RNA-Seq)"]);
    }

    #[test]
    fn test_blank_facets_are_skipped() {
        let mut filters = SearchFilters::new("radiation");
        filters.organism = Some(" ".to_string());
        assert!(filters.facet_pairs().is_empty());
    }
}
