//! Common types used across Biodex

use serde::{Deserialize, Serialize};

/// Source literal stamped on every record fetched by the ingestion pipeline.
///
/// Together with the record title it forms the natural key used by the
/// dataset store.
pub const DATASET_SOURCE: &str = "NASA OSDR";

/// Maximum stored title length, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Maximum stored description length, in characters.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

/// Omics category of a dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatasetType {
    #[default]
    Genomics,
    Transcriptomics,
    Proteomics,
    Metabolomics,
    Environmental,
}

impl DatasetType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Genomics => "genomics",
            DatasetType::Transcriptomics => "transcriptomics",
            DatasetType::Proteomics => "proteomics",
            DatasetType::Metabolomics => "metabolomics",
            DatasetType::Environmental => "environmental",
        }
    }
}

impl std::fmt::Display for DatasetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DatasetType {
    type Err = crate::BiodexError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "genomics" => Ok(DatasetType::Genomics),
            "transcriptomics" => Ok(DatasetType::Transcriptomics),
            "proteomics" => Ok(DatasetType::Proteomics),
            "metabolomics" => Ok(DatasetType::Metabolomics),
            "environmental" => Ok(DatasetType::Environmental),
            other => Err(crate::BiodexError::UnknownDatasetType(other.to_string())),
        }
    }
}

/// A dataset record in canonical shape.
///
/// Records are produced by the provider client after field-alias resolution,
/// classification and truncation, and persisted by the dataset store keyed by
/// `(title, source)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Provider literal, see [`DATASET_SOURCE`]
    pub source: String,

    /// Classified omics category
    #[serde(rename = "type")]
    pub dataset_type: DatasetType,

    /// Title, at most [`MAX_TITLE_CHARS`] characters
    pub title: String,

    pub organism: Option<String>,

    /// Raw assay-type text as reported by the provider
    pub assay_type: Option<String>,

    /// Description, at most [`MAX_DESCRIPTION_CHARS`] characters
    pub description: String,
}

impl DatasetRecord {
    /// Natural key of the record
    pub fn key(&self) -> (&str, &str) {
        (&self.title, &self.source)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_dataset_type_round_trip_str() {
        for ty in [
            DatasetType::Genomics,
            DatasetType::Transcriptomics,
            DatasetType::Proteomics,
            DatasetType::Metabolomics,
            DatasetType::Environmental,
        ] {
            assert_eq!(ty.as_str().parse::<DatasetType>().unwrap(), ty);
        }
    }

    #[test]
    fn test_dataset_type_rejects_unknown() {
        assert!("lipidomics".parse::<DatasetType>().is_err());
    }

    #[test]
    fn test_record_serializes_type_field() {
        let record = DatasetRecord {
            source: DATASET_SOURCE.to_string(),
            dataset_type: DatasetType::Proteomics,
            title: "Rodent Research 1".to_string(),
            organism: Some("Mus musculus".to_string()),
            assay_type: Some("protein expression profiling".to_string()),
            description: String::new(),
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "proteomics");
        assert_eq!(record.key(), ("Rodent Research 1", "NASA OSDR"));
    }
}
