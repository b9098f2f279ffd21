//! Error types for Biodex

use thiserror::Error;

/// Workspace-level error type
#[derive(Error, Debug)]
pub enum BiodexError {
    #[error("Unknown dataset type: {0}")]
    UnknownDatasetType(String),

    #[error("Invalid job state: {0}")]
    InvalidJobState(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl BiodexError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message() {
        let err = BiodexError::validation("limit must be positive");
        assert_eq!(err.to_string(), "Validation error: limit must be positive");
    }

    #[test]
    fn test_parse_errors_name_the_input() {
        let err = "proteomics-ish".parse::<crate::DatasetType>().unwrap_err();
        assert!(matches!(err, BiodexError::UnknownDatasetType(ref raw) if raw == "proteomics-ish"));
        assert_eq!(err.to_string(), "Unknown dataset type: proteomics-ish");
    }
}
