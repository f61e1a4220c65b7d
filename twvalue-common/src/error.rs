//! Error types shared by the twvalue crates.

use thiserror::Error;

use crate::validation::ValidationError;

/// Configuration error surfaced to the binary.
#[derive(Error, Debug)]
pub enum Error {
    /// A configured value could not be interpreted
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration loaded but failed validation
    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_converts() {
        let err: Error = ValidationError::MissingField {
            field: "finmind.base_url".into(),
        }
        .into();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Missing required field: finmind.base_url"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = Error::Config("Unknown report format: pdf".into());
        assert_eq!(err.to_string(), "Configuration error: Unknown report format: pdf");
    }
}
