//! Configuration validation.
//!
//! Every section is checked independently and all failures are reported
//! together, so a user fixing a config file sees the whole list at once.

use thiserror::Error;

use crate::config::{
    Config, FilterConfiguration, FinMindConfig, ObservabilityConfig, OutputConfig, ScanConfig,
    YahooConfig,
};

/// Configuration validation error.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Multiple validation errors: {0:?}")]
    Multiple(Vec<ValidationError>),
}

impl ValidationError {
    fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Field names involved in this error (flattened for `Multiple`).
    pub fn fields(&self) -> Vec<&str> {
        match self {
            Self::MissingField { field } | Self::InvalidValue { field, .. } => vec![field.as_str()],
            Self::Multiple(errors) => errors.iter().flat_map(|e| e.fields()).collect(),
        }
    }
}

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Trait for validatable configuration sections.
pub trait Validate {
    /// Validate this configuration section.
    fn validate(&self) -> ValidationResult<()>;
}

impl Config {
    /// Validate the entire configuration.
    pub fn validate(&self) -> ValidationResult<()> {
        let results = [
            self.observability.validate(),
            self.finmind.validate(),
            self.yahoo.validate(),
            self.scan.validate(),
            self.filters.validate(),
            self.output.validate(),
        ];

        let mut errors: Vec<ValidationError> = results.into_iter().filter_map(Result::err).collect();

        if errors.is_empty() {
            Ok(())
        } else if errors.len() == 1 {
            Err(errors.remove(0))
        } else {
            Err(ValidationError::Multiple(errors))
        }
    }
}

impl Validate for ObservabilityConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["json", "pretty"];
        if !valid_formats.contains(&self.log_format.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}

impl Validate for FinMindConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "finmind.base_url".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::invalid("finmind.timeout_secs", "must be greater than 0"));
        }
        Ok(())
    }
}

impl Validate for YahooConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.base_url.trim().is_empty() {
            return Err(ValidationError::MissingField {
                field: "yahoo.base_url".into(),
            });
        }
        if self.timeout_secs == 0 {
            return Err(ValidationError::invalid("yahoo.timeout_secs", "must be greater than 0"));
        }
        if self.rate_limit_rpm == Some(0) {
            return Err(ValidationError::invalid(
                "yahoo.rate_limit_rpm",
                "must be greater than 0 (use null to disable)",
            ));
        }
        Ok(())
    }
}

impl Validate for ScanConfig {
    fn validate(&self) -> ValidationResult<()> {
        if self.workers == 0 {
            return Err(ValidationError::invalid("scan.workers", "must be at least 1"));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ValidationError::invalid("scan.fetch_timeout_ms", "must be greater than 0"));
        }
        if self.limit == Some(0) {
            return Err(ValidationError::invalid("scan.limit", "must be at least 1 when set"));
        }
        if let Some(bad) = self.target_symbols.iter().find(|s| s.trim().is_empty()) {
            return Err(ValidationError::invalid(
                "scan.target_symbols",
                format!("contains an empty symbol: {:?}", bad),
            ));
        }
        Ok(())
    }
}

impl Validate for FilterConfiguration {
    fn validate(&self) -> ValidationResult<()> {
        let fields = [
            ("filters.margin_of_safety", self.margin_of_safety),
            ("filters.roe_min", self.roe_min),
            ("filters.debt_to_equity_max", self.debt_to_equity_max),
            ("filters.current_ratio_min", self.current_ratio_min),
            ("filters.dividend_yield_min", self.dividend_yield_min),
            ("filters.revenue_growth_min", self.revenue_growth_min),
        ];
        if let Some((field, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ValidationError::invalid(field, "must be a finite number"));
        }

        if self.margin_of_safety <= 0.0 || self.margin_of_safety > 1.0 {
            return Err(ValidationError::invalid(
                "filters.margin_of_safety",
                "must be in (0, 1]",
            ));
        }
        if self.debt_to_equity_max < 0.0 {
            return Err(ValidationError::invalid(
                "filters.debt_to_equity_max",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

impl Validate for OutputConfig {
    fn validate(&self) -> ValidationResult<()> {
        let valid_formats = ["table", "markdown", "json"];
        if !valid_formats.contains(&self.format.to_lowercase().as_str()) {
            return Err(ValidationError::invalid(
                "output.format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.observability.log_level = "loud".into();
        let err = config.validate().unwrap_err();
        assert_eq!(err.fields(), vec!["observability.log_level"]);
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.scan.workers = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::InvalidValue { ref field, .. } if field == "scan.workers"));
    }

    #[test]
    fn test_margin_of_safety_bounds() {
        let mut filters = FilterConfiguration::default();
        filters.margin_of_safety = 1.0;
        assert!(filters.validate().is_ok());

        filters.margin_of_safety = 0.0;
        assert!(filters.validate().is_err());

        filters.margin_of_safety = 1.2;
        assert!(filters.validate().is_err());
    }

    #[test]
    fn test_non_finite_threshold_rejected() {
        let mut filters = FilterConfiguration::default();
        filters.roe_min = f64::NAN;
        let err = filters.validate().unwrap_err();
        assert_eq!(err.fields(), vec!["filters.roe_min"]);
    }

    #[test]
    fn test_zero_rate_limit_rejected_but_none_allowed() {
        let mut yahoo = YahooConfig::default();
        yahoo.rate_limit_rpm = None;
        assert!(yahoo.validate().is_ok());

        yahoo.rate_limit_rpm = Some(0);
        assert!(yahoo.validate().is_err());
    }

    #[test]
    fn test_multiple_errors_are_collected() {
        let mut config = Config::default();
        config.scan.workers = 0;
        config.output.format = "pdf".into();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ValidationError::Multiple(ref v) if v.len() == 2));
        assert_eq!(err.fields(), vec!["scan.workers", "output.format"]);
    }
}
