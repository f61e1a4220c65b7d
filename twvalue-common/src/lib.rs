//! twvalue Common - Shared types, utilities, and configuration for the screener.
//!
//! This crate provides:
//! - Configuration types and loading
//! - Configuration validation
//! - Error types and handling utilities
//! - Logging setup

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod logging;
pub mod validation;

pub use config::{
    Config, FilterConfiguration, FinMindConfig, ObservabilityConfig, OutputConfig, PacingConfig,
    ScanConfig, SecretsConfig, YahooConfig,
};
pub use error::Error;
pub use validation::{Validate, ValidationError, ValidationResult};
