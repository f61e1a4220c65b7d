//! Configuration management for the twvalue screener.
//!
//! Configuration lives in a single JSON file at `~/.twvalue/config.json`.
//! Every field has a default, so a missing file (or a partial one) is valid.
//!
//! # Configuration Priority
//!
//! 1. Command-line flags (applied by the binary)
//! 2. Environment variables
//! 3. Explicit config file values
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `FINMIND_API_TOKEN` → secrets.finmind_token
//! - `TWVALUE_LOG_LEVEL` → observability.log_level
//! - `TWVALUE_LOG_FORMAT` → observability.log_format
//! - `TWVALUE_WORKERS` → scan.workers

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".twvalue"),
        |dirs| dirs.home_dir().join(".twvalue"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Expand `~` and environment variables in a user-supplied path.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::full(path).map_or_else(|_| path.to_string(), |p| p.into_owned()))
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration for the screener.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Credentials
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// FinMind universe source
    #[serde(default)]
    pub finmind: FinMindConfig,

    /// Yahoo Finance fundamentals source
    #[serde(default)]
    pub yahoo: YahooConfig,

    /// Scan execution (workers, pacing, scope)
    #[serde(default)]
    pub scan: ScanConfig,

    /// Screening thresholds
    #[serde(default)]
    pub filters: FilterConfiguration,

    /// Report output
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from the default path, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration (explicit path or default location) and apply
    /// environment variable overrides.
    pub fn load_with_env(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::load_from(p)?,
            None => Self::load()?,
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("FINMIND_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            self.secrets.finmind_token = Some(token.trim().to_string());
        }

        if let Some(level) = lookup("TWVALUE_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Some(format) = lookup("TWVALUE_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(workers) = lookup("TWVALUE_WORKERS") {
            match workers.parse() {
                Ok(w) => self.scan.workers = w,
                Err(_) => tracing::warn!(value = %workers, "Ignoring unparsable TWVALUE_WORKERS"),
            }
        }
    }

    /// FinMind API token, if configured.
    pub fn finmind_token(&self) -> Option<&str> {
        self.secrets.finmind_token.as_deref()
    }

    /// Copy of the configuration with credentials masked, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if copy.secrets.finmind_token.is_some() {
            copy.secrets.finmind_token = Some("***REDACTED***".into());
        }
        copy
    }
}

// ============================================================================
// Observability
// ============================================================================

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

fn default_log_level() -> String {
    "warn".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Secrets
// ============================================================================

/// Credentials for external data sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// FinMind API token (optional; anonymous access has a lower quota)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finmind_token: Option<String>,
}

// ============================================================================
// Data Sources
// ============================================================================

/// FinMind (universe list) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinMindConfig {
    /// API base URL
    #[serde(default = "default_finmind_base_url")]
    pub base_url: String,

    /// Request timeout in seconds
    #[serde(default = "default_finmind_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for FinMindConfig {
    fn default() -> Self {
        Self {
            base_url: default_finmind_base_url(),
            timeout_secs: default_finmind_timeout_secs(),
        }
    }
}

fn default_finmind_base_url() -> String {
    "https://api.finmindtrade.com/api/v4".into()
}

fn default_finmind_timeout_secs() -> u64 {
    30
}

/// Yahoo Finance (per-stock fundamentals) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YahooConfig {
    /// API base URL
    #[serde(default = "default_yahoo_base_url")]
    pub base_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_yahoo_timeout_secs")]
    pub timeout_secs: u64,

    /// Retries for transient failures (network, 429, 5xx)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff between retries (ms)
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Shared request budget across all lanes (requests per minute).
    /// `None` disables the shared limiter.
    #[serde(default = "default_rate_limit_rpm")]
    pub rate_limit_rpm: Option<u32>,

    /// User agent sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for YahooConfig {
    fn default() -> Self {
        Self {
            base_url: default_yahoo_base_url(),
            timeout_secs: default_yahoo_timeout_secs(),
            max_retries: default_max_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            rate_limit_rpm: default_rate_limit_rpm(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_yahoo_base_url() -> String {
    "https://query2.finance.yahoo.com".into()
}

fn default_yahoo_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_base_delay_ms() -> u64 {
    500
}

fn default_rate_limit_rpm() -> Option<u32> {
    Some(120)
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".into()
}

// ============================================================================
// Scan Execution
// ============================================================================

/// Scan execution configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Number of concurrent lanes (1 = sequential pass)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upper bound on a single fundamentals fetch (ms)
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,

    /// Restrict the scan to these stock ids (empty = whole universe)
    #[serde(default)]
    pub target_symbols: Vec<String>,

    /// Only scan the first N stocks of the universe
    #[serde(default)]
    pub limit: Option<usize>,

    /// Per-lane request pacing
    #[serde(default)]
    pub pacing: PacingConfig,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            target_symbols: Vec::new(),
            limit: None,
            pacing: PacingConfig::default(),
        }
    }
}

fn default_workers() -> usize {
    1
}

fn default_fetch_timeout_ms() -> u64 {
    30_000
}

/// Per-lane pacing toward the fundamentals provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PacingConfig {
    /// Minimum spacing between two requests of one lane (ms)
    #[serde(default = "default_min_interval_ms")]
    pub min_interval_ms: u64,

    /// Requests per batch before a cooldown (0 disables cooldowns)
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,

    /// Cooldown after each full batch (ms)
    #[serde(default = "default_batch_cooldown_ms")]
    pub batch_cooldown_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: default_min_interval_ms(),
            batch_size: default_batch_size(),
            batch_cooldown_ms: default_batch_cooldown_ms(),
        }
    }
}

fn default_min_interval_ms() -> u64 {
    50
}

fn default_batch_size() -> u32 {
    100
}

fn default_batch_cooldown_ms() -> u64 {
    5_000
}

// ============================================================================
// Filter Configuration
// ============================================================================

/// Screening thresholds. Read-only for the duration of a scan.
///
/// All ratios are decimal fractions (0.15 = 15%).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FilterConfiguration {
    /// Buy target = intrinsic value × this fraction, in (0, 1]
    #[serde(default = "default_margin_of_safety")]
    pub margin_of_safety: f64,

    /// Minimum return on equity
    #[serde(default = "default_roe_min")]
    pub roe_min: f64,

    /// Maximum debt to equity ratio
    #[serde(default = "default_debt_to_equity_max")]
    pub debt_to_equity_max: f64,

    /// Minimum current ratio
    #[serde(default = "default_current_ratio_min")]
    pub current_ratio_min: f64,

    /// Minimum dividend yield
    #[serde(default = "default_dividend_yield_min")]
    pub dividend_yield_min: f64,

    /// Minimum year-over-year revenue growth
    #[serde(default = "default_revenue_growth_min")]
    pub revenue_growth_min: f64,
}

impl Default for FilterConfiguration {
    fn default() -> Self {
        Self {
            margin_of_safety: default_margin_of_safety(),
            roe_min: default_roe_min(),
            debt_to_equity_max: default_debt_to_equity_max(),
            current_ratio_min: default_current_ratio_min(),
            dividend_yield_min: default_dividend_yield_min(),
            revenue_growth_min: default_revenue_growth_min(),
        }
    }
}

impl FilterConfiguration {
    /// One-line summary for logs and report headers.
    pub fn summary(&self) -> String {
        format!(
            "MoS {:.0}%, ROE>{:.1}%, D/E<{:.2}, CR>{:.2}, DY>{:.1}%, RevG>{:.1}%",
            self.margin_of_safety * 100.0,
            self.roe_min * 100.0,
            self.debt_to_equity_max,
            self.current_ratio_min,
            self.dividend_yield_min * 100.0,
            self.revenue_growth_min * 100.0
        )
    }
}

fn default_margin_of_safety() -> f64 {
    0.7
}

fn default_roe_min() -> f64 {
    0.15
}

fn default_debt_to_equity_max() -> f64 {
    0.5
}

fn default_current_ratio_min() -> f64 {
    1.5
}

fn default_dividend_yield_min() -> f64 {
    0.02
}

fn default_revenue_growth_min() -> f64 {
    0.05
}

// ============================================================================
// Output Configuration
// ============================================================================

/// Report output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Default report format (table, markdown, json)
    #[serde(default = "default_output_format")]
    pub format: String,

    /// Directory for saved reports when `--output` names no directory
    #[serde(default = "default_report_dir")]
    pub report_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: default_output_format(),
            report_dir: default_report_dir(),
        }
    }
}

fn default_output_format() -> String {
    "table".into()
}

fn default_report_dir() -> String {
    "~/.twvalue/reports".into()
}

// ============================================================================
// Tests
// ============================================================================
