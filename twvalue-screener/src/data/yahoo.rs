//! Yahoo Finance adapter for per-stock fundamentals.
//!
//! Reads the v10 quote summary API. Yahoo has no official API and its
//! payloads drift; every metric is treated as optional here and
//! completeness is decided by [`FundamentalsRecord::from_raw`].
//!
//! [`FundamentalsRecord::from_raw`]: super::FundamentalsRecord::from_raw
//!
//! # Rate Limits
//! - Undocumented; bursts trigger HTTP 429
//! - A shared token bucket throttles all lanes proactively
//! - Transient failures are retried with exponential backoff

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use twvalue_common::Config;

use super::pacing::{shared_limiter, SharedRateLimiter};
use super::provider::{FundamentalsProvider, ProviderError};
use super::{RawFundamentals, StockIdentity};

/// Quote summary modules holding the screened metrics.
const QUOTE_SUMMARY_MODULES: &str = "defaultKeyStatistics,financialData,summaryDetail";

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryResponse {
    quote_summary: QuoteSummary,
}

#[derive(Debug, Deserialize)]
struct QuoteSummary {
    #[serde(default)]
    result: Option<Vec<QuoteSummaryModules>>,
    #[serde(default)]
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteSummaryModules {
    #[serde(default)]
    default_key_statistics: Option<KeyStatistics>,
    #[serde(default)]
    financial_data: Option<FinancialData>,
    #[serde(default)]
    summary_detail: Option<SummaryDetail>,
}

/// Yahoo's `{ "raw": 1.23, "fmt": "1.23" }` number wrapper. Missing values
/// arrive as `{}`.
#[derive(Debug, Default, Deserialize)]
struct YahooNumber {
    #[serde(default)]
    raw: Option<f64>,
}

fn raw(value: &Option<YahooNumber>) -> Option<f64> {
    value.as_ref().and_then(|v| v.raw)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeyStatistics {
    #[serde(default)]
    trailing_eps: Option<YahooNumber>,
    #[serde(default)]
    book_value: Option<YahooNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinancialData {
    #[serde(default)]
    current_price: Option<YahooNumber>,
    #[serde(default)]
    return_on_equity: Option<YahooNumber>,
    #[serde(default)]
    debt_to_equity: Option<YahooNumber>,
    #[serde(default)]
    current_ratio: Option<YahooNumber>,
    #[serde(default)]
    revenue_growth: Option<YahooNumber>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryDetail {
    #[serde(default)]
    dividend_yield: Option<YahooNumber>,
}

impl QuoteSummaryModules {
    fn into_raw(self) -> RawFundamentals {
        let stats = self.default_key_statistics.unwrap_or_default();
        let fin = self.financial_data.unwrap_or_default();
        let summary = self.summary_detail.unwrap_or_default();

        RawFundamentals {
            eps: raw(&stats.trailing_eps),
            book_value_per_share: raw(&stats.book_value),
            current_price: raw(&fin.current_price),
            return_on_equity: raw(&fin.return_on_equity),
            debt_to_equity_pct: raw(&fin.debt_to_equity),
            current_ratio: raw(&fin.current_ratio),
            dividend_yield: raw(&summary.dividend_yield),
            revenue_growth: raw(&fin.revenue_growth),
        }
    }
}

// ============================================================================
// Yahoo Adapter
// ============================================================================

/// Fundamentals provider backed by Yahoo Finance.
pub struct YahooFundamentals {
    base_url: String,
    client: reqwest::Client,
    max_retries: u32,
    base_delay: Duration,
    rate_limiter: Option<SharedRateLimiter>,
}

impl YahooFundamentals {
    pub fn new(base_url: impl Into<String>, timeout: Duration, user_agent: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .gzip(true)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            max_retries: 2,
            base_delay: Duration::from_millis(500),
            rate_limiter: None,
        }
    }

    /// Set retry policy for transient failures.
    pub fn with_retry(mut self, max_retries: u32, base_delay: Duration) -> Self {
        self.max_retries = max_retries;
        self.base_delay = base_delay;
        self
    }

    /// Share a request budget across every caller of this provider.
    pub fn with_rate_limiter(mut self, limiter: SharedRateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Self {
        let yahoo = &config.yahoo;
        let provider = Self::new(
            yahoo.base_url.clone(),
            Duration::from_secs(yahoo.timeout_secs),
            &yahoo.user_agent,
        )
        .with_retry(yahoo.max_retries, Duration::from_millis(yahoo.retry_base_delay_ms));

        match yahoo.rate_limit_rpm {
            Some(rpm) => provider.with_rate_limiter(shared_limiter("yahoo", rpm)),
            None => provider,
        }
    }

    fn quote_summary_url(&self, ticker: &str) -> String {
        format!("{}/v10/finance/quoteSummary/{}", self.base_url, ticker)
    }

    async fn fetch_once(&self, ticker: &str) -> Result<RawFundamentals, ProviderError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.acquire().await;
        }

        let response = self
            .client
            .get(self.quote_summary_url(ticker))
            .query(&[("modules", QUOTE_SUMMARY_MODULES)])
            .send()
            .await
            .map_err(ProviderError::from_transport)?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::DataNotAvailable(ticker.to_string()));
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("HTTP {}", status)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("Retry-After")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            return Err(ProviderError::RateLimited { retry_after_secs: retry_after });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            return Err(ProviderError::Internal(format!("HTTP {}", status)));
        }

        let body: QuoteSummaryResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))?;

        Self::parse_summary(ticker, body)
    }

    fn parse_summary(ticker: &str, body: QuoteSummaryResponse) -> Result<RawFundamentals, ProviderError> {
        if let Some(err) = body.quote_summary.error {
            return Err(ProviderError::DataNotAvailable(format!(
                "{}: {} {}",
                ticker, err.code, err.description
            )));
        }

        body.quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .map(QuoteSummaryModules::into_raw)
            .ok_or_else(|| ProviderError::DataNotAvailable(format!("{}: empty result", ticker)))
    }
}

#[async_trait]
impl FundamentalsProvider for YahooFundamentals {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_raw(&self, stock: &StockIdentity) -> Result<RawFundamentals, ProviderError> {
        let ticker = stock.ticker();
        let mut attempt = 0;

        loop {
            match self.fetch_once(&ticker).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_recoverable() && attempt < self.max_retries => {
                    let delay = self.base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    debug!(
                        ticker = %ticker,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Retrying Yahoo request"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    if e.is_recoverable() {
                        warn!(ticker = %ticker, attempts = attempt + 1, error = %e, "Yahoo retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
