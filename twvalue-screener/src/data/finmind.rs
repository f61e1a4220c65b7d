//! FinMind API adapter for the Taiwan stock universe.
//!
//! # API Documentation
//! https://finmind.github.io/
//!
//! # Notes
//! - `TaiwanStockInfo` lists every security once per industry tag, so the
//!   same stock id can appear several times.
//! - A token is optional; anonymous access has a lower quota.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

use twvalue_common::Config;

use super::provider::{ProviderError, UniverseProvider};
use super::{MarketSegment, StockIdentity};

/// Dataset holding the stock list.
const STOCK_INFO_DATASET: &str = "TaiwanStockInfo";

/// Industry category FinMind uses for instruments without an industry.
const NO_INDUSTRY: &str = "None";

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct FinMindResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    data: Vec<StockInfoRow>,
}

#[derive(Debug, Deserialize)]
struct StockInfoRow {
    stock_id: String,
    #[serde(default)]
    stock_name: Option<String>,
    #[serde(rename = "type", default)]
    market_type: Option<String>,
    #[serde(default)]
    industry_category: Option<String>,
}

impl StockInfoRow {
    /// Keep only ordinary shares of listed and OTC companies.
    fn into_identity(self) -> Option<StockIdentity> {
        let industry = self.industry_category.as_deref().unwrap_or(NO_INDUSTRY);
        if industry == NO_INDUSTRY || !StockIdentity::is_common_stock_id(&self.stock_id) {
            return None;
        }
        let segment: MarketSegment = self.market_type.as_deref()?.parse().ok()?;

        let identity = StockIdentity::new(self.stock_id, segment);
        Some(match self.stock_name {
            Some(name) if !name.trim().is_empty() => identity.with_name(name.trim()),
            _ => identity,
        })
    }
}

// ============================================================================
// FinMind Adapter
// ============================================================================

/// Universe provider backed by FinMind's `TaiwanStockInfo` dataset.
pub struct FinMindUniverse {
    base_url: String,
    token: Option<String>,
    client: reqwest::Client,
}

impl FinMindUniverse {
    pub fn new(base_url: impl Into<String>, token: Option<String>, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            client,
        }
    }

    /// Create from config
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.finmind.base_url.clone(),
            config.finmind_token().map(String::from),
            Duration::from_secs(config.finmind.timeout_secs),
        )
    }

    async fn fetch_stock_info(&self) -> Result<FinMindResponse, ProviderError> {
        let url = format!("{}/data", self.base_url);
        debug!(url = %url, authenticated = self.token.is_some(), "Calling FinMind API");

        let mut request = self
            .client
            .get(&url)
            .query(&[("dataset", STOCK_INFO_DATASET)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(ProviderError::from_transport)?;
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::Auth(format!("FinMind rejected token (HTTP {})", status)));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited { retry_after_secs: None });
        }
        if status.is_server_error() {
            return Err(ProviderError::Unavailable(format!("HTTP {}", status)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Internal(format!("HTTP {}: {}", status, body)));
        }

        let body: FinMindResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("Failed to parse response: {}", e)))?;

        match body.status {
            Some(200) | None => Ok(body),
            Some(code) => Err(ProviderError::Unavailable(format!(
                "FinMind status {}: {}",
                code,
                body.msg.as_deref().unwrap_or("no message")
            ))),
        }
    }
}

#[async_trait]
impl UniverseProvider for FinMindUniverse {
    fn name(&self) -> &'static str {
        "finmind"
    }

    async fn list_universe(&self) -> Result<Vec<StockIdentity>, ProviderError> {
        let response = self.fetch_stock_info().await?;
        let total_rows = response.data.len();

        let mut seen = HashSet::new();
        let stocks: Vec<StockIdentity> = response
            .data
            .into_iter()
            .filter_map(StockInfoRow::into_identity)
            .filter(|s| seen.insert(s.id.clone()))
            .collect();

        info!(
            rows = total_rows,
            stocks = stocks.len(),
            "Loaded listed/OTC universe from FinMind"
        );
        Ok(stocks)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, kind: &str, industry: &str) -> StockInfoRow {
        StockInfoRow {
            stock_id: id.into(),
            stock_name: Some(format!("Name {}", id)),
            market_type: Some(kind.into()),
            industry_category: Some(industry.into()),
        }
    }

    #[test]
    fn test_row_kept_for_listed_stock() {
        let identity = row("2330", "twse", "半導體業").into_identity().unwrap();
        assert_eq!(identity.id, "2330");
        assert_eq!(identity.market_segment, MarketSegment::Listed);
        assert_eq!(identity.name.as_deref(), Some("Name 2330"));
    }

    #[test]
    fn test_row_filters() {
        assert!(row("6488", "tpex", "半導體業").into_identity().is_some());
        assert!(row("0050", "twse", "None").into_identity().is_none());
        assert!(row("00878", "twse", "ETF").into_identity().is_none());
        assert!(row("1234", "emerging", "電子工業").into_identity().is_none());
        assert!(row("", "twse", "水泥工業").into_identity().is_none());
    }

    #[test]
    fn test_missing_industry_is_excluded() {
        let mut r = row("1101", "twse", "水泥工業");
        r.industry_category = None;
        assert!(r.into_identity().is_none());
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let provider = FinMindUniverse::new("http://localhost/api/v4/", None, Duration::from_secs(1));
        assert_eq!(provider.base_url, "http://localhost/api/v4");
    }
}
