//! Data provider abstraction.
//!
//! The screener depends on two collaborators only through these traits:
//! a universe source listing stocks, and a fundamentals source answering
//! per-stock queries.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use super::{FundamentalsRecord, RawFundamentals, StockIdentity};

// ============================================================================
// Provider Error
// ============================================================================

/// Errors specific to data providers.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Network error (connection failed, timeout)
    #[error("Network error: {0}")]
    Network(String),

    /// Authentication error (invalid token, expired)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Rate limit exceeded
    #[error("Rate limited{}", retry_hint(.retry_after_secs))]
    RateLimited { retry_after_secs: Option<u64> },

    /// No data for the requested stock
    #[error("Data not available: {0}")]
    DataNotAvailable(String),

    /// Provider is temporarily unavailable (5xx)
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    /// Response could not be decoded
    #[error("Malformed response: {0}")]
    Malformed(String),

    /// Internal provider error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn retry_hint(retry_after_secs: &Option<u64>) -> String {
    retry_after_secs
        .map(|secs| format!(", retry after {} seconds", secs))
        .unwrap_or_default()
}

impl ProviderError {
    /// Check if the error is recoverable (worth retrying)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Network(_) | Self::RateLimited { .. } | Self::Unavailable(_)
        )
    }

    /// Map a reqwest transport error.
    pub(crate) fn from_transport(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Network("Request timeout".into())
        } else if e.is_connect() {
            Self::Network("Connection failed".into())
        } else {
            Self::Network(e.to_string())
        }
    }
}

// ============================================================================
// Provider Traits
// ============================================================================

/// Source of the stock universe.
#[async_trait]
pub trait UniverseProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// List every stock eligible for screening.
    ///
    /// An empty list is a valid answer; an error means the source could not
    /// be reached or understood.
    async fn list_universe(&self) -> Result<Vec<StockIdentity>, ProviderError>;
}

/// Source of per-stock fundamentals.
#[async_trait]
pub trait FundamentalsProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Fetch raw fundamentals for one stock.
    async fn fetch_raw(&self, stock: &StockIdentity) -> Result<RawFundamentals, ProviderError>;

    /// Fetch a complete record, or `None` when the provider failed or any
    /// required field is missing. Provider errors never escape this call.
    async fn fetch_fundamentals(&self, stock: &StockIdentity) -> Option<FundamentalsRecord> {
        match self.fetch_raw(stock).await {
            Ok(raw) => {
                let record = FundamentalsRecord::from_raw(raw);
                if record.is_none() {
                    debug!(provider = self.name(), stock = %stock.id, "Incomplete fundamentals");
                }
                record
            }
            Err(e) => {
                debug!(provider = self.name(), stock = %stock.id, error = %e, "Fundamentals fetch failed");
                None
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MarketSegment;

    struct FixedProvider(Result<RawFundamentals, ProviderError>);

    #[async_trait]
    impl FundamentalsProvider for FixedProvider {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch_raw(&self, _stock: &StockIdentity) -> Result<RawFundamentals, ProviderError> {
            self.0.clone()
        }
    }

    #[test]
    fn test_recoverable_errors() {
        assert!(ProviderError::Network("reset".into()).is_recoverable());
        assert!(ProviderError::RateLimited { retry_after_secs: None }.is_recoverable());
        assert!(ProviderError::Unavailable("503".into()).is_recoverable());
        assert!(!ProviderError::DataNotAvailable("2330".into()).is_recoverable());
        assert!(!ProviderError::Auth("bad token".into()).is_recoverable());
        assert!(!ProviderError::Malformed("eof".into()).is_recoverable());
    }

    #[test]
    fn test_rate_limited_display() {
        let err = ProviderError::RateLimited { retry_after_secs: Some(30) };
        assert_eq!(err.to_string(), "Rate limited, retry after 30 seconds");
        let err = ProviderError::RateLimited { retry_after_secs: None };
        assert_eq!(err.to_string(), "Rate limited");
    }

    #[tokio::test]
    async fn test_fetch_fundamentals_absorbs_errors() {
        let stock = StockIdentity::new("2330", MarketSegment::Listed);
        let provider = FixedProvider(Err(ProviderError::Network("down".into())));
        assert!(provider.fetch_fundamentals(&stock).await.is_none());
    }

    #[tokio::test]
    async fn test_fetch_fundamentals_rejects_incomplete() {
        let stock = StockIdentity::new("2330", MarketSegment::Listed);
        let provider = FixedProvider(Ok(RawFundamentals {
            eps: Some(1.0),
            ..Default::default()
        }));
        assert!(provider.fetch_fundamentals(&stock).await.is_none());
    }
}
