//! Market data module for Taiwan equities.
//!
//! # Data Sources
//! - **FinMind**: `TaiwanStockInfo` dataset, the universe of listed and OTC stocks
//! - **Yahoo Finance**: per-stock fundamentals from the quote summary API

mod finmind;
mod pacing;
mod provider;
mod yahoo;

pub use finmind::FinMindUniverse;
pub use pacing::{shared_limiter, LanePacer, RateLimiter, SharedRateLimiter};
pub use provider::{FundamentalsProvider, ProviderError, UniverseProvider};
pub use yahoo::YahooFundamentals;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Stock Identity
// ============================================================================

/// Exchange segment a stock trades on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarketSegment {
    /// Taiwan Stock Exchange (上市)
    #[serde(rename = "twse")]
    Listed,
    /// Taipei Exchange (上櫃)
    #[serde(rename = "tpex")]
    Otc,
}

impl MarketSegment {
    /// Yahoo Finance ticker suffix for this segment.
    pub fn ticker_suffix(&self) -> &'static str {
        match self {
            Self::Listed => ".TW",
            Self::Otc => ".TWO",
        }
    }

    /// FinMind `type` code for this segment.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Listed => "twse",
            Self::Otc => "tpex",
        }
    }
}

impl FromStr for MarketSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "twse" => Ok(Self::Listed),
            "tpex" => Ok(Self::Otc),
            other => Err(format!("unknown market segment: {}", other)),
        }
    }
}

impl fmt::Display for MarketSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// One stock of the universe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockIdentity {
    /// Four-digit stock code, e.g. "2330"
    pub id: String,
    /// Exchange segment
    pub market_segment: MarketSegment,
    /// Display name, when the universe source provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl StockIdentity {
    pub fn new(id: impl Into<String>, market_segment: MarketSegment) -> Self {
        Self {
            id: id.into(),
            market_segment,
            name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Yahoo Finance ticker, e.g. "2330.TW" or "6488.TWO".
    pub fn ticker(&self) -> String {
        format!("{}{}", self.id, self.market_segment.ticker_suffix())
    }

    /// Whether `id` is a plain four-digit stock code (excludes warrants and ETFs).
    pub fn is_common_stock_id(id: &str) -> bool {
        id.len() == 4 && id.bytes().all(|b| b.is_ascii_digit())
    }
}

impl fmt::Display for StockIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {}", self.id, name),
            None => write!(f, "{}", self.id),
        }
    }
}

// ============================================================================
// Fundamentals
// ============================================================================

/// Fundamentals as delivered by a provider.
///
/// Every field is optional and `debt_to_equity_pct` is still in the
/// provider's percent units (55.8 means 0.558).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFundamentals {
    pub eps: Option<f64>,
    pub book_value_per_share: Option<f64>,
    pub current_price: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub debt_to_equity_pct: Option<f64>,
    pub current_ratio: Option<f64>,
    pub dividend_yield: Option<f64>,
    pub revenue_growth: Option<f64>,
}

/// Complete per-stock fundamentals snapshot. Ratios are decimal fractions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    /// Trailing earnings per share
    pub eps: f64,
    /// Book value per share
    pub book_value_per_share: f64,
    /// Last traded price
    pub current_price: f64,
    /// Return on equity (0.15 = 15%)
    pub return_on_equity: f64,
    /// Debt to equity (0.558 = 55.8%); 0.0 when the provider reports none
    pub debt_to_equity: f64,
    /// Current assets / current liabilities
    pub current_ratio: f64,
    /// Dividend yield (0.02 = 2%)
    pub dividend_yield: f64,
    /// Year-over-year revenue growth, may be negative
    pub revenue_growth: f64,
}

impl FundamentalsRecord {
    /// Build a complete record from provider output.
    ///
    /// Returns `None` if any required field is missing or non-finite. The
    /// debt ratio is the only optional input: absent means no debt (0.0),
    /// present is converted from percent to a fraction.
    pub fn from_raw(raw: RawFundamentals) -> Option<Self> {
        fn finite(v: Option<f64>) -> Option<f64> {
            v.filter(|x| x.is_finite())
        }

        let debt_to_equity = match raw.debt_to_equity_pct {
            None => 0.0,
            Some(pct) if pct.is_finite() => pct / 100.0,
            Some(_) => return None,
        };

        Some(Self {
            eps: finite(raw.eps)?,
            book_value_per_share: finite(raw.book_value_per_share)?,
            current_price: finite(raw.current_price)?,
            return_on_equity: finite(raw.return_on_equity)?,
            debt_to_equity,
            current_ratio: finite(raw.current_ratio)?,
            dividend_yield: finite(raw.dividend_yield)?,
            revenue_growth: finite(raw.revenue_growth)?,
        })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_raw() -> RawFundamentals {
        RawFundamentals {
            eps: Some(5.0),
            book_value_per_share: Some(40.0),
            current_price: Some(30.0),
            return_on_equity: Some(0.2),
            debt_to_equity_pct: Some(55.8),
            current_ratio: Some(2.0),
            dividend_yield: Some(0.04),
            revenue_growth: Some(0.1),
        }
    }

    #[test]
    fn test_ticker_suffix() {
        assert_eq!(StockIdentity::new("2330", MarketSegment::Listed).ticker(), "2330.TW");
        assert_eq!(StockIdentity::new("6488", MarketSegment::Otc).ticker(), "6488.TWO");
    }

    #[test]
    fn test_segment_from_finmind_type() {
        assert_eq!("twse".parse::<MarketSegment>().unwrap(), MarketSegment::Listed);
        assert_eq!("TPEX".parse::<MarketSegment>().unwrap(), MarketSegment::Otc);
        assert!("emerging".parse::<MarketSegment>().is_err());
    }

    #[test]
    fn test_common_stock_id() {
        assert!(StockIdentity::is_common_stock_id("2330"));
        assert!(!StockIdentity::is_common_stock_id("00878"));
        assert!(!StockIdentity::is_common_stock_id("033"));
        assert!(!StockIdentity::is_common_stock_id("23A0"));
        assert!(!StockIdentity::is_common_stock_id("２３３０"));
    }

    #[test]
    fn test_debt_ratio_normalized_from_percent() {
        let record = FundamentalsRecord::from_raw(complete_raw()).unwrap();
        assert!((record.debt_to_equity - 0.558).abs() < 1e-12);
    }

    #[test]
    fn test_absent_debt_ratio_is_zero() {
        let raw = RawFundamentals {
            debt_to_equity_pct: None,
            ..complete_raw()
        };
        let record = FundamentalsRecord::from_raw(raw).unwrap();
        assert_eq!(record.debt_to_equity, 0.0);
    }

    #[test]
    fn test_missing_field_yields_no_record() {
        let raw = RawFundamentals {
            dividend_yield: None,
            ..complete_raw()
        };
        assert!(FundamentalsRecord::from_raw(raw).is_none());

        let raw = RawFundamentals {
            eps: None,
            ..complete_raw()
        };
        assert!(FundamentalsRecord::from_raw(raw).is_none());
    }

    #[test]
    fn test_non_finite_value_yields_no_record() {
        let raw = RawFundamentals {
            current_price: Some(f64::NAN),
            ..complete_raw()
        };
        assert!(FundamentalsRecord::from_raw(raw).is_none());

        let raw = RawFundamentals {
            debt_to_equity_pct: Some(f64::INFINITY),
            ..complete_raw()
        };
        assert!(FundamentalsRecord::from_raw(raw).is_none());
    }

    #[test]
    fn test_negative_revenue_growth_is_kept() {
        let raw = RawFundamentals {
            revenue_growth: Some(-0.12),
            ..complete_raw()
        };
        let record = FundamentalsRecord::from_raw(raw).unwrap();
        assert!((record.revenue_growth + 0.12).abs() < 1e-12);
    }
}
