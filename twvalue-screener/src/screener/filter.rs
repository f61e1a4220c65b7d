//! Composite value filter.
//!
//! Six strict comparisons, checked in a fixed order. Equality fails every
//! criterion; evaluation stops at the first failure.

use serde::{Deserialize, Serialize};
use std::fmt;

use twvalue_common::FilterConfiguration;

use crate::data::FundamentalsRecord;
use crate::valuation::ValuationResult;

/// One screening criterion, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Criterion {
    /// Price below the margin-of-safety buy target
    PriceBelowBuyTarget,
    /// ROE above the minimum
    ReturnOnEquity,
    /// Debt to equity below the maximum
    DebtToEquity,
    /// Current ratio above the minimum
    CurrentRatio,
    /// Dividend yield above the minimum
    DividendYield,
    /// Revenue growth above the minimum
    RevenueGrowth,
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PriceBelowBuyTarget => "price >= buy target",
            Self::ReturnOnEquity => "ROE too low",
            Self::DebtToEquity => "D/E too high",
            Self::CurrentRatio => "current ratio too low",
            Self::DividendYield => "dividend yield too low",
            Self::RevenueGrowth => "revenue growth too low",
        };
        write!(f, "{}", label)
    }
}

/// Screening filter bound to one set of thresholds.
#[derive(Debug, Clone, Copy)]
pub struct ScreeningFilter {
    config: FilterConfiguration,
}

impl ScreeningFilter {
    pub fn new(config: FilterConfiguration) -> Self {
        Self { config }
    }

    /// Check every criterion, returning the first one that fails.
    pub fn evaluate(&self, record: &FundamentalsRecord, valuation: &ValuationResult) -> Result<(), Criterion> {
        let c = &self.config;
        let checks = [
            (Criterion::PriceBelowBuyTarget, record.current_price < valuation.buy_price_target),
            (Criterion::ReturnOnEquity, record.return_on_equity > c.roe_min),
            (Criterion::DebtToEquity, record.debt_to_equity < c.debt_to_equity_max),
            (Criterion::CurrentRatio, record.current_ratio > c.current_ratio_min),
            (Criterion::DividendYield, record.dividend_yield > c.dividend_yield_min),
            (Criterion::RevenueGrowth, record.revenue_growth > c.revenue_growth_min),
        ];

        match checks.into_iter().find(|(_, ok)| !ok) {
            Some((criterion, _)) => Err(criterion),
            None => Ok(()),
        }
    }

    /// Whether the stock passes all six criteria.
    pub fn passes(&self, record: &FundamentalsRecord, valuation: &ValuationResult) -> bool {
        self.evaluate(record, valuation).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn passing_record() -> FundamentalsRecord {
        FundamentalsRecord {
            eps: 5.0,
            book_value_per_share: 40.0,
            current_price: 30.0,
            return_on_equity: 0.20,
            debt_to_equity: 0.30,
            current_ratio: 2.0,
            dividend_yield: 0.04,
            revenue_growth: 0.10,
        }
    }

    fn valuation(buy: f64) -> ValuationResult {
        ValuationResult {
            intrinsic_value: buy / 0.7,
            buy_price_target: buy,
        }
    }

    fn filter() -> ScreeningFilter {
        ScreeningFilter::new(FilterConfiguration::default())
    }

    #[test]
    fn test_all_criteria_pass() {
        assert!(filter().passes(&passing_record(), &valuation(40.0)));
    }

    #[test_case(40.0, false ; "price equal to buy target fails")]
    #[test_case(39.99, true ; "one cent below passes")]
    fn test_price_boundary(price: f64, expected: bool) {
        let record = FundamentalsRecord {
            current_price: price,
            ..passing_record()
        };
        assert_eq!(filter().passes(&record, &valuation(40.0)), expected);
    }

    #[test_case(0.15, false ; "roe at minimum fails")]
    #[test_case(0.1501, true ; "roe above minimum passes")]
    fn test_roe_boundary(roe: f64, expected: bool) {
        let record = FundamentalsRecord {
            return_on_equity: roe,
            ..passing_record()
        };
        assert_eq!(filter().passes(&record, &valuation(40.0)), expected);
    }

    #[test_case(0.5, false ; "debt at maximum fails")]
    #[test_case(0.0, true ; "no debt passes")]
    fn test_debt_boundary(de: f64, expected: bool) {
        let record = FundamentalsRecord {
            debt_to_equity: de,
            ..passing_record()
        };
        assert_eq!(filter().passes(&record, &valuation(40.0)), expected);
    }

    #[test]
    fn test_reports_first_failing_criterion() {
        let record = FundamentalsRecord {
            current_price: 100.0,
            return_on_equity: 0.01,
            ..passing_record()
        };
        assert_eq!(
            filter().evaluate(&record, &valuation(40.0)),
            Err(Criterion::PriceBelowBuyTarget)
        );
    }

    #[test_case(|r: &mut FundamentalsRecord| r.current_ratio = 1.5, Criterion::CurrentRatio ; "current ratio")]
    #[test_case(|r: &mut FundamentalsRecord| r.dividend_yield = 0.02, Criterion::DividendYield ; "dividend yield")]
    #[test_case(|r: &mut FundamentalsRecord| r.revenue_growth = 0.05, Criterion::RevenueGrowth ; "revenue growth")]
    #[test_case(|r: &mut FundamentalsRecord| r.revenue_growth = -0.2, Criterion::RevenueGrowth ; "shrinking revenue")]
    fn test_single_failure_is_reported(tweak: fn(&mut FundamentalsRecord), expected: Criterion) {
        let mut record = passing_record();
        tweak(&mut record);
        assert_eq!(filter().evaluate(&record, &valuation(40.0)), Err(expected));
    }
}
