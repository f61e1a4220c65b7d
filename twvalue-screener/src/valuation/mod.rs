//! Graham intrinsic value.
//!
//! `intrinsic = sqrt(22.5 × EPS × BVPS)`, where 22.5 is the product of
//! Graham's ceilings on P/E (15) and P/B (1.5). The buy target applies the
//! margin of safety on top.

use serde::{Deserialize, Serialize};

/// Max P/E (15) × max P/B (1.5).
pub const GRAHAM_MULTIPLIER: f64 = 22.5;

/// Intrinsic value and buy target for one stock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValuationResult {
    pub intrinsic_value: f64,
    pub buy_price_target: f64,
}

/// Computes Graham valuations for a fixed margin of safety.
#[derive(Debug, Clone, Copy)]
pub struct ValuationEngine {
    margin_of_safety: f64,
}

impl ValuationEngine {
    pub fn new(margin_of_safety: f64) -> Self {
        Self { margin_of_safety }
    }

    /// Value a stock from trailing EPS and book value per share.
    ///
    /// `None` when either input is non-positive or non-finite; the formula
    /// is undefined for loss-making or negative-equity companies.
    pub fn compute(&self, eps: f64, book_value_per_share: f64) -> Option<ValuationResult> {
        if !(eps.is_finite() && book_value_per_share.is_finite()) {
            return None;
        }
        if eps <= 0.0 || book_value_per_share <= 0.0 {
            return None;
        }

        let intrinsic_value = (GRAHAM_MULTIPLIER * eps * book_value_per_share).sqrt();
        if !intrinsic_value.is_finite() {
            return None;
        }

        Some(ValuationResult {
            intrinsic_value,
            buy_price_target: intrinsic_value * self.margin_of_safety,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_known_value() {
        // sqrt(22.5 × 2 × 20) = 30
        let v = ValuationEngine::new(0.7).compute(2.0, 20.0).unwrap();
        assert!((v.intrinsic_value - 30.0).abs() < 1e-9);
        assert!((v.buy_price_target - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_positive_inputs() {
        let engine = ValuationEngine::new(0.7);
        assert!(engine.compute(0.0, 10.0).is_none());
        assert!(engine.compute(-1.0, 10.0).is_none());
        assert!(engine.compute(2.0, 0.0).is_none());
        assert!(engine.compute(2.0, -5.0).is_none());
        assert!(engine.compute(f64::NAN, 10.0).is_none());
        assert!(engine.compute(2.0, f64::INFINITY).is_none());
    }

    #[test]
    fn test_full_margin_equals_intrinsic() {
        let v = ValuationEngine::new(1.0).compute(3.0, 15.0).unwrap();
        assert_eq!(v.intrinsic_value, v.buy_price_target);
    }

    proptest! {
        #[test]
        fn prop_absent_when_eps_not_positive(eps in -1e6f64..=0.0, bvps in -1e6f64..1e6) {
            prop_assert!(ValuationEngine::new(0.7).compute(eps, bvps).is_none());
        }

        #[test]
        fn prop_absent_when_bvps_not_positive(eps in -1e6f64..1e6, bvps in -1e6f64..=0.0) {
            prop_assert!(ValuationEngine::new(0.7).compute(eps, bvps).is_none());
        }

        #[test]
        fn prop_formula_holds(
            eps in 0.001f64..1e4,
            bvps in 0.001f64..1e5,
            margin in 0.01f64..=1.0,
        ) {
            let v = ValuationEngine::new(margin).compute(eps, bvps).unwrap();
            let expected = (22.5 * eps * bvps).sqrt();
            prop_assert!((v.intrinsic_value - expected).abs() <= 1e-9 * expected.max(1.0));
            prop_assert!((v.buy_price_target - expected * margin).abs() <= 1e-9 * expected.max(1.0));
            prop_assert!(v.buy_price_target <= v.intrinsic_value);
        }
    }
}
