//! twvalue Screener Library
//!
//! Scans Taiwan listed (TWSE) and OTC (TPEx) stocks for value opportunities
//! and reports every stock passing all screening criteria.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        twvalue-screener                          │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐  │
//! │  │ data         │──▶│ valuation    │──▶│ screener             │  │
//! │  │ FinMind,     │   │ Graham value │   │ filter, orchestrator │  │
//! │  │ Yahoo,pacing │   │ buy target   │   │ report, progress     │  │
//! │  └──────────────┘   └──────────────┘   └──────────────────────┘  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Screening Criteria
//!
//! A stock passes when every one of these strict comparisons holds:
//! - price below `sqrt(22.5 × EPS × BVPS) × margin_of_safety`
//! - ROE above the minimum
//! - debt to equity below the maximum
//! - current ratio above the minimum
//! - dividend yield above the minimum
//! - revenue growth above the minimum

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod data;
pub mod screener;
pub mod valuation;

pub use data::{FundamentalsRecord, MarketSegment, StockIdentity};
pub use screener::{ScanOrchestrator, ScanOutcome, ScreenedStock};
pub use valuation::{ValuationEngine, ValuationResult};
