//! Value screener.
//!
//! ```text
//! universe ──▶ fundamentals ──▶ Graham valuation ──▶ six-criterion filter ──▶ report
//!  (FinMind)     (Yahoo)          sqrt(22.5·EPS·BVPS)   all strict, in order
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use twvalue_screener::screener::{ScanOrchestrator, ScanReport, ReportFormat};
//!
//! let orchestrator = ScanOrchestrator::new(fundamentals, config.filters, config.scan.clone());
//! let outcome = orchestrator.scan(&universe).await?;
//! println!("{}", ScanReport::new(&outcome).generate(ReportFormat::Table)?);
//! ```

pub mod engine;
pub mod filter;
pub mod progress;
pub mod report;

pub use engine::{
    evaluate_stock, NoopObserver, ScanError, ScanObserver, ScanOrchestrator, ScanOutcome,
    ScreenedStock, SkipReason, StopSignal,
};
pub use filter::{Criterion, ScreeningFilter};
pub use progress::{MatchPrinter, ProgressObserver};
pub use report::{ReportFormat, ScanReport, NO_MATCHES_MESSAGE};
