//! Scan orchestrator.
//!
//! Drives one batch scan: list the universe, then for every stock fetch
//! fundamentals, value it, filter it and collect the matches. Work is spread
//! over `scan.workers` lanes that pull the next universe index from a shared
//! cursor; matches are re-sorted into universe order when the scan finishes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use twvalue_common::{FilterConfiguration, PacingConfig, ScanConfig, Validate};

use crate::data::{
    FundamentalsProvider, FundamentalsRecord, LanePacer, ProviderError, StockIdentity,
    UniverseProvider,
};
use crate::valuation::{ValuationEngine, ValuationResult};

use super::filter::{Criterion, ScreeningFilter};

// ============================================================================
// Errors
// ============================================================================

/// Errors that abort a scan.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The universe could not be listed; nothing was fetched.
    #[error("Universe provider unavailable: {0}")]
    ProviderUnavailable(#[source] ProviderError),

    #[error("Invalid scan configuration: {0}")]
    InvalidConfig(String),
}

/// Why a stock did not make it into the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No record (fetch failed, timed out, or fields missing)
    MissingData,
    /// Non-positive EPS or book value
    InvalidValuationInput,
    /// Rejected by a screening criterion
    FilteredOut(Criterion),
}

// ============================================================================
// Stop Signal
// ============================================================================

#[derive(Debug, Default)]
struct StopState {
    raised: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag for one scan, shared by every lane.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<StopState>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask lanes to stop taking new stocks. In-flight fetches still finish.
    pub fn raise(&self) {
        self.0.raised.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_raised(&self) -> bool {
        self.0.raised.load(Ordering::SeqCst)
    }

    /// Resolves once the signal is raised.
    pub async fn raised(&self) {
        let mut notified = std::pin::pin!(self.0.notify.notified());
        notified.as_mut().enable();
        if self.is_raised() {
            return;
        }
        notified.await;
    }
}

// ============================================================================
// Results
// ============================================================================

/// A stock that passed every criterion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenedStock {
    pub stock: StockIdentity,
    pub fundamentals: FundamentalsRecord,
    pub valuation: ValuationResult,
}

/// Result of one scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Scan ID (timestamp-based)
    pub id: String,
    /// Passing stocks, in universe order
    pub results: Vec<ScreenedStock>,
    /// Stocks in the (scoped) universe
    pub total_in_universe: usize,
    /// Completed fetch attempts
    pub total_processed: usize,
    /// Stocks that passed every criterion
    pub total_passed: usize,
    /// Skipped: no complete record
    pub missing_data: usize,
    /// Skipped: valuation undefined
    pub invalid_valuation: usize,
    /// Skipped: failed a criterion
    pub filtered_out: usize,
    /// Stopped before the universe was exhausted
    pub cancelled: bool,
    /// Thresholds the scan ran with
    pub filters: FilterConfiguration,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl ScanOutcome {
    /// Summary string for logging.
    pub fn summary(&self) -> String {
        format!(
            "Processed {}/{} stocks in {:.1}s: {} passed, {} missing data, {} invalid valuation, {} filtered out{}",
            self.total_processed,
            self.total_in_universe,
            self.duration_secs,
            self.total_passed,
            self.missing_data,
            self.invalid_valuation,
            self.filtered_out,
            if self.cancelled { " (cancelled)" } else { "" }
        )
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Hooks into scan progress. Every method defaults to a no-op.
///
/// Hooks are called from lane tasks and must not block.
pub trait ScanObserver: Send + Sync {
    fn on_scan_started(&self, _total: usize) {}

    fn on_stock_processed(&self, _stock: &StockIdentity, _skip: Option<SkipReason>) {}

    fn on_match(&self, _matched: &ScreenedStock) {}

    fn on_scan_finished(&self, _outcome: &ScanOutcome) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ScanObserver for NoopObserver {}

// ============================================================================
// Orchestrator
// ============================================================================

/// Value, then filter, one fetched record.
pub fn evaluate_stock(
    record: Option<FundamentalsRecord>,
    valuation: &ValuationEngine,
    filter: &ScreeningFilter,
) -> Result<(FundamentalsRecord, ValuationResult), SkipReason> {
    let record = record.ok_or(SkipReason::MissingData)?;
    let value = valuation
        .compute(record.eps, record.book_value_per_share)
        .ok_or(SkipReason::InvalidValuationInput)?;
    filter
        .evaluate(&record, &value)
        .map_err(SkipReason::FilteredOut)?;
    Ok((record, value))
}

#[derive(Default)]
struct ScanState {
    cursor: AtomicUsize,
    processed: AtomicUsize,
    missing_data: AtomicUsize,
    invalid_valuation: AtomicUsize,
    filtered_out: AtomicUsize,
    matches: Mutex<Vec<(usize, ScreenedStock)>>,
}

/// Everything a lane task needs, cloned per lane.
#[derive(Clone)]
struct Lane {
    universe: Arc<Vec<StockIdentity>>,
    state: Arc<ScanState>,
    provider: Arc<dyn FundamentalsProvider>,
    observer: Arc<dyn ScanObserver>,
    valuation: ValuationEngine,
    filter: ScreeningFilter,
    stop: StopSignal,
    fetch_timeout: Duration,
    pacing: PacingConfig,
}

impl Lane {
    async fn run(self, lane_id: usize) {
        let mut pacer = LanePacer::new(&self.pacing);

        loop {
            if self.stop.is_raised() {
                debug!(lane = lane_id, "Stop signal raised, lane exiting");
                break;
            }

            let index = self.state.cursor.fetch_add(1, Ordering::SeqCst);
            let Some(stock) = self.universe.get(index) else {
                break;
            };

            // A batch cooldown can be long; give up the wait on stop
            tokio::select! {
                _ = pacer.wait_turn() => {}
                _ = self.stop.raised() => {
                    debug!(lane = lane_id, "Stop signal raised while pacing, lane exiting");
                    break;
                }
            }
            if self.stop.is_raised() {
                break;
            }

            self.process(index, stock).await;
        }
    }

    async fn process(&self, index: usize, stock: &StockIdentity) {
        let record = match tokio::time::timeout(self.fetch_timeout, self.provider.fetch_fundamentals(stock)).await {
            Ok(record) => record,
            Err(_) => {
                warn!(
                    stock = %stock.id,
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "Fundamentals fetch timed out"
                );
                None
            }
        };
        self.state.processed.fetch_add(1, Ordering::SeqCst);

        let skip = match evaluate_stock(record, &self.valuation, &self.filter) {
            Ok((fundamentals, valuation)) => {
                let matched = ScreenedStock {
                    stock: stock.clone(),
                    fundamentals,
                    valuation,
                };
                info!(
                    stock = %stock,
                    price = fundamentals.current_price,
                    buy_target = valuation.buy_price_target,
                    "Match found"
                );
                self.state.matches.lock().await.push((index, matched.clone()));
                self.observer.on_match(&matched);
                None
            }
            Err(reason) => {
                let counter = match reason {
                    SkipReason::MissingData => &self.state.missing_data,
                    SkipReason::InvalidValuationInput => &self.state.invalid_valuation,
                    SkipReason::FilteredOut(_) => &self.state.filtered_out,
                };
                counter.fetch_add(1, Ordering::SeqCst);
                debug!(stock = %stock.id, reason = ?reason, "Skipped");
                Some(reason)
            }
        };

        self.observer.on_stock_processed(stock, skip);
    }
}

/// Runs value scans over a universe of stocks.
pub struct ScanOrchestrator {
    fundamentals: Arc<dyn FundamentalsProvider>,
    observer: Arc<dyn ScanObserver>,
    filters: FilterConfiguration,
    scan: ScanConfig,
}

impl ScanOrchestrator {
    pub fn new(
        fundamentals: Arc<dyn FundamentalsProvider>,
        filters: FilterConfiguration,
        scan: ScanConfig,
    ) -> Self {
        Self {
            fundamentals,
            observer: Arc::new(NoopObserver),
            filters,
            scan,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ScanObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// List the universe, apply `target_symbols` and `limit`, then run to
    /// completion.
    pub async fn scan(&self, universe: &dyn UniverseProvider) -> Result<ScanOutcome, ScanError> {
        self.scan_with_stop(universe, &StopSignal::new()).await
    }

    /// Like [`scan`](Self::scan), but lanes stop taking new stocks once
    /// `stop` is raised. The signal belongs to this scan only.
    pub async fn scan_with_stop(
        &self,
        universe: &dyn UniverseProvider,
        stop: &StopSignal,
    ) -> Result<ScanOutcome, ScanError> {
        self.check_config()?;

        info!(provider = universe.name(), "Listing universe");
        let stocks = universe
            .list_universe()
            .await
            .map_err(ScanError::ProviderUnavailable)?;

        let scoped = self.scope(stocks);
        Ok(self.run_with_stop(scoped, stop).await)
    }

    /// Restrict a universe to the configured target symbols and limit,
    /// preserving universe order.
    pub fn scope(&self, universe: Vec<StockIdentity>) -> Vec<StockIdentity> {
        let listed = universe.len();
        let targets: HashSet<&str> = self.scan.target_symbols.iter().map(|s| s.trim()).collect();

        let scoped: Vec<StockIdentity> = universe
            .into_iter()
            .filter(|s| targets.is_empty() || targets.contains(s.id.as_str()))
            .take(self.scan.limit.unwrap_or(usize::MAX))
            .collect();

        if scoped.len() != listed {
            info!(listed, scoped = scoped.len(), "Universe scoped");
        }
        if !targets.is_empty() && scoped.len() < targets.len() {
            warn!(
                requested = targets.len(),
                found = scoped.len(),
                "Some target symbols are not in the universe"
            );
        }
        scoped
    }

    /// Scan an already-listed universe.
    pub async fn run(&self, universe: Vec<StockIdentity>) -> ScanOutcome {
        self.run_with_stop(universe, &StopSignal::new()).await
    }

    pub async fn run_with_stop(&self, universe: Vec<StockIdentity>, stop: &StopSignal) -> ScanOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();
        let id = format!("scan-{}", started_at.format("%Y%m%d-%H%M%S"));
        let total = universe.len();

        info!(
            scan_id = %id,
            stocks = total,
            workers = self.scan.workers,
            filters = %self.filters.summary(),
            "Starting value scan"
        );
        self.observer.on_scan_started(total);

        let state = Arc::new(ScanState::default());

        if total > 0 {
            let lane = Lane {
                universe: Arc::new(universe),
                state: Arc::clone(&state),
                provider: Arc::clone(&self.fundamentals),
                observer: Arc::clone(&self.observer),
                valuation: ValuationEngine::new(self.filters.margin_of_safety),
                filter: ScreeningFilter::new(self.filters),
                stop: stop.clone(),
                fetch_timeout: Duration::from_millis(self.scan.fetch_timeout_ms),
                pacing: self.scan.pacing.clone(),
            };

            let lanes = self.scan.workers.clamp(1, total);
            let mut join_set = JoinSet::new();
            for lane_id in 0..lanes {
                join_set.spawn(lane.clone().run(lane_id));
            }

            while let Some(joined) = join_set.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "Scan lane terminated abnormally");
                }
            }
        }

        let mut matches = std::mem::take(&mut *state.matches.lock().await);
        matches.sort_by_key(|(index, _)| *index);
        let results: Vec<ScreenedStock> = matches.into_iter().map(|(_, s)| s).collect();

        let processed = state.processed.load(Ordering::SeqCst);
        let completed_at = Utc::now();
        let outcome = ScanOutcome {
            id,
            total_in_universe: total,
            total_processed: processed,
            total_passed: results.len(),
            missing_data: state.missing_data.load(Ordering::SeqCst),
            invalid_valuation: state.invalid_valuation.load(Ordering::SeqCst),
            filtered_out: state.filtered_out.load(Ordering::SeqCst),
            cancelled: stop.is_raised() && processed < total,
            results,
            filters: self.filters,
            started_at,
            completed_at,
            duration_secs: clock.elapsed().as_secs_f64(),
        };

        info!(scan_id = %outcome.id, "{}", outcome.summary());
        self.observer.on_scan_finished(&outcome);
        outcome
    }

    fn check_config(&self) -> Result<(), ScanError> {
        self.scan
            .validate()
            .and_then(|_| self.filters.validate())
            .map_err(|e| ScanError::InvalidConfig(e.to_string()))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{MarketSegment, RawFundamentals};
    use async_trait::async_trait;

    fn good_record() -> FundamentalsRecord {
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

    struct NoData;

    #[async_trait]
    impl FundamentalsProvider for NoData {
        fn name(&self) -> &'static str {
            "none"
        }

        async fn fetch_raw(&self, _stock: &StockIdentity) -> Result<RawFundamentals, ProviderError> {
            Err(ProviderError::DataNotAvailable("none".into()))
        }
    }

    fn engine_and_filter() -> (ValuationEngine, ScreeningFilter) {
        let filters = FilterConfiguration::default();
        (
            ValuationEngine::new(filters.margin_of_safety),
            ScreeningFilter::new(filters),
        )
    }

    #[test]
    fn test_evaluate_stock_paths() {
        let (valuation, filter) = engine_and_filter();

        assert_eq!(
            evaluate_stock(None, &valuation, &filter).unwrap_err(),
            SkipReason::MissingData
        );

        let losing = FundamentalsRecord {
            eps: -1.0,
            ..good_record()
        };
        assert_eq!(
            evaluate_stock(Some(losing), &valuation, &filter).unwrap_err(),
            SkipReason::InvalidValuationInput
        );

        let expensive = FundamentalsRecord {
            current_price: 1000.0,
            ..good_record()
        };
        assert_eq!(
            evaluate_stock(Some(expensive), &valuation, &filter).unwrap_err(),
            SkipReason::FilteredOut(Criterion::PriceBelowBuyTarget)
        );

        let (record, value) = evaluate_stock(Some(good_record()), &valuation, &filter).unwrap();
        assert_eq!(record, good_record());
        assert!(value.buy_price_target > record.current_price);
    }

    #[test]
    fn test_stop_signal_shared_between_clones() {
        let stop = StopSignal::new();
        let clone = stop.clone();
        assert!(!clone.is_raised());
        stop.raise();
        assert!(clone.is_raised());
    }

    #[tokio::test]
    async fn test_raised_resolves_for_waiter_and_late_caller() {
        let stop = StopSignal::new();
        let waiter = {
            let stop = stop.clone();
            tokio::spawn(async move { stop.raised().await })
        };
        tokio::task::yield_now().await;
        stop.raise();
        waiter.await.unwrap();

        // Already raised: returns immediately
        tokio::time::timeout(Duration::from_secs(1), stop.raised())
            .await
            .unwrap();
    }

    #[test]
    fn test_scope_targets_and_limit() {
        let mut scan = ScanConfig::default();
        scan.target_symbols = vec!["2317".into(), " 1101 ".into()];
        let orchestrator = ScanOrchestrator::new(Arc::new(NoData), FilterConfiguration::default(), scan);

        let universe = vec![
            StockIdentity::new("1101", MarketSegment::Listed),
            StockIdentity::new("2317", MarketSegment::Listed),
            StockIdentity::new("2330", MarketSegment::Listed),
        ];
        let ids: Vec<String> = orchestrator.scope(universe.clone()).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1101", "2317"]);

        let mut scan = ScanConfig::default();
        scan.limit = Some(2);
        let orchestrator = ScanOrchestrator::new(Arc::new(NoData), FilterConfiguration::default(), scan);
        let ids: Vec<String> = orchestrator.scope(universe).into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["1101", "2317"]);
    }

    #[tokio::test]
    async fn test_empty_universe() {
        let orchestrator = ScanOrchestrator::new(
            Arc::new(NoData),
            FilterConfiguration::default(),
            ScanConfig::default(),
        );
        let outcome = orchestrator.run(Vec::new()).await;
        assert_eq!(outcome.total_in_universe, 0);
        assert_eq!(outcome.total_processed, 0);
        assert_eq!(outcome.total_passed, 0);
        assert!(outcome.results.is_empty());
        assert!(!outcome.cancelled);
    }

    #[tokio::test]
    async fn test_invalid_config_rejected_before_listing() {
        struct Unreachable;

        #[async_trait]
        impl UniverseProvider for Unreachable {
            fn name(&self) -> &'static str {
                "unreachable"
            }

            async fn list_universe(&self) -> Result<Vec<StockIdentity>, ProviderError> {
                panic!("universe must not be listed with invalid config");
            }
        }

        let mut scan = ScanConfig::default();
        scan.workers = 0;
        let orchestrator = ScanOrchestrator::new(Arc::new(NoData), FilterConfiguration::default(), scan);
        let err = orchestrator.scan(&Unreachable).await.unwrap_err();
        assert!(matches!(err, ScanError::InvalidConfig(_)));
    }
}
