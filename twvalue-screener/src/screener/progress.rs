//! Terminal progress and match notifications.

use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::Duration;

use crate::data::StockIdentity;

use super::engine::{ScanObserver, ScanOutcome, ScreenedStock, SkipReason};

const BAR_TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Progress bar on stderr with inline match notifications.
pub struct ProgressObserver {
    bar: ProgressBar,
}

impl ProgressObserver {
    pub fn new() -> Self {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .map(|style| style.progress_chars("#>-"))
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        Self { bar }
    }
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn match_line(matched: &ScreenedStock) -> String {
    format!(
        "*** {} matches all criteria: price {:.2} < buy target {:.2} (intrinsic {:.2})",
        matched.stock,
        matched.fundamentals.current_price,
        matched.valuation.buy_price_target,
        matched.valuation.intrinsic_value
    )
}

impl ScanObserver for ProgressObserver {
    fn on_scan_started(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(0);
        self.bar.enable_steady_tick(Duration::from_millis(120));
    }

    fn on_stock_processed(&self, stock: &StockIdentity, _skip: Option<SkipReason>) {
        self.bar.set_message(stock.id.clone());
        self.bar.inc(1);
    }

    fn on_match(&self, matched: &ScreenedStock) {
        // println is dropped when the bar is not drawn (stderr not a terminal)
        if self.bar.is_hidden() {
            eprintln!("{}", match_line(matched));
        } else {
            self.bar.println(match_line(matched));
        }
    }

    fn on_scan_finished(&self, outcome: &ScanOutcome) {
        let msg = if outcome.cancelled {
            format!("cancelled, {} matched", outcome.total_passed)
        } else {
            format!("done, {} matched", outcome.total_passed)
        };
        self.bar.finish_with_message(msg);
    }
}

/// Prints one line per match and nothing else. Used without a progress bar.
pub struct MatchPrinter<W = io::Stderr> {
    out: Mutex<W>,
}

impl MatchPrinter {
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }
}

impl<W: Write + Send> MatchPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new(out) }
    }
}

impl<W: Write + Send> ScanObserver for MatchPrinter<W> {
    fn on_match(&self, matched: &ScreenedStock) {
        if let Ok(mut out) = self.out.lock() {
            let _ = writeln!(out, "{}", match_line(matched));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FundamentalsRecord, MarketSegment};
    use crate::valuation::ValuationResult;
    use indicatif::ProgressDrawTarget;

    fn hidden() -> ProgressObserver {
        let observer = ProgressObserver::new();
        observer.bar.set_draw_target(ProgressDrawTarget::hidden());
        observer
    }

    #[test]
    fn test_progress_counts_processed_stocks() {
        let observer = hidden();
        observer.on_scan_started(3);
        let stock = StockIdentity::new("2330", MarketSegment::Listed);
        observer.on_stock_processed(&stock, None);
        observer.on_stock_processed(&stock, Some(SkipReason::MissingData));
        assert_eq!(observer.bar.position(), 2);
    }

    fn sample_match() -> ScreenedStock {
        ScreenedStock {
            stock: StockIdentity::new("1101", MarketSegment::Listed).with_name("台泥"),
            fundamentals: FundamentalsRecord {
                eps: 2.0,
                book_value_per_share: 20.0,
                current_price: 18.0,
                return_on_equity: 0.2,
                debt_to_equity: 0.1,
                current_ratio: 2.0,
                dividend_yield: 0.05,
                revenue_growth: 0.1,
            },
            valuation: ValuationResult {
                intrinsic_value: 30.0,
                buy_price_target: 21.0,
            },
        }
    }

    #[test]
    fn test_match_line() {
        let line = match_line(&sample_match());
        assert!(line.contains("1101 台泥"));
        assert!(line.contains("18.00 < buy target 21.00"));
    }

    #[test]
    fn test_match_printer_writes_one_line_per_match() {
        let printer = MatchPrinter::new(Vec::new());
        let stock = StockIdentity::new("2330", MarketSegment::Listed);
        printer.on_scan_started(2);
        printer.on_stock_processed(&stock, Some(SkipReason::MissingData));
        printer.on_match(&sample_match());
        printer.on_match(&sample_match());

        let out = String::from_utf8(printer.out.into_inner().unwrap()).unwrap();
        assert_eq!(out.lines().count(), 2);
        assert!(out.lines().all(|l| l.starts_with("*** 1101 台泥 matches")));
    }

    #[test]
    fn test_hidden_bar_still_accepts_matches() {
        let observer = hidden();
        observer.on_scan_started(1);
        observer.on_match(&sample_match());
        assert_eq!(observer.bar.position(), 0);
    }
}
