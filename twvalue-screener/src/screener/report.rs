//! Report generation for scan results.
//!
//! Formats:
//! - Table (plain aligned text for the terminal)
//! - Markdown (with a summary header, for saving)
//! - JSON (the serialized outcome, for programmatic use)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::engine::{ScanOutcome, ScreenedStock};

/// Rendered when no stock passed.
pub const NO_MATCHES_MESSAGE: &str = "No stocks matched all screening criteria.";

// ============================================================================
// Report Format
// ============================================================================

/// Supported report formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Aligned plain-text table
    #[default]
    Table,
    /// Markdown document
    Markdown,
    /// Pretty-printed JSON
    Json,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Table => "txt",
            Self::Markdown => "md",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Table => write!(f, "table"),
            Self::Markdown => write!(f, "markdown"),
            Self::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" | "text" | "txt" => Ok(Self::Table),
            "markdown" | "md" => Ok(Self::Markdown),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown report format: {}", s)),
        }
    }
}

// ============================================================================
// Rows
// ============================================================================

fn pct(v: f64) -> String {
    format!("{:.2}%", v * 100.0)
}

fn num(v: f64) -> String {
    format!("{:.2}", v)
}

/// Column headers; the buy target column carries the margin of safety.
fn headers(margin_of_safety: f64) -> Vec<String> {
    vec![
        "Stock".into(),
        "Name".into(),
        "Price".into(),
        format!("Buy@{:.0}%", margin_of_safety * 100.0),
        "Intrinsic".into(),
        "ROE".into(),
        "RevGrowth".into(),
        "DivYield".into(),
        "D/E".into(),
        "CurrentRatio".into(),
        "EPS".into(),
        "BVPS".into(),
    ]
}

fn row(s: &ScreenedStock) -> Vec<String> {
    let f = &s.fundamentals;
    vec![
        s.stock.id.clone(),
        s.stock.name.clone().unwrap_or_else(|| "-".into()),
        num(f.current_price),
        num(s.valuation.buy_price_target),
        num(s.valuation.intrinsic_value),
        pct(f.return_on_equity),
        pct(f.revenue_growth),
        pct(f.dividend_yield),
        num(f.debt_to_equity),
        num(f.current_ratio),
        num(f.eps),
        num(f.book_value_per_share),
    ]
}

// ============================================================================
// Scan Report
// ============================================================================

/// Report generator for a finished scan.
pub struct ScanReport<'a> {
    outcome: &'a ScanOutcome,
}

impl<'a> ScanReport<'a> {
    pub fn new(outcome: &'a ScanOutcome) -> Self {
        Self { outcome }
    }

    /// Generate report in the specified format.
    pub fn generate(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Table => Ok(self.to_table()),
            ReportFormat::Markdown => Ok(self.to_markdown()),
            ReportFormat::Json => self.to_json(),
        }
    }

    /// Save report to file. A path without an extension gets one from the
    /// format; `~` is expanded and missing directories are created.
    pub fn save_to_file(&self, path: &Path, format: ReportFormat) -> Result<PathBuf> {
        let expanded = twvalue_common::config::expand_path(&path.to_string_lossy());
        let file_path = if expanded.extension().is_none() {
            expanded.with_extension(format.extension())
        } else {
            expanded
        };

        if let Some(parent) = file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create report directory")?;
        }

        let content = self.generate(format)?;
        std::fs::write(&file_path, content).context("Failed to write report file")?;

        Ok(file_path)
    }

    /// Plain aligned table, or the no-matches message.
    pub fn to_table(&self) -> String {
        if self.outcome.total_passed == 0 {
            return format!("{}\n", NO_MATCHES_MESSAGE);
        }

        let headers = headers(self.outcome.filters.margin_of_safety);
        let rows: Vec<Vec<String>> = self.outcome.results.iter().map(row).collect();

        let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
        for r in &rows {
            for (w, cell) in widths.iter_mut().zip(r) {
                *w = (*w).max(cell.chars().count());
            }
        }

        // Text columns left-aligned, numbers right-aligned
        let render = |cells: &[String]| -> String {
            cells
                .iter()
                .zip(&widths)
                .enumerate()
                .map(|(i, (cell, &w))| {
                    let pad = w.saturating_sub(cell.chars().count());
                    if i < 2 {
                        format!("{}{}", cell, " ".repeat(pad))
                    } else {
                        format!("{}{}", " ".repeat(pad), cell)
                    }
                })
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = String::new();
        out.push_str(&render(&headers));
        out.push('\n');
        out.push_str(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("  "));
        out.push('\n');
        for r in &rows {
            out.push_str(&render(r));
            out.push('\n');
        }
        out
    }

    /// Markdown report with summary header.
    pub fn to_markdown(&self) -> String {
        let o = self.outcome;
        let mut md = String::new();

        md.push_str("# Taiwan Value Screen\n\n");
        md.push_str(&format!(
            "**Scan ID**: {}\n**Completed**: {}\n**Duration**: {:.1}s\n\n",
            o.id,
            o.completed_at.format("%Y-%m-%d %H:%M:%S UTC"),
            o.duration_secs
        ));

        md.push_str("## Summary\n\n");
        md.push_str(&format!("- **Universe**: {} stocks\n", o.total_in_universe));
        md.push_str(&format!("- **Processed**: {}\n", o.total_processed));
        md.push_str(&format!("- **Passed**: {}\n", o.total_passed));
        md.push_str(&format!(
            "- **Skipped**: {} missing data, {} invalid valuation, {} filtered out\n",
            o.missing_data, o.invalid_valuation, o.filtered_out
        ));
        md.push_str(&format!("- **Criteria**: {}\n", o.filters.summary()));
        if o.cancelled {
            md.push_str("- **Note**: scan was cancelled, results are partial\n");
        }
        md.push('\n');

        md.push_str("## Matches\n\n");
        if o.total_passed == 0 {
            md.push_str(NO_MATCHES_MESSAGE);
            md.push('\n');
            return md;
        }

        let headers = headers(o.filters.margin_of_safety);
        md.push_str(&format!("| {} |\n", headers.join(" | ")));
        md.push_str(&format!("|{}\n", "---|".repeat(headers.len())));
        for s in &o.results {
            md.push_str(&format!("| {} |\n", row(s).join(" | ")));
        }

        md
    }

    /// Serialized outcome.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self.outcome).context("Failed to serialize scan outcome")
    }
}

// ============================================================================
// Tests
// ============================================================================
