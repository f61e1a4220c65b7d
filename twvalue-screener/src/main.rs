//! twvalue - Taiwan equities value screener.

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use twvalue_common::config::{config_path, expand_path};
use twvalue_common::logging::init_logging;
use twvalue_common::Config;
use twvalue_screener::data::{FinMindUniverse, YahooFundamentals};
use twvalue_screener::screener::{
    MatchPrinter, ProgressObserver, ReportFormat, ScanObserver, ScanOrchestrator, ScanReport,
    StopSignal,
};

/// Screen Taiwan stocks with Graham valuation and quality filters.
#[derive(Parser, Debug)]
#[command(name = "twvalue")]
#[command(version)]
#[command(about = "Graham-style value screener for Taiwan listed and OTC stocks", long_about = None)]
struct Cli {
    /// Config file (default: ~/.twvalue/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan the universe and print matching stocks
    Scan(ScanArgs),

    /// Show the effective configuration (secrets redacted)
    Config,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    /// Only scan these stock ids (comma separated, e.g. 2330,2317)
    #[arg(long, value_delimiter = ',')]
    symbols: Vec<String>,

    /// Only scan the first N stocks of the universe
    #[arg(long)]
    limit: Option<usize>,

    /// Concurrent lanes
    #[arg(short, long)]
    workers: Option<usize>,

    /// Report format (table, markdown, json)
    #[arg(short, long)]
    format: Option<ReportFormat>,

    /// Also save the report to this path
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable the progress bar
    #[arg(long)]
    no_progress: bool,

    /// Buy target as a fraction of intrinsic value, in (0, 1]
    #[arg(long)]
    margin_of_safety: Option<f64>,

    /// Minimum return on equity (fraction)
    #[arg(long)]
    roe_min: Option<f64>,

    /// Maximum debt to equity (fraction)
    #[arg(long)]
    de_max: Option<f64>,

    /// Minimum current ratio
    #[arg(long)]
    current_ratio_min: Option<f64>,

    /// Minimum dividend yield (fraction)
    #[arg(long)]
    dividend_yield_min: Option<f64>,

    /// Minimum revenue growth (fraction)
    #[arg(long)]
    revenue_growth_min: Option<f64>,
}

impl ScanArgs {
    /// Command-line flags win over file and environment.
    fn apply_to(&self, config: &mut Config) {
        if !self.symbols.is_empty() {
            config.scan.target_symbols = self
                .symbols
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(limit) = self.limit {
            config.scan.limit = Some(limit);
        }
        if let Some(workers) = self.workers {
            config.scan.workers = workers;
        }
        if let Some(format) = self.format {
            config.output.format = format.to_string();
        }

        let filters = &mut config.filters;
        let overrides = [
            (self.margin_of_safety, &mut filters.margin_of_safety),
            (self.roe_min, &mut filters.roe_min),
            (self.de_max, &mut filters.debt_to_equity_max),
            (self.current_ratio_min, &mut filters.current_ratio_min),
            (self.dividend_yield_min, &mut filters.dividend_yield_min),
            (self.revenue_growth_min, &mut filters.revenue_growth_min),
        ];
        for (value, field) in overrides {
            if let Some(v) = value {
                *field = v;
            }
        }
    }
}

/// Matches are always announced on stderr; the bar is optional.
fn observer_for(no_progress: bool) -> Arc<dyn ScanObserver> {
    if no_progress {
        Arc::new(MatchPrinter::stderr())
    } else {
        Arc::new(ProgressObserver::new())
    }
}

fn log_level(configured: &str, verbose: u8) -> &str {
    match verbose {
        0 => configured,
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = Config::load_with_env(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(
        log_level(&config.observability.log_level, cli.verbose),
        &config.observability.log_format,
    );

    match cli.command {
        Commands::Scan(args) => {
            args.apply_to(&mut config);
            run_scan(config, &args).await
        }
        Commands::Config => {
            let path = cli.config.unwrap_or_else(config_path);
            println!("# {}", path.display());
            println!("{}", serde_json::to_string_pretty(&config.redacted())?);
            Ok(())
        }
    }
}

async fn run_scan(config: Config, args: &ScanArgs) -> Result<()> {
    config
        .validate()
        .map_err(twvalue_common::Error::from)
        .context("Invalid configuration")?;

    let format: ReportFormat = config
        .output
        .format
        .parse()
        .map_err(twvalue_common::Error::Config)?;

    if config.finmind_token().is_none() {
        warn!("No FinMind token configured, using anonymous quota");
    }

    let universe = FinMindUniverse::from_config(&config);
    let fundamentals = Arc::new(YahooFundamentals::from_config(&config));

    let orchestrator = ScanOrchestrator::new(fundamentals, config.filters, config.scan.clone())
        .with_observer(observer_for(args.no_progress));

    let stop = StopSignal::new();
    let interrupt = {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight requests");
                stop.raise();
            }
        })
    };

    let outcome = orchestrator
        .scan_with_stop(&universe, &stop)
        .await
        .context("Scan failed");
    interrupt.abort();
    let outcome = outcome?;

    let report = ScanReport::new(&outcome);
    print!("{}", report.generate(format)?);
    if format == ReportFormat::Json {
        println!();
    }

    if let Some(output) = &args.output {
        let target = if output.is_relative() && output.parent().map_or(true, |p| p.as_os_str().is_empty()) {
            expand_path(&config.output.report_dir).join(output)
        } else {
            output.clone()
        };
        let written = report.save_to_file(&target, format)?;
        info!(path = %written.display(), "Report saved");
        eprintln!("Report saved to {}", written.display());
    }

    Ok(())
}
