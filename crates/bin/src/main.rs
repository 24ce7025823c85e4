//! Hobart CLI binary.
//!
//! Runs the portfolio pipeline over CSV price and factor history.

use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use hobart::data::{MarketData, load_market_data};
use hobart::output::{ExportFormat, Exporter, ReportBuilder, TextTable, position_records};
use hobart::{Pipeline, PipelineConfig};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hobart")]
#[command(about = "Hobart: factor-model portfolio construction and backtesting", long_about = None)]
#[command(version)]
struct Cli {
    /// Pipeline configuration (JSON); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Long-format price history: date,symbol,price,market_cap[,...]
    #[arg(long, global = true)]
    prices: Option<PathBuf>,

    /// Wide-format factor returns: date,<factor>,...
    #[arg(long, global = true)]
    factors: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest the pipeline and attribute the final book
    Backtest {
        /// Directory for history, positions, attribution and report files
        #[arg(long)]
        output: Option<PathBuf>,

        /// Output format for the console summary
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Construct a target portfolio for one date
    Construct {
        /// Decision date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Markdown,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("--{0} is required for this command")]
    MissingInput(&'static str),

    #[error("backtest aborted: {0}")]
    Aborted(String),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };

    match cli.command {
        Commands::Config => {
            println!("{}", config.to_json()?);
            Ok(())
        }
        Commands::Backtest { output, format } => {
            let data = load(cli.prices.as_deref(), cli.factors.as_deref())?;
            backtest(config, &data, output.as_deref(), format)
        }
        Commands::Construct { date, format } => {
            let data = load(cli.prices.as_deref(), cli.factors.as_deref())?;
            construct(config, &data, date, format)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn spinner(message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} {msg} [{elapsed}]")
    {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

fn load(
    prices: Option<&Path>,
    factors: Option<&Path>,
) -> Result<MarketData, Box<dyn std::error::Error>> {
    let prices = prices.ok_or(CliError::MissingInput("prices"))?;
    let factors = factors.ok_or(CliError::MissingInput("factors"))?;
    let data = load_market_data(prices, factors)?;
    tracing::info!(
        assets = data.assets().len(),
        factors = data.factors().n_factors(),
        periods = data.factors().n_periods(),
        "market data loaded"
    );
    Ok(data)
}

fn backtest(
    config: PipelineConfig,
    data: &MarketData,
    output: Option<&Path>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config)?;

    let pb = spinner("Running backtest...");
    let report = match pipeline.run_backtest(data) {
        Ok(report) => report,
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };
    pb.finish_with_message(format!(
        "Backtest finished: {} days, {} rebalances",
        report.history.len(),
        report.summary.rebalances
    ));

    if let hobart::backtest::RunOutcome::Aborted(error) = &report.outcome {
        return Err(CliError::Aborted(error.to_string()).into());
    }

    let attribution = pipeline.attribute_backtest(data, &report)?;

    match format {
        OutputFormat::Text => {
            println!("{}", report.to_ascii_table());
            if let Some(attribution) = &attribution {
                println!("{}", attribution.to_ascii_table());
            }
        }
        OutputFormat::Markdown => {
            println!("{}", report.to_markdown());
            if let Some(attribution) = &attribution {
                println!("{}", attribution.to_markdown());
            }
        }
        OutputFormat::Json => println!("{}", report.export_to_string(ExportFormat::PrettyJson)?),
    }

    if let Some(dir) = output {
        std::fs::create_dir_all(dir)?;
        report.export_to_file(&dir.join("history.csv"), ExportFormat::Csv)?;
        position_records(&report).export_to_file(&dir.join("positions.csv"), ExportFormat::Csv)?;
        report
            .summary
            .export_to_file(&dir.join("summary.json"), ExportFormat::PrettyJson)?;

        let mut builder = ReportBuilder::new()
            .title("hobart backtest")
            .section("config", pipeline.config())?
            .section("outcome", &report.outcome)?
            .section("summary", &report.summary)?;
        if let Some(attribution) = &attribution {
            attribution.export_to_file(&dir.join("attribution.csv"), ExportFormat::Csv)?;
            builder = builder.section("attribution", &attribution.factors())?;
        }
        builder.build().write(&dir.join("report.json"))?;
        tracing::info!(dir = %dir.display(), "results written");
    }
    Ok(())
}

fn construct(
    config: PipelineConfig,
    data: &MarketData,
    date: NaiveDate,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = Pipeline::new(config)?;

    let pb = spinner("Constructing portfolio...");
    let construction = match pipeline.construct(data, date) {
        Ok(construction) => construction,
        Err(e) => {
            pb.finish_with_message("Failed!");
            return Err(e.into());
        }
    };
    pb.finish_with_message(format!(
        "Constructed {} positions",
        construction.portfolio.holdings.len()
    ));

    let portfolio = &construction.portfolio;
    match format {
        OutputFormat::Text => println!("{}", portfolio.to_ascii_table()),
        OutputFormat::Markdown => println!("{}", portfolio.to_markdown()),
        OutputFormat::Json => println!("{}", portfolio.export_to_string(ExportFormat::PrettyJson)?),
    }
    if let Some(status) = construction.status {
        println!("Solver status: {status}");
    }
    Ok(())
}
