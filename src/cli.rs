//! CLI definition and dispatch.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::{write_resampled, CsvReportAdapter};
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::config_validation::{load_engine_config, parse_aux_rules, EngineConfig};
use crate::domain::engine::{run_backtest, run_live, EngineMode, StrategyRun};
use crate::domain::error::StratTestError;
use crate::domain::metrics::Summary;
use crate::domain::resample::{resample, ResampleSpec};
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "strattest", about = "Trading strategy backtest and signal engine")]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a strategy from an INI config
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory for trades.csv and bars.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate a config and its strategy parameters
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Resample a tick CSV into bars
    Resample {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        frequency: String,
        #[arg(short, long)]
        output: PathBuf,
        /// Auxiliary column rules, e.g. `bid_size:mean,ask_size:last`
        #[arg(long)]
        aux_rules: Option<String>,
    },
}

/// Installs the global subscriber; `RUST_LOG` overrides the default level.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .with(filter)
        .init();
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run { config, output } => run_engine(&config, output.as_deref()),
        Command::Validate { config } => run_validate(&config),
        Command::Resample {
            input,
            frequency,
            output,
            aux_rules,
        } => run_resample(&input, &frequency, &output, aux_rules.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

fn load_config(path: &Path) -> Result<EngineConfig, StratTestError> {
    tracing::info!(path = %path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(path)?;
    load_engine_config(&adapter)
}

/// `run`: loads the configured data, runs it and prints the summary.
pub fn run_engine(config_path: &Path, output: Option<&Path>) -> Result<(), StratTestError> {
    let config = load_config(config_path)?;
    let data = CsvAdapter::new(config.data_path.clone());

    let run = execute(&config, &data)?;
    print_summary(&config, &run);

    if let Some(dir) = output {
        CsvReportAdapter.write(&run, dir)?;
        eprintln!("\nReport written to: {}", dir.display());
    }
    Ok(())
}

/// Loads data through `data` and runs the configured mode.
pub fn execute(config: &EngineConfig, data: &dyn DataPort) -> Result<StrategyRun, StratTestError> {
    match (config.mode, &config.resample) {
        (EngineMode::Backtest, Some(spec)) => run_backtest(&data.fetch_ticks()?, spec, &config.run),
        (EngineMode::Backtest, None) => Err(StratTestError::ConfigMissing {
            section: "data".into(),
            key: "frequency".into(),
        }),
        (EngineMode::Live, _) => run_live(data.fetch_bars()?, &config.run),
    }
}

pub fn run_validate(config_path: &Path) -> Result<(), StratTestError> {
    let config = load_config(config_path)?;
    eprintln!("Config validated successfully");
    eprintln!("  Mode:      {}", config.mode);
    eprintln!("  Strategy:  {}", config.run.strategy);
    eprintln!("  Timing:    {}", config.run.timing);
    eprintln!("  Data:      {}", config.data_path.display());
    if let Some(spec) = &config.resample {
        eprintln!("  Frequency: {}", spec.frequency);
    }

    let indicators = config.run.strategy.required_indicators();
    if !indicators.is_empty() {
        eprintln!("\nIndicators to compute:");
        for ind in &indicators {
            eprintln!("  {}", ind);
        }
    }
    Ok(())
}

/// `resample`: ticks CSV in, bars CSV out.
pub fn run_resample(
    input: &Path,
    frequency: &str,
    output: &Path,
    aux_rules: Option<&str>,
) -> Result<(), StratTestError> {
    let mut spec = ResampleSpec::new(frequency.parse()?);
    if let Some(rules) = aux_rules {
        for (column, rule) in parse_aux_rules(rules)? {
            spec = spec.with_rule(&column, rule);
        }
    }

    let ticks = CsvAdapter::new(input.to_path_buf()).fetch_ticks()?;
    let resampled = resample(&ticks, &spec)?;
    write_resampled(output, &resampled)?;
    eprintln!(
        "Resampled {} ticks into {} bars at {} -> {}",
        ticks.ticks.len(),
        resampled.bars.len(),
        spec.frequency,
        output.display()
    );
    Ok(())
}

fn pct(value: f64) -> String {
    if value.is_nan() {
        "n/a".to_string()
    } else {
        format!("{:.2}%", value * 100.0)
    }
}

fn print_summary(config: &EngineConfig, run: &StrategyRun) {
    let Summary {
        closed_trades,
        open_trades,
        win_rate,
        avg_return,
        best_return,
        worst_return,
        cumulative_return,
        avg_trade_length,
        stop_exits,
        max_drawdown,
        ..
    } = run.summary;

    eprintln!("\n=== {} ({}) ===", config.run.strategy, config.mode);
    eprintln!("Bars:             {}", run.table.len());
    eprintln!("Closed Trades:    {}", closed_trades);
    eprintln!("Open Trades:      {}", open_trades);
    eprintln!("Win Rate:         {:.1}%", win_rate * 100.0);
    eprintln!("Avg Return:       {}", pct(avg_return));
    eprintln!("Best Trade:       {}", pct(best_return));
    eprintln!("Worst Trade:      {}", pct(worst_return));
    eprintln!("Cumulative:       {}", pct(cumulative_return));
    eprintln!("Avg Length:       {:.1} bars", avg_trade_length);
    eprintln!("Stop Exits:       {}", stop_exits);
    eprintln!("Max Drawdown:     -{:.1}%", max_drawdown * 100.0);
}
