//! Pipeline driver: bars in, strategy table, trades and summary out.
//!
//! `backtest` mode resamples ticks first; `live` mode takes bars that are
//! already at the target frequency. Both share [`run_strategy`].

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::error::StratTestError;
use super::execution::{
    execution_columns, gross_returns, ExecutionColumns, ExecutionTiming, ReturnColumns,
};
use super::indicator::{compute_indicators, IndicatorSet};
use super::metrics::{trade_records, Summary, TradeRecord};
use super::ohlcv::{ensure_strictly_increasing, Bar};
use super::resample::{resample, ResampleSpec, TickSeries};
use super::signal::{generate, PositionState};
use super::stop_loss::apply_stop_loss;
use super::strategy::Strategy;
use super::trade_group::{group_keys, scan_trade_spans};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineMode {
    #[default]
    Backtest,
    Live,
}

impl FromStr for EngineMode {
    type Err = StratTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "backtest" => Ok(EngineMode::Backtest),
            "live" => Ok(EngineMode::Live),
            other => Err(StratTestError::ConfigInvalid {
                section: "engine".to_string(),
                key: "mode".to_string(),
                reason: format!("expected 'backtest' or 'live', got '{other}'"),
            }),
        }
    }
}

impl fmt::Display for EngineMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            EngineMode::Backtest => "backtest",
            EngineMode::Live => "live",
        })
    }
}

/// Everything one strategy run needs besides the data.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub strategy: Strategy,
    pub timing: ExecutionTiming,
    pub cost_bps: f64,
    /// Trailing stop distance; 0 disables the stop.
    pub stop_loss_bps: f64,
}

impl RunConfig {
    pub fn new(strategy: Strategy) -> Self {
        RunConfig {
            strategy,
            timing: ExecutionTiming::default(),
            cost_bps: 0.0,
            stop_loss_bps: 0.0,
        }
    }

    fn validate(&self) -> Result<(), StratTestError> {
        for (key, value) in [("cost_bps", self.cost_bps), ("stop_loss_bps", self.stop_loss_bps)] {
            if !value.is_finite() || value < 0.0 {
                return Err(StratTestError::InvalidParameter {
                    strategy: self.strategy.name().to_string(),
                    key: key.to_string(),
                    reason: format!("must be a non-negative number, got {value}"),
                });
            }
        }
        Ok(())
    }
}

/// The per-bar table every stage adds columns to.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StrategyTable {
    pub bars: Vec<Bar>,
    pub aux: BTreeMap<String, Vec<f64>>,
    pub indicators: IndicatorSet,
    pub position: PositionState,
    /// Entry timestamp of the trade group each bar belongs to.
    pub trade_group: Vec<Option<NaiveDateTime>>,
    pub execution: ExecutionColumns,
    pub returns: ReturnColumns,
}

impl StrategyTable {
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRun {
    pub table: StrategyTable,
    pub trades: Vec<TradeRecord>,
    pub summary: Summary,
}

/// Runs indicators, signals, stop-loss, execution and aggregation over `bars`.
pub fn run_strategy(bars: Vec<Bar>, config: &RunConfig) -> Result<StrategyRun, StratTestError> {
    run_with_aux(bars, BTreeMap::new(), config)
}

/// Live mode: bars are already at the target frequency.
pub fn run_live(bars: Vec<Bar>, config: &RunConfig) -> Result<StrategyRun, StratTestError> {
    run_strategy(bars, config)
}

/// Backtest mode: resamples ticks before running the strategy.
pub fn run_backtest(
    ticks: &TickSeries,
    spec: &ResampleSpec,
    config: &RunConfig,
) -> Result<StrategyRun, StratTestError> {
    config.validate()?;
    let resampled = resample(ticks, spec)?;
    tracing::info!(
        ticks = ticks.ticks.len(),
        bars = resampled.bars.len(),
        frequency = %spec.frequency,
        "resampled ticks"
    );
    run_with_aux(resampled.bars, resampled.aux, config)
}

fn run_with_aux(
    bars: Vec<Bar>,
    aux: BTreeMap<String, Vec<f64>>,
    config: &RunConfig,
) -> Result<StrategyRun, StratTestError> {
    config.validate()?;
    ensure_strictly_increasing(bars.iter().map(|b| b.timestamp))?;

    let strategy = &config.strategy;
    tracing::info!(strategy = %strategy, bars = bars.len(), timing = %config.timing, "running strategy");

    let indicators = compute_indicators(&bars, &strategy.required_indicators());
    let provisional = generate(strategy, &bars, &indicators);
    let position = apply_stop_loss(&bars, &provisional, config.stop_loss_bps)?;

    let spans = scan_trade_spans(&position.signal, &position.new_position);
    let trade_group = group_keys(&bars, &spans);
    let execution = execution_columns(&bars, &position, config.timing, config.cost_bps);
    let returns = gross_returns(&execution.basis, &position.signal);

    let trades = trade_records(&bars, &position, &spans, &execution);
    let summary = Summary::compute(&trades, &returns);
    tracing::info!(
        closed = summary.closed_trades,
        open = summary.open_trades,
        stop_exits = summary.stop_exits,
        "strategy run complete"
    );

    Ok(StrategyRun {
        table: StrategyTable {
            bars,
            aux,
            indicators,
            position,
            trade_group,
            execution,
            returns,
        },
        trades,
        summary,
    })
}
