//! CSV report adapter: `trades.csv` and `bars.csv` per run.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::domain::engine::{StrategyRun, StrategyTable};
use crate::domain::error::StratTestError;
use crate::domain::indicator::{IndicatorSeries, IndicatorValue};
use crate::domain::metrics::TradeRecord;
use crate::domain::ohlcv::format_timestamp;
use crate::domain::resample::ResampledBars;
use crate::ports::report_port::ReportPort;

pub const TRADES_FILE: &str = "trades.csv";
pub const BARS_FILE: &str = "bars.csv";

pub struct CsvReportAdapter;

#[derive(Debug, Serialize)]
struct TradeRow {
    key: String,
    direction: i8,
    closed: bool,
    entry_price: Option<f64>,
    exit_price: Option<f64>,
    length: usize,
    exit_time: Option<String>,
    stop_hits: usize,
    log_return: Option<f64>,
    pct_return: Option<f64>,
    cum_log_return: Option<f64>,
    cum_pct_return: Option<f64>,
}

impl From<&TradeRecord> for TradeRow {
    fn from(t: &TradeRecord) -> Self {
        TradeRow {
            key: format_timestamp(t.key),
            direction: t.direction,
            closed: t.is_closed(),
            entry_price: t.entry_price,
            exit_price: t.exit_price,
            length: t.length,
            exit_time: t.exit_time.map(format_timestamp),
            stop_hits: t.stop_hits,
            log_return: t.log_return,
            pct_return: t.pct_return,
            cum_log_return: t.cum_log_return,
            cum_pct_return: t.cum_pct_return,
        }
    }
}

fn report_error(context: &str, e: impl Display) -> StratTestError {
    StratTestError::Report {
        reason: format!("{context}: {e}"),
    }
}

fn cell<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn indicator_headers(series: &IndicatorSeries) -> Vec<String> {
    let name = series.indicator_type.to_string();
    match series.values.first().map(|p| &p.value) {
        Some(IndicatorValue::Bollinger { .. }) => vec![
            format!("{name}.upper"),
            format!("{name}.middle"),
            format!("{name}.lower"),
        ],
        _ => vec![name],
    }
}

fn indicator_cells(series: &IndicatorSeries, i: usize) -> Vec<String> {
    let point = series.values.get(i).filter(|p| p.valid);
    match point.map(|p| &p.value) {
        Some(IndicatorValue::Simple(v)) => vec![v.to_string()],
        Some(IndicatorValue::Bollinger {
            upper,
            middle,
            lower,
        }) => vec![upper.to_string(), middle.to_string(), lower.to_string()],
        None => vec![String::new(); indicator_headers(series).len()],
    }
}

/// Writes one row per trade record.
pub fn write_trades(path: &Path, trades: &[TradeRecord]) -> Result<(), StratTestError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error("trades.csv", e))?;
    for trade in trades {
        wtr.serialize(TradeRow::from(trade))
            .map_err(|e| report_error("trades.csv", e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes the full per-bar table.
pub fn write_table(path: &Path, table: &StrategyTable) -> Result<(), StratTestError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error("bars.csv", e))?;
    let indicators = table.indicators.iter_sorted();

    let mut header: Vec<String> = ["timestamp", "open", "high", "low", "close", "volume"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(table.aux.keys().cloned());
    for series in &indicators {
        header.extend(indicator_headers(series));
    }
    header.extend(
        [
            "signal",
            "new_position",
            "action",
            "stop_hit",
            "stop_price",
            "trade_group",
            "basis",
            "execution_price",
            "execution_time",
            "gross_log_return",
            "strategy_log_return",
            "cumulative_pct_return",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    wtr.write_record(&header)
        .map_err(|e| report_error("bars.csv", e))?;

    let pos = &table.position;
    let exec = &table.execution;
    let rets = &table.returns;
    for (i, bar) in table.bars.iter().enumerate() {
        let mut row = vec![
            format_timestamp(bar.timestamp),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            cell(bar.volume),
        ];
        row.extend(table.aux.values().map(|col| cell(col.get(i))));
        for series in &indicators {
            row.extend(indicator_cells(series, i));
        }
        row.extend([
            pos.signal[i].to_string(),
            pos.new_position[i].to_string(),
            pos.action[i].as_str().to_string(),
            pos.stop_hit[i].to_string(),
            cell(pos.stop_price[i]),
            cell(table.trade_group[i].map(format_timestamp)),
            cell(exec.basis[i]),
            cell(exec.execution_price[i]),
            cell(exec.execution_time[i].map(format_timestamp)),
            cell(rets.gross_log_return[i]),
            cell(rets.strategy_log_return[i]),
            cell(rets.cumulative_pct_return[i]),
        ]);
        wtr.write_record(&row)
            .map_err(|e| report_error("bars.csv", e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// Writes resampled bars and their auxiliary columns.
pub fn write_resampled(path: &Path, resampled: &ResampledBars) -> Result<(), StratTestError> {
    let mut wtr = csv::Writer::from_path(path).map_err(|e| report_error("resample", e))?;

    let mut header: Vec<String> = ["timestamp", "open", "high", "low", "close", "volume"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend(resampled.aux.keys().cloned());
    wtr.write_record(&header)
        .map_err(|e| report_error("resample", e))?;

    for (i, bar) in resampled.bars.iter().enumerate() {
        let mut row = vec![
            format_timestamp(bar.timestamp),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            cell(bar.volume),
        ];
        row.extend(resampled.aux.values().map(|col| cell(col.get(i))));
        wtr.write_record(&row)
            .map_err(|e| report_error("resample", e))?;
    }
    wtr.flush()?;
    Ok(())
}

impl ReportPort for CsvReportAdapter {
    fn write(&self, run: &StrategyRun, output_dir: &Path) -> Result<(), StratTestError> {
        fs::create_dir_all(output_dir)?;
        write_trades(&output_dir.join(TRADES_FILE), &run.trades)?;
        write_table(&output_dir.join(BARS_FILE), &run.table)?;
        tracing::info!(dir = %output_dir.display(), trades = run.trades.len(), "report written");
        Ok(())
    }
}
