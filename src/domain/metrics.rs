//! Trade records and summary statistics.

use chrono::NaiveDateTime;

use super::execution::{ExecutionColumns, ReturnColumns};
use super::ohlcv::Bar;
use super::signal::PositionState;
use super::trade_group::TradeSpan;

/// One trade group, from entry event to closing event.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    /// Timestamp of the entry bar.
    pub key: NaiveDateTime,
    pub entry_index: usize,
    pub exit_index: Option<usize>,
    pub direction: i8,
    pub entry_price: Option<f64>,
    pub exit_price: Option<f64>,
    /// Bars covered, counting both the entry and the exit bar.
    pub length: usize,
    pub exit_time: Option<NaiveDateTime>,
    pub stop_hits: usize,
    pub log_return: Option<f64>,
    pub pct_return: Option<f64>,
    pub cum_log_return: Option<f64>,
    pub cum_pct_return: Option<f64>,
}

impl TradeRecord {
    pub fn is_closed(&self) -> bool {
        self.exit_index.is_some()
    }

    pub fn exited_on_stop(&self) -> bool {
        self.stop_hits > 0
    }
}

fn log_ratio(entry: Option<f64>, exit: Option<f64>) -> Option<f64> {
    let (entry, exit) = (entry?, exit?);
    if entry > 0.0 && exit > 0.0 && entry.is_finite() && exit.is_finite() {
        Some((exit / entry).ln())
    } else {
        None
    }
}

/// Builds one record per span, in entry order.
pub fn trade_records(
    bars: &[Bar],
    state: &PositionState,
    spans: &[TradeSpan],
    exec: &ExecutionColumns,
) -> Vec<TradeRecord> {
    let n = bars.len();
    let mut cum_log = 0.0;

    spans
        .iter()
        .map(|span| {
            let entry_price = exec.execution_price[span.start];
            let (exit_price, exit_time) = match span.exit {
                Some(x) => (exec.execution_price[x], exec.execution_time[x]),
                None => (None, None),
            };
            let last = span.exit.map_or(n, |x| x + 1);
            let stop_hits = state.stop_hit[span.start..last]
                .iter()
                .filter(|&&hit| hit)
                .count();

            let log_return = if span.is_closed() {
                log_ratio(entry_price, exit_price)
            } else {
                None
            };
            let (cum_log_return, cum_pct_return) = match log_return {
                Some(r) => {
                    cum_log += r;
                    (Some(cum_log), Some(cum_log.exp() - 1.0))
                }
                None => (None, None),
            };

            TradeRecord {
                key: bars[span.start].timestamp,
                entry_index: span.start,
                exit_index: span.exit,
                direction: span.direction,
                entry_price,
                exit_price,
                length: span.length(n),
                exit_time,
                stop_hits,
                log_return,
                pct_return: log_return.map(|r| r.exp() - 1.0),
                cum_log_return,
                cum_pct_return,
            }
        })
        .collect()
}

/// Aggregate statistics over closed trades and the gross return curve.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub closed_trades: usize,
    pub open_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    /// Mean per-trade % return; NaN when no trade closed.
    pub avg_return: f64,
    pub best_return: f64,
    pub worst_return: f64,
    /// Final cumulative % return over closed trades; NaN when none closed.
    pub cumulative_return: f64,
    pub avg_trade_length: f64,
    pub stop_exits: usize,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
}

impl Summary {
    pub fn compute(trades: &[TradeRecord], returns: &ReturnColumns) -> Self {
        let closed: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_closed()).collect();
        let open_trades = trades.len() - closed.len();
        let pct: Vec<f64> = closed.iter().filter_map(|t| t.pct_return).collect();

        let trades_won = pct.iter().filter(|&&r| r > 0.0).count();
        let trades_lost = pct.iter().filter(|&&r| r < 0.0).count();
        let win_rate = if pct.is_empty() {
            0.0
        } else {
            trades_won as f64 / pct.len() as f64
        };

        let (avg_return, best_return, worst_return) = if pct.is_empty() {
            (f64::NAN, f64::NAN, f64::NAN)
        } else {
            let sum: f64 = pct.iter().sum();
            (
                sum / pct.len() as f64,
                pct.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                pct.iter().copied().fold(f64::INFINITY, f64::min),
            )
        };

        let cumulative_return = closed
            .iter()
            .rev()
            .find_map(|t| t.cum_pct_return)
            .unwrap_or(f64::NAN);

        let avg_trade_length = if closed.is_empty() {
            0.0
        } else {
            closed.iter().map(|t| t.length).sum::<usize>() as f64 / closed.len() as f64
        };

        let equity: Vec<f64> = returns
            .cumulative_pct_return
            .iter()
            .flatten()
            .map(|r| 1.0 + r)
            .collect();
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity);

        Summary {
            closed_trades: closed.len(),
            open_trades,
            trades_won,
            trades_lost,
            win_rate,
            avg_return,
            best_return,
            worst_return,
            cumulative_return,
            avg_trade_length,
            stop_exits: trades.iter().map(|t| t.stop_hits).sum(),
            max_drawdown,
            max_drawdown_duration,
        }
    }
}

/// Largest peak-to-trough fall (as a fraction of the peak) and the longest
/// run of bars spent below a peak.
fn compute_drawdown(equity: &[f64]) -> (f64, usize) {
    let Some(&first) = equity.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for &value in equity {
        if value > peak {
            peak = value;
            current_dd_duration = 0;
        } else if peak > 0.0 && value < peak {
            max_dd = max_dd.max((peak - value) / peak);
            current_dd_duration += 1;
            max_dd_duration = max_dd_duration.max(current_dd_duration);
        }
    }

    (max_dd, max_dd_duration)
}
