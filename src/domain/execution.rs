//! Execution prices and gross returns.
//!
//! Each position-change event trades at a basis price chosen by the
//! [`ExecutionTiming`] convention, adjusted by the transaction cost. Bars
//! without an event carry their close as basis so that gross returns can be
//! computed over the whole table.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDateTime;

use super::error::StratTestError;
use super::ohlcv::Bar;
use super::signal::PositionState;
use super::stop_loss::bps_fraction;

/// When a position-change event is deemed to trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionTiming {
    /// At the open of the bar after the event.
    #[default]
    NextBarOpen,
    /// At the close of the event bar.
    CurrentBarClose,
    /// Entries at their own close, exits at the previous bar's close.
    PreviousBarClose,
}

impl FromStr for ExecutionTiming {
    type Err = StratTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "next-bar-open" => Ok(ExecutionTiming::NextBarOpen),
            "current-bar-close" => Ok(ExecutionTiming::CurrentBarClose),
            "previous-bar-close" | "cheat" => Ok(ExecutionTiming::PreviousBarClose),
            _ => Err(StratTestError::UnsupportedTiming {
                name: s.to_string(),
            }),
        }
    }
}

impl fmt::Display for ExecutionTiming {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExecutionTiming::NextBarOpen => "next-bar-open",
            ExecutionTiming::CurrentBarClose => "current-bar-close",
            ExecutionTiming::PreviousBarClose => "previous-bar-close",
        };
        f.write_str(name)
    }
}

/// Per-bar execution columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionColumns {
    /// Price used for returns; undefined where the timing has no price.
    pub basis: Vec<Option<f64>>,
    /// Defined only on event bars.
    pub execution_price: Vec<Option<f64>>,
    /// Defined only on event bars.
    pub execution_time: Vec<Option<NaiveDateTime>>,
}

/// Per-bar gross return columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReturnColumns {
    pub gross_log_return: Vec<Option<f64>>,
    pub strategy_log_return: Vec<Option<f64>>,
    pub cumulative_pct_return: Vec<Option<f64>>,
}

/// Buys pay more, sells receive less: `price × (1 + change × cost)`.
pub fn apply_transaction_cost(price: f64, change: i8, cost_fraction: f64) -> f64 {
    price * (1.0 + f64::from(change) * cost_fraction)
}

/// Basis price and trade time of bar `i` under `timing`.
fn basis_at(
    bars: &[Bar],
    i: usize,
    change: i8,
    timing: ExecutionTiming,
) -> (Option<f64>, Option<NaiveDateTime>) {
    let bar = &bars[i];
    if change == 0 {
        return (Some(bar.close), None);
    }
    match timing {
        ExecutionTiming::NextBarOpen => match bars.get(i + 1) {
            Some(next) => (Some(next.open), Some(next.timestamp)),
            None => (None, None),
        },
        ExecutionTiming::CurrentBarClose => (Some(bar.close), Some(bar.timestamp)),
        ExecutionTiming::PreviousBarClose if change < 0 => match i.checked_sub(1) {
            Some(p) => (Some(bars[p].close), Some(bars[p].timestamp)),
            None => (None, None),
        },
        ExecutionTiming::PreviousBarClose => (Some(bar.close), Some(bar.timestamp)),
    }
}

/// Computes basis, execution price and execution time for every bar.
pub fn execution_columns(
    bars: &[Bar],
    state: &PositionState,
    timing: ExecutionTiming,
    cost_bps: f64,
) -> ExecutionColumns {
    let cost_fraction = bps_fraction(cost_bps);
    let mut cols = ExecutionColumns {
        basis: Vec::with_capacity(bars.len()),
        execution_price: Vec::with_capacity(bars.len()),
        execution_time: Vec::with_capacity(bars.len()),
    };

    for i in 0..bars.len() {
        let change = state.new_position.get(i).copied().unwrap_or(0);
        let (basis, time) = basis_at(bars, i, change, timing);
        let price = if change != 0 {
            basis.map(|b| apply_transaction_cost(b, change, cost_fraction))
        } else {
            None
        };
        cols.basis.push(basis);
        cols.execution_price.push(price);
        cols.execution_time.push(time);
    }
    cols
}

fn ln_defined(price: Option<f64>) -> Option<f64> {
    price.filter(|p| *p > 0.0 && p.is_finite()).map(f64::ln)
}

/// Gross log returns of the basis series and the strategy's share of them.
pub fn gross_returns(basis: &[Option<f64>], signal: &[i8]) -> ReturnColumns {
    let n = basis.len();
    let gross: Vec<Option<f64>> = (0..n)
        .map(|i| {
            let now = ln_defined(basis[i])?;
            let next = ln_defined(*basis.get(i + 1)?)?;
            Some(next - now)
        })
        .collect();

    let strategy: Vec<Option<f64>> = gross
        .iter()
        .zip(signal)
        .map(|(g, &s)| g.map(|g| g * f64::from(s)))
        .collect();

    let mut running = 0.0;
    let cumulative = strategy
        .iter()
        .map(|r| {
            r.map(|r| {
                running += r;
                running.exp() - 1.0
            })
        })
        .collect();

    ReturnColumns {
        gross_log_return: gross,
        strategy_log_return: strategy,
        cumulative_pct_return: cumulative,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::test_support::ohlc_bars;

    fn sample_bars() -> Vec<Bar> {
        ohlc_bars(&[
            (10.0, 10.5, 9.5, 10.2),
            (10.3, 10.8, 10.1, 10.6),
            (10.7, 11.0, 10.4, 10.5),
            (10.4, 10.6, 10.0, 10.1),
        ])
    }

    #[test]
    fn timing_names() {
        assert_eq!(
            "next-bar-open".parse::<ExecutionTiming>().unwrap(),
            ExecutionTiming::NextBarOpen
        );
        assert_eq!(
            "current_bar_close".parse::<ExecutionTiming>().unwrap(),
            ExecutionTiming::CurrentBarClose
        );
        assert_eq!(
            "cheat".parse::<ExecutionTiming>().unwrap(),
            ExecutionTiming::PreviousBarClose
        );
        assert!(matches!(
            "vwap".parse::<ExecutionTiming>(),
            Err(StratTestError::UnsupportedTiming { .. })
        ));
        assert_eq!(ExecutionTiming::default().to_string(), "next-bar-open");
    }

    #[test]
    fn cost_sign() {
        assert!((apply_transaction_cost(1.0, 1, 0.0025) - 1.0025).abs() < 1e-12);
        assert!((apply_transaction_cost(1.0, -1, 0.0025) - 0.9975).abs() < 1e-12);
        assert!((apply_transaction_cost(1.0, 0, 0.0025) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn next_bar_open_uses_following_bar() {
        let bars = sample_bars();
        let state = PositionState::with_changes(vec![1, 1, 0, 0], vec![1, 0, -1, 0]);
        let cols = execution_columns(&bars, &state, ExecutionTiming::NextBarOpen, 0.0);

        assert_eq!(cols.execution_price[0], Some(10.3));
        assert_eq!(cols.execution_time[0], Some(bars[1].timestamp));
        assert_eq!(cols.execution_price[1], None);
        assert_eq!(cols.basis[1], Some(10.6));
        assert_eq!(cols.execution_price[2], Some(10.4));
        assert_eq!(cols.execution_time[2], Some(bars[3].timestamp));
    }

    #[test]
    fn next_bar_open_last_bar_undefined() {
        let bars = sample_bars();
        let state = PositionState::with_changes(vec![0, 0, 0, 1], vec![0, 0, 0, 1]);
        let cols = execution_columns(&bars, &state, ExecutionTiming::NextBarOpen, 10.0);
        assert_eq!(cols.basis[3], None);
        assert_eq!(cols.execution_price[3], None);
        assert_eq!(cols.execution_time[3], None);
    }

    #[test]
    fn current_bar_close_with_cost() {
        let bars = sample_bars();
        let state = PositionState::with_changes(vec![1, 1, 0, 0], vec![1, 0, -1, 0]);
        let cols = execution_columns(&bars, &state, ExecutionTiming::CurrentBarClose, 25.0);
        assert!((cols.execution_price[0].unwrap() - 10.2 * 1.0025).abs() < 1e-12);
        assert!((cols.execution_price[2].unwrap() - 10.5 * 0.9975).abs() < 1e-12);
        assert_eq!(cols.execution_time[2], Some(bars[2].timestamp));
    }

    #[test]
    fn previous_bar_close_for_exits() {
        let bars = sample_bars();
        let state = PositionState::with_changes(vec![0, 1, 0, 0], vec![0, 1, -1, 0]);
        let cols = execution_columns(&bars, &state, ExecutionTiming::PreviousBarClose, 0.0);
        assert_eq!(cols.execution_price[1], Some(10.6));
        assert_eq!(cols.execution_price[2], Some(10.6));
        assert_eq!(cols.execution_time[2], Some(bars[1].timestamp));

        let state = PositionState::with_changes(vec![-1, 0, 0, 0], vec![-1, 1, 0, 0]);
        let cols = execution_columns(&bars, &state, ExecutionTiming::PreviousBarClose, 0.0);
        assert_eq!(cols.execution_price[0], None);
    }

    #[test]
    fn gross_returns_follow_basis() {
        let basis = vec![Some(100.0), Some(110.0), Some(99.0), Some(99.0)];
        let rets = gross_returns(&basis, &[1, 1, 0, 0]);

        let r0 = (110.0_f64 / 100.0).ln();
        let r1 = (99.0_f64 / 110.0).ln();
        assert!((rets.gross_log_return[0].unwrap() - r0).abs() < 1e-12);
        assert!((rets.strategy_log_return[1].unwrap() - r1).abs() < 1e-12);
        assert_eq!(rets.strategy_log_return[2], Some(0.0));
        assert_eq!(rets.gross_log_return[3], None);
        assert_eq!(rets.cumulative_pct_return[3], None);
        // 100 -> 110 -> 99 held long
        assert!((rets.cumulative_pct_return[1].unwrap() - (-0.01)).abs() < 1e-12);
    }

    #[test]
    fn gross_returns_skip_undefined_prices() {
        let basis = vec![Some(100.0), None, Some(0.0), Some(50.0), Some(55.0)];
        let rets = gross_returns(&basis, &[-1, -1, -1, -1, -1]);
        assert_eq!(rets.gross_log_return[0], None);
        assert_eq!(rets.gross_log_return[1], None);
        assert_eq!(rets.gross_log_return[2], None);
        let short = -(55.0_f64 / 50.0).ln();
        assert!((rets.strategy_log_return[3].unwrap() - short).abs() < 1e-12);
        assert!((rets.cumulative_pct_return[3].unwrap() - (short.exp() - 1.0)).abs() < 1e-12);
    }
}
