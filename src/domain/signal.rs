//! Signal generation: indicator values to per-bar position state.
//!
//! Every strategy yields a [`PositionState`] whose `signal` column holds the
//! desired position and whose `new_position` column holds the position-change
//! events derived from it.

use crate::domain::indicator::{IndicatorSeries, IndicatorSet};
use crate::domain::ohlcv::Bar;
use crate::domain::strategy::{Side, Strategy};

/// What happened on a bar, as seen by a reader of the output table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TradeAction {
    #[default]
    Hold,
    Buy,
    Sell,
    StopExit,
}

impl TradeAction {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeAction::Hold => "hold",
            TradeAction::Buy => "buy",
            TradeAction::Sell => "sell",
            TradeAction::StopExit => "stop_exit",
        }
    }

    fn from_change(change: i8) -> Self {
        match change {
            1 => TradeAction::Buy,
            -1 => TradeAction::Sell,
            _ => TradeAction::Hold,
        }
    }
}

/// Per-bar position columns, one entry per bar.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionState {
    pub signal: Vec<i8>,
    pub new_position: Vec<i8>,
    pub action: Vec<TradeAction>,
    pub stop_hit: Vec<bool>,
    pub stop_price: Vec<Option<f64>>,
}

impl PositionState {
    /// Builds the state for a raw signal column, deriving the change events.
    pub fn from_signal(signal: Vec<i8>) -> Self {
        let new_position = position_changes(&signal);
        Self::with_changes(signal, new_position)
    }

    /// Builds the state from explicit signal and change columns.
    pub fn with_changes(signal: Vec<i8>, new_position: Vec<i8>) -> Self {
        let n = signal.len();
        let action = new_position
            .iter()
            .map(|&c| TradeAction::from_change(c))
            .collect();
        PositionState {
            signal,
            new_position,
            action,
            stop_hit: vec![false; n],
            stop_price: vec![None; n],
        }
    }

    pub fn len(&self) -> usize {
        self.signal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signal.is_empty()
    }

    pub fn stop_exit_count(&self) -> usize {
        self.stop_hit.iter().filter(|&&hit| hit).count()
    }
}

/// Sign of the first difference of `signal`, with 0 before the first bar.
pub fn position_changes(signal: &[i8]) -> Vec<i8> {
    let mut prev = 0i8;
    signal
        .iter()
        .map(|&s| {
            let change = (s - prev).signum();
            prev = s;
            change
        })
        .collect()
}

/// Maps the strategy's indicators onto a provisional position state.
///
/// Indicators missing from `indicators` are treated as undefined everywhere.
pub fn generate(strategy: &Strategy, bars: &[Bar], indicators: &IndicatorSet) -> PositionState {
    let n = bars.len();
    let required = strategy.required_indicators();
    let series = |idx: usize| required.get(idx).and_then(|t| indicators.get(t));

    match *strategy {
        Strategy::MaCrossover { side, .. } => {
            let signal = crossover_signal(series(0), series(1), n, side);
            PositionState::from_signal(signal)
        }
        Strategy::BollingerBreakout { .. } => {
            PositionState::from_signal(breakout_signal(bars, series(0)))
        }
        Strategy::RsiThreshold { threshold, .. } => {
            let signal = (0..n)
                .map(|i| match series(0).and_then(|s| s.simple_at(i)) {
                    Some(rsi) if rsi < threshold => 1,
                    _ => 0,
                })
                .collect();
            PositionState::from_signal(signal)
        }
        Strategy::BuyAndHold => buy_and_hold(n),
    }
}

fn crossover_signal(
    fast: Option<&IndicatorSeries>,
    slow: Option<&IndicatorSeries>,
    n: usize,
    side: Side,
) -> Vec<i8> {
    (0..n)
        .map(|i| {
            let f = fast.and_then(|s| s.simple_at(i));
            let s = slow.and_then(|s| s.simple_at(i));
            match (f, s) {
                (Some(f), Some(s)) if f > s => 1,
                (Some(f), Some(s)) if f < s && side == Side::LongShort => -1,
                _ => 0,
            }
        })
        .collect()
}

fn breakout_signal(bars: &[Bar], bands: Option<&IndicatorSeries>) -> Vec<i8> {
    let mut held = 0i8;
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            if let Some((upper, middle, _)) = bands.and_then(|s| s.bands_at(i)) {
                if bar.close > upper {
                    held = 1;
                } else if bar.close < middle {
                    held = 0;
                }
            }
            held
        })
        .collect()
}

/// Long on every bar, entering on the first and exiting on the last.
fn buy_and_hold(n: usize) -> PositionState {
    let signal = vec![1i8; n];
    let mut changes = vec![0i8; n];
    if let Some(first) = changes.first_mut() {
        *first = 1;
    }
    if n > 1 {
        changes[n - 1] = -1;
    }
    PositionState::with_changes(signal, changes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::indicator::compute_indicators;
    use crate::domain::indicator::test_support::make_bars;
    use crate::domain::indicator::MovingAverage;

    fn run(strategy: &Strategy, prices: &[f64]) -> PositionState {
        let bars = make_bars(prices);
        let indicators = compute_indicators(&bars, &strategy.required_indicators());
        generate(strategy, &bars, &indicators)
    }

    #[test]
    fn position_changes_from_flat() {
        assert_eq!(position_changes(&[0, 1, 1, 0, -1, 1]), vec![0, 1, 0, -1, -1, 1]);
        assert_eq!(position_changes(&[1, 1]), vec![1, 0]);
        assert_eq!(position_changes(&[-1]), vec![-1]);
        assert!(position_changes(&[]).is_empty());
    }

    #[test]
    fn actions_follow_changes() {
        let state = PositionState::from_signal(vec![0, 1, 0, -1]);
        assert_eq!(
            state.action,
            vec![
                TradeAction::Hold,
                TradeAction::Buy,
                TradeAction::Sell,
                TradeAction::Sell
            ]
        );
        assert_eq!(state.stop_exit_count(), 0);
    }

    #[test]
    fn crossover_long_only_goes_flat() {
        let strategy = Strategy::MaCrossover {
            ma: MovingAverage::Sma,
            fast: 1,
            slow: 2,
            side: Side::LongOnly,
        };
        let state = run(&strategy, &[10.0, 11.0, 12.0, 11.0, 10.0]);
        // bar 0: slow undefined
        assert_eq!(state.signal, vec![0, 1, 1, 0, 0]);
        assert_eq!(state.new_position, vec![0, 1, 0, -1, 0]);
    }

    #[test]
    fn crossover_long_short_flips() {
        let strategy = Strategy::MaCrossover {
            ma: MovingAverage::Sma,
            fast: 1,
            slow: 2,
            side: Side::LongShort,
        };
        let state = run(&strategy, &[10.0, 11.0, 12.0, 11.0, 10.0]);
        assert_eq!(state.signal, vec![0, 1, 1, -1, -1]);
        assert_eq!(state.new_position, vec![0, 1, 0, -1, 0]);
    }

    #[test]
    fn crossover_equality_is_flat() {
        let strategy = Strategy::MaCrossover {
            ma: MovingAverage::Sma,
            fast: 1,
            slow: 2,
            side: Side::LongShort,
        };
        let state = run(&strategy, &[10.0, 10.0, 10.0]);
        assert_eq!(state.signal, vec![0, 0, 0]);
    }

    #[test]
    fn breakout_holds_between_bands() {
        let strategy = Strategy::BollingerBreakout {
            window: 3,
            stddev_mult_x100: 100,
        };
        // bar 3 breaks above the upper band, bar 4 sits between middle and upper,
        // bar 5 falls below the middle band.
        let state = run(&strategy, &[10.0, 10.0, 10.0, 13.0, 12.0, 9.0]);
        assert_eq!(state.signal, vec![0, 0, 0, 1, 1, 0]);
        assert_eq!(state.new_position, vec![0, 0, 0, 1, 0, -1]);
    }

    #[test]
    fn rsi_threshold_long_below_level() {
        let strategy = Strategy::RsiThreshold {
            window: 2,
            threshold: 70.0,
        };
        // RSI undefined for the first two bars, then 100 (no losses), then low.
        let state = run(&strategy, &[10.0, 11.0, 12.0, 8.0]);
        assert_eq!(state.signal, vec![0, 0, 0, 1]);
    }

    #[test]
    fn buy_and_hold_events() {
        let state = run(&Strategy::BuyAndHold, &[1.0, 2.0, 3.0]);
        assert_eq!(state.signal, vec![1, 1, 1]);
        assert_eq!(state.new_position, vec![1, 0, -1]);
        assert_eq!(
            state.action,
            vec![TradeAction::Buy, TradeAction::Hold, TradeAction::Sell]
        );
    }

    #[test]
    fn buy_and_hold_single_bar_only_enters() {
        let state = run(&Strategy::BuyAndHold, &[1.0]);
        assert_eq!(state.new_position, vec![1]);
    }

    #[test]
    fn empty_input() {
        let state = run(&Strategy::BuyAndHold, &[]);
        assert!(state.is_empty());
    }
}
