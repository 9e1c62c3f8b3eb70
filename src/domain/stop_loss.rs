//! Trailing stop-loss with re-entry.
//!
//! Runs after signal generation. Each provisional trade group is split into
//! legs: a leg ends at the first confirmed stop breach, and a new leg starts
//! once price recovers past the extreme seen during the stopped leg. The legs
//! are then spliced into a fresh [`PositionState`].
//!
//! Long stop: running max(high) since entry × (1 − bps/10000); a bar breaches
//! when low < stop and it closes down. Short is the mirror image.

use crate::domain::error::StratTestError;
use crate::domain::ohlcv::Bar;
use crate::domain::signal::{PositionState, TradeAction};
use crate::domain::trade_group::{scan_trade_spans, TradeSpan};

/// How a leg ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegExit {
    /// Stopped out on this bar.
    Stop(usize),
    /// The provisional closing event at this bar.
    Signal(usize),
    /// Still open at the end of the table.
    Open,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leg {
    pub entry: usize,
    pub exit: LegExit,
}

/// Converts basis points to a fraction.
pub fn bps_fraction(bps: f64) -> f64 {
    bps / 10_000.0
}

/// Applies the trailing stop to every provisional trade group.
///
/// Returns the provisional state unchanged when `stop_loss_bps <= 0`.
pub fn apply_stop_loss(
    bars: &[Bar],
    provisional: &PositionState,
    stop_loss_bps: f64,
) -> Result<PositionState, StratTestError> {
    if stop_loss_bps <= 0.0 || !stop_loss_bps.is_finite() {
        return Ok(provisional.clone());
    }
    let fraction = bps_fraction(stop_loss_bps);
    let n = bars.len().min(provisional.len());

    let mut state = provisional.clone();
    let spans = scan_trade_spans(&provisional.signal[..n], &provisional.new_position[..n]);

    for span in &spans {
        let held_end = span.held_end(n);
        let resolver = LegResolver {
            bars,
            provisional,
            span,
            held_end,
            fraction,
        };
        let mut legs = Vec::new();
        resolver.resolve(span.start, 0, &mut legs)?;
        if legs.len() > 1 || matches!(legs.first(), Some(Leg { exit: LegExit::Stop(_), .. })) {
            tracing::debug!(start = span.start, legs = legs.len(), "stop-loss revised trade");
        }
        splice_legs(&mut state, provisional, span, held_end, &legs);
        for leg in &legs {
            fill_stop_prices(&mut state, bars, span.direction, leg, held_end, fraction);
        }
    }

    Ok(state)
}

/// Leg resolution context for one provisional group.
struct LegResolver<'a> {
    bars: &'a [Bar],
    provisional: &'a PositionState,
    span: &'a TradeSpan,
    held_end: usize,
    fraction: f64,
}

impl LegResolver<'_> {
    /// Resolves the legs of the group from `entry` onward.
    fn resolve(&self, entry: usize, depth: usize, legs: &mut Vec<Leg>) -> Result<(), StratTestError> {
        if depth > self.held_end - self.span.start {
            return Err(StratTestError::StopLossDiverged {
                start: self.span.start,
            });
        }
        let dir = self.span.direction;

        let Some(breach) = find_breach(self.bars, dir, entry, self.held_end, self.fraction) else {
            let exit = match self.span.exit {
                Some(x) => LegExit::Signal(x),
                None => LegExit::Open,
            };
            legs.push(Leg { entry, exit });
            return Ok(());
        };
        legs.push(Leg {
            entry,
            exit: LegExit::Stop(breach),
        });

        let reference = leg_extreme(&self.bars[entry..=breach], dir);
        let reentry = (breach + 1..self.held_end).find(|&r| {
            self.provisional.signal[r] == dir
                && if dir == 1 {
                    self.bars[r].close > reference
                } else {
                    self.bars[r].close < reference
                }
        });

        match reentry {
            Some(r) => self.resolve(r, depth + 1, legs),
            None => Ok(()),
        }
    }
}

/// First bar in `(entry, held_end)` that breaches the running stop.
fn find_breach(
    bars: &[Bar],
    dir: i8,
    entry: usize,
    held_end: usize,
    fraction: f64,
) -> Option<usize> {
    let mut extreme = leg_extreme(&bars[entry..=entry], dir);
    (entry + 1..held_end).find(|&k| {
        let bar = &bars[k];
        if dir == 1 {
            extreme = extreme.max(bar.high);
            bar.low < extreme * (1.0 - fraction) && bar.is_down()
        } else {
            extreme = extreme.min(bar.low);
            bar.high > extreme * (1.0 + fraction) && bar.is_up()
        }
    })
}

/// Highest high (long) or lowest low (short) over `window`.
fn leg_extreme(window: &[Bar], dir: i8) -> f64 {
    if dir == 1 {
        window.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max)
    } else {
        window.iter().map(|b| b.low).fold(f64::INFINITY, f64::min)
    }
}

fn entry_action(dir: i8) -> TradeAction {
    if dir == 1 {
        TradeAction::Buy
    } else {
        TradeAction::Sell
    }
}

/// Rewrites one group's bars in `state` from its resolved legs.
fn splice_legs(
    state: &mut PositionState,
    provisional: &PositionState,
    span: &TradeSpan,
    held_end: usize,
    legs: &[Leg],
) {
    let dir = span.direction;
    // A flip bar belongs to the next group and is left to it.
    let owned_exit = span
        .exit
        .filter(|&x| provisional.new_position[x] != provisional.signal[x]);

    let cleared = span.start..owned_exit.map_or(held_end, |x| x + 1);
    for k in cleared {
        state.signal[k] = 0;
        state.new_position[k] = 0;
        state.action[k] = TradeAction::Hold;
        state.stop_hit[k] = false;
        state.stop_price[k] = None;
    }

    for leg in legs {
        let held_to = match leg.exit {
            LegExit::Stop(t) => t,
            LegExit::Signal(_) | LegExit::Open => held_end,
        };
        state.signal[leg.entry..held_to].fill(dir);
        state.new_position[leg.entry] = dir;
        state.action[leg.entry] = entry_action(dir);

        match leg.exit {
            LegExit::Stop(t) => {
                state.signal[t] = 0;
                state.new_position[t] = -dir;
                state.action[t] = TradeAction::StopExit;
                state.stop_hit[t] = true;
            }
            LegExit::Signal(x) if owned_exit == Some(x) => {
                state.signal[x] = provisional.signal[x];
                state.new_position[x] = provisional.new_position[x];
                state.action[x] = provisional.action[x];
            }
            LegExit::Signal(_) | LegExit::Open => {}
        }
    }
}

/// Writes the running stop level over the bars a leg holds.
fn fill_stop_prices(
    state: &mut PositionState,
    bars: &[Bar],
    dir: i8,
    leg: &Leg,
    held_end: usize,
    fraction: f64,
) {
    let last = match leg.exit {
        LegExit::Stop(t) => t + 1,
        LegExit::Signal(_) | LegExit::Open => held_end,
    };
    let mut extreme = leg_extreme(&bars[leg.entry..=leg.entry], dir);
    let slots = &mut state.stop_price[leg.entry..last];
    for (bar, slot) in bars[leg.entry..last].iter().zip(slots) {
        let stop = if dir == 1 {
            extreme = extreme.max(bar.high);
            extreme * (1.0 - fraction)
        } else {
            extreme = extreme.min(bar.low);
            extreme * (1.0 + fraction)
        };
        *slot = Some(stop);
    }
}
