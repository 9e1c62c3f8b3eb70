//! Trade group assignment.
//!
//! A single left-to-right scan over (signal, position-change) finds each
//! entry and the first opposite event that closes it. A bar that closes one
//! group and opens another belongs to the group it opens.

use chrono::NaiveDateTime;

use crate::domain::ohlcv::Bar;

/// One entry-to-exit run of bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeSpan {
    pub start: usize,
    pub direction: i8,
    /// Closing event bar; `None` while the group is still open at the end.
    pub exit: Option<usize>,
}

impl TradeSpan {
    pub fn is_closed(&self) -> bool {
        self.exit.is_some()
    }

    /// Exclusive end of the bars holding this group's position: the exit
    /// bar, or `n` while open.
    pub fn held_end(&self, n: usize) -> usize {
        self.exit.unwrap_or(n)
    }

    /// Number of bars covered, counting the exit bar.
    pub fn length(&self, n: usize) -> usize {
        match self.exit {
            Some(exit) => exit - self.start + 1,
            None => n - self.start,
        }
    }
}

/// Scans the columns for trade spans in order of entry.
pub fn scan_trade_spans(signal: &[i8], new_position: &[i8]) -> Vec<TradeSpan> {
    let mut spans = Vec::new();
    let mut open: Option<TradeSpan> = None;

    for (i, (&sig, &change)) in signal.iter().zip(new_position).enumerate() {
        if let Some(mut span) = open {
            if change == -span.direction {
                span.exit = Some(i);
                spans.push(span);
                open = None;
            }
        }
        if open.is_none() && change != 0 && sig == change {
            open = Some(TradeSpan {
                start: i,
                direction: change,
                exit: None,
            });
        }
    }

    spans.extend(open);
    spans
}

/// Per-bar group keys: the entry timestamp of the group each bar belongs to.
pub fn group_keys(bars: &[Bar], spans: &[TradeSpan]) -> Vec<Option<NaiveDateTime>> {
    let mut keys = vec![None; bars.len()];
    for span in spans {
        let key = bars[span.start].timestamp;
        let end = span.exit.map_or(bars.len(), |exit| exit + 1);
        for slot in &mut keys[span.start..end] {
            *slot = Some(key);
        }
    }
    keys
}
