//! Exponential moving average of close.
//!
//! Seeded with the SMA of the first `period` closes, then
//! `ema = close * k + ema_prev * (1 - k)` with `k = 2 / (period + 1)`.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_ema(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Ema(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries::all_invalid(indicator_type, bars);
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
    let mut ema = seed;

    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            if i >= period {
                ema = bar.close * k + ema * (1.0 - k);
            }
            let valid = i + 1 >= period;
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid,
                value: IndicatorValue::Simple(if valid { ema } else { 0.0 }),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
