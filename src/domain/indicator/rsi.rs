//! Relative Strength Index with Wilder-smoothed gains and losses.
//!
//! `RSI = 100 - 100 / (1 + avg_gain / avg_loss)`, 100 when there are no
//! losses. The first `period` bars are invalid: the seed needs `period`
//! price changes.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, WilderAverage,
};
use crate::domain::ohlcv::Bar;

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
    }
}

pub fn calculate_rsi(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Rsi(period);
    if period == 0 || bars.len() <= period {
        return IndicatorSeries::all_invalid(indicator_type, bars);
    }

    let mut gains = WilderAverage::new(period);
    let mut losses = WilderAverage::new(period);
    let mut prev_close: Option<f64> = None;

    let values = bars
        .iter()
        .map(|bar| {
            let rsi = prev_close.and_then(|prev| {
                let change = bar.close - prev;
                let gain = gains.push(change.max(0.0));
                let loss = losses.push((-change).max(0.0));
                Some(rsi_from_averages(gain?, loss?))
            });
            prev_close = Some(bar.close);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: rsi.is_some(),
                value: IndicatorValue::Simple(rsi.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
