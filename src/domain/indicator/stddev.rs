//! Rolling population standard deviation of close.
//!
//! Also home to the rolling-window builder shared with Bollinger Bands.

use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

/// Mean and population standard deviation of the closes in `window`.
pub(crate) fn mean_and_stddev(window: &[Bar]) -> (f64, f64) {
    let n = window.len() as f64;
    let mean = window.iter().map(|b| b.close).sum::<f64>() / n;
    let variance = window.iter().map(|b| (b.close - mean).powi(2)).sum::<f64>() / n;
    (mean, variance.sqrt())
}

/// Builds a series by evaluating `value_of` on each full trailing window of
/// `period` bars. Bars before the first full window carry `placeholder` and
/// are invalid.
pub(crate) fn rolling<F>(
    bars: &[Bar],
    period: usize,
    indicator_type: IndicatorType,
    placeholder: IndicatorValue,
    value_of: F,
) -> IndicatorSeries
where
    F: Fn(&[Bar]) -> IndicatorValue,
{
    if period == 0 {
        return IndicatorSeries::all_invalid(indicator_type, bars);
    }
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| match i.checked_sub(period - 1) {
            Some(first) => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: true,
                value: value_of(&bars[first..=i]),
            },
            None => IndicatorPoint {
                timestamp: bar.timestamp,
                valid: false,
                value: placeholder,
            },
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_stddev(bars: &[Bar], period: usize) -> IndicatorSeries {
    rolling(
        bars,
        period,
        IndicatorType::Stddev(period),
        IndicatorValue::Simple(0.0),
        |window| IndicatorValue::Simple(mean_and_stddev(window).1),
    )
}
