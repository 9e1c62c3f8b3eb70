//! Average True Range.
//!
//! Wilder average of the true range; the first bar has no previous close, so
//! its true range is `high - low`.

use crate::domain::indicator::{
    IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue, WilderAverage,
};
use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Atr(period);
    if period == 0 || bars.len() < period {
        return IndicatorSeries::all_invalid(indicator_type, bars);
    }

    let mut average = WilderAverage::new(period);
    let values = bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let tr = match i.checked_sub(1) {
                Some(prev) => bar.true_range(bars[prev].close),
                None => bar.high - bar.low,
            };
            let atr = average.push(tr);
            IndicatorPoint {
                timestamp: bar.timestamp,
                valid: atr.is_some(),
                value: IndicatorValue::Simple(atr.unwrap_or(0.0)),
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}
