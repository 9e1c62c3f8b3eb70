//! Bollinger Bands: SMA middle band, upper/lower at ± k population stddevs.
//!
//! `k` is carried as hundredths (`stddev_mult_x100`) so the indicator type
//! stays hashable.

use crate::domain::indicator::stddev::{mean_and_stddev, rolling};
use crate::domain::indicator::{IndicatorSeries, IndicatorType, IndicatorValue};
use crate::domain::ohlcv::Bar;

pub fn calculate_bollinger(bars: &[Bar], period: usize, stddev_mult_x100: u32) -> IndicatorSeries {
    let mult = f64::from(stddev_mult_x100) / 100.0;
    rolling(
        bars,
        period,
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        IndicatorValue::Bollinger {
            upper: 0.0,
            middle: 0.0,
            lower: 0.0,
        },
        |window| {
            let (middle, stddev) = mean_and_stddev(window);
            IndicatorValue::Bollinger {
                upper: middle + mult * stddev,
                middle,
                lower: middle - mult * stddev,
            }
        },
    )
}
