//! Technical indicator implementations.
//!
//! This module provides types for representing indicator values and series:
//! - `IndicatorPoint`: A single point in an indicator time series
//! - `IndicatorValue`: Enum for different indicator output shapes
//! - `IndicatorType`: Enum for indicator identity + parameters (serves as HashMap key)
//! - `IndicatorSeries`: A time series of indicator values
//! - `IndicatorSet`: Lookup from `IndicatorType` to its computed series

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;
pub mod sma;
pub mod stddev;

use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::domain::error::StratTestError;
use crate::domain::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorPoint {
    pub timestamp: NaiveDateTime,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IndicatorValue {
    Simple(f64),
    Bollinger { upper: f64, middle: f64, lower: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Stddev(usize),
    Bollinger { period: usize, stddev_mult_x100: u32 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// Value at bar `i` for single-valued indicators, `None` during warmup.
    pub fn simple_at(&self, i: usize) -> Option<f64> {
        match self.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value: IndicatorValue::Simple(v),
                ..
            }) => Some(*v),
            _ => None,
        }
    }

    /// (upper, middle, lower) at bar `i`, `None` during warmup.
    pub fn bands_at(&self, i: usize) -> Option<(f64, f64, f64)> {
        match self.values.get(i) {
            Some(IndicatorPoint {
                valid: true,
                value:
                    IndicatorValue::Bollinger {
                        upper,
                        middle,
                        lower,
                    },
                ..
            }) => Some((*upper, *middle, *lower)),
            _ => None,
        }
    }

    /// Series of `len` invalid points, one per bar.
    pub(crate) fn all_invalid(indicator_type: IndicatorType, bars: &[Bar]) -> Self {
        let value = match indicator_type {
            IndicatorType::Bollinger { .. } => IndicatorValue::Bollinger {
                upper: 0.0,
                middle: 0.0,
                lower: 0.0,
            },
            _ => IndicatorValue::Simple(0.0),
        };
        IndicatorSeries {
            indicator_type,
            values: bars
                .iter()
                .map(|b| IndicatorPoint {
                    timestamp: b.timestamp,
                    valid: false,
                    value,
                })
                .collect(),
        }
    }
}

/// Wilder's running average: the plain mean of the first `period` inputs,
/// then `avg = (avg * (period - 1) + x) / period`.
pub(crate) struct WilderAverage {
    period: usize,
    seen: usize,
    value: f64,
}

impl WilderAverage {
    pub(crate) fn new(period: usize) -> Self {
        WilderAverage {
            period,
            seen: 0,
            value: 0.0,
        }
    }

    /// Feeds one input; `None` until `period` inputs have been seen.
    pub(crate) fn push(&mut self, x: f64) -> Option<f64> {
        let n = self.period as f64;
        self.seen += 1;
        if self.seen < self.period {
            self.value += x;
            return None;
        }
        self.value = if self.seen == self.period {
            (self.value + x) / n
        } else {
            (self.value * (n - 1.0) + x) / n
        };
        Some(self.value)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
        }
    }
}

/// Moving-average family used by crossover strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MovingAverage {
    Sma,
    #[default]
    Ema,
}

impl MovingAverage {
    pub fn indicator(self, period: usize) -> IndicatorType {
        match self {
            MovingAverage::Sma => IndicatorType::Sma(period),
            MovingAverage::Ema => IndicatorType::Ema(period),
        }
    }
}

impl FromStr for MovingAverage {
    type Err = StratTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sma" => Ok(MovingAverage::Sma),
            "ema" => Ok(MovingAverage::Ema),
            other => Err(StratTestError::UnsupportedIndicator {
                name: other.to_string(),
            }),
        }
    }
}

/// Computes one indicator over the bars.
pub fn calculate(bars: &[Bar], indicator: IndicatorType) -> IndicatorSeries {
    match indicator {
        IndicatorType::Sma(period) => sma::calculate_sma(bars, period),
        IndicatorType::Ema(period) => ema::calculate_ema(bars, period),
        IndicatorType::Rsi(period) => rsi::calculate_rsi(bars, period),
        IndicatorType::Atr(period) => atr::calculate_atr(bars, period),
        IndicatorType::Stddev(period) => stddev::calculate_stddev(bars, period),
        IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        } => bollinger::calculate_bollinger(bars, period, stddev_mult_x100),
    }
}

/// Indicator series keyed by their structured identity, so several
/// instances of one kind (e.g. fast and slow EMA) coexist.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndicatorSet {
    series: HashMap<IndicatorType, IndicatorSeries>,
}

impl IndicatorSet {
    pub fn get(&self, indicator: &IndicatorType) -> Option<&IndicatorSeries> {
        self.series.get(indicator)
    }

    pub fn insert(&mut self, series: IndicatorSeries) {
        self.series.insert(series.indicator_type, series);
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    /// Series in a stable order (by indicator identity).
    pub fn iter_sorted(&self) -> Vec<&IndicatorSeries> {
        let mut all: Vec<&IndicatorSeries> = self.series.values().collect();
        all.sort_by_key(|s| s.indicator_type);
        all
    }
}

/// Computes every requested indicator once, skipping duplicates.
pub fn compute_indicators(bars: &[Bar], indicators: &[IndicatorType]) -> IndicatorSet {
    let mut set = IndicatorSet::default();
    for &indicator in indicators {
        if set.get(&indicator).is_none() {
            tracing::debug!(indicator = %indicator, bars = bars.len(), "computing indicator");
            set.insert(calculate(bars, indicator));
        }
    }
    set
}
