//! Strategy selection and parameter bundles.
//!
//! A strategy is chosen by name and configured from a string parameter map.
//! All required parameters are checked before any computation runs.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::StratTestError;
use crate::domain::indicator::{IndicatorType, MovingAverage};

/// Raw parameter bundle, e.g. from the `[params]` config section.
pub type StrategyParams = BTreeMap<String, String>;

/// Default RSI level below which the oscillator strategy stays long.
pub const DEFAULT_RSI_THRESHOLD: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    LongShort,
    LongOnly,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Fast/slow moving-average crossover.
    MaCrossover {
        ma: MovingAverage,
        fast: usize,
        slow: usize,
        side: Side,
    },
    /// Long above the upper band, flat below the middle band.
    BollingerBreakout { window: usize, stddev_mult_x100: u32 },
    /// Long while RSI is below the threshold.
    RsiThreshold { window: usize, threshold: f64 },
    BuyAndHold,
}

impl Strategy {
    pub const NAMES: [&'static str; 5] = [
        "ma-crossover-ls",
        "ma-crossover-lo",
        "bollinger-breakout-lo",
        "rsi-threshold-lo",
        "buy-and-hold",
    ];

    /// Builds a strategy from its name and parameter bundle.
    pub fn from_params(name: &str, params: &StrategyParams) -> Result<Self, StratTestError> {
        let name = name.trim().to_lowercase();
        let reader = ParamReader {
            strategy: &name,
            params,
        };

        match name.as_str() {
            "ma-crossover-ls" | "ma-crossover-lo" => {
                let side = if name.ends_with("-ls") {
                    Side::LongShort
                } else {
                    Side::LongOnly
                };
                let ma = match params.get("ma") {
                    Some(v) => v.parse::<MovingAverage>()?,
                    None => MovingAverage::default(),
                };
                Ok(Strategy::MaCrossover {
                    ma,
                    fast: reader.window("fast")?,
                    slow: reader.window("slow")?,
                    side,
                })
            }
            "bollinger-breakout-lo" => {
                let window = reader.window("window")?;
                let dev = reader.number("window_dev")?;
                if !dev.is_finite() || dev < 0.0 {
                    return Err(reader.invalid("window_dev", "must be a non-negative number"));
                }
                Ok(Strategy::BollingerBreakout {
                    window,
                    stddev_mult_x100: (dev * 100.0).round() as u32,
                })
            }
            "rsi-threshold-lo" => {
                let window = reader.window("window")?;
                let threshold = match params.get("threshold") {
                    Some(_) => reader.number("threshold")?,
                    None => DEFAULT_RSI_THRESHOLD,
                };
                if !(0.0..=100.0).contains(&threshold) {
                    return Err(reader.invalid("threshold", "must be between 0 and 100"));
                }
                Ok(Strategy::RsiThreshold { window, threshold })
            }
            "buy-and-hold" => Ok(Strategy::BuyAndHold),
            _ => Err(StratTestError::UnsupportedStrategy { name }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::MaCrossover {
                side: Side::LongShort,
                ..
            } => "ma-crossover-ls",
            Strategy::MaCrossover {
                side: Side::LongOnly,
                ..
            } => "ma-crossover-lo",
            Strategy::BollingerBreakout { .. } => "bollinger-breakout-lo",
            Strategy::RsiThreshold { .. } => "rsi-threshold-lo",
            Strategy::BuyAndHold => "buy-and-hold",
        }
    }

    pub fn is_long_only(&self) -> bool {
        !matches!(
            self,
            Strategy::MaCrossover {
                side: Side::LongShort,
                ..
            }
        )
    }

    /// Indicators the strategy reads, in computation order.
    pub fn required_indicators(&self) -> Vec<IndicatorType> {
        match *self {
            Strategy::MaCrossover { ma, fast, slow, .. } => {
                vec![ma.indicator(fast), ma.indicator(slow)]
            }
            Strategy::BollingerBreakout {
                window,
                stddev_mult_x100,
            } => vec![IndicatorType::Bollinger {
                period: window,
                stddev_mult_x100,
            }],
            Strategy::RsiThreshold { window, .. } => vec![IndicatorType::Rsi(window)],
            Strategy::BuyAndHold => Vec::new(),
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        let inds = self.required_indicators();
        if let Some((first, rest)) = inds.split_first() {
            write!(f, " {first}")?;
            for ind in rest {
                write!(f, " vs {ind}")?;
            }
        }
        Ok(())
    }
}

struct ParamReader<'a> {
    strategy: &'a str,
    params: &'a StrategyParams,
}

impl ParamReader<'_> {
    fn raw(&self, key: &str) -> Result<&str, StratTestError> {
        self.params
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .ok_or_else(|| StratTestError::MissingParameter {
                strategy: self.strategy.to_string(),
                key: key.to_string(),
            })
    }

    fn invalid(&self, key: &str, reason: &str) -> StratTestError {
        StratTestError::InvalidParameter {
            strategy: self.strategy.to_string(),
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    fn window(&self, key: &str) -> Result<usize, StratTestError> {
        let value: usize = self
            .raw(key)?
            .parse()
            .map_err(|_| self.invalid(key, "expected a positive integer"))?;
        if value == 0 {
            return Err(self.invalid(key, "expected a positive integer"));
        }
        Ok(value)
    }

    fn number(&self, key: &str) -> Result<f64, StratTestError> {
        self.raw(key)?
            .parse()
            .map_err(|_| self.invalid(key, "expected a number"))
    }
}
