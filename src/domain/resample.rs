//! Tick-to-bar resampling.
//!
//! Ticks are bucketed on multiples of the frequency since the Unix epoch.
//! Each non-empty bucket becomes one bar labelled with the bucket's
//! period-end timestamp; empty buckets are dropped.

use chrono::{DateTime, NaiveDateTime};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::StratTestError;
use super::ohlcv::{ensure_strictly_increasing, Bar};

/// A single price observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub volume: Option<f64>,
}

/// A named auxiliary column aligned 1:1 with the ticks.
#[derive(Debug, Clone, PartialEq)]
pub struct AuxColumn {
    pub name: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSeries {
    pub ticks: Vec<Tick>,
    pub aux: Vec<AuxColumn>,
}

/// Aggregation applied to an auxiliary column within a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggRule {
    #[default]
    Mean,
    Sum,
    First,
    Last,
    Max,
    Min,
}

impl AggRule {
    /// Aggregates the non-missing (non-NaN) values; NaN when none remain.
    fn apply(self, values: &[f64]) -> f64 {
        let values: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
        if values.is_empty() {
            return f64::NAN;
        }
        match self {
            AggRule::Mean => values.iter().sum::<f64>() / values.len() as f64,
            AggRule::Sum => values.iter().sum(),
            AggRule::First => values[0],
            AggRule::Last => values[values.len() - 1],
            AggRule::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            AggRule::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        }
    }
}

impl FromStr for AggRule {
    type Err = StratTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mean" | "avg" => Ok(AggRule::Mean),
            "sum" => Ok(AggRule::Sum),
            "first" => Ok(AggRule::First),
            "last" => Ok(AggRule::Last),
            "max" => Ok(AggRule::Max),
            "min" => Ok(AggRule::Min),
            other => Err(StratTestError::ConfigInvalid {
                section: "data".into(),
                key: "aux_rules".into(),
                reason: format!("unknown aggregation rule '{other}'"),
            }),
        }
    }
}

/// Fixed bar frequency, e.g. `30min`, `15s`, `1h`, `1d`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Frequency {
    seconds: i64,
}

impl Frequency {
    pub fn from_seconds(seconds: i64) -> Option<Self> {
        (seconds > 0).then_some(Frequency { seconds })
    }

    pub fn seconds(&self) -> i64 {
        self.seconds
    }
}

impl FromStr for Frequency {
    type Err = StratTestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| StratTestError::InvalidFrequency {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = s.trim();
        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);

        let count: i64 = if digits.is_empty() {
            1
        } else {
            digits.parse().map_err(|_| invalid("count out of range"))?
        };

        let unit_seconds = match unit {
            "s" | "S" | "sec" => 1,
            "min" | "T" => 60,
            "h" | "H" => 3_600,
            "d" | "D" => 86_400,
            "" => return Err(invalid("missing unit")),
            _ => return Err(invalid("unknown unit")),
        };

        count
            .checked_mul(unit_seconds)
            .and_then(Frequency::from_seconds)
            .ok_or_else(|| invalid("frequency must be positive"))
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % 86_400 == 0 {
            write!(f, "{}d", s / 86_400)
        } else if s % 3_600 == 0 {
            write!(f, "{}h", s / 3_600)
        } else if s % 60 == 0 {
            write!(f, "{}min", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

/// Target frequency plus per-column aggregation rules. Auxiliary columns
/// without an explicit rule are averaged.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleSpec {
    pub frequency: Frequency,
    pub rules: BTreeMap<String, AggRule>,
}

impl ResampleSpec {
    pub fn new(frequency: Frequency) -> Self {
        ResampleSpec {
            frequency,
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, column: &str, rule: AggRule) -> Self {
        self.rules.insert(column.to_string(), rule);
        self
    }

    fn rule_for(&self, column: &str) -> AggRule {
        self.rules.get(column).copied().unwrap_or_default()
    }
}

/// Resampled bars and their aggregated auxiliary columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResampledBars {
    pub bars: Vec<Bar>,
    pub aux: BTreeMap<String, Vec<f64>>,
}

struct Bucket {
    start: i64,
    first: usize,
    last: usize,
}

pub fn resample(series: &TickSeries, spec: &ResampleSpec) -> Result<ResampledBars, StratTestError> {
    ensure_strictly_increasing(series.ticks.iter().map(|t| t.timestamp))?;

    for column in &series.aux {
        if column.values.len() != series.ticks.len() {
            return Err(StratTestError::Data {
                reason: format!(
                    "auxiliary column '{}' has {} rows, expected {}",
                    column.name,
                    column.values.len(),
                    series.ticks.len()
                ),
            });
        }
    }

    let freq = spec.frequency.seconds();
    let mut buckets: Vec<Bucket> = Vec::new();
    for (i, tick) in series.ticks.iter().enumerate() {
        let start = tick.timestamp.and_utc().timestamp().div_euclid(freq) * freq;
        match buckets.last_mut() {
            Some(b) if b.start == start => b.last = i,
            _ => buckets.push(Bucket {
                start,
                first: i,
                last: i,
            }),
        }
    }

    let mut result = ResampledBars::default();
    for column in &series.aux {
        result
            .aux
            .insert(column.name.clone(), Vec::with_capacity(buckets.len()));
    }

    for bucket in &buckets {
        let ticks = &series.ticks[bucket.first..=bucket.last];
        let label = DateTime::from_timestamp(bucket.start + freq, 0)
            .ok_or_else(|| StratTestError::Data {
                reason: format!("bucket timestamp {} out of range", bucket.start + freq),
            })?
            .naive_utc();

        let high = ticks.iter().map(|t| t.price).fold(f64::NEG_INFINITY, f64::max);
        let low = ticks.iter().map(|t| t.price).fold(f64::INFINITY, f64::min);
        let volume = ticks
            .iter()
            .filter_map(|t| t.volume)
            .fold(None, |acc: Option<f64>, v| Some(acc.unwrap_or(0.0) + v));

        result.bars.push(Bar {
            timestamp: label,
            open: ticks[0].price,
            high,
            low,
            close: ticks[ticks.len() - 1].price,
            volume,
        });

        for column in &series.aux {
            let rule = spec.rule_for(&column.name);
            let value = rule.apply(&column.values[bucket.first..=bucket.last]);
            if let Some(out) = result.aux.get_mut(&column.name) {
                out.push(value);
            }
        }
    }

    tracing::debug!(
        ticks = series.ticks.len(),
        bars = result.bars.len(),
        frequency = %spec.frequency,
        "resampled ticks"
    );

    Ok(result)
}
