#![allow(dead_code)]

use chrono::{Duration, NaiveDateTime};
use strattest::domain::error::StratTestError;
pub use strattest::domain::ohlcv::Bar;
use strattest::domain::ohlcv::parse_timestamp;
use strattest::domain::resample::{AuxColumn, Tick, TickSeries};
use strattest::domain::indicator::MovingAverage;
use strattest::domain::strategy::{Side, Strategy};
use strattest::ports::data_port::DataPort;

/// Serves fixed bars and ticks, or a fixed error.
pub struct MockDataPort {
    pub bars: Vec<Bar>,
    pub ticks: TickSeries,
    pub error: Option<String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            bars: Vec::new(),
            ticks: TickSeries::default(),
            error: None,
        }
    }

    pub fn with_bars(mut self, bars: Vec<Bar>) -> Self {
        self.bars = bars;
        self
    }

    pub fn with_ticks(mut self, ticks: TickSeries) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    fn check(&self) -> Result<(), StratTestError> {
        match &self.error {
            Some(reason) => Err(StratTestError::Data {
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DataPort for MockDataPort {
    fn fetch_bars(&self) -> Result<Vec<Bar>, StratTestError> {
        self.check()?;
        Ok(self.bars.clone())
    }

    fn fetch_ticks(&self) -> Result<TickSeries, StratTestError> {
        self.check()?;
        Ok(self.ticks.clone())
    }
}

pub fn start() -> NaiveDateTime {
    parse_timestamp("2024-01-01 00:00:00").unwrap()
}

/// Flat bars (open = high = low = close), 30 minutes apart.
pub fn bars_from_closes(closes: &[f64]) -> Vec<Bar> {
    let rows: Vec<_> = closes.iter().map(|&c| (c, c, c, c)).collect();
    ohlc_bars(&rows)
}

/// Bars from `(open, high, low, close)` rows, 30 minutes apart.
pub fn ohlc_bars(rows: &[(f64, f64, f64, f64)]) -> Vec<Bar> {
    rows.iter()
        .enumerate()
        .map(|(i, &(open, high, low, close))| Bar {
            timestamp: start() + Duration::minutes(30 * i as i64),
            open,
            high,
            low,
            close,
            volume: Some(1000.0),
        })
        .collect()
}

/// Ticks at the given second offsets from [`start`], with one `bid_size`
/// auxiliary column.
pub fn make_ticks(rows: &[(i64, f64, f64)]) -> TickSeries {
    TickSeries {
        ticks: rows
            .iter()
            .map(|&(secs, price, _)| Tick {
                timestamp: start() + Duration::seconds(secs),
                price,
                volume: Some(1.0),
            })
            .collect(),
        aux: vec![AuxColumn {
            name: "bid_size".to_string(),
            values: rows.iter().map(|r| r.2).collect(),
        }],
    }
}

/// Long stop-out on bar 2 followed by a recovery that re-enters on bar 4.
pub fn stop_and_recover_bars() -> Vec<Bar> {
    ohlc_bars(&[
        (10.0, 10.0, 10.0, 10.0),
        (10.0, 10.0, 10.0, 10.0),
        (10.0, 10.0, 9.0, 9.2),
        (9.2, 9.8, 9.1, 9.7),
        (9.7, 10.6, 9.7, 10.5),
        (10.5, 10.7, 10.4, 10.6),
        (10.6, 10.6, 10.5, 10.5),
    ])
}

/// A small spread of strategies covering every variant.
pub fn sample_strategies() -> Vec<Strategy> {
    vec![
        Strategy::MaCrossover {
            ma: MovingAverage::Sma,
            fast: 2,
            slow: 4,
            side: Side::LongShort,
        },
        Strategy::MaCrossover {
            ma: MovingAverage::Ema,
            fast: 3,
            slow: 6,
            side: Side::LongOnly,
        },
        Strategy::BollingerBreakout {
            window: 5,
            stddev_mult_x100: 100,
        },
        Strategy::RsiThreshold {
            window: 4,
            threshold: 60.0,
        },
        Strategy::BuyAndHold,
    ]
}
