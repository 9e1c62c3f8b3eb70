//! Market data access port trait.

use crate::domain::error::StratTestError;
use crate::domain::ohlcv::Bar;
use crate::domain::resample::TickSeries;

pub trait DataPort {
    /// Bars already at the target frequency, for live mode.
    fn fetch_bars(&self) -> Result<Vec<Bar>, StratTestError>;

    /// Raw ticks plus auxiliary columns, for backtest mode.
    fn fetch_ticks(&self) -> Result<TickSeries, StratTestError>;
}
