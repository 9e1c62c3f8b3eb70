//! Report output port trait.

use std::path::Path;

use crate::domain::engine::StrategyRun;
use crate::domain::error::StratTestError;

/// Port for writing the result of a strategy run.
pub trait ReportPort {
    fn write(&self, run: &StrategyRun, output_dir: &Path) -> Result<(), StratTestError>;
}
