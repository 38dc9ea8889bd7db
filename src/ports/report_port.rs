//! Report generation port trait.

use crate::domain::backtest::PeriodPortfolioReturn;
use crate::domain::error::MlstockError;
use crate::domain::metrics::Metrics;
use std::path::Path;

/// Port for writing the evaluated period series.
pub trait ReportPort {
    fn write(
        &self,
        periods: &[PeriodPortfolioReturn],
        metrics: &Metrics,
        output_path: &Path,
    ) -> Result<(), MlstockError>;
}
