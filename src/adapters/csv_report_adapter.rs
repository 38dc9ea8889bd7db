//! CSV report writer for the evaluated period series.
//!
//! One line per trade date: the per-period portfolio and benchmark returns and
//! their cumulative values. Charting tools read this file directly.

use crate::domain::backtest::PeriodPortfolioReturn;
use crate::domain::date_range::format_date;
use crate::domain::error::MlstockError;
use crate::domain::metrics::Metrics;
use crate::ports::report_port::ReportPort;
use std::fs;
use std::path::Path;
use tracing::info;

pub const HEADER: [&str; 6] = [
    "trade_date",
    "cohort_size",
    "portfolio_return",
    "benchmark_return",
    "cumulative_portfolio_return",
    "cumulative_benchmark_return",
];

pub struct CsvReportAdapter;

fn csv_error(e: csv::Error) -> MlstockError {
    MlstockError::Io(std::io::Error::other(e))
}

impl ReportPort for CsvReportAdapter {
    fn write(
        &self,
        periods: &[PeriodPortfolioReturn],
        metrics: &Metrics,
        output_path: &Path,
    ) -> Result<(), MlstockError> {
        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut wtr = csv::Writer::from_path(output_path).map_err(csv_error)?;
        wtr.write_record(HEADER).map_err(csv_error)?;
        for p in periods {
            wtr.write_record([
                format_date(p.trade_date),
                p.cohort_size.to_string(),
                p.portfolio_return.to_string(),
                p.benchmark_period_return.to_string(),
                p.cumulative_portfolio_return.to_string(),
                p.cumulative_benchmark_return.to_string(),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;

        info!(
            periods = metrics.periods,
            total_return = metrics.total_return,
            path = %output_path.display(),
            "report written"
        );
        Ok(())
    }
}
