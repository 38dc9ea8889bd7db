//! Configuration validation.
//!
//! Validates the `[backtest]` section before any data is loaded.

use crate::domain::backtest::BenchmarkSource;
use crate::domain::date_range::parse_date;
use crate::domain::error::MlstockError;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    validate_dates(config)?;
    validate_cohort_size(config)?;
    validate_benchmark(config)?;
    validate_risk_free_rate(config)?;
    validate_periods_per_year(config)?;
    Ok(())
}

fn invalid(key: &str, reason: &str) -> MlstockError {
    MlstockError::ConfigInvalid {
        section: "backtest".to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}

fn validate_dates(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    let start = optional_date(config, "start_date")?;
    let end = optional_date(config, "end_date")?;

    if let (Some(start), Some(end)) = (start, end) {
        if start > end {
            return Err(invalid("start_date", "start_date must not be after end_date"));
        }
    }
    Ok(())
}

fn optional_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, MlstockError> {
    match config.get_string("backtest", key) {
        None => Ok(None),
        Some(s) => parse_date(&s)
            .map(Some)
            .map_err(|_| invalid(key, "invalid date format, expected YYYYMMDD")),
    }
}

fn validate_cohort_size(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    if config.get_string("backtest", "cohort_size").is_none() {
        return Ok(());
    }
    let value = config.get_int("backtest", "cohort_size", 0);
    if value < 1 {
        return Err(invalid("cohort_size", "cohort_size must be a positive integer"));
    }
    Ok(())
}

fn validate_benchmark(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    match config.get_string("backtest", "benchmark") {
        None => Ok(()),
        Some(s) => s
            .parse::<BenchmarkSource>()
            .map(|_| ())
            .map_err(|_| invalid("benchmark", "benchmark must be cohort or universe")),
    }
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(invalid("risk_free_rate", "risk_free_rate must be between 0 and 1"));
    }
    Ok(())
}

fn validate_periods_per_year(config: &dyn ConfigPort) -> Result<(), MlstockError> {
    let value = config.get_double("backtest", "periods_per_year", 52.0);
    if value <= 0.0 {
        return Err(invalid("periods_per_year", "periods_per_year must be positive"));
    }
    Ok(())
}
