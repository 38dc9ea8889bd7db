#![allow(dead_code)]

use chrono::NaiveDate;
use mlstock::domain::backtest::PeriodPortfolioReturn;
use mlstock::domain::error::MlstockError;
use mlstock::domain::metrics::Metrics;
pub use mlstock::domain::prediction::PredictionRow;
use mlstock::ports::model_port::Predictor;
use mlstock::ports::prediction_port::PredictionSource;
use mlstock::ports::report_port::ReportPort;
use std::cell::RefCell;
use std::path::{Path, PathBuf};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y%m%d").unwrap()
}

pub fn make_row(day: &str, code: &str, score: f64, win: u8, ret: f64, bench: f64) -> PredictionRow {
    PredictionRow::new(date(day), code, score, win, ret, bench)
}

/// A prediction table spread over `days` weekly dates starting 20220107, with
/// `per_day` stocks each. Scores rise with the stock index; every third stock
/// is vetoed.
pub fn make_table(days: usize, per_day: usize) -> Vec<PredictionRow> {
    let start = date("20220107");
    let mut rows = Vec::with_capacity(days * per_day);
    for d in 0..days {
        let trade_date = start + chrono::Duration::days(7 * d as i64);
        for s in 0..per_day {
            let win = if s % 3 == 2 { 0 } else { 1 };
            let ret = ((s as f64) - (per_day as f64) / 2.0) / 100.0;
            rows.push(PredictionRow::new(
                trade_date,
                format!("{:06}.SZ", s + 1),
                s as f64 / per_day as f64,
                win,
                ret,
                0.001 * d as f64,
            ));
        }
    }
    rows
}

pub struct MockPredictionSource {
    pub rows: Vec<PredictionRow>,
    pub error: Option<String>,
}

impl MockPredictionSource {
    pub fn new(rows: Vec<PredictionRow>) -> Self {
        Self { rows, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            rows: Vec::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl PredictionSource for MockPredictionSource {
    fn load_predictions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PredictionRow>, MlstockError> {
        if let Some(reason) = &self.error {
            return Err(MlstockError::DataParse {
                reason: reason.clone(),
            });
        }
        Ok(self
            .rows
            .iter()
            .filter(|r| r.trade_date.is_none_or(|d| d >= start_date && d <= end_date))
            .cloned()
            .collect())
    }
}

/// Predicts the value of one feature, or a constant when no feature is named.
pub struct FeaturePredictor {
    pub feature: Option<String>,
    pub constant: f64,
}

impl FeaturePredictor {
    pub fn feature(name: &str) -> Self {
        Self {
            feature: Some(name.to_string()),
            constant: 0.0,
        }
    }

    pub fn constant(value: f64) -> Self {
        Self {
            feature: None,
            constant: value,
        }
    }
}

impl Predictor for FeaturePredictor {
    fn predict(&self, row: &PredictionRow) -> Result<f64, MlstockError> {
        match &self.feature {
            Some(name) => row
                .features
                .get(name)
                .copied()
                .ok_or_else(|| MlstockError::invalid_input(format!("missing feature '{}'", name))),
            None => Ok(self.constant),
        }
    }
}

/// Captures what would have been written.
#[derive(Default)]
pub struct RecordingReport {
    pub written: RefCell<Option<(Vec<PeriodPortfolioReturn>, PathBuf)>>,
}

impl ReportPort for RecordingReport {
    fn write(
        &self,
        periods: &[PeriodPortfolioReturn],
        _metrics: &Metrics,
        output_path: &Path,
    ) -> Result<(), MlstockError> {
        *self.written.borrow_mut() = Some((periods.to_vec(), output_path.to_path_buf()));
        Ok(())
    }
}
