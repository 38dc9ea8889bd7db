//! Per-stock, per-period model predictions consumed by the backtest.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// One row of the prediction table, keyed by (trade_date, stock_id).
///
/// `trade_date` and `stock_id` are optional only so that malformed input can
/// be represented and rejected by the evaluator; `predicted_win_loss` and
/// `realized_next_period_return` are optional because rows missing them are
/// dropped rather than rejected.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub trade_date: Option<NaiveDate>,
    pub stock_id: Option<String>,
    /// Lower is preferred.
    pub predicted_rank_score: f64,
    pub predicted_win_loss: Option<u8>,
    pub realized_next_period_return: Option<f64>,
    pub benchmark_return: f64,
    pub features: BTreeMap<String, f64>,
}

impl PredictionRow {
    pub fn new(
        trade_date: NaiveDate,
        stock_id: impl Into<String>,
        predicted_rank_score: f64,
        predicted_win_loss: u8,
        realized_next_period_return: f64,
        benchmark_return: f64,
    ) -> Self {
        PredictionRow {
            trade_date: Some(trade_date),
            stock_id: Some(stock_id.into()),
            predicted_rank_score,
            predicted_win_loss: Some(predicted_win_loss),
            realized_next_period_return: Some(realized_next_period_return),
            benchmark_return,
            features: BTreeMap::new(),
        }
    }

    pub fn with_feature(mut self, name: &str, value: f64) -> Self {
        self.features.insert(name.to_string(), value);
        self
    }

    /// A row enters ranking only with a finite realized return and a win/loss
    /// label of 1. A NaN return counts as missing.
    pub fn is_eligible(&self) -> bool {
        self.realized_next_period_return.is_some_and(f64::is_finite)
            && self.predicted_win_loss == Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, 1, 7).unwrap()
    }

    #[test]
    fn new_row_is_fully_populated() {
        let row = PredictionRow::new(date(), "600000.SH", 0.3, 1, 0.02, 0.01);
        assert_eq!(row.trade_date, Some(date()));
        assert_eq!(row.stock_id.as_deref(), Some("600000.SH"));
        assert!(row.features.is_empty());
        assert!(row.is_eligible());
    }

    #[test]
    fn predicted_loss_is_not_eligible() {
        let row = PredictionRow::new(date(), "A", 0.1, 0, 0.2, 0.0);
        assert!(!row.is_eligible());
    }

    #[test]
    fn missing_fields_are_not_eligible() {
        let mut row = PredictionRow::new(date(), "A", 0.1, 1, 0.2, 0.0);
        row.realized_next_period_return = None;
        assert!(!row.is_eligible());

        let mut row = PredictionRow::new(date(), "A", 0.1, 1, 0.2, 0.0);
        row.predicted_win_loss = None;
        assert!(!row.is_eligible());

        let row = PredictionRow::new(date(), "A", 0.1, 1, f64::NAN, 0.0);
        assert!(!row.is_eligible());
    }

    #[test]
    fn with_feature_adds_columns() {
        let row = PredictionRow::new(date(), "A", 0.1, 1, 0.2, 0.0)
            .with_feature("momentum", 0.5)
            .with_feature("turnover", 1.2);
        assert_eq!(row.features.get("momentum"), Some(&0.5));
        assert_eq!(row.features.len(), 2);
    }
}
