//! Prediction table access port trait.

use crate::domain::error::MlstockError;
use crate::domain::prediction::PredictionRow;
use chrono::NaiveDate;

pub trait PredictionSource {
    /// Rows whose trade date falls in `[start_date, end_date]`, inclusive.
    fn load_predictions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PredictionRow>, MlstockError>;
}
