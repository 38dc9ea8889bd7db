//! Model collaborator port trait.

use crate::domain::error::MlstockError;
use crate::domain::prediction::PredictionRow;

/// A loaded prediction artifact, applied once per row by the orchestrator.
pub trait Predictor {
    fn predict(&self, row: &PredictionRow) -> Result<f64, MlstockError>;
}
