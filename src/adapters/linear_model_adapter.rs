//! Linear model artifacts stored as INI coefficient files.
//!
//! ```ini
//! [model]
//! kind = classifier
//! intercept = -0.2
//! threshold = 0.5
//!
//! [coefficients]
//! momentum = 1.3
//! turnover = -0.4
//! ```
//!
//! A `regression` model predicts `intercept + Σ w·x`; a `classifier` maps that
//! through a logistic function and predicts 1 when it reaches `threshold`.

use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::domain::error::MlstockError;
use crate::domain::prediction::PredictionRow;
use crate::ports::config_port::ConfigPort;
use crate::ports::model_port::Predictor;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModelKind {
    Regression,
    Classifier { threshold: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    pub kind: ModelKind,
    pub intercept: f64,
    pub coefficients: Vec<(String, f64)>,
}

impl LinearModel {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, MlstockError> {
        Self::build(&FileConfigAdapter::from_file(path)?)
    }

    pub fn from_string(content: &str) -> Result<Self, MlstockError> {
        Self::build(&FileConfigAdapter::from_string(content)?)
    }

    fn build(config: &FileConfigAdapter) -> Result<Self, MlstockError> {
        let kind = match config.get_trimmed("model", "kind").as_deref() {
            Some("regression") => ModelKind::Regression,
            Some("classifier") => {
                let threshold = config.get_double("model", "threshold", 0.5);
                if !(0.0..=1.0).contains(&threshold) {
                    return Err(MlstockError::ConfigInvalid {
                        section: "model".into(),
                        key: "threshold".into(),
                        reason: "threshold must be between 0 and 1".into(),
                    });
                }
                ModelKind::Classifier { threshold }
            }
            Some(other) => {
                return Err(MlstockError::ConfigInvalid {
                    section: "model".into(),
                    key: "kind".into(),
                    reason: format!("unknown model kind '{}'", other),
                });
            }
            None => {
                return Err(MlstockError::ConfigMissing {
                    section: "model".into(),
                    key: "kind".into(),
                });
            }
        };

        let coefficients = config
            .section_entries("coefficients")
            .into_iter()
            .map(|(feature, raw)| {
                let weight = raw.trim().parse::<f64>().map_err(|_| MlstockError::ConfigInvalid {
                    section: "coefficients".into(),
                    key: feature.clone(),
                    reason: format!("'{}' is not a number", raw),
                })?;
                Ok((feature, weight))
            })
            .collect::<Result<Vec<_>, MlstockError>>()?;

        Ok(LinearModel {
            kind,
            intercept: config.get_double("model", "intercept", 0.0),
            coefficients,
        })
    }

    fn linear_score(&self, row: &PredictionRow) -> Result<f64, MlstockError> {
        self.coefficients
            .iter()
            .try_fold(self.intercept, |acc, (feature, weight)| {
                let x = row.features.get(feature).ok_or_else(|| {
                    MlstockError::invalid_input(format!(
                        "stock {} on {}: missing feature '{}'",
                        row.stock_id.as_deref().unwrap_or("?"),
                        row.trade_date
                            .map(|d| d.format("%Y%m%d").to_string())
                            .unwrap_or_else(|| "?".to_string()),
                        feature
                    ))
                })?;
                Ok(acc + weight * x)
            })
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Predictor for LinearModel {
    fn predict(&self, row: &PredictionRow) -> Result<f64, MlstockError> {
        let z = self.linear_score(row)?;
        Ok(match self.kind {
            ModelKind::Regression => z,
            ModelKind::Classifier { threshold } => {
                if sigmoid(z) >= threshold {
                    1.0
                } else {
                    0.0
                }
            }
        })
    }
}
