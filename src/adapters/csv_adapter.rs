//! CSV prediction table adapter.
//!
//! Reads a header-row CSV keyed by (trade_date, stock_id). Empty cells are
//! nulls. Columns other than the six known ones are kept as numeric features
//! for the model collaborators.

use crate::domain::date_range::{format_date, parse_date};
use crate::domain::error::MlstockError;
use crate::domain::prediction::PredictionRow;
use crate::domain::stock_code::normalize_stock_code;
use crate::ports::prediction_port::PredictionSource;
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{debug, warn};

const TRADE_DATE: &[&str] = &["trade_date"];
const STOCK_ID: &[&str] = &["stock_id", "ts_code"];
const RANK_SCORE: &[&str] = &["predicted_rank_score", "y_pred"];
const WIN_LOSS: &[&str] = &["predicted_win_loss", "pred_winloss"];
const REALIZED: &[&str] = &["realized_next_period_return", "next_pct_chg"];
const BENCHMARK: &[&str] = &["benchmark_return", "pct_chg_baseline"];

pub struct CsvAdapter {
    path: PathBuf,
}

struct Columns {
    trade_date: usize,
    stock_id: usize,
    rank_score: Option<usize>,
    win_loss: Option<usize>,
    realized: usize,
    benchmark: usize,
    features: Vec<(usize, String)>,
}

impl CsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn resolve_columns(headers: &StringRecord) -> Result<Columns, MlstockError> {
        let find = |aliases: &[&str]| {
            headers
                .iter()
                .position(|h| aliases.iter().any(|a| *a == h.trim()))
        };
        let require = |aliases: &[&str]| {
            find(aliases).ok_or_else(|| MlstockError::DataParse {
                reason: format!("missing {} column", aliases[0]),
            })
        };

        let known: Vec<&str> = [TRADE_DATE, STOCK_ID, RANK_SCORE, WIN_LOSS, REALIZED, BENCHMARK]
            .concat();
        let features = headers
            .iter()
            .enumerate()
            .filter(|(_, h)| !known.iter().any(|k| *k == h.trim()))
            .map(|(i, h)| (i, h.trim().to_string()))
            .collect();

        Ok(Columns {
            trade_date: require(TRADE_DATE)?,
            stock_id: require(STOCK_ID)?,
            rank_score: find(RANK_SCORE),
            win_loss: find(WIN_LOSS),
            realized: require(REALIZED)?,
            benchmark: require(BENCHMARK)?,
            features,
        })
    }

    fn parse_row(
        record: &StringRecord,
        columns: &Columns,
        line: u64,
    ) -> Result<PredictionRow, MlstockError> {
        let cell = |idx: usize| record.get(idx).map(str::trim).filter(|s| !s.is_empty());
        // NaN and infinite cells read as null, like empty ones.
        let number = |idx: usize, name: &str| -> Result<Option<f64>, MlstockError> {
            cell(idx)
                .map(|s| {
                    s.parse::<f64>().map_err(|e| MlstockError::DataParse {
                        reason: format!("line {}: invalid {} '{}': {}", line, name, s, e),
                    })
                })
                .transpose()
                .map(|v| v.filter(|x| x.is_finite()))
        };

        let trade_date = cell(columns.trade_date)
            .map(|s| {
                parse_date(s).map_err(|e| MlstockError::DataParse {
                    reason: format!("line {}: {}", line, e),
                })
            })
            .transpose()?;

        let predicted_win_loss = match columns.win_loss {
            Some(idx) => match number(idx, "predicted_win_loss")? {
                None => None,
                Some(v) if v == 0.0 => Some(0),
                Some(v) if v == 1.0 => Some(1),
                Some(v) => {
                    return Err(MlstockError::DataParse {
                        reason: format!("line {}: predicted_win_loss must be 0 or 1, got {}", line, v),
                    });
                }
            },
            None => None,
        };

        let predicted_rank_score = match columns.rank_score {
            Some(idx) => number(idx, "predicted_rank_score")?.unwrap_or(f64::NAN),
            None => f64::NAN,
        };

        let benchmark_return =
            number(columns.benchmark, "benchmark_return")?.ok_or_else(|| MlstockError::DataParse {
                reason: format!("line {}: missing benchmark_return", line),
            })?;

        let features = columns
            .features
            .iter()
            .filter_map(|(idx, name)| {
                let raw = cell(*idx)?;
                match raw.parse::<f64>() {
                    Ok(v) if v.is_finite() => Some((name.clone(), v)),
                    _ => {
                        warn!(line, feature = %name, value = raw, "skipping non-numeric feature cell");
                        None
                    }
                }
            })
            .collect::<BTreeMap<_, _>>();

        Ok(PredictionRow {
            trade_date,
            stock_id: cell(columns.stock_id).map(normalize_stock_code),
            predicted_rank_score,
            predicted_win_loss,
            realized_next_period_return: number(columns.realized, "realized_next_period_return")?,
            benchmark_return,
            features,
        })
    }
}

fn date_extent(rows: &[PredictionRow]) -> (String, String) {
    let dates = rows.iter().filter_map(|r| r.trade_date);
    let min = dates.clone().min().map(format_date).unwrap_or_default();
    let max = dates.max().map(format_date).unwrap_or_default();
    (min, max)
}

impl PredictionSource for CsvAdapter {
    fn load_predictions(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PredictionRow>, MlstockError> {
        if !self.path.exists() {
            return Err(MlstockError::MissingArtifact {
                path: self.path.display().to_string(),
            });
        }

        let mut rdr = csv::Reader::from_path(&self.path).map_err(|e| MlstockError::DataParse {
            reason: format!("failed to read {}: {}", self.path.display(), e),
        })?;
        let headers = rdr.headers().map_err(|e| MlstockError::DataParse {
            reason: format!("CSV header error: {}", e),
        })?;
        let columns = Self::resolve_columns(headers)?;
        if columns.rank_score.is_none() {
            warn!("no predicted_rank_score column; scores must come from a model");
        }
        if columns.win_loss.is_none() {
            warn!("no predicted_win_loss column; labels must come from a model");
        }

        let mut rows = Vec::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| MlstockError::DataParse {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record.position().map(|p| p.line()).unwrap_or(i as u64 + 2);
            rows.push(Self::parse_row(&record, &columns, line)?);
        }

        let original_size = rows.len();
        let (original_start, original_end) = date_extent(&rows);

        // Rows without a date are kept so the evaluator can reject them.
        rows.retain(|r| match r.trade_date {
            Some(d) => d >= start_date && d <= end_date,
            None => true,
        });

        debug!(
            "data {}~{} {} rows, filtered to {}~{} {} rows",
            original_start,
            original_end,
            original_size,
            format_date(start_date),
            format_date(end_date),
            rows.len()
        );
        Ok(rows)
    }
}
