//! Factor (indicator) extraction from raw provider records.
//!
//! A factor turns provider fields into a normalized row-table keyed by
//! (stock, date). Concrete factors plug in through the [`Factor`] trait; the
//! backtest only ever sees the resulting table.

use crate::domain::error::MlstockError;
use crate::domain::regression::ols_simple;
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A raw record as delivered by the market-data provider.
///
/// Financial statements are keyed by announcement date rather than trade
/// date; `date()` resolves whichever is present.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub ts_code: String,
    pub trade_date: Option<NaiveDate>,
    pub ann_date: Option<NaiveDate>,
    pub fields: BTreeMap<String, f64>,
}

impl RawRecord {
    pub fn date(&self) -> Option<NaiveDate> {
        self.trade_date.or(self.ann_date)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactorRow {
    pub stock_id: String,
    pub trade_date: NaiveDate,
    pub values: BTreeMap<String, f64>,
}

pub trait Factor {
    /// Column name used in the factor table.
    fn name(&self) -> &str;

    /// Human-readable label.
    fn cname(&self) -> &str {
        "undefined"
    }

    fn calculate(&self, raw: &[RawRecord]) -> Result<Vec<FactorRow>, MlstockError>;
}

/// Keeps only `provider_fields` from each record and renames them pairwise to
/// `factor_names`. Records without a date, or missing any listed field, are
/// skipped.
pub fn extract_fields(
    raw: &[RawRecord],
    provider_fields: &[&str],
    factor_names: &[&str],
) -> Result<Vec<FactorRow>, MlstockError> {
    if provider_fields.len() != factor_names.len() {
        return Err(MlstockError::configuration(format!(
            "{} provider fields but {} factor names",
            provider_fields.len(),
            factor_names.len()
        )));
    }

    let rows = raw
        .iter()
        .filter_map(|record| {
            let trade_date = record.date()?;
            let values = provider_fields
                .iter()
                .zip(factor_names)
                .map(|(from, to)| record.fields.get(*from).map(|v| (to.to_string(), *v)))
                .collect::<Option<BTreeMap<_, _>>>()?;
            Some(FactorRow {
                stock_id: record.ts_code.clone(),
                trade_date,
                values,
            })
        })
        .collect();
    Ok(rows)
}

/// A factor that is a direct relabelling of provider fields.
#[derive(Debug, Clone)]
pub struct FieldFactor {
    name: String,
    cname: String,
    provider_fields: Vec<String>,
    factor_names: Vec<String>,
}

impl FieldFactor {
    pub fn new(name: &str, cname: &str, provider_fields: &[&str], factor_names: &[&str]) -> Self {
        FieldFactor {
            name: name.to_string(),
            cname: cname.to_string(),
            provider_fields: provider_fields.iter().map(|s| s.to_string()).collect(),
            factor_names: factor_names.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Factor for FieldFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn cname(&self) -> &str {
        &self.cname
    }

    fn calculate(&self, raw: &[RawRecord]) -> Result<Vec<FactorRow>, MlstockError> {
        let from: Vec<&str> = self.provider_fields.iter().map(String::as_str).collect();
        let to: Vec<&str> = self.factor_names.iter().map(String::as_str).collect();
        extract_fields(raw, &from, &to)
    }
}

/// Cross-sectional residual of `field` after regressing it on `against`,
/// fitted separately for each trade date (e.g. size-neutralized value).
/// Dates with fewer than three usable records are skipped.
#[derive(Debug, Clone)]
pub struct NeutralizedFactor {
    name: String,
    field: String,
    against: String,
}

impl NeutralizedFactor {
    pub fn new(name: &str, field: &str, against: &str) -> Self {
        NeutralizedFactor {
            name: name.to_string(),
            field: field.to_string(),
            against: against.to_string(),
        }
    }
}

impl Factor for NeutralizedFactor {
    fn name(&self) -> &str {
        &self.name
    }

    fn cname(&self) -> &str {
        "neutralized residual"
    }

    fn calculate(&self, raw: &[RawRecord]) -> Result<Vec<FactorRow>, MlstockError> {
        let extracted = extract_fields(
            raw,
            &[self.field.as_str(), self.against.as_str()],
            &["y", "x"],
        )?;

        let mut by_date: BTreeMap<NaiveDate, Vec<FactorRow>> = BTreeMap::new();
        for row in extracted {
            by_date.entry(row.trade_date).or_default().push(row);
        }

        let mut out = Vec::new();
        for (trade_date, rows) in by_date {
            if rows.len() < 3 {
                continue;
            }
            let y: Vec<f64> = rows.iter().map(|r| r.values["y"]).collect();
            let x: Vec<f64> = rows.iter().map(|r| r.values["x"]).collect();
            let fit = ols_simple(&x, &y)?;
            for (row, residual) in rows.into_iter().zip(fit.residuals) {
                out.push(FactorRow {
                    stock_id: row.stock_id,
                    trade_date,
                    values: BTreeMap::from([(self.name.clone(), residual)]),
                });
            }
        }
        Ok(out)
    }
}
