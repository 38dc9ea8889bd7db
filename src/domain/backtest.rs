//! Backtest evaluation: filter, group by trade date, rank-select a cohort,
//! aggregate and compound into a portfolio return series.
//!
//! The evaluator is a pure transform from prediction rows to one
//! [`PeriodPortfolioReturn`] per trade date. Selection on each date sees only
//! that date's rows; compounding is a single left-to-right scan over the
//! date-ordered aggregates.

use crate::domain::error::MlstockError;
use crate::domain::prediction::PredictionRow;
use chrono::NaiveDate;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::str::FromStr;
use tracing::{debug, trace};

pub const DEFAULT_COHORT_SIZE: i64 = 30;

/// Where the per-period benchmark return is averaged from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BenchmarkSource {
    /// Mean `benchmark_return` over the selected cohort.
    #[default]
    Cohort,
    /// Mean `benchmark_return` over every row of the date that has a realized
    /// return, before the win/loss veto.
    Universe,
}

impl FromStr for BenchmarkSource {
    type Err = MlstockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cohort" => Ok(BenchmarkSource::Cohort),
            "universe" => Ok(BenchmarkSource::Universe),
            other => Err(MlstockError::configuration(format!(
                "unknown benchmark source '{}', expected cohort or universe",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub cohort_size: i64,
    pub benchmark: BenchmarkSource,
    pub risk_free_rate: f64,
    /// Weekly rebalancing by default.
    pub periods_per_year: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default(),
            end_date: NaiveDate::from_ymd_opt(2022, 9, 1).unwrap_or_default(),
            cohort_size: DEFAULT_COHORT_SIZE,
            benchmark: BenchmarkSource::Cohort,
            risk_free_rate: 0.0,
            periods_per_year: 52.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodPortfolioReturn {
    pub trade_date: NaiveDate,
    /// Number of rows actually selected on this date.
    pub cohort_size: usize,
    pub portfolio_return: f64,
    pub benchmark_period_return: f64,
    pub cumulative_portfolio_return: f64,
    pub cumulative_benchmark_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct PeriodAggregate {
    trade_date: NaiveDate,
    cohort_size: usize,
    portfolio_return: f64,
    benchmark_return: f64,
}

/// Evaluates `rows` with a top-`cohort_size` cohort and the cohort benchmark.
pub fn evaluate(
    rows: &[PredictionRow],
    cohort_size: i64,
) -> Result<Vec<PeriodPortfolioReturn>, MlstockError> {
    let config = BacktestConfig {
        cohort_size,
        ..BacktestConfig::default()
    };
    evaluate_with(rows, &config)
}

pub fn evaluate_with(
    rows: &[PredictionRow],
    config: &BacktestConfig,
) -> Result<Vec<PeriodPortfolioReturn>, MlstockError> {
    let cohort_size = checked_cohort_size(config.cohort_size)?;
    validate_rows(rows)?;

    let eligible: Vec<&PredictionRow> = rows.iter().filter(|r| r.is_eligible()).collect();
    debug!(
        before = rows.len(),
        after = eligible.len(),
        "filtered rows by win/loss prediction"
    );

    let universe = match config.benchmark {
        BenchmarkSource::Universe => Some(universe_benchmark(rows)),
        BenchmarkSource::Cohort => None,
    };

    let groups = group_by_date(eligible);
    let mut aggregates = Vec::with_capacity(groups.len());
    for (trade_date, group) in groups {
        let cohort = select_cohort(group, cohort_size);
        let portfolio_return = mean(cohort.iter().filter_map(|r| r.realized_next_period_return));
        let cohort_benchmark = mean(cohort.iter().map(|r| r.benchmark_return));
        let benchmark_return = universe
            .as_ref()
            .and_then(|u| u.get(&trade_date).copied())
            .unwrap_or(cohort_benchmark);

        trace!(%trade_date, selected = cohort.len(), portfolio_return, benchmark_return);
        aggregates.push(PeriodAggregate {
            trade_date,
            cohort_size: cohort.len(),
            portfolio_return,
            benchmark_return,
        });
    }

    Ok(compound(&aggregates))
}

fn checked_cohort_size(cohort_size: i64) -> Result<usize, MlstockError> {
    if cohort_size <= 0 {
        return Err(MlstockError::configuration(format!(
            "cohort_size must be positive, got {}",
            cohort_size
        )));
    }
    usize::try_from(cohort_size)
        .map_err(|_| MlstockError::configuration(format!("cohort_size {} is too large", cohort_size)))
}

/// Rejects null keys and duplicate (trade_date, stock_id) pairs, stopping at
/// the first offending row.
fn validate_rows(rows: &[PredictionRow]) -> Result<(), MlstockError> {
    let mut seen: HashSet<(NaiveDate, &str)> = HashSet::with_capacity(rows.len());
    for (idx, row) in rows.iter().enumerate() {
        let trade_date = row
            .trade_date
            .ok_or_else(|| MlstockError::invalid_input(format!("row {}: null trade_date", idx)))?;
        let stock_id = row
            .stock_id
            .as_deref()
            .ok_or_else(|| MlstockError::invalid_input(format!("row {}: null stock_id", idx)))?;
        if !seen.insert((trade_date, stock_id)) {
            return Err(MlstockError::invalid_input(format!(
                "row {}: duplicate stock {} on {}",
                idx,
                stock_id,
                trade_date.format("%Y%m%d")
            )));
        }
    }
    Ok(())
}

fn group_by_date(rows: Vec<&PredictionRow>) -> BTreeMap<NaiveDate, Vec<&PredictionRow>> {
    let mut groups: BTreeMap<NaiveDate, Vec<&PredictionRow>> = BTreeMap::new();
    for row in rows {
        if let Some(date) = row.trade_date {
            groups.entry(date).or_default().push(row);
        }
    }
    groups
}

/// Stable ascending sort on rank score (NaN last), then the first `cohort_size`.
fn select_cohort(mut group: Vec<&PredictionRow>, cohort_size: usize) -> Vec<&PredictionRow> {
    group.sort_by(|a, b| rank_order(a.predicted_rank_score, b.predicted_rank_score));
    group.truncate(cohort_size);
    group
}

fn rank_order(a: f64, b: f64) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (false, false) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
    }
}

fn universe_benchmark(rows: &[PredictionRow]) -> BTreeMap<NaiveDate, f64> {
    let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    for row in rows {
        let realized = row.realized_next_period_return.is_some_and(f64::is_finite);
        if let (Some(date), true) = (row.trade_date, realized) {
            let entry = sums.entry(date).or_insert((0.0, 0));
            entry.0 += row.benchmark_return;
            entry.1 += 1;
        }
    }
    sums.into_iter()
        .map(|(date, (sum, count))| (date, sum / count as f64))
        .collect()
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

fn compound(aggregates: &[PeriodAggregate]) -> Vec<PeriodPortfolioReturn> {
    let mut cum_portfolio = 1.0;
    let mut cum_benchmark = 1.0;
    aggregates
        .iter()
        .map(|agg| {
            cum_portfolio *= 1.0 + agg.portfolio_return;
            cum_benchmark *= 1.0 + agg.benchmark_return;
            PeriodPortfolioReturn {
                trade_date: agg.trade_date,
                cohort_size: agg.cohort_size,
                portfolio_return: agg.portfolio_return,
                benchmark_period_return: agg.benchmark_return,
                cumulative_portfolio_return: cum_portfolio - 1.0,
                cumulative_benchmark_return: cum_benchmark - 1.0,
            }
        })
        .collect()
}

/// Running `prod(1 + r) - 1` over `returns` in order.
pub fn cumulative_returns(returns: &[f64]) -> Vec<f64> {
    let mut acc = 1.0;
    returns
        .iter()
        .map(|r| {
            acc *= 1.0 + r;
            acc - 1.0
        })
        .collect()
}
