//! Trading-date utilities: `YYYYMMDD` conversion, month/year partitioning of a
//! date range, nearest trading-date lookup and calendar offsets.

use crate::domain::error::MlstockError;
use chrono::{Datelike, Days, Months, NaiveDate};
use std::str::FromStr;

pub const DATE_FORMAT: &str = "%Y%m%d";

pub fn parse_date(s: &str) -> Result<NaiveDate, MlstockError> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
        MlstockError::invalid_input(format!("invalid date '{}', expected YYYYMMDD", s))
    })
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn check_order(start: NaiveDate, end: NaiveDate) -> Result<(), MlstockError> {
    if start > end {
        return Err(MlstockError::configuration(format!(
            "start date {} is after end date {}",
            format_date(start),
            format_date(end)
        )));
    }
    Ok(())
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|d| d.pred_opt())
        .unwrap_or(NaiveDate::MAX)
}

fn last_day_of_year(date: NaiveDate) -> NaiveDate {
    NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(NaiveDate::MAX)
}

fn split_by(
    start: NaiveDate,
    end: NaiveDate,
    period_end: fn(NaiveDate) -> NaiveDate,
) -> Result<Vec<(NaiveDate, NaiveDate)>, MlstockError> {
    check_order(start, end)?;

    let mut scopes = Vec::new();
    let mut cursor = start;
    loop {
        let sub_end = period_end(cursor).min(end);
        scopes.push((cursor, sub_end));
        match sub_end.succ_opt() {
            Some(next) if sub_end < end => cursor = next,
            _ => break,
        }
    }
    Ok(scopes)
}

/// Splits `[start, end]` into calendar-month sub-ranges.
///
/// `20210301..20220515` yields `[20210301, 20210331]`, `[20210401, 20210430]`,
/// ..., `[20220501, 20220515]`. The first range begins on `start` and the last
/// ends on `end`, even when those fall mid-month.
pub fn split_by_month(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, NaiveDate)>, MlstockError> {
    split_by(start, end, last_day_of_month)
}

/// Splits `[start, end]` into calendar-year sub-ranges, clipped to the bounds.
pub fn split_by_year(
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<(NaiveDate, NaiveDate)>, MlstockError> {
    split_by(start, end, last_day_of_year)
}

/// Finds the latest trading date on or before `target` (`include_target`) or
/// strictly before it. `trading_dates` must be ascending; the scan runs from
/// the end.
pub fn nearest_trading_date(
    target: NaiveDate,
    trading_dates: &[NaiveDate],
    include_target: bool,
) -> Option<NaiveDate> {
    trading_dates
        .iter()
        .rev()
        .find(|&&d| if include_target { d <= target } else { d < target })
        .copied()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanUnit {
    Year,
    Month,
    Week,
    Day,
}

impl FromStr for SpanUnit {
    type Err = MlstockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "year" => Ok(SpanUnit::Year),
            "month" => Ok(SpanUnit::Month),
            "week" => Ok(SpanUnit::Week),
            "day" => Ok(SpanUnit::Day),
            other => Err(MlstockError::configuration(format!(
                "unrecognized date unit: {}",
                other
            ))),
        }
    }
}

/// Shifts `date` by `amount` units; negative amounts move back in time.
/// Month and year shifts clamp to the end of a shorter month.
pub fn shift_date(date: NaiveDate, unit: SpanUnit, amount: i64) -> Result<NaiveDate, MlstockError> {
    let magnitude = amount.unsigned_abs();
    let shifted = match unit {
        SpanUnit::Year | SpanUnit::Month => {
            let months = if unit == SpanUnit::Year {
                magnitude.checked_mul(12)
            } else {
                Some(magnitude)
            };
            months
                .and_then(|m| u32::try_from(m).ok())
                .map(Months::new)
                .and_then(|m| {
                    if amount < 0 {
                        date.checked_sub_months(m)
                    } else {
                        date.checked_add_months(m)
                    }
                })
        }
        SpanUnit::Week | SpanUnit::Day => {
            let days = if unit == SpanUnit::Week {
                magnitude.checked_mul(7)
            } else {
                Some(magnitude)
            };
            days.map(Days::new).and_then(|d| {
                if amount < 0 {
                    date.checked_sub_days(d)
                } else {
                    date.checked_add_days(d)
                }
            })
        }
    };
    shifted.ok_or_else(|| {
        MlstockError::configuration(format!(
            "shifting {} by {} {:?} is out of range",
            format_date(date),
            amount,
            unit
        ))
    })
}

pub fn duration_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}
