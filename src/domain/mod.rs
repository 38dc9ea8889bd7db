//! Core domain types and logic.

pub mod prediction;
pub mod backtest;
pub mod metrics;
pub mod date_range;
pub mod regression;
pub mod factor;
pub mod stock_code;
pub mod config_validation;
pub mod error;
