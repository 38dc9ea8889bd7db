//! Integration tests for the evaluation core and metrics.
//!
//! Tests cover:
//! - Multi-date scenarios through `evaluate` / `evaluate_with`
//! - Ordering, cohort size, idempotence, veto and tie properties (proptest)
//! - Metrics over the evaluated series

mod common;

use approx::assert_abs_diff_eq;
use common::*;
use mlstock::domain::backtest::{
    cumulative_returns, evaluate, evaluate_with, BacktestConfig, BenchmarkSource,
};
use mlstock::domain::error::MlstockError;
use mlstock::domain::metrics::Metrics;
use proptest::prelude::*;

mod scenarios {
    use super::*;

    #[test]
    fn three_dates_compound_in_order() {
        let rows = vec![
            make_row("20220121", "600000.SH", 0.1, 1, 0.03, 0.0),
            make_row("20220107", "600000.SH", 0.1, 1, 0.05, 0.0),
            make_row("20220114", "600000.SH", 0.1, 1, -0.02, 0.0),
        ];
        let out = evaluate(&rows, 30).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].trade_date, date("20220107"));
        assert_eq!(out[2].trade_date, date("20220121"));
        assert_abs_diff_eq!(
            out[2].cumulative_portfolio_return,
            1.05 * 0.98 * 1.03 - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn date_with_no_eligible_rows_is_absent() {
        let rows = vec![
            make_row("20220107", "A", 0.1, 1, 0.05, 0.01),
            make_row("20220114", "A", 0.1, 0, 0.50, 0.40),
            make_row("20220121", "A", 0.1, 1, 0.03, -0.02),
        ];
        let out = evaluate(&rows, 30).unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[1].trade_date, date("20220121"));
        assert_abs_diff_eq!(
            out[1].cumulative_portfolio_return,
            1.05 * 1.03 - 1.0,
            epsilon = 1e-12
        );
        assert_abs_diff_eq!(out[1].benchmark_period_return, -0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(
            out[1].cumulative_benchmark_return,
            1.01 * 0.98 - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn veto_excludes_best_ranked_row() {
        let rows = vec![
            make_row("20220107", "A", 0.1, 1, 0.10, 0.0),
            make_row("20220107", "B", 0.2, 1, -0.05, 0.0),
            make_row("20220107", "C", 0.05, 0, 0.20, 0.0),
        ];
        let out = evaluate(&rows, 2).unwrap();
        assert_abs_diff_eq!(out[0].portfolio_return, 0.025, epsilon = 1e-12);
    }

    #[test]
    fn benchmark_compounds_alongside_portfolio() {
        let rows = vec![
            make_row("20220107", "A", 0.1, 1, 0.02, 0.01),
            make_row("20220107", "B", 0.2, 1, 0.04, 0.03),
            make_row("20220114", "A", 0.1, 1, 0.00, -0.02),
        ];
        let out = evaluate(&rows, 30).unwrap();

        assert_abs_diff_eq!(out[0].benchmark_period_return, 0.02, epsilon = 1e-12);
        assert_abs_diff_eq!(
            out[1].cumulative_benchmark_return,
            1.02 * 0.98 - 1.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn universe_benchmark_config() {
        let rows = vec![
            make_row("20220107", "A", 0.1, 1, 0.02, 0.01),
            make_row("20220107", "B", 0.2, 0, 0.04, 0.05),
        ];
        let config = BacktestConfig {
            benchmark: BenchmarkSource::Universe,
            ..BacktestConfig::default()
        };
        let out = evaluate_with(&rows, &config).unwrap();
        assert_abs_diff_eq!(out[0].benchmark_period_return, 0.03, epsilon = 1e-12);
        assert_abs_diff_eq!(out[0].portfolio_return, 0.02, epsilon = 1e-12);
    }

    #[test]
    fn empty_input_gives_empty_series() {
        assert!(evaluate(&[], 30).unwrap().is_empty());
    }

    #[test]
    fn null_key_is_invalid_input() {
        let mut row = make_row("20220107", "A", 0.1, 1, 0.02, 0.0);
        row.stock_id = None;
        assert!(matches!(
            evaluate(&[row], 30),
            Err(MlstockError::InvalidInput { .. })
        ));
    }

    #[test]
    fn zero_cohort_is_configuration_error() {
        let rows = make_table(2, 4);
        assert!(matches!(
            evaluate(&rows, 0),
            Err(MlstockError::Configuration { .. })
        ));
    }

    #[test]
    fn cumulative_matches_manual_product() {
        let cum = cumulative_returns(&[0.05, -0.02, 0.03]);
        assert_abs_diff_eq!(cum[0], 0.05, epsilon = 1e-12);
        assert_abs_diff_eq!(cum[1], 1.05 * 0.98 - 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(cum[2], 1.05 * 0.98 * 1.03 - 1.0, epsilon = 1e-12);
    }
}

mod metrics_over_series {
    use super::*;

    #[test]
    fn total_return_is_last_cumulative() {
        let rows = make_table(10, 9);
        let out = evaluate(&rows, 3).unwrap();
        let metrics = Metrics::compute(&out, 0.0, 52.0);

        assert_eq!(metrics.periods, 10);
        assert_abs_diff_eq!(
            metrics.total_return,
            out.last().unwrap().cumulative_portfolio_return,
            epsilon = 1e-12
        );
        assert!(metrics.max_drawdown >= 0.0);
        assert!((0.0..=1.0).contains(&metrics.win_rate));
    }

    #[test]
    fn empty_series_is_all_zero() {
        let metrics = Metrics::compute(&[], 0.0, 52.0);
        assert_eq!(metrics.periods, 0);
        assert_eq!(metrics.total_return, 0.0);
        assert_eq!(metrics.sharpe_ratio, 0.0);
    }
}

fn arb_rows() -> impl Strategy<Value = Vec<PredictionRow>> {
    prop::collection::vec(
        (0u32..6, 0u8..2, -10i32..10, -50i32..50),
        0..60,
    )
    .prop_map(|cells| {
        cells
            .into_iter()
            .enumerate()
            .map(|(i, (day, win, score, ret))| {
                PredictionRow::new(
                    date("20220103") + chrono::Duration::days(7 * day as i64),
                    format!("S{:03}", i),
                    score as f64 / 10.0,
                    win,
                    ret as f64 / 1000.0,
                    0.0,
                )
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn dates_are_strictly_increasing(rows in arb_rows(), k in 1i64..10) {
        let out = evaluate(&rows, k).unwrap();
        for pair in out.windows(2) {
            prop_assert!(pair[0].trade_date < pair[1].trade_date);
        }
    }

    #[test]
    fn cohort_is_min_of_k_and_eligible(rows in arb_rows(), k in 1i64..10) {
        let out = evaluate(&rows, k).unwrap();
        for period in &out {
            let eligible = rows
                .iter()
                .filter(|r| r.trade_date == Some(period.trade_date) && r.is_eligible())
                .count();
            prop_assert_eq!(period.cohort_size, eligible.min(k as usize));
        }
        let eligible_dates: std::collections::BTreeSet<_> = rows
            .iter()
            .filter(|r| r.is_eligible())
            .filter_map(|r| r.trade_date)
            .collect();
        prop_assert_eq!(out.len(), eligible_dates.len());
    }

    #[test]
    fn evaluation_is_idempotent(rows in arb_rows(), k in 1i64..10) {
        prop_assert_eq!(evaluate(&rows, k).unwrap(), evaluate(&rows, k).unwrap());
    }

    #[test]
    fn vetoed_rows_never_change_the_result(rows in arb_rows(), k in 1i64..10) {
        let kept: Vec<PredictionRow> = rows
            .iter()
            .filter(|r| r.predicted_win_loss == Some(1))
            .cloned()
            .collect();
        prop_assert_eq!(evaluate(&rows, k).unwrap(), evaluate(&kept, k).unwrap());
    }

    #[test]
    fn ties_resolve_by_input_order(returns in prop::collection::vec(-50i32..50, 2..12), k in 1usize..6) {
        let rows: Vec<PredictionRow> = returns
            .iter()
            .enumerate()
            .map(|(i, r)| make_row("20220107", &format!("S{:03}", i), 0.5, 1, *r as f64 / 1000.0, 0.0))
            .collect();
        let out = evaluate(&rows, k as i64).unwrap();
        let take = k.min(rows.len());
        let expected = returns[..take].iter().map(|r| *r as f64 / 1000.0).sum::<f64>() / take as f64;
        prop_assert!((out[0].portfolio_return - expected).abs() < 1e-12);
    }
}
