//! Performance statistics over a compounded period return series.

use super::backtest::PeriodPortfolioReturn;

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub periods: usize,
    pub total_return: f64,
    pub benchmark_total_return: f64,
    pub excess_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub max_drawdown_duration: usize,
    pub win_rate: f64,
    pub beat_benchmark_rate: f64,
    pub best_period: f64,
    pub worst_period: f64,
}

impl Metrics {
    pub fn compute(
        periods: &[PeriodPortfolioReturn],
        risk_free_rate: f64,
        periods_per_year: f64,
    ) -> Self {
        let n = periods.len();
        let total_return = periods
            .last()
            .map(|p| p.cumulative_portfolio_return)
            .unwrap_or(0.0);
        let benchmark_total_return = periods
            .last()
            .map(|p| p.cumulative_benchmark_return)
            .unwrap_or(0.0);

        let years = n as f64 / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 && total_return.is_finite() {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let returns: Vec<f64> = periods.iter().map(|p| p.portfolio_return).collect();
        let period_rf = if periods_per_year > 0.0 {
            risk_free_rate / periods_per_year
        } else {
            0.0
        };
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(&returns, period_rf, periods_per_year);

        let equity: Vec<f64> = periods
            .iter()
            .map(|p| 1.0 + p.cumulative_portfolio_return)
            .collect();
        let (max_drawdown, max_drawdown_duration) = compute_drawdown(&equity);

        let wins = returns.iter().filter(|&&r| r > 0.0).count();
        let beats = periods
            .iter()
            .filter(|p| p.portfolio_return > p.benchmark_period_return)
            .count();
        let (win_rate, beat_benchmark_rate) = if n > 0 {
            (wins as f64 / n as f64, beats as f64 / n as f64)
        } else {
            (0.0, 0.0)
        };

        let best_period = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let worst_period = returns.iter().copied().fold(f64::INFINITY, f64::min);

        Metrics {
            periods: n,
            total_return,
            benchmark_total_return,
            excess_return: total_return - benchmark_total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            win_rate,
            beat_benchmark_rate,
            best_period: if n > 0 { best_period } else { 0.0 },
            worst_period: if n > 0 { worst_period } else { 0.0 },
        }
    }
}

/// Max drawdown of an equity curve that starts from 1.0 before the first point.
fn compute_drawdown(equity: &[f64]) -> (f64, usize) {
    let mut peak = 1.0_f64;
    let mut max_dd = 0.0_f64;
    let mut current_duration = 0usize;
    let mut max_duration = 0usize;

    for &value in equity {
        if value >= peak {
            peak = value;
            current_duration = 0;
        } else if peak > 0.0 {
            let dd = (peak - value) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_duration += 1;
            if current_duration > max_duration {
                max_duration = current_duration;
            }
        }
    }

    (max_dd, max_duration)
}

fn compute_risk_adjusted(returns: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if returns.len() < 2 {
        return (0.0, 0.0);
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess = mean - period_rf;
    let scale = periods_per_year.max(0.0).sqrt();

    let sharpe = if stddev > 0.0 {
        excess / stddev * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}
