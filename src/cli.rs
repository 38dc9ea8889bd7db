//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::linear_model_adapter::LinearModel;
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BenchmarkSource, PeriodPortfolioReturn};
use crate::domain::config_validation::validate_backtest_config;
use crate::domain::date_range::{
    duration_days, format_date, nearest_trading_date, parse_date, split_by_month, split_by_year,
};
use crate::domain::error::MlstockError;
use crate::domain::metrics::Metrics;
use crate::domain::prediction::PredictionRow;
use crate::logging::{self, LogSettings, Timer};
use crate::ports::config_port::ConfigPort;
use crate::ports::model_port::Predictor;
use crate::ports::prediction_port::PredictionSource;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_REPORT_PATH: &str = "periods.csv";

#[derive(Parser, Debug)]
#[command(name = "mlstock", about = "Cohort backtester for ML stock-selection predictions")]
pub struct Cli {
    /// Log level filter (overrides [logging] level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate predictions into a compounded portfolio return series
    Backtest(BacktestArgs),
    /// Print month or year sub-ranges of a date span
    Durations {
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long, value_enum, default_value_t = Granularity::Month)]
        by: Granularity,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Default, Clone)]
pub struct BacktestArgs {
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Start date, YYYYMMDD
    #[arg(short, long)]
    pub start_date: Option<String>,
    /// End date, YYYYMMDD
    #[arg(short, long)]
    pub end_date: Option<String>,
    /// Prediction table (CSV)
    #[arg(short, long)]
    pub data: Option<PathBuf>,
    /// Rank-score model artifact
    #[arg(long)]
    pub model_pct: Option<PathBuf>,
    /// Win/loss classifier artifact
    #[arg(long)]
    pub model_winloss: Option<PathBuf>,
    #[arg(short = 'k', long)]
    pub cohort_size: Option<i64>,
    /// Rows the benchmark period return is averaged over
    #[arg(long, value_enum)]
    pub benchmark: Option<BenchmarkArg>,
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Granularity {
    Month,
    Year,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BenchmarkArg {
    /// Selected cohort only
    Cohort,
    /// Every row of the date with a realized return
    Universe,
}

impl From<BenchmarkArg> for BenchmarkSource {
    fn from(arg: BenchmarkArg) -> Self {
        match arg {
            BenchmarkArg::Cohort => BenchmarkSource::Cohort,
            BenchmarkArg::Universe => BenchmarkSource::Universe,
        }
    }
}

/// Artifact locations for one backtest run, checked to exist.
#[derive(Debug, Clone, PartialEq)]
pub struct RunPaths {
    pub data: PathBuf,
    pub model_pct: Option<PathBuf>,
    pub model_winloss: Option<PathBuf>,
    pub output: PathBuf,
}

#[derive(Debug, Clone)]
pub struct BacktestOutcome {
    pub periods: Vec<PeriodPortfolioReturn>,
    pub metrics: Metrics,
}

pub fn run(cli: Cli) -> ExitCode {
    let config_path = match &cli.command {
        Command::Backtest(args) => args.config.clone(),
        Command::Validate { config } => Some(config.clone()),
        Command::Durations { .. } => None,
    };
    let adapter = match config_path {
        Some(path) => match load_config(&path) {
            Ok(a) => a,
            Err(code) => return code,
        },
        None => FileConfigAdapter::empty(),
    };

    let mut settings = LogSettings::from_config(&adapter);
    if let Some(level) = cli.log_level {
        settings.level = level;
    }
    if let Err(e) = logging::init(&settings) {
        eprintln!("warning: logging disabled: {e}");
    }

    match cli.command {
        Command::Backtest(args) => run_backtest(&adapter, &args),
        Command::Durations { start, end, by } => run_durations(&start, &end, by),
        Command::Validate { config } => run_validate(&adapter, &config),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        ExitCode::from(&e)
    })
}

fn fail(e: MlstockError) -> ExitCode {
    error!("{e}");
    eprintln!("error: {e}");
    (&e).into()
}

fn run_backtest(adapter: &FileConfigAdapter, args: &BacktestArgs) -> ExitCode {
    let _timer = Timer::start("backtest");

    // Stage 1: Validate config file values
    if let Err(e) = validate_backtest_config(adapter) {
        return fail(e);
    }

    // Stage 2: Build BacktestConfig, flags over config over defaults
    let bt_config = match build_backtest_config(adapter, args) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };

    // Stage 3: Resolve and check artifacts before any computation
    let paths = match resolve_paths(adapter, args) {
        Ok(p) => p,
        Err(e) => return fail(e),
    };

    // Stage 4: Load model artifacts
    let rank_model = match paths.model_pct.as_deref().map(LinearModel::from_file).transpose() {
        Ok(m) => m,
        Err(e) => return fail(e),
    };
    let winloss_model = match paths
        .model_winloss
        .as_deref()
        .map(LinearModel::from_file)
        .transpose()
    {
        Ok(m) => m,
        Err(e) => return fail(e),
    };

    info!(
        start = %format_date(bt_config.start_date),
        end = %format_date(bt_config.end_date),
        days = duration_days(bt_config.start_date, bt_config.end_date),
        cohort_size = bt_config.cohort_size,
        data = %paths.data.display(),
        "running backtest"
    );

    // Stages 5-8: Load, predict, evaluate, report
    let source = CsvAdapter::new(paths.data.clone());
    let outcome = match run_backtest_pipeline(
        &source,
        rank_model.as_ref().map(|m| m as &dyn Predictor),
        winloss_model.as_ref().map(|m| m as &dyn Predictor),
        &bt_config,
        &CsvReportAdapter,
        &paths.output,
    ) {
        Ok(o) => o,
        Err(e) => return fail(e),
    };

    print_summary(&outcome, &bt_config);
    eprintln!("\nReport written to: {}", paths.output.display());
    ExitCode::SUCCESS
}

pub fn build_backtest_config(
    adapter: &dyn ConfigPort,
    args: &BacktestArgs,
) -> Result<BacktestConfig, MlstockError> {
    let defaults = BacktestConfig::default();

    let start_date = resolve_date(
        args.start_date.as_deref(),
        adapter,
        "start_date",
        defaults.start_date,
    )?;
    let end_date = resolve_date(args.end_date.as_deref(), adapter, "end_date", defaults.end_date)?;
    if start_date > end_date {
        return Err(MlstockError::configuration(format!(
            "start date {} is after end date {}",
            format_date(start_date),
            format_date(end_date)
        )));
    }

    let cohort_size = args
        .cohort_size
        .unwrap_or_else(|| adapter.get_int("backtest", "cohort_size", defaults.cohort_size));
    if cohort_size <= 0 {
        return Err(MlstockError::configuration(format!(
            "cohort size must be positive, got {}",
            cohort_size
        )));
    }

    let benchmark = match (args.benchmark, adapter.get_trimmed("backtest", "benchmark")) {
        (Some(arg), _) => arg.into(),
        (None, Some(s)) => s.parse::<BenchmarkSource>()?,
        (None, None) => defaults.benchmark,
    };

    Ok(BacktestConfig {
        start_date,
        end_date,
        cohort_size,
        benchmark,
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
        periods_per_year: adapter.get_double(
            "backtest",
            "periods_per_year",
            defaults.periods_per_year,
        ),
    })
}

fn resolve_date(
    flag: Option<&str>,
    adapter: &dyn ConfigPort,
    key: &str,
    default: NaiveDate,
) -> Result<NaiveDate, MlstockError> {
    match flag
        .map(str::to_string)
        .or_else(|| adapter.get_trimmed("backtest", key))
    {
        Some(s) => parse_date(&s).map_err(|_| {
            MlstockError::configuration(format!("{} '{}' is not a YYYYMMDD date", key, s))
        }),
        None => Ok(default),
    }
}

/// Errors with `MissingArtifact` when the file is absent.
pub fn check_file_path(path: &Path) -> Result<(), MlstockError> {
    if path.exists() {
        Ok(())
    } else {
        Err(MlstockError::MissingArtifact {
            path: path.display().to_string(),
        })
    }
}

pub fn resolve_paths(adapter: &dyn ConfigPort, args: &BacktestArgs) -> Result<RunPaths, MlstockError> {
    let data = args
        .data
        .clone()
        .or_else(|| adapter.get_path("data", "path"))
        .ok_or_else(|| MlstockError::ConfigMissing {
            section: "data".into(),
            key: "path".into(),
        })?;
    let model_pct = args
        .model_pct
        .clone()
        .or_else(|| adapter.get_path("model", "pct"));
    let model_winloss = args
        .model_winloss
        .clone()
        .or_else(|| adapter.get_path("model", "winloss"));
    let output = args
        .output
        .clone()
        .or_else(|| adapter.get_path("report", "output"))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REPORT_PATH));

    check_file_path(&data)?;
    for model in model_pct.iter().chain(model_winloss.iter()) {
        check_file_path(model)?;
    }

    Ok(RunPaths {
        data,
        model_pct,
        model_winloss,
        output,
    })
}

/// Overwrites rank scores and win/loss labels with model output, for each
/// model that is present.
pub fn apply_models(
    rows: &mut [PredictionRow],
    rank_model: Option<&dyn Predictor>,
    winloss_model: Option<&dyn Predictor>,
) -> Result<(), MlstockError> {
    if let Some(model) = rank_model {
        let _timer = Timer::start("rank model prediction");
        for row in rows.iter_mut() {
            row.predicted_rank_score = model.predict(row)?;
        }
    }
    if let Some(model) = winloss_model {
        let _timer = Timer::start("win/loss classification");
        for row in rows.iter_mut() {
            let label = model.predict(row)?;
            row.predicted_win_loss = Some(u8::from(label >= 0.5));
        }
    }
    Ok(())
}

pub fn run_backtest_pipeline(
    source: &dyn PredictionSource,
    rank_model: Option<&dyn Predictor>,
    winloss_model: Option<&dyn Predictor>,
    bt_config: &BacktestConfig,
    report: &dyn ReportPort,
    output_path: &Path,
) -> Result<BacktestOutcome, MlstockError> {
    // Stage 5: Load predictions in range
    let mut rows = source.load_predictions(bt_config.start_date, bt_config.end_date)?;
    let mut trading_dates: Vec<NaiveDate> = rows.iter().filter_map(|r| r.trade_date).collect();
    trading_dates.sort_unstable();
    trading_dates.dedup();
    match nearest_trading_date(bt_config.end_date, &trading_dates, true) {
        Some(last) => info!(
            trading_dates = trading_dates.len(),
            last = %format_date(last),
            "loaded predictions"
        ),
        None => warn!("no prediction rows in range"),
    }

    // Stage 6: Apply model collaborators
    apply_models(&mut rows, rank_model, winloss_model)?;

    // Stage 7: Evaluate and compute metrics
    let periods = {
        let _timer = Timer::start("cohort evaluation");
        backtest_engine::evaluate_with(&rows, bt_config)?
    };
    let metrics = Metrics::compute(&periods, bt_config.risk_free_rate, bt_config.periods_per_year);

    // Stage 8: Write report
    report.write(&periods, &metrics, output_path)?;

    Ok(BacktestOutcome { periods, metrics })
}

fn print_summary(outcome: &BacktestOutcome, bt_config: &BacktestConfig) {
    let m = &outcome.metrics;
    eprintln!("\n=== Backtest Results ===");
    eprintln!(
        "Range:            {} - {}",
        format_date(bt_config.start_date),
        format_date(bt_config.end_date)
    );
    eprintln!("Periods:          {}", m.periods);
    eprintln!("Total Return:     {:.2}%", m.total_return * 100.0);
    eprintln!("Benchmark:        {:.2}%", m.benchmark_total_return * 100.0);
    eprintln!("Excess:           {:.2}%", m.excess_return * 100.0);
    eprintln!("Annualized:       {:.2}%", m.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", m.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", m.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", m.max_drawdown * 100.0);
    eprintln!("Win Rate:         {:.1}%", m.win_rate * 100.0);
    eprintln!("Beat Benchmark:   {:.1}%", m.beat_benchmark_rate * 100.0);
}

/// One `START END` line per sub-range.
pub fn format_durations(start: &str, end: &str, by: Granularity) -> Result<Vec<String>, MlstockError> {
    let start = parse_date(start)?;
    let end = parse_date(end)?;
    let ranges = match by {
        Granularity::Month => split_by_month(start, end)?,
        Granularity::Year => split_by_year(start, end)?,
    };
    Ok(ranges
        .into_iter()
        .map(|(s, e)| format!("{} {}", format_date(s), format_date(e)))
        .collect())
}

fn run_durations(start: &str, end: &str, by: Granularity) -> ExitCode {
    match format_durations(start, end, by) {
        Ok(lines) => {
            for line in lines {
                println!("{}", line);
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

fn run_validate(adapter: &FileConfigAdapter, config_path: &Path) -> ExitCode {
    let result = validate_backtest_config(adapter)
        .and_then(|_| build_backtest_config(adapter, &BacktestArgs::default()))
        .and_then(|_| {
            resolve_paths(adapter, &BacktestArgs::default())?;
            Ok(())
        });
    match result {
        Ok(()) => {
            eprintln!("Configuration is valid: {}", config_path.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backtest_flags() {
        let cli = Cli::try_parse_from([
            "mlstock", "backtest", "-s", "20200101", "-e", "20201231", "-d", "data.csv", "-k",
            "10", "--model-pct", "pct.ini", "--benchmark", "universe",
        ])
        .unwrap();
        match cli.command {
            Command::Backtest(args) => {
                assert_eq!(args.start_date.as_deref(), Some("20200101"));
                assert_eq!(args.end_date.as_deref(), Some("20201231"));
                assert_eq!(args.data, Some(PathBuf::from("data.csv")));
                assert_eq!(args.cohort_size, Some(10));
                assert_eq!(args.model_pct, Some(PathBuf::from("pct.ini")));
                assert_eq!(args.model_winloss, None);
                assert_eq!(args.benchmark, Some(BenchmarkArg::Universe));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn unknown_benchmark_rejected_by_parser() {
        let result = Cli::try_parse_from(["mlstock", "backtest", "--benchmark", "median"]);
        assert!(result.is_err());
    }

    #[test]
    fn benchmark_arg_maps_to_source() {
        assert_eq!(BenchmarkSource::from(BenchmarkArg::Cohort), BenchmarkSource::Cohort);
        assert_eq!(BenchmarkSource::from(BenchmarkArg::Universe), BenchmarkSource::Universe);
    }

    #[test]
    fn durations_default_to_month() {
        let cli = Cli::try_parse_from(["mlstock", "durations", "--start", "20220101", "--end", "20220301"])
            .unwrap();
        assert!(matches!(cli.command, Command::Durations { by: Granularity::Month, .. }));
    }

    #[test]
    fn format_durations_by_year() {
        let lines = format_durations("20200615", "20220301", Granularity::Year).unwrap();
        assert_eq!(
            lines,
            vec![
                "20200615 20201231".to_string(),
                "20210101 20211231".to_string(),
                "20220101 20220301".to_string(),
            ]
        );
    }

    #[test]
    fn format_durations_rejects_bad_date() {
        assert!(format_durations("2022-01-01", "20220301", Granularity::Month).is_err());
    }

    #[test]
    fn check_file_path_reports_missing() {
        let err = check_file_path(Path::new("/nonexistent/model.ini")).unwrap_err();
        assert_eq!(err.to_string(), "file [/nonexistent/model.ini] does not exist");
    }
}
