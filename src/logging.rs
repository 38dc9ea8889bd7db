//! Logging setup and scoped timing.
//!
//! [`init`] installs a `tracing` subscriber once, at the entry point: a console
//! layer on stderr plus, optionally, a plain-text file layer under `logs/`.
//! `RUST_LOG` takes precedence over the configured level.

use crate::domain::error::MlstockError;
use crate::ports::config_port::ConfigPort;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[derive(Debug, Clone, PartialEq)]
pub struct LogSettings {
    pub level: String,
    /// Also write to `<log_dir>/<YYYYMMDDHHMM>.log`.
    pub file: bool,
    pub log_dir: PathBuf,
    /// Message-only console output.
    pub simple: bool,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".to_string(),
            file: false,
            log_dir: PathBuf::from("logs"),
            simple: false,
        }
    }
}

impl LogSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Self {
        let defaults = LogSettings::default();
        LogSettings {
            level: config
                .get_trimmed("logging", "level")
                .unwrap_or(defaults.level),
            file: config.get_bool("logging", "file", defaults.file),
            log_dir: config.get_path("logging", "dir").unwrap_or(defaults.log_dir),
            simple: config.get_bool("logging", "simple", defaults.simple),
        }
    }
}

pub fn log_file_path(log_dir: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d%H%M");
    log_dir.join(format!("{}.log", stamp))
}

/// Installs the global subscriber. Returns the log file path when file
/// logging is enabled.
pub fn init(settings: &LogSettings) -> Result<Option<PathBuf>, MlstockError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| {
            MlstockError::configuration(format!("invalid log level '{}': {}", settings.level, e))
        })?;

    let simple_console = settings.simple.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .without_time()
            .with_level(false)
            .with_target(false)
    });
    let full_console = (!settings.simple).then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_file(true)
            .with_line_number(true)
    });

    let (file_layer, file_path) = if settings.file {
        fs::create_dir_all(&settings.log_dir)?;
        let path = log_file_path(&settings.log_dir);
        let file = File::create(&path)?;
        let layer = fmt::layer()
            .with_ansi(false)
            .with_file(true)
            .with_line_number(true)
            .with_writer(Mutex::new(file));
        (Some(layer), Some(path))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(simple_console)
        .with(full_console)
        .with(file_layer)
        .try_init()
        .map_err(|e| MlstockError::configuration(format!("logger already initialised: {}", e)))?;

    if let Some(path) = &file_path {
        info!("logging to {}", path.display());
    }
    Ok(file_path)
}

/// `{days}d {hours}h {minutes}m {seconds}s {millis}ms`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;
    let seconds = total % 60;
    format!(
        "{}d {}h {}m {}s {}ms",
        days,
        hours,
        minutes,
        seconds,
        elapsed.subsec_millis()
    )
}

/// Logs the time spent in a scope when dropped.
pub struct Timer {
    title: String,
    start: Instant,
}

impl Timer {
    pub fn start(title: impl Into<String>) -> Self {
        Timer {
            title: title.into(),
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        info!("{} took {}", self.title, format_elapsed(self.start.elapsed()));
    }
}
