//! Logging for pipeline runs.
//!
//! Progress goes to stderr so `airfare predict` can keep stdout for the JSON
//! reply. Every run also appends to two daily files under
//! `<data dir>/airfare/logs`: `airfare.<date>.log` with everything the filter
//! lets through and `error.<date>.log` with warnings and errors, which is
//! where skipped raw files and unseen categories end up.
//!
//! The level comes from `--log-level`, then `RUST_LOG`, then `info`.
//!
//! ```no_run
//! airfare::logging::init(Some("debug"))?;
//! tracing::debug!("Model matrix columns: ...");
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    EnvFilter, Layer as _, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const LOG_PREFIX: &str = "airfare";
const ERROR_LOG_PREFIX: &str = "error";
const KEPT_LOG_FILES: usize = 14;

/// `<data dir>/airfare/logs`, created on first use.
pub fn get_log_dir() -> Result<PathBuf> {
    let log_dir = dirs::data_dir()
        .context("Failed to determine data directory")?
        .join(LOG_PREFIX)
        .join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir.display()))?;
    Ok(log_dir)
}

fn daily_appender(log_dir: &Path, prefix: &str) -> Result<RollingFileAppender> {
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(prefix)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to create {prefix} log appender"))
}

fn level_filter(level: Option<&str>) -> Result<EnvFilter> {
    match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{level}'"))
        }
        None => EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new("info"))
            .context("Failed to create env filter"),
    }
}

/// Install the global subscriber. Call once, before the run starts.
///
/// # Errors
///
/// Fails on an invalid level, or when the log files cannot be created.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = level_filter(level)?;
    let log_dir = get_log_dir()?;

    let console = fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);

    let run_log = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_writer(daily_appender(&log_dir, LOG_PREFIX)?);

    let error_log = fmt::layer()
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_writer(daily_appender(&log_dir, ERROR_LOG_PREFIX)?)
        .with_filter(EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(run_log)
        .with(error_log)
        .init();

    tracing::debug!("Writing logs to {}", log_dir.display());
    Ok(())
}

/// Today's run log, printed at the end of `airfare run`.
pub fn get_current_log_path() -> Result<PathBuf> {
    let today = chrono::Local::now().format("%Y-%m-%d");
    Ok(get_log_dir()?.join(format!("{LOG_PREFIX}.{today}.log")))
}
