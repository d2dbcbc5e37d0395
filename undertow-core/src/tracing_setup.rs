//! Tracing setup for Undertow
//!
//! Console output follows the level the operator picks; a second layer writes
//! everything down to TRACE into a per-run log file for post-mortem debugging.

use std::fs::{File, create_dir_all};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// File the trace layer writes to, inside the logs directory.
pub const LOG_FILE_NAME: &str = "undertow-last-run.log";

/// Installs the console and file layers and returns the log file path.
///
/// `RUST_LOG` overrides `console_level` for the console layer. The file layer
/// writes to `<logs_dir>/undertow-last-run.log` (default `./logs`), replacing
/// the previous run's file.
///
/// # Errors
///
/// - `Box<dyn std::error::Error>` - If logs directory cannot be created or log file cannot be opened for writing
pub fn init_tracing(
    console_level: Level,
    logs_dir: Option<&Path>,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let logs_path = logs_dir.unwrap_or_else(|| Path::new("logs"));

    create_dir_all(logs_path)?;
    let log_file_path = logs_path.join(LOG_FILE_NAME);
    let log_file = File::create(&log_file_path)?;

    let console_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(console_level.to_string()));

    let console_layer = fmt::layer()
        .with_target(false)
        .compact()
        .with_filter(console_filter);

    // Session ids and phases are only useful with source locations attached.
    let file_layer = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .with_writer(log_file)
        .with_filter(EnvFilter::new("trace"));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    tracing::debug!(
        "Logging to console at {} and to {}",
        console_level,
        log_file_path.display()
    );

    Ok(log_file_path)
}

/// Values accepted by `--log-level`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliLogLevel {
    /// Only errors
    Error,
    /// Warnings and errors
    Warn,
    /// Request and reaper summaries
    Info,
    /// Per-phase request progress
    Debug,
    /// Per-chunk streaming detail
    Trace,
}

impl CliLogLevel {
    /// Maps the flag value onto a `tracing` level.
    ///
    /// ```
    /// use undertow_core::tracing_setup::CliLogLevel;
    ///
    /// assert_eq!(CliLogLevel::Warn.as_tracing_level(), tracing::Level::WARN);
    /// ```
    pub fn as_tracing_level(self) -> Level {
        match self {
            CliLogLevel::Error => Level::ERROR,
            CliLogLevel::Warn => Level::WARN,
            CliLogLevel::Info => Level::INFO,
            CliLogLevel::Debug => Level::DEBUG,
            CliLogLevel::Trace => Level::TRACE,
        }
    }
}

impl std::str::FromStr for CliLogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}

impl std::fmt::Display for CliLogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing_is_case_insensitive() {
        assert!(matches!("DEBUG".parse::<CliLogLevel>(), Ok(CliLogLevel::Debug)));
        assert!(matches!("warn".parse::<CliLogLevel>(), Ok(CliLogLevel::Warn)));
        assert!("verbose".parse::<CliLogLevel>().is_err());
        assert_eq!(CliLogLevel::value_variants().len(), 5);
    }

    #[test]
    fn test_display_matches_flag_value() {
        for level in [CliLogLevel::Error, CliLogLevel::Info, CliLogLevel::Trace] {
            let parsed: CliLogLevel = level.to_string().parse().unwrap();
            assert_eq!(level.to_string(), level.to_string().to_lowercase());
            assert_eq!(parsed, level);
        }
    }
}
