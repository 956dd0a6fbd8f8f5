//! Logging setup.
//!
//! Mapping progress is reported through `tracing` events:
//! - `debug!` for build progress (devices, configurations, parse results)
//! - `warn!` for every recorded diagnostic and dropped device
//!
//! Library users usually install their own subscriber. [`init`] sets up a
//! `tracing-subscriber` fmt layer for binaries and tests that do not.
//!
//! # Example
//! ```no_run
//! use daq_control_map::{logging, settings::MapSettings};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let settings = MapSettings::from_env()?;
//! logging::init_from_settings(&settings)?;
//! tracing::info!("mapping started");
//! # Ok(())
//! # }
//! ```

use crate::settings::MapSettings;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed format with colors (for development)
    Pretty,
    /// Compact single-line format without colors
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Logging options
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: Level,
    /// Output format
    pub format: OutputFormat,
    /// Whether to include file and line numbers
    pub with_file_and_line: bool,
    /// Whether to include the event target (module path)
    pub with_target: bool,
    /// Whether to enable ANSI colors (Pretty format only)
    pub with_ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: OutputFormat::Pretty,
            with_file_and_line: false,
            with_target: true,
            with_ansi: true,
        }
    }
}

impl LogConfig {
    /// Plain text output at `level`.
    pub fn new(level: Level) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    /// Log config at the level named in `settings`.
    pub fn from_settings(settings: &MapSettings) -> Result<Self, String> {
        Ok(Self::new(parse_log_level(&settings.log_level)?))
    }

    /// Use `format` for the output.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable ANSI colors.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }
}

/// Initialize logging at the level named in `settings`.
pub fn init_from_settings(settings: &MapSettings) -> Result<(), String> {
    init(LogConfig::from_settings(settings)?)
}

/// Install a global subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Idempotent: if a global
/// subscriber is already installed this returns `Ok(())`.
pub fn init(config: LogConfig) -> Result<(), String> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let layer = fmt::layer()
        .with_file(config.with_file_and_line)
        .with_line_number(config.with_file_and_line)
        .with_target(config.with_target);
    let layer = match config.format {
        OutputFormat::Pretty => layer.pretty().with_ansi(config.with_ansi).boxed(),
        OutputFormat::Compact => layer.compact().with_ansi(false).boxed(),
        OutputFormat::Json => layer.json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(format!("Failed to initialize logging: {}", e))
            }
        })
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> Result<Level, String> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(format!(
            "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
            level
        )),
    }
}
