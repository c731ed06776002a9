//! Shared logging bootstrap for the pipeline binaries.

use crate::{Error, Result};

use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }

    /// Read `LAKEHOUSE_LOG_FORMAT`, defaulting to JSON lines
    pub fn from_env() -> Result<Self> {
        match std::env::var("LAKEHOUSE_LOG_FORMAT") {
            Ok(raw) => parse_log_format(&raw),
            Err(_) => Ok(LogFormat::Json),
        }
    }
}

/// Handle for the process-wide subscriber of one binary.
#[derive(Debug)]
pub struct Telemetry {
    service_name: String,
    format: LogFormat,
}

impl Telemetry {
    /// Install the tracing subscriber for a binary.
    ///
    /// `RUST_LOG` directives, when set, refine the level given on the CLI.
    pub fn init_for_component(service_name: &str, log_level: &str) -> Result<Self> {
        let level = parse_log_level(log_level)?;
        let format = LogFormat::from_env()?;

        let filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::from_level(level).into())
            .from_env_lossy();

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true);

        let installed = match format {
            LogFormat::Json => builder.json().try_init(),
            LogFormat::Pretty => builder.pretty().try_init(),
        };
        installed.map_err(|e| {
            Error::Config(format!("failed to initialize telemetry subscriber: {e}"))
        })?;

        info!(
            service_name = %service_name,
            log_level = %level,
            log_format = format.as_str(),
            "Telemetry bootstrap initialized"
        );

        Ok(Self {
            service_name: service_name.to_string(),
            format,
        })
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn format(&self) -> LogFormat {
        self.format
    }
}

fn parse_log_level(raw: &str) -> Result<Level> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        other => Err(Error::Config(format!(
            "invalid log level '{other}', expected one of [trace, debug, info, warn, error]"
        ))),
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "json" => Ok(LogFormat::Json),
        "pretty" | "text" => Ok(LogFormat::Pretty),
        other => Err(Error::Config(format!(
            "LAKEHOUSE_LOG_FORMAT must be one of [json, pretty], got '{other}'"
        ))),
    }
}
