//! Logging setup shared by every unical crate and the CLI.
//!
//! ```ignore
//! use unical_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::cli_debug())?;
//! ```
//!
//! `RUST_LOG` takes precedence over [`TracingConfig::default_level`] unless
//! an explicit [`TracingConfig::env_filter`] is given.

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Log targets enabled by the default filter.
pub const TARGETS: [&str; 5] = [
    "unical_core",
    "unical_providers",
    "unical_sync",
    "unical_client",
    "unical",
];

/// Errors that can occur during tracing initialization.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line human-readable output.
    #[default]
    Pretty,
    /// One line per event.
    Compact,
    /// One JSON object per event, for log collectors.
    Json,
}

/// Configuration for [`init_tracing`].
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level applied to every unical target when `RUST_LOG` is unset.
    pub default_level: Level,
    pub output_format: TracingOutputFormat,
    /// Include file and line number.
    pub include_location: bool,
    /// Include the module path.
    pub include_target: bool,
    pub include_timestamp: bool,
    /// Log span creation and close.
    pub include_span_events: bool,
    /// Explicit filter directive; overrides both `RUST_LOG` and `default_level`.
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: false,
            include_timestamp: true,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Verbose compact output for `--debug` runs.
    #[must_use]
    pub fn cli_debug() -> Self {
        Self {
            default_level: Level::DEBUG,
            output_format: TracingOutputFormat::Compact,
            include_location: true,
            include_target: true,
            include_timestamp: false,
            include_span_events: false,
            env_filter: None,
        }
    }

    /// JSON output for long-running `watch` sessions.
    #[must_use]
    pub fn daemon() -> Self {
        Self {
            default_level: Level::INFO,
            output_format: TracingOutputFormat::Json,
            include_location: true,
            include_target: true,
            include_timestamp: true,
            include_span_events: true,
            env_filter: None,
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Filter directive covering every unical target at `default_level`.
    pub fn default_directives(&self) -> String {
        let level = self.default_level.as_str().to_ascii_lowercase();
        TARGETS
            .iter()
            .map(|target| format!("{target}={level}"))
            .collect::<Vec<_>>()
            .join(",")
    }

    fn build_filter(&self) -> Result<EnvFilter, TracingError> {
        match &self.env_filter {
            Some(filter) => Ok(EnvFilter::try_new(filter)?),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.default_directives()))),
        }
    }

    fn build_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let span_events = if self.include_span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        };
        let base = fmt::layer()
            .with_file(self.include_location)
            .with_line_number(self.include_location)
            .with_target(self.include_target)
            .with_span_events(span_events);

        match (self.output_format, self.include_timestamp) {
            (TracingOutputFormat::Pretty, true) => base.pretty().boxed(),
            (TracingOutputFormat::Pretty, false) => base.pretty().without_time().boxed(),
            (TracingOutputFormat::Compact, true) => base.compact().boxed(),
            (TracingOutputFormat::Compact, false) => base.compact().without_time().boxed(),
            (TracingOutputFormat::Json, true) => base.json().boxed(),
            (TracingOutputFormat::Json, false) => base.json().without_time().boxed(),
        }
    }
}

/// Installs the global subscriber. Call once at startup.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the
/// filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let filter = config.build_filter()?;
    let subscriber = tracing_subscriber::registry()
        .with(config.build_layer())
        .with(filter);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}
