//! Logging setup for the service locator
//!
//! All container events are emitted with the `service_locator` target:
//! registration and configuration at `DEBUG`, resolution at `TRACE`.
//! Installing a subscriber needs the `logging-json` or `logging-pretty`
//! feature; without either, [`LoggingBuilder::init`] does nothing.
//!
//! # Example
//!
//! ```rust,ignore
//! use service_locator::logging;
//!
//! logging::builder()
//!     .trace()
//!     .locator_only()
//!     .pretty()
//!     .init()
//!     .unwrap();
//! ```

use crate::Result;
use tracing::Level;

/// Log target used by every event of this crate.
pub const TARGET: &str = "service_locator";

/// Output format of the installed subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event
    #[default]
    Json,
    /// Multi-line, colored
    Pretty,
    /// Single-line
    Compact,
}

/// Builder for the tracing subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    level: Level,
    format: LogFormat,
    target: Option<&'static str>,
    source_location: bool,
    threads: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            format: LogFormat::default(),
            target: None,
            source_location: false,
            threads: false,
        }
    }
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Include per-resolution events
    pub fn trace(self) -> Self {
        self.with_level(Level::TRACE)
    }

    pub fn debug(self) -> Self {
        self.with_level(Level::DEBUG)
    }

    /// Only show events from `target`
    pub fn with_target_filter(mut self, target: &'static str) -> Self {
        self.target = Some(target);
        self
    }

    /// Only show events from this crate
    pub fn locator_only(self) -> Self {
        self.with_target_filter(TARGET)
    }

    /// Include file and line of each event
    pub fn with_source_location(mut self) -> Self {
        self.source_location = true;
        self
    }

    /// Include thread ids and names
    pub fn with_threads(mut self) -> Self {
        self.threads = true;
        self
    }

    pub fn json(mut self) -> Self {
        self.format = LogFormat::Json;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.format = LogFormat::Pretty;
        self
    }

    pub fn compact(mut self) -> Self {
        self.format = LogFormat::Compact;
        self
    }

    /// The `EnvFilter` directive this builder installs.
    pub fn directive(&self) -> String {
        match self.target {
            Some(target) => format!("{target}={}", self.level),
            None => self.level.to_string(),
        }
    }

    /// Install the subscriber globally.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    #[cfg(any(feature = "logging-json", feature = "logging-pretty"))]
    pub fn init(self) -> Result<()> {
        use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, prelude::*};

        let layer: Box<dyn Layer<Registry> + Send + Sync> = match self.format {
            #[cfg(feature = "logging-json")]
            LogFormat::Json => fmt::layer()
                .json()
                .with_file(self.source_location)
                .with_line_number(self.source_location)
                .with_thread_ids(self.threads)
                .with_thread_names(self.threads)
                .boxed(),
            // JSON output needs `logging-json`; fall back to the default text format
            #[cfg(not(feature = "logging-json"))]
            LogFormat::Json => fmt::layer()
                .with_file(self.source_location)
                .with_line_number(self.source_location)
                .with_thread_ids(self.threads)
                .with_thread_names(self.threads)
                .boxed(),
            LogFormat::Pretty => fmt::layer()
                .pretty()
                .with_file(self.source_location)
                .with_line_number(self.source_location)
                .with_thread_ids(self.threads)
                .with_thread_names(self.threads)
                .boxed(),
            LogFormat::Compact => fmt::layer()
                .compact()
                .with_file(self.source_location)
                .with_line_number(self.source_location)
                .with_thread_ids(self.threads)
                .with_thread_names(self.threads)
                .boxed(),
        };

        tracing_subscriber::registry()
            .with(layer)
            .with(EnvFilter::new(self.directive()))
            .try_init()
            .map_err(crate::DiError::other)
    }

    /// No subscriber feature enabled; nothing to install.
    #[cfg(not(any(feature = "logging-json", feature = "logging-pretty")))]
    pub fn init(self) -> Result<()> {
        Ok(())
    }
}

/// Create a new logging builder
pub fn builder() -> LoggingBuilder {
    LoggingBuilder::new()
}

/// Install a subscriber for this crate's events at `DEBUG`.
///
/// JSON output with `logging-json`, pretty output otherwise.
pub fn init() -> Result<()> {
    let builder = builder().locator_only();
    if cfg!(feature = "logging-json") {
        builder.json().init()
    } else {
        builder.pretty().init()
    }
}
