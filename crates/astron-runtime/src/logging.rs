//! Log subscriber setup.
//!
//! Everything in Astron logs through `tracing`. This module installs a
//! `tracing-subscriber` stack described by [`LoggingConfig`], or built by
//! hand with [`LoggingBuilder`]. `RUST_LOG`, when set, replaces the base
//! level; per-module filters are added on top.
//!
//! ```rust,ignore
//! use astron_runtime::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .with_level(tracing::Level::DEBUG)
//!     .directive("astron_framework=trace")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::path::PathBuf;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LogOutput, LogRotation, LoggingConfig, SpanEventConfig};
use crate::error::LoggingError;

/// File name used when the configured path has none.
const DEFAULT_LOG_FILE: &str = "astron.log";

/// Span lifecycle events to log.
///
/// The router opens a `dispatch` span per message and an `execute` span per
/// executor task; `LIFECYCLE` shows when each starts and how long it took.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    /// No span events.
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Creation and close.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Every event.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    /// Enter and exit only.
    pub const ACTIVE: Self = Self {
        new: false,
        enter: true,
        exit: true,
        close: false,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        use fmt::format::FmtSpan;

        [
            (self.new, FmtSpan::NEW),
            (self.enter, FmtSpan::ENTER),
            (self.exit, FmtSpan::EXIT),
            (self.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, flag)| acc | flag)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

impl From<LogRotation> for Rotation {
    fn from(rotation: LogRotation) -> Self {
        match rotation {
            LogRotation::Never => Rotation::NEVER,
            LogRotation::Hourly => Rotation::HOURLY,
            LogRotation::Daily => Rotation::DAILY,
        }
    }
}

/// Installs the subscriber described by `config`.
///
/// Does nothing if a global subscriber is already set.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// Builder for the global log subscriber.
#[derive(Debug, Clone)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: tracing::Level,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
    file_path: Option<PathBuf>,
    rotation: LogRotation,
    max_files: usize,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact output on stdout at `INFO`.
    pub fn new() -> Self {
        Self {
            directives: Vec::new(),
            level: tracing::Level::INFO,
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
            file_path: None,
            rotation: LogRotation::Never,
            max_files: 5,
        }
    }

    /// Mirrors a [`LoggingConfig`].
    pub fn from_config(config: &LoggingConfig) -> Self {
        Self {
            directives: config
                .filters
                .iter()
                .map(|(module, level)| format!("{module}={level}"))
                .collect(),
            level: config.level.to_tracing_level(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            with_target: true,
            with_thread_ids: config.thread_ids,
            with_file: config.file_location,
            with_line_number: config.file_location,
            file_path: config.file_path.clone(),
            rotation: config.rotation,
            max_files: config.max_files as usize,
        }
    }

    /// Sets the base level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive such as `astron_core=debug`.
    pub fn directive(mut self, directive: impl Into<String>) -> Self {
        self.directives.push(directive.into());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    /// Includes file names and line numbers.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self.with_line_number = enabled;
        self
    }

    /// Log file for [`LogOutput::File`].
    pub fn file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    pub fn rotation(mut self, rotation: LogRotation, max_files: usize) -> Self {
        self.rotation = rotation;
        self.max_files = max_files;
        self
    }

    /// The filter the subscriber will use.
    pub fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));

        self.directives
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(filter, EnvFilter::add_directive)
    }

    fn file_appender(&self) -> Result<Option<RollingFileAppender>, LoggingError> {
        let Some(path) = &self.file_path else {
            return Ok(None);
        };
        let directory = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(DEFAULT_LOG_FILE);

        let appender = RollingFileAppender::builder()
            .rotation(self.rotation.into())
            .filename_prefix(file_name)
            .max_log_files(self.max_files.max(1))
            .build(directory)?;
        Ok(Some(appender))
    }

    /// Installs the subscriber, ignoring failure.
    pub fn init(self) {
        let _ = self.try_init();
    }

    /// Installs the subscriber.
    pub fn try_init(self) -> Result<(), LoggingError> {
        let filter = self.build_filter();
        let span_events = self.span_events.to_fmt_span();

        macro_rules! decorate {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events.clone())
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
            };
        }

        macro_rules! install {
            ($writer:expr) => {{
                let registry = tracing_subscriber::registry().with(filter);
                match self.format {
                    #[cfg(feature = "json-log")]
                    LogFormat::Json => registry
                        .with(decorate!(fmt::layer().json().with_writer($writer)))
                        .try_init(),
                    LogFormat::Compact => registry
                        .with(decorate!(fmt::layer().compact().with_writer($writer)))
                        .try_init(),
                    LogFormat::Pretty => registry
                        .with(decorate!(fmt::layer().pretty().with_writer($writer)))
                        .try_init(),
                    // `json` without the `json-log` feature lands here too.
                    _ => registry
                        .with(decorate!(fmt::layer().with_writer($writer)))
                        .try_init(),
                }
            }};
        }

        match self.output {
            LogOutput::Stdout => install!(std::io::stdout)?,
            LogOutput::Stderr => install!(std::io::stderr)?,
            LogOutput::File => match self.file_appender()? {
                Some(appender) => install!(appender)?,
                None => {
                    install!(std::io::stdout)?;
                    tracing::warn!("File output requested without a file path, using stdout");
                }
            },
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_to_fmt_span() {
        use fmt::format::FmtSpan;

        assert_eq!(SpanEvents::NONE.to_fmt_span(), FmtSpan::NONE);
        assert_eq!(
            SpanEvents::LIFECYCLE.to_fmt_span(),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(SpanEvents::FULL.to_fmt_span(), FmtSpan::FULL);
    }

    #[test]
    fn test_from_config() {
        let mut config = LoggingConfig::default();
        config.level = LogLevel::Warn;
        config.filters.insert("astron_framework".into(), LogLevel::Trace);
        config.file_location = true;

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::WARN);
        assert_eq!(builder.directives, vec!["astron_framework=trace".to_string()]);
        assert!(builder.with_file && builder.with_line_number);
    }

    #[test]
    fn test_file_appender_creates_directory_entry() {
        let dir = tempfile::tempdir().unwrap();
        let builder = LoggingBuilder::new().file_path(dir.path().join("bot.log"));
        assert!(builder.file_appender().unwrap().is_some());
        assert!(LoggingBuilder::new().file_appender().unwrap().is_none());
    }
}
