//! Configuration schema definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use astron_framework::{
    RejectionKind, RouterOptions, RouterOptionsBuilder, options::DEFAULT_EXTENSION,
    options::DEFAULT_RESPONSE_PERMISSION,
};
use serde::{Deserialize, Serialize};

use super::error::ConfigResult;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AstronConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Router settings.
    #[serde(default)]
    pub router: RouterConfig,
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    /// Lower-case name, as accepted by `EnvFilter` directives.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    /// Converts to the `tracing` level.
    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpanEventConfig {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Base level when `RUST_LOG` is not set.
    pub level: LogLevel,
    pub format: LogFormat,
    pub output: LogOutput,
    pub span_events: SpanEventConfig,
    /// Include thread ids.
    pub thread_ids: bool,
    /// Include file names and line numbers.
    pub file_location: bool,
    /// Log file, used when `output = "file"`.
    pub file_path: Option<PathBuf>,
    pub rotation: LogRotation,
    /// Rotated files kept on disk.
    pub max_files: u32,
    /// Per-module levels, e.g. `astron_framework = "debug"`.
    pub filters: BTreeMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::Never,
            max_files: 5,
            filters: BTreeMap::new(),
        }
    }
}

// =============================================================================
// Router
// =============================================================================

/// Warning templates, one per rejection kind. Unset means silent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WarningsConfig {
    pub direct_message_only: Option<String>,
    pub guild_only: Option<String>,
    pub owner_only: Option<String>,
    pub missing_self_capability: Option<String>,
    pub missing_executor_permissions: Option<String>,
    pub missing_caller_permissions: Option<String>,
    pub cooldown: Option<String>,
}

impl WarningsConfig {
    /// Every configured template with its rejection kind.
    pub fn entries(&self) -> impl Iterator<Item = (RejectionKind, &str)> {
        [
            (RejectionKind::DirectMessageOnly, &self.direct_message_only),
            (RejectionKind::GuildOnly, &self.guild_only),
            (RejectionKind::OwnerOnly, &self.owner_only),
            (RejectionKind::MissingSelfCapability, &self.missing_self_capability),
            (
                RejectionKind::MissingExecutorPermissions,
                &self.missing_executor_permissions,
            ),
            (
                RejectionKind::MissingCallerPermissions,
                &self.missing_caller_permissions,
            ),
            (RejectionKind::Cooldown, &self.cooldown),
        ]
        .into_iter()
        .filter_map(|(kind, template)| template.as_deref().map(|t| (kind, t)))
    }
}

/// Router configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Root of the handler tree. Required.
    pub directory: Option<PathBuf>,
    pub prefix: String,
    /// Owner user ids.
    pub owners: Vec<String>,
    /// The bot's own user id, for mention addressing.
    pub self_id: Option<String>,
    /// Reported at startup.
    pub version: String,
    pub block_bots: bool,
    pub allow_direct_messages: bool,
    pub allow_mention_prefix: bool,
    pub source_extension: String,
    pub response_permission: String,
    pub warnings: WarningsConfig,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: "!".to_string(),
            owners: Vec::new(),
            self_id: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
            block_bots: true,
            allow_direct_messages: true,
            allow_mention_prefix: true,
            source_extension: DEFAULT_EXTENSION.to_string(),
            response_permission: DEFAULT_RESPONSE_PERMISSION.to_string(),
            warnings: WarningsConfig::default(),
        }
    }
}

impl RouterConfig {
    /// A builder pre-filled from this configuration.
    ///
    /// Use it to add what files cannot express, such as a per-message prefix
    /// or computed warnings.
    pub fn options_builder(&self) -> RouterOptionsBuilder {
        let mut builder = RouterOptions::builder()
            .prefix(self.prefix.as_str())
            .owners(self.owners.iter().cloned())
            .block_bots(self.block_bots)
            .allow_direct_messages(self.allow_direct_messages)
            .allow_mention_prefix(self.allow_mention_prefix)
            .source_extension(self.source_extension.as_str())
            .response_permission(self.response_permission.as_str());

        if let Some(directory) = &self.directory {
            builder = builder.directory(directory);
        }
        if let Some(id) = &self.self_id {
            builder = builder.self_id(id);
        }
        for (kind, template) in self.warnings.entries() {
            builder = builder.warning(kind, template);
        }
        builder
    }

    /// Builds router options; fails when `directory` is unset.
    pub fn into_router_options(&self) -> ConfigResult<RouterOptions> {
        Ok(self.options_builder().build()?)
    }
}
