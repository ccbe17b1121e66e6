//! Runtime error types.

use thiserror::Error;

use crate::config::ConfigError;

/// Errors raised while installing the log subscriber.
#[derive(Error, Debug)]
pub enum LoggingError {
    /// A global subscriber is already installed.
    #[error("Failed to install log subscriber: {0}")]
    Init(#[from] tracing_subscriber::util::TryInitError),

    /// The log file could not be opened.
    #[error("Failed to open log file: {0}")]
    Appender(#[from] tracing_appender::rolling::InitError),
}

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Logging could not be set up.
    #[error(transparent)]
    Logging(#[from] LoggingError),

    /// The shutdown signal handler could not be installed.
    #[error("Failed to listen for shutdown signals: {0}")]
    Signal(#[source] std::io::Error),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
