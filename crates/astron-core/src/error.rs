//! Unified error types for the Astron core.
//!
//! Framework-level errors (loading, reloading, router construction) are
//! defined in `astron-framework`.

use thiserror::Error;

// =============================================================================
// Validation Errors
// =============================================================================

/// Errors produced while building a [`HandlerDefinition`](crate::HandlerDefinition).
///
/// A definition that fails validation is never constructed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// The handler id is empty.
    #[error("handler id must not be empty")]
    EmptyId,

    /// An id or alias contains whitespace and could never be typed as one token.
    #[error("'{token}' contains whitespace")]
    Whitespace {
        /// The offending token.
        token: String,
    },

    /// An alias is empty.
    #[error("handler '{id}' declares an empty alias")]
    EmptyAlias {
        /// The handler declaring it.
        id: String,
    },

    /// The same alias (or the id itself) is declared twice on one handler.
    #[error("handler '{id}' declares '{alias}' more than once")]
    RepeatedAlias {
        /// The handler declaring it.
        id: String,
        /// The repeated token.
        alias: String,
    },

    /// The category is empty.
    #[error("handler '{id}' has no category")]
    EmptyCategory {
        /// The handler.
        id: String,
    },

    /// The cooldown is negative or not a finite number.
    #[error("handler '{id}' has an invalid cooldown: {seconds}")]
    InvalidCooldown {
        /// The handler.
        id: String,
        /// The rejected value in seconds.
        seconds: f64,
    },

    /// A listener was declared without an event name.
    #[error("listener '{id}' has no event name")]
    MissingEvent {
        /// The listener.
        id: String,
    },
}

// =============================================================================
// Registry Errors
// =============================================================================

/// Errors that can occur when mutating a [`Registry`](crate::Registry).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A token (id or alias) is already claimed by another handler.
    #[error("'{token}' is already registered by handler '{existing}'")]
    DuplicateId {
        /// The colliding token.
        token: String,
        /// The id of the handler that already owns it.
        existing: String,
    },
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

// =============================================================================
// Execution Errors
// =============================================================================

/// Errors raised by the built-in executors.
#[derive(Debug, Clone, Error)]
pub enum ExecuteError {
    /// The handler was defined without an execution callback.
    #[error("NOT_IMPLEMENTED {id} exec")]
    NotImplemented {
        /// The handler id.
        id: String,
    },
}

// =============================================================================
// Transport Errors
// =============================================================================

/// Errors reported by the external messaging transport.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Sending a message failed.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// The connection is not available.
    #[error("connection closed: {reason}")]
    ConnectionClosed {
        /// Reason for closure.
        reason: String,
    },

    /// Any other transport failure.
    #[error("transport error: {0}")]
    Other(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
