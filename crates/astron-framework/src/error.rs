//! Error types for the Astron framework.

use std::path::PathBuf;

use astron_core::{RegistryError, ValidationError};
use thiserror::Error;

/// Errors raised while reading one handler manifest.
///
/// The loader logs these and keeps going; they end up in the
/// [`LoadReport`](crate::LoadReport).
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// Path being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The manifest is not valid TOML/YAML or does not match the schema.
    #[error("failed to parse {path}: {source}")]
    Parse {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: Box<figment::Error>,
    },

    /// The manifest parsed but describes an invalid definition.
    #[error("invalid handler in {path}: {source}")]
    Validation {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: ValidationError,
    },

    /// The manifest names an executor that nobody registered.
    #[error("{path} references unknown executor '{executor}'")]
    UnknownExecutor {
        /// Manifest path.
        path: PathBuf,
        /// The missing executor key.
        executor: String,
    },

    /// The definition collides with one already registered.
    #[error("cannot register handler from {path}: {source}")]
    Duplicate {
        /// Manifest path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: RegistryError,
    },
}

impl LoadError {
    /// Path of the file the error concerns.
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Validation { path, .. }
            | Self::UnknownExecutor { path, .. }
            | Self::Duplicate { path, .. } => path,
        }
    }
}

/// Result type for load operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Errors raised by [`Router::reload_one`](crate::Router::reload_one).
#[derive(Debug, Error)]
pub enum ReloadError {
    /// No handler resolves from the token.
    #[error("no handler named '{token}'")]
    NotFound {
        /// The token looked up.
        token: String,
    },

    /// The handler was registered in code and has no manifest to re-read.
    #[error("handler '{id}' was not loaded from a file and cannot be reloaded")]
    NoSource {
        /// The handler id.
        id: String,
    },

    /// Re-reading the manifest failed; the live registry is unchanged.
    #[error(transparent)]
    Load(#[from] LoadError),
}

/// Result type for reload operations.
pub type ReloadResult<T> = Result<T, ReloadError>;

/// Errors raised while constructing a router.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// A required option was not provided.
    #[error("missing required option: {name}")]
    MissingOption {
        /// Option name.
        name: &'static str,
    },
}

impl BuildError {
    /// Creates a missing option error.
    pub fn missing(name: &'static str) -> Self {
        Self::MissingOption { name }
    }
}

/// Result type for router construction.
pub type BuildResult<T> = Result<T, BuildError>;
