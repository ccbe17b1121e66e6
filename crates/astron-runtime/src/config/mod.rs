//! Configuration for the Astron runtime.
//!
//! Router and logging settings are read from TOML or YAML files and the
//! environment, then validated before the router is built.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AstronConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, RouterConfig,
    SpanEventConfig, WarningsConfig,
};
pub use validation::validate_config;
