//! # Astron Runtime
//!
//! Runs an Astron router as a process:
//!
//! - layered configuration (`astron.toml` / `astron.yaml`, `ASTRON_*`
//!   variables) in [`config`]
//! - log subscriber setup in [`logging`]
//! - the [`AstronRuntime`] intake loop, which feeds [`TransportEvent`]s to
//!   the router until the stream ends or the process receives Ctrl+C or
//!   SIGTERM
//!
//! ```rust,ignore
//! use astron_runtime::{AstronRuntime, TransportEvent};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = AstronRuntime::builder().build()?;
//!     runtime.run(my_transport.events()).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

pub use config::{
    AstronConfig, ConfigError, ConfigLoader, ConfigResult, LoggingConfig, RouterConfig,
};
pub use error::{LoggingError, RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{AstronRuntime, RuntimeBuilder, TransportEvent, install_panic_hook};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros, for executors that want them without a direct `tracing`
/// dependency.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
