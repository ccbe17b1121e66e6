//! # Astron Framework
//!
//! Turns a directory of handler manifests into a running command router.
//!
//! - [`Loader`] discovers `<root>/<category>/*.toml` manifests and binds them
//!   to executors from an [`ExecutorCatalog`]
//! - [`DispatchPipeline`] runs each inbound message through the gates (bot
//!   filter, address, scope, ownership, permissions, cooldown)
//! - [`Router`] owns the live registry and exposes load, reload, dispatch and
//!   event delivery
//!
//! ```rust,ignore
//! use astron_framework::{ExecutorCatalog, Router, RouterOptions};
//!
//! let options = RouterOptions::builder()
//!     .directory("./commands")
//!     .prefix("!")
//!     .build()?;
//! let router = Router::new(options, ExecutorCatalog::collect_all());
//! router.load();
//!
//! router.dispatch(message).await;
//! ```

pub mod address;
pub mod catalog;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod options;
pub mod pipeline;
pub mod router;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::ExecutorCatalog;
pub use error::{
    BuildError, BuildResult, LoadError, LoadResult, ReloadError, ReloadResult,
};
pub use loader::{LoadFailure, LoadReport, Loader};
pub use manifest::{HandlerManifest, ManifestKind};
pub use options::{
    Prefix, Rejection, RejectionKind, RouterOptions, RouterOptionsBuilder, Warning,
    WarningContext, Warnings,
};
pub use pipeline::{DispatchOutcome, DispatchPipeline, Gate, IgnoreReason, PipelineStats};
pub use router::Router;
