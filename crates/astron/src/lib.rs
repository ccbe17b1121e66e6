//! # Astron
//!
//! A command router for chat bots whose commands live in a directory tree.
//!
//! ## Overview
//!
//! Each file under `<directory>/<category>/` describes one command or event
//! listener: its id, aliases, scope, required permissions and cooldown. The
//! code that runs is an executor bound by id, registered with
//! `#[command("id")]` / `#[listener("id")]` or added to an
//! [`ExecutorCatalog`](framework::ExecutorCatalog) by hand. Editing a file
//! and reloading changes a command without touching anything else.
//!
//! ```text
//! ┌───────────┐   TransportEvent   ┌─────────┐   Message   ┌────────────────────┐
//! │ Transport │───────────────────▶│ Runtime │────────────▶│ Dispatch pipeline  │──▶ executor task
//! └───────────┘                    └─────────┘             │ (bot, address,     │
//!                                       │                  │  scope, owner,     │
//!                                       │ Event            │  permissions,      │
//!                                       ▼                  │  cooldown)         │
//!                                 listeners ──▶ task       └────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use astron::prelude::*;
//!
//! #[command("ping")]
//! async fn ping(ctx: CommandContext, _args: Vec<String>) -> Result<(), BoxError> {
//!     ctx.reply("Pong!").await?;
//!     Ok(())
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     // reads astron.toml: [router] directory = "commands", prefix = "!"
//!     let runtime = AstronRuntime::builder().build()?;
//!     runtime.run(my_transport.events()).await?;
//!     Ok(())
//! }
//! ```
//!
//! with `commands/general/ping.toml`:
//!
//! ```toml
//! id = "ping"
//! aliases = ["p"]
//! cooldown = 5
//! ```
//!
//! Code generated by the macros names `astron_core` directly, so crates using
//! them also depend on `astron-core`.
//!
//! ## Features
//!
//! - `macros`: `#[command]` and `#[listener]` (default)
//! - `toml-config` / `yaml-config`: configuration file formats
//! - `json-log`: JSON log output

pub use astron_core as core;
pub use astron_framework as framework;
pub use astron_runtime as runtime;

#[cfg(feature = "macros")]
pub use astron_macros::{command, listener};

/// Prelude module for convenient imports.
pub mod prelude {
    // Runtime - main entry point
    pub use astron_runtime::{AstronRuntime, TransportEvent};

    // Router and its options
    pub use astron_framework::{
        DispatchOutcome, ExecutorCatalog, Prefix, RejectionKind, Router, RouterOptions, Warning,
    };

    // Executors
    pub use astron_core::{
        BoxError, CommandContext, InboundMessage, ListenerContext, command_fn, listener_fn,
    };

    // Messages and definitions
    pub use astron_core::{Author, BoxedMessage, ChannelKind, GuildContext, HandlerDefinition};

    #[cfg(feature = "macros")]
    pub use astron_macros::{command, listener};
}
