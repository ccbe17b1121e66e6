//! # Astron Core
//!
//! Platform-independent building blocks of the Astron command router.
//!
//! - **Definitions**: validated command and listener definitions
//!   ([`HandlerDefinition`], [`CommandBuilder`], [`ListenerBuilder`])
//! - **Executors**: the callbacks bound to definitions ([`CommandExecutor`],
//!   [`ListenerExecutor`]) and their link-time registries
//! - **Registry**: id/alias resolution and category grouping ([`Registry`])
//! - **Cooldowns**: per-handler, per-invoker expiry ([`CooldownTracker`])
//! - **Messages**: the transport-facing [`InboundMessage`] trait
//!
//! Loading definitions from disk and routing messages through the dispatch
//! gates lives in `astron-framework`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use astron_core::{HandlerDefinition, Registry, command_fn};
//!
//! let mut registry = Registry::new();
//! registry.register(
//!     HandlerDefinition::command("ping")
//!         .category("general")
//!         .alias("p")
//!         .executor(command_fn(|ctx, _args| async move {
//!             ctx.reply("Pong!").await?;
//!             Ok(())
//!         }))
//!         .build()?,
//! )?;
//!
//! assert_eq!(registry.resolve("P").unwrap().id(), "ping");
//! ```

pub mod cooldown;
pub mod error;
pub mod executor;
pub mod handler;
pub mod message;
pub mod permission;
pub mod registry;
pub mod util;

pub use cooldown::CooldownTracker;
pub use error::{
    ExecuteError, RegistryError, RegistryResult, TransportError, TransportResult, ValidationError,
};
pub use executor::{
    BoxedCommandExecutor, BoxedListenerExecutor, COMMAND_EXECUTORS, CommandContext,
    CommandExecutor, CommandExecutorEntry, LISTENER_EXECUTORS, ListenerContext, ListenerExecutor,
    ListenerExecutorEntry, NotImplemented, command_fn, listener_fn,
};
pub use handler::{
    CommandBuilder, CommandSpec, DEFAULT_COOLDOWN, DEFAULT_EMITTER, HandlerDefinition,
    HandlerKind, ListenerBuilder, ListenerSpec, Scope,
};
pub use message::{Author, BoxedMessage, ChannelKind, GuildContext, InboundMessage};
pub use permission::{Permission, PermissionSet, format_list};
pub use registry::{Category, Registry};
pub use tower::BoxError;

// Used by code generated from `astron-macros`.
#[doc(hidden)]
pub use linkme;
