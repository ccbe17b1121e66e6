//! Procedural macros for the Astron command router.
//!
//! `#[command]` and `#[listener]` register an `async fn` as an executor so
//! that handler manifests can bind to it by id, without any manual catalog
//! wiring:
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
//! #[listener("welcome")]
//! async fn welcome(ctx: ListenerContext, payload: Arc<serde_json::Value>) -> Result<(), BoxError> {
//!     tracing::info!(event = ctx.event(), "member joined");
//!     Ok(())
//! }
//! ```
//!
//! `ExecutorCatalog::collect_all()` then finds both.

mod executor;

use proc_macro::TokenStream;

use executor::Kind;

/// Registers an `async fn(CommandContext, Vec<String>)` as a command
/// executor. The id defaults to the function name.
#[proc_macro_attribute]
pub fn command(attr: TokenStream, item: TokenStream) -> TokenStream {
    executor::expand(Kind::Command, attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}

/// Registers an `async fn(ListenerContext, Arc<serde_json::Value>)` as a
/// listener executor. The id defaults to the function name.
#[proc_macro_attribute]
pub fn listener(attr: TokenStream, item: TokenStream) -> TokenStream {
    executor::expand(Kind::Listener, attr.into(), item.into())
        .unwrap_or_else(syn::Error::into_compile_error)
        .into()
}
