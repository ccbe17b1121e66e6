//! Execution callbacks bound to handler definitions.
//!
//! Executors are opaque application code. The router only knows how to call
//! them: commands receive a [`CommandContext`] and their argument tokens,
//! listeners receive a [`ListenerContext`] and the event payload.
//!
//! Executors can be registered two ways:
//! - at link time through the [`COMMAND_EXECUTORS`] / [`LISTENER_EXECUTORS`]
//!   slices (the `#[command]` and `#[listener]` attributes do this), or
//! - at run time by building them with [`command_fn`] / [`listener_fn`] and
//!   handing them to the loader's catalog.

use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use linkme::distributed_slice;
use tower::BoxError;

use crate::error::{ExecuteError, TransportResult};
use crate::handler::HandlerDefinition;
use crate::message::{Author, BoxedMessage};

// =============================================================================
// Contexts
// =============================================================================

/// Everything a command executor gets to see about its invocation.
#[derive(Debug, Clone)]
pub struct CommandContext {
    message: BoxedMessage,
    handler: Arc<HandlerDefinition>,
    prefix: String,
    invoked_as: String,
}

impl CommandContext {
    /// Creates a context.
    pub fn new(
        message: BoxedMessage,
        handler: Arc<HandlerDefinition>,
        prefix: impl Into<String>,
        invoked_as: impl Into<String>,
    ) -> Self {
        Self {
            message,
            handler,
            prefix: prefix.into(),
            invoked_as: invoked_as.into(),
        }
    }

    /// The message that triggered the command.
    pub fn message(&self) -> &BoxedMessage {
        &self.message
    }

    /// The definition being executed.
    pub fn handler(&self) -> &HandlerDefinition {
        &self.handler
    }

    /// The address that matched: the prefix or the mention text.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The token the command was invoked with (id or alias, lower-cased).
    pub fn invoked_as(&self) -> &str {
        &self.invoked_as
    }

    /// The message author.
    pub fn author(&self) -> &Author {
        self.message.author()
    }

    /// Replies in the originating channel.
    pub async fn reply(&self, text: impl AsRef<str>) -> TransportResult<()> {
        self.message.reply(text.as_ref()).await
    }
}

/// Everything a listener executor gets to see about its invocation.
#[derive(Debug, Clone)]
pub struct ListenerContext {
    handler: Arc<HandlerDefinition>,
    emitter: String,
    event: String,
}

impl ListenerContext {
    /// Creates a context.
    pub fn new(
        handler: Arc<HandlerDefinition>,
        emitter: impl Into<String>,
        event: impl Into<String>,
    ) -> Self {
        Self {
            handler,
            emitter: emitter.into(),
            event: event.into(),
        }
    }

    /// The definition being executed.
    pub fn handler(&self) -> &HandlerDefinition {
        &self.handler
    }

    /// The emitter the event came from.
    pub fn emitter(&self) -> &str {
        &self.emitter
    }

    /// The event name.
    pub fn event(&self) -> &str {
        &self.event
    }
}

// =============================================================================
// Executor traits
// =============================================================================

/// A command execution callback.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    /// Runs the command with the remaining argument tokens.
    async fn execute(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), BoxError>;
}

/// A listener callback.
#[async_trait]
pub trait ListenerExecutor: Send + Sync + 'static {
    /// Handles one event occurrence.
    async fn on_event(
        &self,
        ctx: ListenerContext,
        payload: Arc<serde_json::Value>,
    ) -> Result<(), BoxError>;
}

/// Shared command executor.
pub type BoxedCommandExecutor = Arc<dyn CommandExecutor>;

/// Shared listener executor.
pub type BoxedListenerExecutor = Arc<dyn ListenerExecutor>;

/// Executor bound to definitions that never received one.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotImplemented;

#[async_trait]
impl CommandExecutor for NotImplemented {
    async fn execute(&self, ctx: CommandContext, _args: Vec<String>) -> Result<(), BoxError> {
        Err(ExecuteError::NotImplemented {
            id: ctx.handler().id().to_string(),
        }
        .into())
    }
}

#[async_trait]
impl ListenerExecutor for NotImplemented {
    async fn on_event(
        &self,
        ctx: ListenerContext,
        _payload: Arc<serde_json::Value>,
    ) -> Result<(), BoxError> {
        Err(ExecuteError::NotImplemented {
            id: ctx.handler().id().to_string(),
        }
        .into())
    }
}

// =============================================================================
// Function adapters
// =============================================================================

/// Wraps an async function as a [`CommandExecutor`].
pub struct CommandFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> CommandExecutor for CommandFn<F, Fut>
where
    F: Fn(CommandContext, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn execute(&self, ctx: CommandContext, args: Vec<String>) -> Result<(), BoxError> {
        (self.f)(ctx, args).await
    }
}

/// Creates a command executor from an async function or closure.
pub fn command_fn<F, Fut>(f: F) -> BoxedCommandExecutor
where
    F: Fn(CommandContext, Vec<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(CommandFn {
        f,
        _marker: PhantomData,
    })
}

/// Wraps an async function as a [`ListenerExecutor`].
pub struct ListenerFn<F, Fut> {
    f: F,
    _marker: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut> ListenerExecutor for ListenerFn<F, Fut>
where
    F: Fn(ListenerContext, Arc<serde_json::Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    async fn on_event(
        &self,
        ctx: ListenerContext,
        payload: Arc<serde_json::Value>,
    ) -> Result<(), BoxError> {
        (self.f)(ctx, payload).await
    }
}

/// Creates a listener executor from an async function or closure.
pub fn listener_fn<F, Fut>(f: F) -> BoxedListenerExecutor
where
    F: Fn(ListenerContext, Arc<serde_json::Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    Arc::new(ListenerFn {
        f,
        _marker: PhantomData,
    })
}

// =============================================================================
// Link-time registries (linkme distributed slices)
// =============================================================================

/// A command executor contributed at link time.
#[derive(Debug, Clone, Copy)]
pub struct CommandExecutorEntry {
    /// Key manifests refer to in their `executor` field (or their id).
    pub id: &'static str,
    /// Builds the executor.
    pub factory: fn() -> BoxedCommandExecutor,
}

/// A listener executor contributed at link time.
#[derive(Debug, Clone, Copy)]
pub struct ListenerExecutorEntry {
    /// Key manifests refer to in their `executor` field (or their id).
    pub id: &'static str,
    /// Builds the executor.
    pub factory: fn() -> BoxedListenerExecutor,
}

/// Every command executor registered via `#[command("id")]`.
#[distributed_slice]
pub static COMMAND_EXECUTORS: [CommandExecutorEntry];

/// Every listener executor registered via `#[listener("id")]`.
#[distributed_slice]
pub static LISTENER_EXECUTORS: [ListenerExecutorEntry];
