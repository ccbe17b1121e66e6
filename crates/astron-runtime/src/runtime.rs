//! Runtime orchestration: configuration, logging, and the event intake loop.
//!
//! A transport turns whatever its platform delivers into a stream of
//! [`TransportEvent`]s. The runtime feeds messages to the router's dispatch
//! pipeline and every other event to the subscribed listeners, until the
//! stream ends or the process is asked to stop.
//!
//! ```rust,ignore
//! use astron_runtime::AstronRuntime;
//!
//! let runtime = AstronRuntime::builder()
//!     .config_file("astron.toml")
//!     .build()?;
//!
//! runtime.run(transport.events()).await?;
//! ```

use std::path::PathBuf;
use std::sync::Once;

use astron_core::{BoxedMessage, TransportError};
use astron_framework::pipeline::panic_message;
use astron_framework::{ExecutorCatalog, LoadReport, Router, RouterOptionsBuilder};
use futures::{Stream, StreamExt};
use tokio::signal;
use tracing::{debug, error, info, warn};

use crate::config::{AstronConfig, ConfigError, ConfigLoader, validate_config};
use crate::error::{LoggingError, RuntimeError, RuntimeResult};
use crate::logging::LoggingBuilder;

/// Something a transport delivered.
pub enum TransportEvent {
    /// A chat message, routed through the dispatch pipeline.
    Message(BoxedMessage),
    /// Any other platform event, delivered to listeners.
    Event {
        emitter: String,
        name: String,
        payload: serde_json::Value,
    },
    /// The transport hit a problem it could recover from.
    Error(TransportError),
}

impl TransportEvent {
    /// An event from the default `client` emitter.
    pub fn event(name: impl Into<String>, payload: serde_json::Value) -> Self {
        Self::Event {
            emitter: astron_core::DEFAULT_EMITTER.to_string(),
            name: name.into(),
            payload,
        }
    }
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Message(message) => f
                .debug_struct("Message")
                .field("author", &message.author().id)
                .finish_non_exhaustive(),
            Self::Event { emitter, name, .. } => f
                .debug_struct("Event")
                .field("emitter", emitter)
                .field("name", name)
                .finish_non_exhaustive(),
            Self::Error(e) => f.debug_tuple("Error").field(e).finish(),
        }
    }
}

// =============================================================================
// Panic hook
// =============================================================================

static PANIC_HOOK: Once = Once::new();

/// Routes panic reports through `tracing` instead of stderr.
///
/// Installed once per process; later calls do nothing.
pub fn install_panic_hook() {
    PANIC_HOOK.call_once(|| {
        std::panic::set_hook(Box::new(|info| {
            let location = info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_default();
            error!(
                panic.message = %panic_message(info.payload()),
                panic.location = %location,
                "Panic"
            );
        }));
    });
}

// =============================================================================
// AstronRuntime
// =============================================================================

/// Owns the configuration and the router, and drives the intake loop.
pub struct AstronRuntime {
    config: AstronConfig,
    router: Router,
}

impl AstronRuntime {
    /// Starts building a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    /// The configuration the runtime was built from.
    pub fn config(&self) -> &AstronConfig {
        &self.config
    }

    /// The router. Clones share the same registry.
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Rebuilds the registry from disk.
    pub fn reload(&self) -> LoadReport {
        self.router.reload_all()
    }

    /// Handles one transport event.
    ///
    /// Messages are dispatched in arrival order; executors run on their own
    /// tasks, so a slow command does not hold up the next message.
    pub async fn handle(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => {
                let outcome = self.router.dispatch(message).await;
                debug!(?outcome, "Message handled");
            }
            TransportEvent::Event {
                emitter,
                name,
                payload,
            } => {
                let started = self.router.emit(&emitter, &name, payload).len();
                debug!(emitter = %emitter, event = %name, listeners = started, "Event handled");
            }
            TransportEvent::Error(e) => {
                warn!(error = %e, "Transport error");
            }
        }
    }

    /// Consumes `events` until the stream ends, Ctrl+C, or SIGTERM.
    pub async fn run<S>(&self, events: S) -> RuntimeResult<()>
    where
        S: Stream<Item = TransportEvent>,
    {
        #[cfg(unix)]
        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .map_err(RuntimeError::Signal)?;

        let shutdown = async move {
            #[cfg(unix)]
            tokio::select! {
                _ = ctrl_c() => info!("Received Ctrl+C, shutting down"),
                _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            }

            #[cfg(not(unix))]
            {
                ctrl_c().await;
                info!("Received Ctrl+C, shutting down");
            }
        };

        info!("Astron is running. Press Ctrl+C to stop.");
        self.run_until(events, shutdown).await
    }

    /// Consumes `events` until the stream ends or `shutdown` completes.
    pub async fn run_until<S, F>(&self, events: S, shutdown: F) -> RuntimeResult<()>
    where
        S: Stream<Item = TransportEvent>,
        F: Future<Output = ()>,
    {
        let mut events = std::pin::pin!(events);
        let mut shutdown = std::pin::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                next = events.next() => match next {
                    Some(event) => self.handle(event).await,
                    None => {
                        info!("Transport stream ended");
                        break;
                    }
                },
            }
        }

        info!(handlers = self.router.registry().len(), "Runtime stopped");
        Ok(())
    }
}

/// Resolves on Ctrl+C. If the handler cannot be installed, never resolves.
async fn ctrl_c() {
    if let Err(e) = signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for Ctrl+C");
        futures::future::pending::<()>().await;
    }
}

impl std::fmt::Debug for AstronRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AstronRuntime")
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

type OptionsHook = Box<dyn FnOnce(RouterOptionsBuilder) -> RouterOptionsBuilder>;

/// Builder for [`AstronRuntime`].
///
/// Without an explicit configuration, `astron.toml` is searched for in the
/// current directory and the user config directory.
pub struct RuntimeBuilder {
    loader: ConfigLoader,
    config: Option<AstronConfig>,
    catalog: Option<ExecutorCatalog>,
    options_hooks: Vec<OptionsHook>,
    init_logging: bool,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            loader: ConfigLoader::new(),
            config: None,
            catalog: None,
            options_hooks: Vec::new(),
            init_logging: true,
        }
    }

    /// Loads this file instead of searching.
    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.loader = self.loader.file(path.into());
        self
    }

    /// Selects the configuration profile.
    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.loader = self.loader.profile(profile);
        self
    }

    /// Uses a ready configuration; no files or environment are read.
    pub fn config(mut self, config: AstronConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Uses this catalog instead of the link-time registered executors.
    pub fn catalog(mut self, catalog: ExecutorCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Adjusts router options beyond what configuration files can say,
    /// such as a per-message prefix or computed warnings.
    pub fn router_options<F>(mut self, f: F) -> Self
    where
        F: FnOnce(RouterOptionsBuilder) -> RouterOptionsBuilder + 'static,
    {
        self.options_hooks.push(Box::new(f));
        self
    }

    /// Leaves the global subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    /// Loads configuration, sets up logging, builds the router, and loads
    /// the handler tree.
    pub fn build(self) -> RuntimeResult<AstronRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            match LoggingBuilder::from_config(&config.logging).try_init() {
                Ok(()) => {}
                Err(LoggingError::Init(_)) => debug!("Log subscriber already installed"),
                Err(e) => return Err(e.into()),
            }
        }
        install_panic_hook();

        let options = self
            .options_hooks
            .into_iter()
            .fold(config.router.options_builder(), |builder, hook| hook(builder))
            .build()
            .map_err(ConfigError::from)?;
        let catalog = self.catalog.unwrap_or_else(ExecutorCatalog::collect_all);

        let router = Router::new(options, catalog);
        let report = router.load();
        info!(
            version = %config.router.version,
            handlers = report.loaded(),
            failures = report.failures.len(),
            "Runtime initialized"
        );

        Ok(AstronRuntime { config, router })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use astron_core::{
        Author, ChannelKind, InboundMessage, TransportResult, command_fn, listener_fn,
    };
    use async_trait::async_trait;
    use futures::stream;

    use super::*;

    struct ConsoleLine {
        author: Author,
        content: String,
    }

    #[async_trait]
    impl InboundMessage for ConsoleLine {
        fn author(&self) -> &Author {
            &self.author
        }

        fn content(&self) -> &str {
            &self.content
        }

        fn channel_kind(&self) -> ChannelKind {
            ChannelKind::Direct
        }

        async fn reply(&self, _text: &str) -> TransportResult<()> {
            Ok(())
        }

        async fn direct_message(&self, _text: &str) -> TransportResult<()> {
            Ok(())
        }
    }

    fn line(content: &str) -> TransportEvent {
        TransportEvent::Message(Arc::new(ConsoleLine {
            author: Author::user("7"),
            content: content.to_string(),
        }))
    }

    fn runtime(
        dir: &std::path::Path,
        pings: Arc<AtomicUsize>,
        events: Arc<AtomicUsize>,
    ) -> AstronRuntime {
        std::fs::create_dir_all(dir.join("general")).unwrap();
        std::fs::write(dir.join("general/ping.toml"), "id = \"ping\"\n").unwrap();
        std::fs::write(
            dir.join("general/ready.toml"),
            "kind = \"listener\"\nid = \"ready\"\nevent = \"ready\"\n",
        )
        .unwrap();

        let catalog = ExecutorCatalog::new()
            .command(
                "ping",
                command_fn(move |_ctx, _args| {
                    let pings = pings.clone();
                    async move {
                        pings.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            )
            .listener(
                "ready",
                listener_fn(move |_ctx, _payload| {
                    let events = events.clone();
                    async move {
                        events.fetch_add(1, Ordering::SeqCst);
                        Ok(())
                    }
                }),
            );

        let mut config = AstronConfig::default();
        config.router.directory = Some(dir.to_path_buf());

        AstronRuntime::builder()
            .config(config)
            .catalog(catalog)
            .without_logging()
            .build()
            .unwrap()
    }

    async fn settle() {
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_run_until_stream_ends() {
        let dir = tempfile::tempdir().unwrap();
        let pings = Arc::new(AtomicUsize::new(0));
        let events = Arc::new(AtomicUsize::new(0));
        let runtime = runtime(dir.path(), pings.clone(), events.clone());
        assert_eq!(runtime.router().registry().len(), 2);

        let input = stream::iter(vec![
            line("!ping"),
            line("hello"),
            TransportEvent::event("ready", serde_json::json!({})),
            TransportEvent::Error(TransportError::Other("flaky".into())),
        ]);
        runtime
            .run_until(input, futures::future::pending())
            .await
            .unwrap();
        settle().await;

        assert_eq!(pings.load(Ordering::SeqCst), 1);
        assert_eq!(events.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_run_until_shutdown_first() {
        let dir = tempfile::tempdir().unwrap();
        let pings = Arc::new(AtomicUsize::new(0));
        let runtime = runtime(dir.path(), pings.clone(), Arc::default());

        runtime
            .run_until(stream::iter(vec![line("!ping")]), async {})
            .await
            .unwrap();
        settle().await;

        assert_eq!(pings.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_router_options_hook() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AstronConfig::default();
        config.router.directory = Some(dir.path().to_path_buf());

        let runtime = AstronRuntime::builder()
            .config(config)
            .catalog(ExecutorCatalog::new())
            .router_options(|builder| builder.owners(["99"]))
            .without_logging()
            .build()
            .unwrap();
        assert!(runtime.router().options().is_owner("99"));
    }

    #[test]
    fn test_build_rejects_invalid_config() {
        let result = AstronRuntime::builder()
            .config(AstronConfig::default())
            .without_logging()
            .build();
        assert!(matches!(result, Err(RuntimeError::Config(_))));
    }
}
