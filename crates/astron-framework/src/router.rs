//! The router: live registry, loader and dispatch pipeline in one handle.
//!
//! The live [`Registry`] sits behind an [`ArcSwap`]. Every dispatch loads one
//! snapshot, so a concurrent reload is observed either fully or not at all.
//! Administrative changes (reloads, registrations) are serialized by a lock
//! and always build the next registry off to the side before swapping it in.
//!
//! `Router` is a cheap, clonable handle and implements
//! `tower::Service<BoxedMessage>`, so middleware can be stacked on top of
//! dispatch.

use std::collections::HashSet;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use arc_swap::ArcSwap;
use astron_core::{
    BoxedMessage, HandlerDefinition, HandlerKind, ListenerContext, Registry, RegistryResult,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::Service;
use tracing::{Instrument, debug, debug_span, info, warn};

use crate::catalog::ExecutorCatalog;
use crate::error::{LoadError, ReloadError, ReloadResult};
use crate::loader::{LoadReport, Loader};
use crate::options::RouterOptions;
use crate::pipeline::{DispatchOutcome, DispatchPipeline, PipelineStats, spawn_guarded};

struct RouterInner {
    loader: Loader,
    registry: ArcSwap<Registry>,
    reload_lock: Mutex<()>,
    pipeline: DispatchPipeline,
    /// `once` listeners that already fired against the current registry.
    fired: Mutex<HashSet<String>>,
}

/// Command and listener router.
#[derive(Clone)]
pub struct Router {
    inner: Arc<RouterInner>,
}

impl Router {
    /// Creates a router with an empty registry. Call [`load`](Self::load) to
    /// read the handler directory.
    pub fn new(options: RouterOptions, catalog: ExecutorCatalog) -> Self {
        let loader = Loader::new(
            options.directory.clone(),
            &options.source_extension,
            Arc::new(catalog),
        );
        let options = Arc::new(options);

        Self {
            inner: Arc::new(RouterInner {
                loader,
                registry: ArcSwap::from_pointee(Registry::new()),
                reload_lock: Mutex::new(()),
                pipeline: DispatchPipeline::new(options),
                fired: Mutex::new(HashSet::new()),
            }),
        }
    }

    /// The options in effect.
    pub fn options(&self) -> &RouterOptions {
        self.inner.pipeline.options()
    }

    /// The loader reading the handler directory.
    pub fn loader(&self) -> &Loader {
        &self.inner.loader
    }

    /// Gate counters.
    pub fn stats(&self) -> &PipelineStats {
        self.inner.pipeline.stats()
    }

    /// The current registry snapshot.
    pub fn registry(&self) -> Arc<Registry> {
        self.inner.registry.load_full()
    }

    /// Resolves a handler by id or alias in the current snapshot.
    pub fn fetch(&self, token: &str) -> Option<Arc<HandlerDefinition>> {
        self.inner.registry.load().resolve(token).cloned()
    }

    // ------------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------------

    /// Loads the handler directory into the router.
    pub fn load(&self) -> LoadReport {
        info!(directory = %self.inner.loader.root().display(), "Loading handlers");
        self.reload_all()
    }

    /// Rebuilds the registry from the handler directory and swaps it in.
    ///
    /// Handlers registered in code (without a source file) are carried over.
    pub fn reload_all(&self) -> LoadReport {
        let _guard = self.inner.reload_lock.lock();
        let current = self.inner.registry.load_full();

        let (mut next, report) = self.inner.loader.load_all();
        for handler in current
            .ids()
            .filter_map(|id| current.get(id))
            .filter(|handler| handler.source().is_none())
        {
            if let Err(error) = next.register(handler.clone()) {
                warn!(handler = %handler.id(), error = %error, "Dropping in-code handler after reload");
            }
        }

        self.inner.registry.store(Arc::new(next));
        self.inner.fired.lock().clear();
        report
    }

    /// Re-reads one handler's manifest and replaces it.
    ///
    /// The live registry is untouched unless the new definition registers
    /// cleanly.
    pub fn reload_one(&self, token: &str) -> ReloadResult<Arc<HandlerDefinition>> {
        let _guard = self.inner.reload_lock.lock();
        let current = self.inner.registry.load_full();

        let old = current
            .resolve(token)
            .cloned()
            .ok_or_else(|| ReloadError::NotFound {
                token: token.to_string(),
            })?;
        let rebuilt = self
            .inner
            .loader
            .reread(&old)
            .ok_or_else(|| ReloadError::NoSource {
                id: old.id().to_string(),
            })??;
        let rebuilt = Arc::new(rebuilt);

        let mut next = Registry::clone(&current);
        next.unregister(old.id());
        next.register(rebuilt.clone())
            .map_err(|source| LoadError::Duplicate {
                path: rebuilt.source().map(Into::into).unwrap_or_default(),
                source,
            })?;

        self.inner.registry.store(Arc::new(next));
        let mut fired = self.inner.fired.lock();
        fired.remove(old.id());
        fired.remove(rebuilt.id());

        info!(handler = %rebuilt.id(), "Reloaded handler");
        Ok(rebuilt)
    }

    /// Registers a handler defined in code.
    pub fn register(&self, handler: impl Into<Arc<HandlerDefinition>>) -> RegistryResult<()> {
        let _guard = self.inner.reload_lock.lock();
        let mut next = Registry::clone(&self.inner.registry.load());
        next.register(handler)?;
        self.inner.registry.store(Arc::new(next));
        Ok(())
    }

    /// Removes a handler; returns it if it was registered.
    pub fn unregister(&self, id: &str) -> Option<Arc<HandlerDefinition>> {
        let _guard = self.inner.reload_lock.lock();
        let mut next = Registry::clone(&self.inner.registry.load());
        let removed = next.unregister(id)?;
        self.inner.registry.store(Arc::new(next));
        Some(removed)
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    /// Routes one inbound message.
    pub async fn dispatch(&self, message: BoxedMessage) -> DispatchOutcome {
        self.dispatch_at(message, Instant::now()).await
    }

    /// Routes one inbound message, treating `now` as the current time for
    /// cooldown purposes.
    pub async fn dispatch_at(&self, message: BoxedMessage, now: Instant) -> DispatchOutcome {
        let span = debug_span!("dispatch", author = %message.author().id);
        let registry = self.inner.registry.load_full();
        self.inner
            .pipeline
            .dispatch(&registry, message, now)
            .instrument(span)
            .await
    }

    /// Delivers an event to every listener subscribed to it.
    ///
    /// Returns one handle per started listener. Listeners are spawned onto the
    /// current tokio runtime, so this panics when called outside one and a
    /// subscriber matches. An event nobody listens to spawns nothing.
    pub fn emit(
        &self,
        emitter: &str,
        event: &str,
        payload: serde_json::Value,
    ) -> Vec<JoinHandle<()>> {
        let registry = self.inner.registry.load_full();
        let payload = Arc::new(payload);
        let mut handles = Vec::new();

        for handler in registry.listeners_for(emitter, event) {
            let HandlerKind::Listener(spec) = handler.kind() else {
                continue;
            };
            if spec.once() && !self.inner.fired.lock().insert(handler.id().to_string()) {
                continue;
            }

            debug!(handler = %handler.id(), emitter, event, "Invoking listener");
            let executor = spec.executor().clone();
            let ctx = ListenerContext::new(handler.clone(), emitter, event);
            let payload = payload.clone();
            handles.push(spawn_guarded(
                handler.id().to_string(),
                "listener",
                async move { executor.on_event(ctx, payload).await },
            ));
        }

        handles
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("directory", &self.inner.loader.root())
            .field("handlers", &self.inner.registry.load().len())
            .finish_non_exhaustive()
    }
}

impl Service<BoxedMessage> for Router {
    type Response = DispatchOutcome;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, message: BoxedMessage) -> Self::Future {
        let router = self.clone();
        Box::pin(async move { Ok(router.dispatch(message).await) })
    }
}
