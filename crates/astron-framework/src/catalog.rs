//! Executor catalog.
//!
//! Manifests are plain data; the catalog is where the loader finds the code
//! to run for them. Keys are matched case-insensitively.

use std::collections::HashMap;
use std::fmt;

use astron_core::{
    BoxedCommandExecutor, BoxedListenerExecutor, COMMAND_EXECUTORS, LISTENER_EXECUTORS,
};
use tracing::warn;

/// Named command and listener executors available to the loader.
#[derive(Clone, Default)]
pub struct ExecutorCatalog {
    commands: HashMap<String, BoxedCommandExecutor>,
    listeners: HashMap<String, BoxedListenerExecutor>,
}

impl ExecutorCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a catalog from every executor registered with `#[command]` or
    /// `#[listener]`.
    ///
    /// If two entries share a key a warning is emitted and the first one wins.
    pub fn collect_all() -> Self {
        let mut catalog = Self::new();

        for entry in COMMAND_EXECUTORS.iter() {
            let key = entry.id.to_lowercase();
            if catalog.commands.contains_key(&key) {
                warn!(executor = %key, "Multiple command executors registered, using first");
                continue;
            }
            catalog.commands.insert(key, (entry.factory)());
        }

        for entry in LISTENER_EXECUTORS.iter() {
            let key = entry.id.to_lowercase();
            if catalog.listeners.contains_key(&key) {
                warn!(executor = %key, "Multiple listener executors registered, using first");
                continue;
            }
            catalog.listeners.insert(key, (entry.factory)());
        }

        catalog
    }

    /// Adds a command executor (builder pattern).
    pub fn command(mut self, key: impl AsRef<str>, executor: BoxedCommandExecutor) -> Self {
        self.insert_command(key, executor);
        self
    }

    /// Adds a listener executor (builder pattern).
    pub fn listener(mut self, key: impl AsRef<str>, executor: BoxedListenerExecutor) -> Self {
        self.insert_listener(key, executor);
        self
    }

    /// Adds or replaces a command executor.
    pub fn insert_command(&mut self, key: impl AsRef<str>, executor: BoxedCommandExecutor) {
        self.commands.insert(key.as_ref().to_lowercase(), executor);
    }

    /// Adds or replaces a listener executor.
    pub fn insert_listener(&mut self, key: impl AsRef<str>, executor: BoxedListenerExecutor) {
        self.listeners.insert(key.as_ref().to_lowercase(), executor);
    }

    /// Looks up a command executor.
    pub fn command_executor(&self, key: &str) -> Option<&BoxedCommandExecutor> {
        self.commands.get(&key.to_lowercase())
    }

    /// Looks up a listener executor.
    pub fn listener_executor(&self, key: &str) -> Option<&BoxedListenerExecutor> {
        self.listeners.get(&key.to_lowercase())
    }

    /// Total number of executors.
    pub fn len(&self) -> usize {
        self.commands.len() + self.listeners.len()
    }

    /// Returns `true` if the catalog has no executors.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ExecutorCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutorCatalog")
            .field("commands", &self.commands.keys().collect::<Vec<_>>())
            .field("listeners", &self.listeners.keys().collect::<Vec<_>>())
            .finish()
    }
}
