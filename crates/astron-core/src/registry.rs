//! Handler registry.
//!
//! Stores validated definitions by id, keeps a token map covering ids and
//! aliases, and indexes handlers by category. Every token resolves to exactly
//! one handler; registering a second claimant fails and leaves the registry
//! untouched.
//!
//! The registry itself is a plain value. Concurrent readers see it through an
//! atomically swapped snapshot owned by the router, so mutations here never
//! race with dispatch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::handler::{HandlerDefinition, HandlerKind};

/// A category and the handlers that belong to it.
#[derive(Debug, Clone)]
pub struct Category<'a> {
    name: &'a str,
    handlers: Vec<&'a Arc<HandlerDefinition>>,
}

impl<'a> Category<'a> {
    /// The capitalized category name.
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Handlers in this category, in registration order.
    pub fn handlers(&self) -> &[&'a Arc<HandlerDefinition>] {
        &self.handlers
    }

    /// Number of handlers in this category.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Always `false`; empty categories are dropped from the index.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Registry of handler definitions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handlers: HashMap<String, Arc<HandlerDefinition>>,
    /// Every resolvable token (id or alias) mapped to the owning id.
    tokens: HashMap<String, String>,
    /// Category name mapped to member ids, in registration order.
    categories: BTreeMap<String, Vec<String>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition.
    ///
    /// Fails with [`RegistryError::DuplicateId`] if its id or any alias is
    /// already resolvable. On failure nothing is inserted.
    pub fn register(&mut self, handler: impl Into<Arc<HandlerDefinition>>) -> RegistryResult<()> {
        let handler = handler.into();

        if let Some((token, existing)) = handler
            .tokens()
            .find_map(|token| self.tokens.get(token).map(|owner| (token, owner)))
        {
            return Err(RegistryError::DuplicateId {
                token: token.to_string(),
                existing: existing.clone(),
            });
        }

        let id = handler.id().to_string();
        for token in handler.tokens() {
            self.tokens.insert(token.to_string(), id.clone());
        }
        self.categories
            .entry(handler.category().to_string())
            .or_default()
            .push(id.clone());

        debug!(handler = %id, category = %handler.category(), "Registered handler");
        self.handlers.insert(id, handler);
        Ok(())
    }

    /// Removes a handler and all its aliases.
    ///
    /// Returns the removed definition, or `None` if no handler has this id.
    /// Calling it twice is harmless.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<HandlerDefinition>> {
        let handler = self.handlers.remove(&id.to_lowercase())?;

        for token in handler.tokens() {
            self.tokens.remove(token);
        }

        if let Some(members) = self.categories.get_mut(handler.category()) {
            members.retain(|member| member != handler.id());
            if members.is_empty() {
                self.categories.remove(handler.category());
            }
        }

        debug!(handler = %handler.id(), "Unregistered handler");
        Some(handler)
    }

    /// Looks up a handler by id or alias, ignoring case.
    pub fn resolve(&self, token: &str) -> Option<&Arc<HandlerDefinition>> {
        let token = token.trim().to_lowercase();
        self.tokens.get(&token).and_then(|id| self.handlers.get(id))
    }

    /// Looks up a handler by exact id.
    pub fn get(&self, id: &str) -> Option<&Arc<HandlerDefinition>> {
        self.handlers.get(&id.to_lowercase())
    }

    /// Iterates categories in name order.
    ///
    /// The iterator is lazy and borrows the registry; calling this again
    /// starts over from the current state.
    pub fn categories(&self) -> impl Iterator<Item = Category<'_>> {
        self.categories.iter().map(|(name, ids)| Category {
            name,
            handlers: ids.iter().filter_map(|id| self.handlers.get(id)).collect(),
        })
    }

    /// Looks up one category by name, ignoring case.
    pub fn category(&self, name: &str) -> Option<Category<'_>> {
        let name = crate::util::capitalize(name);
        self.categories().find(|c| c.name == name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Registered ids, in no particular order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// All command definitions.
    pub fn commands(&self) -> impl Iterator<Item = &Arc<HandlerDefinition>> {
        self.handlers.values().filter(|h| h.is_command())
    }

    /// All listener definitions.
    pub fn listeners(&self) -> impl Iterator<Item = &Arc<HandlerDefinition>> {
        self.handlers.values().filter(|h| !h.is_command())
    }

    /// Listeners subscribed to `event` on `emitter`, both matched ignoring case.
    pub fn listeners_for<'a>(
        &'a self,
        emitter: &'a str,
        event: &'a str,
    ) -> impl Iterator<Item = &'a Arc<HandlerDefinition>> + 'a {
        self.handlers.values().filter(move |h| match h.kind() {
            HandlerKind::Listener(spec) => {
                spec.emitter().eq_ignore_ascii_case(emitter)
                    && spec.event().eq_ignore_ascii_case(event)
            }
            HandlerKind::Command(_) => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(id: &str, category: &str, aliases: &[&str]) -> HandlerDefinition {
        HandlerDefinition::command(id)
            .category(category)
            .aliases(aliases.iter().copied())
            .build()
            .unwrap()
    }

    #[test]
    fn test_register_and_resolve() {
        let mut registry = Registry::new();
        registry
            .register(command("ping", "general", &["p"]))
            .unwrap();

        assert_eq!(registry.resolve("ping").unwrap().id(), "ping");
        assert_eq!(registry.resolve("P").unwrap().id(), "ping");
        assert_eq!(registry.resolve("PiNg").unwrap().id(), "ping");
        assert!(registry.resolve("pong").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut registry = Registry::new();
        registry.register(command("ping", "general", &[])).unwrap();

        let err = registry
            .register(command("PING", "other", &[]))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::DuplicateId {
                token: "ping".into(),
                existing: "ping".into(),
            }
        );
        assert_eq!(registry.len(), 1);
        assert!(registry.category("other").is_none());
    }

    #[test]
    fn test_alias_collision_leaves_registry_unchanged() {
        let mut registry = Registry::new();
        registry
            .register(command("ping", "general", &["p"]))
            .unwrap();

        let err = registry
            .register(command("pong", "general", &["q", "p"]))
            .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId { ref token, .. } if token == "p"));

        assert!(registry.resolve("pong").is_none());
        assert!(registry.resolve("q").is_none());
        assert_eq!(registry.category("general").unwrap().len(), 1);
    }

    #[test]
    fn test_alias_cannot_shadow_existing_id() {
        let mut registry = Registry::new();
        registry.register(command("help", "general", &[])).unwrap();

        assert!(registry
            .register(command("info", "general", &["help"]))
            .is_err());
    }

    #[test]
    fn test_unregister_idempotent() {
        let mut registry = Registry::new();
        registry
            .register(command("ping", "general", &["p"]))
            .unwrap();

        assert!(registry.unregister("ping").is_some());
        assert!(registry.unregister("ping").is_none());
        assert!(registry.resolve("p").is_none());
        assert!(registry.is_empty());
        assert_eq!(registry.categories().count(), 0);
    }

    #[test]
    fn test_unregister_frees_tokens() {
        let mut registry = Registry::new();
        registry
            .register(command("ping", "general", &["p"]))
            .unwrap();
        registry.unregister("ping");

        registry.register(command("pong", "general", &["p"])).unwrap();
        assert_eq!(registry.resolve("p").unwrap().id(), "pong");
    }

    #[test]
    fn test_categories_grouped_and_restartable() {
        let mut registry = Registry::new();
        registry.register(command("ping", "general", &[])).unwrap();
        registry.register(command("kick", "moderation", &[])).unwrap();
        registry.register(command("info", "GENERAL", &[])).unwrap();

        let names: Vec<&str> = registry.categories().map(|c| c.name()).collect();
        assert_eq!(names, vec!["General", "Moderation"]);

        let general = registry.category("general").unwrap();
        let ids: Vec<&str> = general.handlers().iter().map(|h| h.id()).collect();
        assert_eq!(ids, vec!["ping", "info"]);

        assert_eq!(registry.categories().count(), 2);
    }

    #[test]
    fn test_listeners_for() {
        let mut registry = Registry::new();
        registry.register(command("ping", "general", &[])).unwrap();
        registry
            .register(
                HandlerDefinition::listener("ready-log", "ready")
                    .category("events")
                    .build()
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(registry.listeners_for("client", "READY").count(), 1);
        assert_eq!(registry.listeners_for("process", "ready").count(), 0);
        assert_eq!(registry.commands().count(), 1);
        assert_eq!(registry.listeners().count(), 1);
    }
}
