//! Handler definitions.
//!
//! A [`HandlerDefinition`] is either a command (invoked by a prefixed message)
//! or a listener (invoked by a named transport event). Definitions are built
//! through [`CommandBuilder`] or [`ListenerBuilder`]; `build()` validates every
//! field and returns a [`ValidationError`] instead of a half-valid value.
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use astron_core::{HandlerDefinition, Scope, command_fn};
//!
//! let ping = HandlerDefinition::command("ping")
//!     .category("general")
//!     .alias("p")
//!     .scope(Scope::GuildOnly)
//!     .cooldown(Duration::from_secs(5))
//!     .executor(command_fn(|ctx, _args| async move {
//!         ctx.reply("Pong!").await?;
//!         Ok(())
//!     }))
//!     .build()?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::executor::{BoxedCommandExecutor, BoxedListenerExecutor, NotImplemented};
use crate::permission::{Permission, dedup_permissions};
use crate::util::{capitalize, has_whitespace};

/// Cooldown applied when a definition does not set one.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(3);

/// Emitter name used by listeners that do not set one.
pub const DEFAULT_EMITTER: &str = "client";

// ============================================================================
// Scope
// ============================================================================

/// Channel-context restriction on where a command may run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    /// Runs everywhere.
    #[default]
    Any,
    /// Runs only in one-to-one conversations with the bot.
    #[serde(alias = "dm", alias = "direct")]
    DirectMessageOnly,
    /// Runs only inside guild channels.
    #[serde(alias = "guild")]
    GuildOnly,
}

// ============================================================================
// HandlerDefinition
// ============================================================================

/// Command-specific part of a definition.
#[derive(Clone)]
pub struct CommandSpec {
    aliases: Vec<String>,
    scope: Scope,
    description: String,
    usage: String,
    examples: Vec<String>,
    executor: BoxedCommandExecutor,
}

impl CommandSpec {
    /// Additional lookup keys, lower-cased.
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Channel restriction.
    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Short description shown in help output.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Usage line shown in help output.
    pub fn usage(&self) -> &str {
        &self.usage
    }

    /// Example invocations.
    pub fn examples(&self) -> &[String] {
        &self.examples
    }

    /// The execution callback.
    pub fn executor(&self) -> &BoxedCommandExecutor {
        &self.executor
    }
}

/// Listener-specific part of a definition.
#[derive(Clone)]
pub struct ListenerSpec {
    event: String,
    emitter: String,
    once: bool,
    executor: BoxedListenerExecutor,
}

impl ListenerSpec {
    /// The event name this listener reacts to, lower-cased.
    pub fn event(&self) -> &str {
        &self.event
    }

    /// The emitter the event must come from.
    pub fn emitter(&self) -> &str {
        &self.emitter
    }

    /// Whether the listener detaches after its first invocation.
    pub fn once(&self) -> bool {
        self.once
    }

    /// The event callback.
    pub fn executor(&self) -> &BoxedListenerExecutor {
        &self.executor
    }
}

/// The variant part of a definition.
#[derive(Clone)]
pub enum HandlerKind {
    /// Invoked by prefixed messages.
    Command(CommandSpec),
    /// Invoked by named transport events.
    Listener(ListenerSpec),
}

/// A validated command or listener definition.
///
/// Definitions are immutable once built; reloading produces a new value.
#[derive(Clone)]
pub struct HandlerDefinition {
    id: String,
    category: String,
    owner_only: bool,
    cooldown: Duration,
    caller_permissions: Vec<Permission>,
    executor_permissions: Vec<Permission>,
    exempt_from_cooldown: HashSet<String>,
    exempt_from_permissions: HashSet<String>,
    source: Option<PathBuf>,
    kind: HandlerKind,
}

impl HandlerDefinition {
    /// Starts building a command.
    pub fn command(id: impl Into<String>) -> CommandBuilder {
        CommandBuilder::new(id.into())
    }

    /// Starts building a listener for `event`.
    pub fn listener(id: impl Into<String>, event: impl Into<String>) -> ListenerBuilder {
        ListenerBuilder::new(id.into(), event.into())
    }

    /// The unique, lower-cased id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The capitalized category name.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Whether only configured owners may run this handler.
    pub fn owner_only(&self) -> bool {
        self.owner_only
    }

    /// Per-invoker cooldown.
    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Permissions the invoker must hold.
    pub fn caller_permissions(&self) -> &[Permission] {
        &self.caller_permissions
    }

    /// Permissions the bot itself must hold.
    pub fn executor_permissions(&self) -> &[Permission] {
        &self.executor_permissions
    }

    /// Returns `true` if `invoker_id` skips the cooldown gate.
    pub fn is_exempt_from_cooldown(&self, invoker_id: &str) -> bool {
        self.exempt_from_cooldown.contains(invoker_id)
    }

    /// Returns `true` if `invoker_id` skips the permission gates.
    pub fn is_exempt_from_permissions(&self, invoker_id: &str) -> bool {
        self.exempt_from_permissions.contains(invoker_id)
    }

    /// The manifest this definition was loaded from, if any.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// The command or listener part.
    pub fn kind(&self) -> &HandlerKind {
        &self.kind
    }

    /// Returns the command part, if this is a command.
    pub fn as_command(&self) -> Option<&CommandSpec> {
        match &self.kind {
            HandlerKind::Command(spec) => Some(spec),
            HandlerKind::Listener(_) => None,
        }
    }

    /// Returns the listener part, if this is a listener.
    pub fn as_listener(&self) -> Option<&ListenerSpec> {
        match &self.kind {
            HandlerKind::Listener(spec) => Some(spec),
            HandlerKind::Command(_) => None,
        }
    }

    /// Returns `true` for commands.
    pub fn is_command(&self) -> bool {
        matches!(self.kind, HandlerKind::Command(_))
    }

    /// Aliases (empty for listeners).
    pub fn aliases(&self) -> &[String] {
        self.as_command().map(CommandSpec::aliases).unwrap_or_default()
    }

    /// Scope (always [`Scope::Any`] for listeners).
    pub fn scope(&self) -> Scope {
        self.as_command().map(CommandSpec::scope).unwrap_or_default()
    }

    /// Every token this definition resolves under: the id, then the aliases.
    pub fn tokens(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.id.as_str()).chain(self.aliases().iter().map(String::as_str))
    }
}

impl fmt::Debug for HandlerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("HandlerDefinition");
        s.field("id", &self.id).field("category", &self.category);
        match &self.kind {
            HandlerKind::Command(spec) => {
                s.field("kind", &"command")
                    .field("aliases", &spec.aliases)
                    .field("scope", &spec.scope);
            }
            HandlerKind::Listener(spec) => {
                s.field("kind", &"listener")
                    .field("event", &spec.event)
                    .field("emitter", &spec.emitter)
                    .field("once", &spec.once);
            }
        }
        s.field("owner_only", &self.owner_only)
            .field("cooldown", &self.cooldown)
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Builders
// ============================================================================

/// Fields shared by both builders.
#[derive(Debug, Clone)]
struct CommonFields {
    id: String,
    category: String,
    owner_only: bool,
    cooldown_secs: f64,
    caller_permissions: Vec<Permission>,
    executor_permissions: Vec<Permission>,
    exempt_from_cooldown: HashSet<String>,
    exempt_from_permissions: HashSet<String>,
    source: Option<PathBuf>,
}

impl CommonFields {
    fn new(id: String) -> Self {
        Self {
            id,
            category: String::new(),
            owner_only: false,
            cooldown_secs: DEFAULT_COOLDOWN.as_secs_f64(),
            caller_permissions: Vec::new(),
            executor_permissions: Vec::new(),
            exempt_from_cooldown: HashSet::new(),
            exempt_from_permissions: HashSet::new(),
            source: None,
        }
    }

    /// Validates the shared fields and returns the normalized id, category
    /// and cooldown.
    fn validate(&self) -> Result<(String, String, Duration), ValidationError> {
        let id = self.id.trim().to_lowercase();
        if id.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        if has_whitespace(&id) {
            return Err(ValidationError::Whitespace { token: id });
        }

        let category = capitalize(&self.category);
        if category.is_empty() {
            return Err(ValidationError::EmptyCategory { id });
        }

        // Rejects negative, non-finite and out-of-range values.
        let Ok(cooldown) = Duration::try_from_secs_f64(self.cooldown_secs) else {
            return Err(ValidationError::InvalidCooldown {
                id,
                seconds: self.cooldown_secs,
            });
        };

        Ok((id, category, cooldown))
    }

    fn into_definition(
        self,
        id: String,
        category: String,
        cooldown: Duration,
        kind: HandlerKind,
    ) -> HandlerDefinition {
        HandlerDefinition {
            id,
            category,
            owner_only: self.owner_only,
            cooldown,
            caller_permissions: self.caller_permissions,
            executor_permissions: self.executor_permissions,
            exempt_from_cooldown: self.exempt_from_cooldown,
            exempt_from_permissions: self.exempt_from_permissions,
            source: self.source,
            kind,
        }
    }
}

/// Generates the setters both builders share.
macro_rules! common_setters {
    () => {
        /// Sets the category (normalized to capitalized form).
        pub fn category(mut self, category: impl Into<String>) -> Self {
            self.common.category = category.into();
            self
        }

        /// Restricts the handler to configured owners.
        pub fn owner_only(mut self, owner_only: bool) -> Self {
            self.common.owner_only = owner_only;
            self
        }

        /// Sets the per-invoker cooldown.
        pub fn cooldown(mut self, cooldown: Duration) -> Self {
            self.common.cooldown_secs = cooldown.as_secs_f64();
            self
        }

        /// Sets the cooldown in seconds; validated by `build()`.
        pub fn cooldown_secs(mut self, seconds: f64) -> Self {
            self.common.cooldown_secs = seconds;
            self
        }

        /// Sets the permissions the invoker must hold.
        pub fn caller_permissions<I, P>(mut self, permissions: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: Into<Permission>,
        {
            self.common.caller_permissions = dedup_permissions(permissions);
            self
        }

        /// Sets the permissions the bot must hold.
        pub fn executor_permissions<I, P>(mut self, permissions: I) -> Self
        where
            I: IntoIterator<Item = P>,
            P: Into<Permission>,
        {
            self.common.executor_permissions = dedup_permissions(permissions);
            self
        }

        /// Sets the invokers that bypass the cooldown gate.
        pub fn exempt_from_cooldown<I, S>(mut self, invokers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.common.exempt_from_cooldown = invokers.into_iter().map(Into::into).collect();
            self
        }

        /// Sets the invokers that bypass the permission gates.
        pub fn exempt_from_permissions<I, S>(mut self, invokers: I) -> Self
        where
            I: IntoIterator<Item = S>,
            S: Into<String>,
        {
            self.common.exempt_from_permissions = invokers.into_iter().map(Into::into).collect();
            self
        }

        /// Records the manifest path the definition was read from.
        pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
            self.common.source = Some(path.into());
            self
        }
    };
}

/// Builder for command definitions.
#[derive(Clone)]
pub struct CommandBuilder {
    common: CommonFields,
    aliases: Vec<String>,
    scope: Scope,
    description: String,
    usage: String,
    examples: Vec<String>,
    executor: Option<BoxedCommandExecutor>,
}

impl CommandBuilder {
    fn new(id: String) -> Self {
        Self {
            common: CommonFields::new(id),
            aliases: Vec::new(),
            scope: Scope::Any,
            description: String::new(),
            usage: String::new(),
            examples: Vec::new(),
            executor: None,
        }
    }

    common_setters!();

    /// Adds one alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds several aliases.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Sets the channel restriction.
    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    /// Sets the help description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the help usage line.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.usage = usage.into();
        self
    }

    /// Sets example invocations.
    pub fn examples<I, S>(mut self, examples: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.examples = examples.into_iter().map(Into::into).collect();
        self
    }

    /// Binds the execution callback.
    pub fn executor(mut self, executor: BoxedCommandExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Validates the builder and produces a definition.
    ///
    /// A command without an executor is valid; invoking it fails with
    /// [`ExecuteError::NotImplemented`](crate::ExecuteError::NotImplemented).
    pub fn build(self) -> Result<HandlerDefinition, ValidationError> {
        let (id, category, cooldown) = self.common.validate()?;

        let mut seen = HashSet::from([id.clone()]);
        let mut aliases = Vec::with_capacity(self.aliases.len());
        for alias in self.aliases {
            let alias = alias.trim().to_lowercase();
            if alias.is_empty() {
                return Err(ValidationError::EmptyAlias { id });
            }
            if has_whitespace(&alias) {
                return Err(ValidationError::Whitespace { token: alias });
            }
            if !seen.insert(alias.clone()) {
                return Err(ValidationError::RepeatedAlias { id, alias });
            }
            aliases.push(alias);
        }

        let spec = CommandSpec {
            aliases,
            scope: self.scope,
            description: self.description,
            usage: self.usage,
            examples: self.examples,
            executor: self.executor.unwrap_or_else(|| Arc::new(NotImplemented)),
        };

        Ok(self
            .common
            .into_definition(id, category, cooldown, HandlerKind::Command(spec)))
    }
}

/// Builder for listener definitions.
#[derive(Clone)]
pub struct ListenerBuilder {
    common: CommonFields,
    event: String,
    emitter: String,
    once: bool,
    executor: Option<BoxedListenerExecutor>,
}

impl ListenerBuilder {
    fn new(id: String, event: String) -> Self {
        Self {
            common: CommonFields::new(id),
            event,
            emitter: DEFAULT_EMITTER.to_string(),
            once: false,
            executor: None,
        }
    }

    common_setters!();

    /// Sets the emitter the event must come from.
    pub fn emitter(mut self, emitter: impl Into<String>) -> Self {
        self.emitter = emitter.into();
        self
    }

    /// Detaches the listener after its first invocation.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Binds the event callback.
    pub fn executor(mut self, executor: BoxedListenerExecutor) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Validates the builder and produces a definition.
    pub fn build(self) -> Result<HandlerDefinition, ValidationError> {
        let (id, category, cooldown) = self.common.validate()?;

        let event = self.event.trim().to_lowercase();
        if event.is_empty() {
            return Err(ValidationError::MissingEvent { id });
        }
        let emitter = match self.emitter.trim() {
            "" => DEFAULT_EMITTER.to_string(),
            other => other.to_lowercase(),
        };

        let spec = ListenerSpec {
            event,
            emitter,
            once: self.once,
            executor: self.executor.unwrap_or_else(|| Arc::new(NotImplemented)),
        };

        Ok(self
            .common
            .into_definition(id, category, cooldown, HandlerKind::Listener(spec)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_defaults() {
        let def = HandlerDefinition::command("Ping")
            .category("general")
            .build()
            .unwrap();

        assert_eq!(def.id(), "ping");
        assert_eq!(def.category(), "General");
        assert_eq!(def.cooldown(), DEFAULT_COOLDOWN);
        assert_eq!(def.scope(), Scope::Any);
        assert!(!def.owner_only());
        assert!(def.is_command());
    }

    #[test]
    fn test_aliases_normalized() {
        let def = HandlerDefinition::command("ping")
            .category("general")
            .aliases(["P", "Pong"])
            .build()
            .unwrap();

        let tokens: Vec<&str> = def.tokens().collect();
        assert_eq!(tokens, vec!["ping", "p", "pong"]);
    }

    #[test]
    fn test_empty_id_rejected() {
        let err = HandlerDefinition::command("  ")
            .category("general")
            .build()
            .unwrap_err();
        assert_eq!(err, ValidationError::EmptyId);
    }

    #[test]
    fn test_whitespace_id_rejected() {
        let err = HandlerDefinition::command("two words")
            .category("general")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::Whitespace { .. }));
    }

    #[test]
    fn test_alias_equal_to_id_rejected() {
        let err = HandlerDefinition::command("ping")
            .category("general")
            .alias("PING")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::RepeatedAlias { .. }));
    }

    #[test]
    fn test_negative_cooldown_rejected() {
        let err = HandlerDefinition::command("ping")
            .category("general")
            .cooldown_secs(-1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::InvalidCooldown { .. }));
    }

    #[test]
    fn test_oversized_cooldown_rejected() {
        for seconds in [1e30, f64::INFINITY, f64::NAN] {
            let err = HandlerDefinition::command("ping")
                .category("general")
                .cooldown_secs(seconds)
                .build()
                .unwrap_err();
            assert!(matches!(err, ValidationError::InvalidCooldown { .. }));
        }
    }

    #[test]
    fn test_missing_category_rejected() {
        let err = HandlerDefinition::command("ping").build().unwrap_err();
        assert!(matches!(err, ValidationError::EmptyCategory { .. }));
    }

    #[test]
    fn test_listener_defaults() {
        let def = HandlerDefinition::listener("on-ready", "Ready")
            .category("events")
            .build()
            .unwrap();

        let spec = def.as_listener().unwrap();
        assert_eq!(spec.event(), "ready");
        assert_eq!(spec.emitter(), DEFAULT_EMITTER);
        assert!(!spec.once());
        assert!(def.aliases().is_empty());
    }

    #[test]
    fn test_listener_requires_event() {
        let err = HandlerDefinition::listener("on-nothing", " ")
            .category("events")
            .build()
            .unwrap_err();
        assert!(matches!(err, ValidationError::MissingEvent { .. }));
    }

    #[test]
    fn test_exemptions() {
        let def = HandlerDefinition::command("ping")
            .category("general")
            .exempt_from_cooldown(["42"])
            .exempt_from_permissions(["7"])
            .build()
            .unwrap();

        assert!(def.is_exempt_from_cooldown("42"));
        assert!(!def.is_exempt_from_cooldown("7"));
        assert!(def.is_exempt_from_permissions("7"));
    }
}
