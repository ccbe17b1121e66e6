//! Router options.
//!
//! Options are assembled with [`RouterOptionsBuilder`]; only the handler
//! directory is required.
//!
//! ```rust,ignore
//! let options = RouterOptions::builder()
//!     .directory("./commands")
//!     .prefix("!")
//!     .owners(["1234"])
//!     .warning(RejectionKind::Cooldown, "Wait {remaining}s before using `{command}` again.")
//!     .build()?;
//! ```

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use astron_core::{BoxedMessage, Permission, format_list};
use futures::future::BoxFuture;

use crate::error::{BuildError, BuildResult};

/// Default manifest extension.
pub const DEFAULT_EXTENSION: &str = "toml";

/// Permission the bot needs to answer in a channel.
pub const DEFAULT_RESPONSE_PERMISSION: &str = "SEND_MESSAGES";

// ============================================================================
// Prefix
// ============================================================================

type PrefixFn = dyn Fn(BoxedMessage) -> BoxFuture<'static, String> + Send + Sync;

/// How the router decides which text addresses it.
#[derive(Clone)]
pub enum Prefix {
    /// The same prefix for every message.
    Static(String),
    /// A prefix computed per message, e.g. from per-guild settings.
    Dynamic(Arc<PrefixFn>),
}

impl Prefix {
    /// Creates a per-message prefix from an async callback.
    pub fn dynamic<F, Fut>(f: F) -> Self
    where
        F: Fn(BoxedMessage) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = String> + Send + 'static,
    {
        Self::Dynamic(Arc::new(move |msg| -> BoxFuture<'static, String> {
            Box::pin(f(msg))
        }))
    }

    /// Resolves the prefix for `message`.
    pub async fn resolve(&self, message: &BoxedMessage) -> String {
        match self {
            Self::Static(prefix) => prefix.clone(),
            Self::Dynamic(f) => f(message.clone()).await,
        }
    }
}

impl Default for Prefix {
    /// An empty static prefix. An empty prefix never matches, so messages are
    /// only addressed by mentioning the bot.
    fn default() -> Self {
        Self::Static(String::new())
    }
}

impl From<&str> for Prefix {
    fn from(value: &str) -> Self {
        Self::Static(value.to_string())
    }
}

impl From<String> for Prefix {
    fn from(value: String) -> Self {
        Self::Static(value)
    }
}

impl fmt::Debug for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(prefix) => f.debug_tuple("Static").field(prefix).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

// ============================================================================
// Rejections and warnings
// ============================================================================

/// Why a resolved command was not run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Direct-message-only command used in a shared channel.
    DirectMessageOnly,
    /// Guild-only command used in a direct message.
    GuildOnly,
    /// Owner-only command used by someone else.
    OwnerOnly,
    /// The bot cannot answer in the channel.
    MissingSelfCapability {
        /// The permission the bot lacks.
        permission: Permission,
    },
    /// The bot lacks permissions the command needs.
    MissingExecutorPermissions {
        /// Missing permissions, in declaration order.
        missing: Vec<Permission>,
    },
    /// The invoker lacks permissions the command needs.
    MissingCallerPermissions {
        /// Missing permissions, in declaration order.
        missing: Vec<Permission>,
    },
    /// The invoker is still cooling down.
    Cooldown {
        /// Time left.
        remaining: Duration,
    },
}

impl Rejection {
    /// The kind used to look up the configured warning.
    pub fn kind(&self) -> RejectionKind {
        match self {
            Self::DirectMessageOnly => RejectionKind::DirectMessageOnly,
            Self::GuildOnly => RejectionKind::GuildOnly,
            Self::OwnerOnly => RejectionKind::OwnerOnly,
            Self::MissingSelfCapability { .. } => RejectionKind::MissingSelfCapability,
            Self::MissingExecutorPermissions { .. } => RejectionKind::MissingExecutorPermissions,
            Self::MissingCallerPermissions { .. } => RejectionKind::MissingCallerPermissions,
            Self::Cooldown { .. } => RejectionKind::Cooldown,
        }
    }

    /// The formatted permission list, if this rejection carries one.
    pub fn permissions(&self) -> Option<String> {
        match self {
            Self::MissingSelfCapability { permission } => Some(format_list(&[permission])),
            Self::MissingExecutorPermissions { missing }
            | Self::MissingCallerPermissions { missing } => Some(format_list(missing)),
            _ => None,
        }
    }

    /// Seconds left with one decimal, if this is a cooldown rejection.
    pub fn remaining(&self) -> Option<String> {
        match self {
            Self::Cooldown { remaining } => Some(format!("{:.1}", remaining.as_secs_f64())),
            _ => None,
        }
    }
}

/// Rejection categories that can carry a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionKind {
    /// See [`Rejection::DirectMessageOnly`].
    DirectMessageOnly,
    /// See [`Rejection::GuildOnly`].
    GuildOnly,
    /// See [`Rejection::OwnerOnly`].
    OwnerOnly,
    /// See [`Rejection::MissingSelfCapability`].
    MissingSelfCapability,
    /// See [`Rejection::MissingExecutorPermissions`].
    MissingExecutorPermissions,
    /// See [`Rejection::MissingCallerPermissions`].
    MissingCallerPermissions,
    /// See [`Rejection::Cooldown`].
    Cooldown,
}

impl RejectionKind {
    /// Snake-case name, as used in configuration files.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DirectMessageOnly => "direct_message_only",
            Self::GuildOnly => "guild_only",
            Self::OwnerOnly => "owner_only",
            Self::MissingSelfCapability => "missing_self_capability",
            Self::MissingExecutorPermissions => "missing_executor_permissions",
            Self::MissingCallerPermissions => "missing_caller_permissions",
            Self::Cooldown => "cooldown",
        }
    }
}

/// Values available when rendering a warning.
#[derive(Debug, Clone)]
pub struct WarningContext<'a> {
    /// Id of the rejected command.
    pub command: &'a str,
    /// Id of the invoker.
    pub author: &'a str,
    /// Why it was rejected.
    pub rejection: &'a Rejection,
}

type WarningFn = dyn Fn(&WarningContext<'_>) -> String + Send + Sync;

/// A configured warning text.
#[derive(Clone)]
pub enum Warning {
    /// Text with `{command}`, `{author}`, `{permissions}` and `{remaining}`
    /// placeholders.
    Template(String),
    /// Text computed from the rejection.
    Callback(Arc<WarningFn>),
}

impl Warning {
    /// Creates a computed warning.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&WarningContext<'_>) -> String + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Renders the warning. An empty result means nothing is sent.
    ///
    /// Placeholders are substituted in one pass, so text coming from the
    /// message (such as the author id) is never expanded again.
    pub fn render(&self, ctx: &WarningContext<'_>) -> String {
        match self {
            Self::Template(template) => render_template(template, |name| match name {
                "command" => Some(ctx.command.to_string()),
                "author" => Some(ctx.author.to_string()),
                "permissions" => Some(ctx.rejection.permissions().unwrap_or_default()),
                "remaining" => Some(ctx.rejection.remaining().unwrap_or_default()),
                _ => None,
            }),
            Self::Callback(f) => f(ctx),
        }
    }
}

/// Replaces each `{name}` in `template` with `lookup(name)`. Unknown names
/// and unclosed braces are copied as-is.
fn render_template(template: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let found = after
            .find('}')
            .and_then(|close| lookup(&after[..close]).map(|value| (close, value)));
        match found {
            Some((close, value)) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

impl From<&str> for Warning {
    fn from(value: &str) -> Self {
        Self::Template(value.to_string())
    }
}

impl From<String> for Warning {
    fn from(value: String) -> Self {
        Self::Template(value)
    }
}

impl fmt::Debug for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Template(text) => f.debug_tuple("Template").field(text).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

/// One optional warning per rejection kind.
#[derive(Debug, Clone, Default)]
pub struct Warnings {
    direct_message_only: Option<Warning>,
    guild_only: Option<Warning>,
    owner_only: Option<Warning>,
    missing_self_capability: Option<Warning>,
    missing_executor_permissions: Option<Warning>,
    missing_caller_permissions: Option<Warning>,
    cooldown: Option<Warning>,
}

impl Warnings {
    fn slot(&mut self, kind: RejectionKind) -> &mut Option<Warning> {
        match kind {
            RejectionKind::DirectMessageOnly => &mut self.direct_message_only,
            RejectionKind::GuildOnly => &mut self.guild_only,
            RejectionKind::OwnerOnly => &mut self.owner_only,
            RejectionKind::MissingSelfCapability => &mut self.missing_self_capability,
            RejectionKind::MissingExecutorPermissions => &mut self.missing_executor_permissions,
            RejectionKind::MissingCallerPermissions => &mut self.missing_caller_permissions,
            RejectionKind::Cooldown => &mut self.cooldown,
        }
    }

    /// Sets the warning for `kind`.
    pub fn set(&mut self, kind: RejectionKind, warning: Warning) {
        *self.slot(kind) = Some(warning);
    }

    /// The warning configured for `kind`.
    pub fn get(&self, kind: RejectionKind) -> Option<&Warning> {
        match kind {
            RejectionKind::DirectMessageOnly => self.direct_message_only.as_ref(),
            RejectionKind::GuildOnly => self.guild_only.as_ref(),
            RejectionKind::OwnerOnly => self.owner_only.as_ref(),
            RejectionKind::MissingSelfCapability => self.missing_self_capability.as_ref(),
            RejectionKind::MissingExecutorPermissions => {
                self.missing_executor_permissions.as_ref()
            }
            RejectionKind::MissingCallerPermissions => self.missing_caller_permissions.as_ref(),
            RejectionKind::Cooldown => self.cooldown.as_ref(),
        }
    }

    /// Renders the warning for a rejection; `None` if unset or empty.
    pub fn render(&self, ctx: &WarningContext<'_>) -> Option<String> {
        self.get(ctx.rejection.kind())
            .map(|warning| warning.render(ctx))
            .filter(|text| !text.is_empty())
    }
}

// ============================================================================
// RouterOptions
// ============================================================================

/// Behaviour switches for the router.
#[derive(Debug, Clone)]
pub struct RouterOptions {
    /// Root of the category tree.
    pub directory: PathBuf,
    /// Address prefix.
    pub prefix: Prefix,
    /// Ignore messages from automated accounts.
    pub block_bots: bool,
    /// Process messages sent in direct conversations.
    pub allow_direct_messages: bool,
    /// Treat a mention of the bot as an address.
    pub allow_mention_prefix: bool,
    /// The bot's own user id, needed for mention addressing.
    pub self_id: Option<String>,
    /// Users allowed to run owner-only commands; they also skip cooldowns.
    pub owners: HashSet<String>,
    /// Manifest file extension.
    pub source_extension: String,
    /// Permission the bot needs to reply in a channel.
    pub response_permission: Permission,
    /// Warnings sent on rejection.
    pub warnings: Warnings,
}

impl RouterOptions {
    /// Starts building options.
    pub fn builder() -> RouterOptionsBuilder {
        RouterOptionsBuilder::default()
    }

    /// Returns `true` if `user_id` is a configured owner.
    pub fn is_owner(&self, user_id: &str) -> bool {
        self.owners.contains(user_id)
    }
}

/// Builder for [`RouterOptions`].
#[derive(Debug, Clone)]
pub struct RouterOptionsBuilder {
    directory: Option<PathBuf>,
    prefix: Prefix,
    block_bots: bool,
    allow_direct_messages: bool,
    allow_mention_prefix: bool,
    self_id: Option<String>,
    owners: HashSet<String>,
    source_extension: String,
    response_permission: Permission,
    warnings: Warnings,
}

impl Default for RouterOptionsBuilder {
    fn default() -> Self {
        Self {
            directory: None,
            prefix: Prefix::default(),
            block_bots: true,
            allow_direct_messages: true,
            allow_mention_prefix: true,
            self_id: None,
            owners: HashSet::new(),
            source_extension: DEFAULT_EXTENSION.to_string(),
            response_permission: Permission::new(DEFAULT_RESPONSE_PERMISSION),
            warnings: Warnings::default(),
        }
    }
}

impl RouterOptionsBuilder {
    /// Sets the handler directory (required).
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Sets the address prefix.
    pub fn prefix(mut self, prefix: impl Into<Prefix>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Ignore automated authors (default `true`).
    pub fn block_bots(mut self, block: bool) -> Self {
        self.block_bots = block;
        self
    }

    /// Process direct messages (default `true`).
    pub fn allow_direct_messages(mut self, allow: bool) -> Self {
        self.allow_direct_messages = allow;
        self
    }

    /// Accept a mention of the bot as an address (default `true`).
    pub fn allow_mention_prefix(mut self, allow: bool) -> Self {
        self.allow_mention_prefix = allow;
        self
    }

    /// Sets the bot's own user id.
    pub fn self_id(mut self, id: impl Into<String>) -> Self {
        self.self_id = Some(id.into());
        self
    }

    /// Sets the owner ids.
    pub fn owners<I, S>(mut self, owners: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.owners = owners.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the manifest extension (default `toml`).
    pub fn source_extension(mut self, extension: impl Into<String>) -> Self {
        self.source_extension = extension.into();
        self
    }

    /// Sets the permission required to reply (default `SEND_MESSAGES`).
    pub fn response_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.response_permission = permission.into();
        self
    }

    /// Sets the warning for one rejection kind.
    pub fn warning(mut self, kind: RejectionKind, warning: impl Into<Warning>) -> Self {
        self.warnings.set(kind, warning.into());
        self
    }

    /// Validates and produces the options.
    pub fn build(self) -> BuildResult<RouterOptions> {
        let directory = self.directory.ok_or(BuildError::missing("directory"))?;
        Ok(RouterOptions {
            directory,
            prefix: self.prefix,
            block_bots: self.block_bots,
            allow_direct_messages: self.allow_direct_messages,
            allow_mention_prefix: self.allow_mention_prefix,
            self_id: self.self_id,
            owners: self.owners,
            source_extension: self.source_extension,
            response_permission: self.response_permission,
            warnings: self.warnings,
        })
    }
}
