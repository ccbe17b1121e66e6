//! The dispatch gates.
//!
//! Every inbound message runs through the gates below, in order. The first
//! gate that does not pass ends processing:
//!
//! 1. **Origin**: automated authors are ignored when `block_bots` is set
//! 2. **Address**: the message must start with the prefix or a bot mention;
//!    direct messages are ignored when `allow_direct_messages` is off
//! 3. **Tokens**: something must follow the address
//! 4. **Resolve**: the key must name a command
//! 5. **Scope**: guild-only and direct-only restrictions
//! 6. **Ownership**: owner-only commands
//! 7. **Self capability**: the bot must be able to answer (guild only)
//! 8. **Permissions**: executor then caller permissions (guild only)
//! 9. **Cooldown**: per-invoker cooldown (guild only)
//! 10. **Invoke**: the executor runs in its own task
//!
//! Gates 1 to 4 end silently. Gates 5 to 9 produce a [`Rejection`] and send
//! the configured warning, if any.

use std::any::Any;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use astron_core::{
    BoxedMessage, ChannelKind, CommandContext, CooldownTracker, HandlerDefinition, HandlerKind,
    Registry, Scope,
};
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tower::BoxError;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::address::{match_address, tokenize};
use crate::options::{Rejection, RouterOptions, WarningContext};

// ============================================================================
// Outcomes
// ============================================================================

/// Why a message was dropped without a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Sent by an automated account.
    Bot,
    /// Does not start with the prefix or a mention.
    Unaddressed,
    /// A direct message while direct messages are disabled.
    DirectMessagesDisabled,
    /// Nothing follows the address.
    Empty,
    /// The key names no handler.
    Unknown,
    /// The key names a listener.
    NotACommand,
}

/// Result of dispatching one message.
pub enum DispatchOutcome {
    /// Dropped silently.
    Ignored(IgnoreReason),
    /// Resolved but refused by a gate.
    Rejected(Rejection),
    /// The executor was started; the handle completes when it returns.
    Invoked(JoinHandle<()>),
}

impl DispatchOutcome {
    /// Returns `true` if the executor was started.
    pub fn is_invoked(&self) -> bool {
        matches!(self, Self::Invoked(_))
    }

    /// The rejection, if a gate refused the command.
    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            Self::Rejected(rejection) => Some(rejection),
            _ => None,
        }
    }

    /// The ignore reason, if the message was dropped.
    pub fn ignored(&self) -> Option<IgnoreReason> {
        match self {
            Self::Ignored(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Debug for DispatchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignored(reason) => f.debug_tuple("Ignored").field(reason).finish(),
            Self::Rejected(rejection) => f.debug_tuple("Rejected").field(rejection).finish(),
            Self::Invoked(_) => f.write_str("Invoked(..)"),
        }
    }
}

// ============================================================================
// Statistics
// ============================================================================

/// A pipeline gate, used to index [`PipelineStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Bot filter.
    Origin,
    /// Prefix or mention match.
    Address,
    /// Key extraction.
    Tokens,
    /// Registry lookup.
    Resolve,
    /// Channel scope.
    Scope,
    /// Owner-only check.
    Ownership,
    /// Bot can answer.
    SelfCapability,
    /// Bot permissions.
    ExecutorPermissions,
    /// Invoker permissions.
    CallerPermissions,
    /// Cooldown check.
    Cooldown,
    /// Executor started.
    Invoke,
}

impl Gate {
    const COUNT: usize = 11;
}

/// How many times each gate was reached.
#[derive(Debug, Default)]
pub struct PipelineStats {
    counters: [AtomicU64; Gate::COUNT],
}

impl PipelineStats {
    fn hit(&self, gate: Gate) {
        self.counters[gate as usize].fetch_add(1, Ordering::Relaxed);
    }

    /// Number of times `gate` was reached.
    pub fn get(&self, gate: Gate) -> u64 {
        self.counters[gate as usize].load(Ordering::Relaxed)
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// Runs inbound messages through the gates.
#[derive(Debug)]
pub struct DispatchPipeline {
    options: Arc<RouterOptions>,
    cooldowns: CooldownTracker,
    stats: PipelineStats,
}

impl DispatchPipeline {
    /// Creates a pipeline with fresh cooldown state.
    pub fn new(options: Arc<RouterOptions>) -> Self {
        Self {
            options,
            cooldowns: CooldownTracker::new(),
            stats: PipelineStats::default(),
        }
    }

    /// The options in effect.
    pub fn options(&self) -> &RouterOptions {
        &self.options
    }

    /// Gate counters.
    pub fn stats(&self) -> &PipelineStats {
        &self.stats
    }

    /// Cooldown state.
    pub fn cooldowns(&self) -> &CooldownTracker {
        &self.cooldowns
    }

    /// Runs `message` through the gates against `registry`, treating `now` as
    /// the current time.
    pub async fn dispatch(
        &self,
        registry: &Registry,
        message: BoxedMessage,
        now: Instant,
    ) -> DispatchOutcome {
        let options = &*self.options;
        let author = message.author().clone();

        // 1. origin
        self.stats.hit(Gate::Origin);
        if author.is_bot && options.block_bots {
            return DispatchOutcome::Ignored(IgnoreReason::Bot);
        }

        // 2. address
        self.stats.hit(Gate::Address);
        let prefix = options.prefix.resolve(&message).await;
        let mention_id = options
            .self_id
            .as_deref()
            .filter(|_| options.allow_mention_prefix);
        let Some(address) = match_address(message.content(), &prefix, mention_id) else {
            return DispatchOutcome::Ignored(IgnoreReason::Unaddressed);
        };
        let direct = message.channel_kind() == ChannelKind::Direct;
        if direct && !options.allow_direct_messages {
            return DispatchOutcome::Ignored(IgnoreReason::DirectMessagesDisabled);
        }

        // 3. tokens
        self.stats.hit(Gate::Tokens);
        let Some(invocation) = tokenize(address.rest) else {
            return DispatchOutcome::Ignored(IgnoreReason::Empty);
        };
        let matched = address.matched.to_string();

        // 4. resolve
        self.stats.hit(Gate::Resolve);
        let Some(handler) = registry.resolve(&invocation.key) else {
            return DispatchOutcome::Ignored(IgnoreReason::Unknown);
        };
        let HandlerKind::Command(command) = handler.kind() else {
            return DispatchOutcome::Ignored(IgnoreReason::NotACommand);
        };

        // 5. scope
        self.stats.hit(Gate::Scope);
        match command.scope() {
            Scope::GuildOnly if direct => {
                return self.reject(&message, handler, Rejection::GuildOnly).await;
            }
            Scope::DirectMessageOnly if !direct => {
                return self
                    .reject(&message, handler, Rejection::DirectMessageOnly)
                    .await;
            }
            _ => {}
        }

        // 6. ownership
        self.stats.hit(Gate::Ownership);
        let is_owner = options.is_owner(&author.id);
        if handler.owner_only() && !is_owner {
            return self.reject(&message, handler, Rejection::OwnerOnly).await;
        }

        if let Some(guild) = message.guild() {
            // 7. self capability
            self.stats.hit(Gate::SelfCapability);
            if !guild.own_permissions.has(&options.response_permission) {
                let rejection = Rejection::MissingSelfCapability {
                    permission: options.response_permission.clone(),
                };
                return self.reject(&message, handler, rejection).await;
            }

            // 8. permissions
            let exempt = handler.is_exempt_from_permissions(&author.id);

            self.stats.hit(Gate::ExecutorPermissions);
            let missing = guild.own_permissions.missing(handler.executor_permissions());
            if !exempt && !missing.is_empty() {
                let rejection = Rejection::MissingExecutorPermissions {
                    missing: missing.into_iter().cloned().collect(),
                };
                return self.reject(&message, handler, rejection).await;
            }

            self.stats.hit(Gate::CallerPermissions);
            let missing = guild.member_permissions.missing(handler.caller_permissions());
            if !exempt && !missing.is_empty() {
                let rejection = Rejection::MissingCallerPermissions {
                    missing: missing.into_iter().cloned().collect(),
                };
                return self.reject(&message, handler, rejection).await;
            }

            // 9. cooldown
            self.stats.hit(Gate::Cooldown);
            let exempt = is_owner || handler.is_exempt_from_cooldown(&author.id);
            if !exempt && !handler.cooldown().is_zero() {
                if self.cooldowns.is_blocked(handler.id(), &author.id, now) {
                    let remaining = self.cooldowns.remaining(handler.id(), &author.id, now);
                    return self
                        .reject(&message, handler, Rejection::Cooldown { remaining })
                        .await;
                }
                self.cooldowns
                    .record(handler.id(), &author.id, handler.cooldown(), now);
            }
        }

        // 10. invoke
        self.stats.hit(Gate::Invoke);
        let executor = command.executor().clone();
        let ctx = CommandContext::new(message, handler.clone(), matched, invocation.key);
        let args = invocation.args;
        let id = handler.id().to_string();
        debug!(handler = %id, invoker = %author.id, "Invoking command");
        DispatchOutcome::Invoked(spawn_guarded(id, "command", async move {
            executor.execute(ctx, args).await
        }))
    }

    async fn reject(
        &self,
        message: &BoxedMessage,
        handler: &HandlerDefinition,
        rejection: Rejection,
    ) -> DispatchOutcome {
        debug!(
            handler = %handler.id(),
            invoker = %message.author().id,
            rejection = rejection.kind().as_str(),
            "Command rejected"
        );

        let ctx = WarningContext {
            command: handler.id(),
            author: &message.author().id,
            rejection: &rejection,
        };
        if let Some(text) = self.options.warnings.render(&ctx) {
            // The bot cannot speak in the channel, so tell the invoker privately.
            let sent = match rejection {
                Rejection::MissingSelfCapability { .. } => message.direct_message(&text).await,
                _ => message.reply(&text).await,
            };
            if let Err(error) = sent {
                warn!(handler = %handler.id(), error = %error, "Failed to send warning");
            }
        }

        DispatchOutcome::Rejected(rejection)
    }
}

/// Spawns an executor future, logging its error or panic with the handler id.
pub(crate) fn spawn_guarded<F>(id: String, kind: &'static str, future: F) -> JoinHandle<()>
where
    F: Future<Output = Result<(), BoxError>> + Send + 'static,
{
    let span = info_span!("execute", handler = %id, kind);
    tokio::spawn(
        async move {
            match AssertUnwindSafe(future).catch_unwind().await {
                Ok(Ok(())) => debug!("Executor finished"),
                Ok(Err(error)) => error!(handler = %id, error = %error, "Executor failed"),
                Err(panic) => {
                    error!(handler = %id, panic = %panic_message(&*panic), "Executor panicked")
                }
            }
        }
        .instrument(span),
    )
}

/// Best-effort text of a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use astron_core::{Author, command_fn};

    use super::*;
    use crate::options::RejectionKind;
    use crate::testing::MockMessage;

    fn counting(id: &str, counter: &Arc<AtomicUsize>) -> astron_core::CommandBuilder {
        let counter = counter.clone();
        HandlerDefinition::command(id)
            .category("general")
            .executor(command_fn(move |_, _| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }))
    }

    fn options() -> RouterOptions {
        RouterOptions::builder()
            .directory("unused")
            .prefix("!")
            .owners(["owner"])
            .warning(RejectionKind::Cooldown, "Wait {remaining} more seconds.")
            .warning(RejectionKind::GuildOnly, "Guild only.")
            .warning(RejectionKind::OwnerOnly, "Owners only.")
            .warning(RejectionKind::MissingSelfCapability, "I cannot speak there.")
            .warning(RejectionKind::MissingExecutorPermissions, "I need {permissions}.")
            .warning(RejectionKind::MissingCallerPermissions, "You need {permissions}.")
            .build()
            .unwrap()
    }

    fn pipeline() -> DispatchPipeline {
        DispatchPipeline::new(Arc::new(options()))
    }

    async fn finish(outcome: DispatchOutcome) {
        if let DispatchOutcome::Invoked(handle) = outcome {
            handle.await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_bot_author_stops_at_origin() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.register(counting("ping", &counter).build().unwrap()).unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::bot("b1"), "!ping").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert_eq!(outcome.ignored(), Some(IgnoreReason::Bot));
        assert_eq!(pipeline.stats().get(Gate::Origin), 1);
        assert_eq!(pipeline.stats().get(Gate::Address), 0);
        assert_eq!(pipeline.stats().get(Gate::Resolve), 0);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert!(msg.replies().is_empty());
    }

    #[tokio::test]
    async fn test_unaddressed_message() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.register(counting("hello", &counter).build().unwrap()).unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "hello").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert_eq!(outcome.ignored(), Some(IgnoreReason::Unaddressed));
        assert_eq!(pipeline.stats().get(Gate::Tokens), 0);
        assert!(msg.replies().is_empty());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_ping_cooldown_scenario() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ping", &counter)
                    .scope(Scope::GuildOnly)
                    .cooldown(Duration::from_secs(5))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let t0 = Instant::now();

        let first = MockMessage::shared(Author::user("u1"), "!ping").arc();
        let outcome = pipeline.dispatch(&registry, first, t0).await;
        assert!(outcome.is_invoked());
        finish(outcome).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let second = MockMessage::shared(Author::user("u1"), "!ping").arc();
        let outcome = pipeline
            .dispatch(&registry, second.clone(), t0 + Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::Cooldown {
                remaining: Duration::from_secs(4)
            })
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let replies = second.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("4.0"));
    }

    #[tokio::test]
    async fn test_ping_cooldown_default_scope() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ping", &counter)
                    .cooldown(Duration::from_secs(5))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        assert_eq!(registry.resolve("ping").unwrap().scope(), Scope::Any);

        let pipeline = pipeline();
        let t0 = Instant::now();

        let first = MockMessage::shared(Author::user("u1"), "!ping").arc();
        let outcome = pipeline.dispatch(&registry, first, t0).await;
        assert!(outcome.is_invoked());
        finish(outcome).await;

        let second = MockMessage::shared(Author::user("u1"), "!ping").arc();
        let outcome = pipeline
            .dispatch(&registry, second.clone(), t0 + Duration::from_secs(1))
            .await;
        assert_eq!(
            outcome.rejection(),
            Some(&Rejection::Cooldown {
                remaining: Duration::from_secs(4)
            })
        );
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        let replies = second.replies();
        assert_eq!(replies.len(), 1);
        assert!(replies[0].contains("4.0"));
    }

    #[tokio::test]
    async fn test_cooldown_expires() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ping", &counter)
                    .cooldown(Duration::from_secs(5))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let t0 = Instant::now();
        let msg = || MockMessage::shared(Author::user("u1"), "!ping").arc();

        finish(pipeline.dispatch(&registry, msg(), t0).await).await;
        let blocked = pipeline
            .dispatch(&registry, msg(), t0 + Duration::from_millis(4999))
            .await;
        assert!(blocked.rejection().is_some());
        let free = pipeline
            .dispatch(&registry, msg(), t0 + Duration::from_millis(5001))
            .await;
        assert!(free.is_invoked());
    }

    #[tokio::test]
    async fn test_owner_skips_cooldown() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ping", &counter)
                    .cooldown(Duration::from_secs(5))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let now = Instant::now();
        for _ in 0..3 {
            let msg = MockMessage::shared(Author::user("owner"), "!ping").arc();
            finish(pipeline.dispatch(&registry, msg, now).await).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert!(pipeline.cooldowns().is_empty());
    }

    #[tokio::test]
    async fn test_guild_only_in_direct_message() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(counting("kick", &counter).scope(Scope::GuildOnly).build().unwrap())
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::direct(Author::user("u1"), "!kick").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert_eq!(outcome.rejection(), Some(&Rejection::GuildOnly));
        assert_eq!(msg.replies(), vec!["Guild only.".to_string()]);
    }

    #[tokio::test]
    async fn test_direct_only_in_guild_without_warning() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("secret", &counter)
                    .scope(Scope::DirectMessageOnly)
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "!secret").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert_eq!(outcome.rejection(), Some(&Rejection::DirectMessageOnly));
        assert!(msg.replies().is_empty());
    }

    #[tokio::test]
    async fn test_owner_only() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(counting("eval", &counter).owner_only(true).build().unwrap())
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "!eval").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;
        assert_eq!(outcome.rejection(), Some(&Rejection::OwnerOnly));
        assert_eq!(msg.replies(), vec!["Owners only.".to_string()]);

        let msg = MockMessage::shared(Author::user("owner"), "!eval").arc();
        finish(pipeline.dispatch(&registry, msg, Instant::now()).await).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_missing_self_capability_sent_privately() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.register(counting("ping", &counter).build().unwrap()).unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "!ping")
            .own_permissions(&[])
            .arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert!(matches!(
            outcome.rejection(),
            Some(Rejection::MissingSelfCapability { .. })
        ));
        assert!(msg.replies().is_empty());
        assert_eq!(msg.direct_messages(), vec!["I cannot speak there.".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_caller_permissions_formatted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ban", &counter)
                    .caller_permissions(["KICK_MEMBERS", "BAN_MEMBERS", "SEND_MESSAGES"])
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "!ban")
            .member_permissions(&["SEND_MESSAGES"])
            .arc();
        pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert_eq!(
            msg.replies(),
            vec!["You need `KICK_MEMBERS` and `BAN_MEMBERS`.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_executor_permissions_checked_before_caller() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ban", &counter)
                    .executor_permissions(["BAN_MEMBERS"])
                    .caller_permissions(["BAN_MEMBERS"])
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("u1"), "!ban").arc();
        let outcome = pipeline.dispatch(&registry, msg.clone(), Instant::now()).await;

        assert!(matches!(
            outcome.rejection(),
            Some(Rejection::MissingExecutorPermissions { .. })
        ));
        assert_eq!(pipeline.stats().get(Gate::CallerPermissions), 0);
        assert_eq!(msg.replies(), vec!["I need `BAN_MEMBERS`.".to_string()]);
    }

    #[tokio::test]
    async fn test_permission_exemption() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ban", &counter)
                    .executor_permissions(["BAN_MEMBERS"])
                    .caller_permissions(["BAN_MEMBERS"])
                    .exempt_from_permissions(["vip"])
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("vip"), "!ban").arc();
        finish(pipeline.dispatch(&registry, msg, Instant::now()).await).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cooldown_exemption_does_not_bypass_permissions() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry
            .register(
                counting("ban", &counter)
                    .caller_permissions(["BAN_MEMBERS"])
                    .exempt_from_cooldown(["vip"])
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        let msg = MockMessage::shared(Author::user("vip"), "!ban").arc();
        let outcome = pipeline.dispatch(&registry, msg, Instant::now()).await;
        assert!(matches!(
            outcome.rejection(),
            Some(Rejection::MissingCallerPermissions { .. })
        ));
    }

    #[tokio::test]
    async fn test_mention_address_and_args() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let mut registry = Registry::new();
        registry
            .register(
                HandlerDefinition::command("echo")
                    .category("general")
                    .executor(command_fn(move |ctx, args| {
                        let seen = seen_clone.clone();
                        async move {
                            seen.lock().push((ctx.prefix().to_string(), args));
                            Ok(())
                        }
                    }))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let options = RouterOptions::builder()
            .directory("unused")
            .prefix("!")
            .self_id("42")
            .build()
            .unwrap();
        let pipeline = DispatchPipeline::new(Arc::new(options));
        let msg = MockMessage::shared(Author::user("u1"), "<@!42>  ECHO a b").arc();
        finish(pipeline.dispatch(&registry, msg, Instant::now()).await).await;

        let seen = seen.lock();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "<@!42>");
        assert_eq!(seen[0].1, vec!["a".to_string(), "b".to_string()]);
    }

    #[tokio::test]
    async fn test_direct_messages_disabled() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut registry = Registry::new();
        registry.register(counting("ping", &counter).build().unwrap()).unwrap();

        let options = RouterOptions::builder()
            .directory("unused")
            .prefix("!")
            .allow_direct_messages(false)
            .build()
            .unwrap();
        let pipeline = DispatchPipeline::new(Arc::new(options));
        let msg = MockMessage::direct(Author::user("u1"), "!ping").arc();
        let outcome = pipeline.dispatch(&registry, msg, Instant::now()).await;

        assert_eq!(outcome.ignored(), Some(IgnoreReason::DirectMessagesDisabled));
    }

    #[tokio::test]
    async fn test_executor_failure_is_contained() {
        let mut registry = Registry::new();
        registry
            .register(
                HandlerDefinition::command("boom")
                    .category("general")
                    .executor(command_fn(|_, _| async { Err("kaboom".into()) }))
                    .build()
                    .unwrap(),
            )
            .unwrap();
        registry
            .register(
                HandlerDefinition::command("panic")
                    .category("general")
                    .executor(command_fn(|_, _| async { panic!("executor panicked") }))
                    .build()
                    .unwrap(),
            )
            .unwrap();

        let pipeline = pipeline();
        for content in ["!boom", "!panic"] {
            let msg = MockMessage::shared(Author::user("u1"), content).arc();
            let outcome = pipeline.dispatch(&registry, msg, Instant::now()).await;
            let DispatchOutcome::Invoked(handle) = outcome else {
                panic!("expected invocation");
            };
            assert!(handle.await.is_ok());
        }
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn Any + Send> = Box::new("static str");
        assert_eq!(panic_message(&*payload), "static str");
        let payload: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(&*payload), "owned");
    }
}
