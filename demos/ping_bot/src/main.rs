//! Ping Bot Example
//!
//! Runs the Astron router against the terminal: every line typed on stdin is
//! an inbound message, replies are printed back.
//!
//! Commands live in `commands/<category>/*.toml`; the code below only
//! provides the executors they bind to. Edit a manifest and type `!reload`
//! (as the owner) to pick the change up.
//!
//! Lines starting with `:dm ` are sent as direct messages, everything else
//! arrives in a simulated server channel.
//!
//! # Usage
//!
//! ```bash
//! cargo run --package ping-bot -- --user 1 --grant KICK_MEMBERS
//! ```

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use anyhow::{Context, Result};
use astron::prelude::{
    AstronRuntime, Author, BoxError, ChannelKind, CommandContext, GuildContext, InboundMessage,
    ListenerContext, Router, TransportEvent,
};
use astron::runtime::config::ConfigLoader;
use astron_core::{PermissionSet, TransportError, TransportResult};
use async_trait::async_trait;
use clap::Parser;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio_util::codec::{FramedRead, LinesCodec};
use tracing::{info, warn};

/// Router handle for executors that manage the router itself.
static ROUTER: OnceLock<Router> = OnceLock::new();

#[derive(Debug, Parser)]
#[command(about = "A console bot demonstrating the Astron command router")]
struct Args {
    /// Configuration file.
    #[arg(long, default_value = concat!(env!("CARGO_MANIFEST_DIR"), "/astron.toml"))]
    config: PathBuf,

    /// User id the typed messages come from.
    #[arg(long, default_value = "1")]
    user: String,

    /// Permissions the user holds in the simulated server.
    #[arg(long = "grant")]
    grants: Vec<String>,

    /// Permissions the bot holds in the simulated server.
    #[arg(long = "bot-grant", default_values_t = vec!["SEND_MESSAGES".to_string()])]
    bot_grants: Vec<String>,
}

// ============================================================================
// Console transport
// ============================================================================

struct ConsoleMessage {
    author: Author,
    content: String,
    guild: Option<GuildContext>,
}

impl ConsoleMessage {
    async fn print(&self, line: String) -> TransportResult<()> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }
}

#[async_trait]
impl InboundMessage for ConsoleMessage {
    fn author(&self) -> &Author {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn channel_kind(&self) -> ChannelKind {
        match self.guild {
            Some(_) => ChannelKind::Shared,
            None => ChannelKind::Direct,
        }
    }

    fn guild(&self) -> Option<&GuildContext> {
        self.guild.as_ref()
    }

    async fn reply(&self, text: &str) -> TransportResult<()> {
        self.print(format!("bot> {text}\n")).await
    }

    async fn direct_message(&self, text: &str) -> TransportResult<()> {
        self.print(format!("bot (dm)> {text}\n")).await
    }
}

fn to_event(line: String, args: &Args) -> TransportEvent {
    let (content, guild) = match line.strip_prefix(":dm ") {
        Some(rest) => (rest.to_string(), None),
        None => (
            line,
            Some(GuildContext {
                own_permissions: args.bot_grants.iter().map(String::as_str).collect(),
                member_permissions: args
                    .grants
                    .iter()
                    .map(String::as_str)
                    .collect::<PermissionSet>(),
            }),
        ),
    };

    TransportEvent::Message(Arc::new(ConsoleMessage {
        author: Author::user(args.user.as_str()),
        content,
        guild,
    }))
}

// ============================================================================
// Executors
// ============================================================================

#[astron::command("ping")]
async fn ping(ctx: CommandContext, _args: Vec<String>) -> Result<(), BoxError> {
    ctx.reply("Pong! 🏓").await?;
    Ok(())
}

#[astron::command("echo")]
async fn echo(ctx: CommandContext, args: Vec<String>) -> Result<(), BoxError> {
    if args.is_empty() {
        let usage = ctx.handler().as_command().map(|c| c.usage()).unwrap_or_default();
        ctx.reply(format!("Usage: {}{usage}", ctx.prefix())).await?;
    } else {
        ctx.reply(args.join(" ")).await?;
    }
    Ok(())
}

#[astron::command("about")]
async fn about(ctx: CommandContext, _args: Vec<String>) -> Result<(), BoxError> {
    let text = match ROUTER.get() {
        Some(router) => {
            let registry = router.registry();
            let categories: Vec<String> = registry
                .categories()
                .map(|c| format!("{} ({})", c.name(), c.len()))
                .collect();
            format!(
                "Astron {} | {} handlers in {}",
                env!("CARGO_PKG_VERSION"),
                registry.len(),
                categories.join(", ")
            )
        }
        None => format!("Astron {}", env!("CARGO_PKG_VERSION")),
    };
    ctx.reply(text).await?;
    Ok(())
}

#[astron::command("reload")]
async fn reload(ctx: CommandContext, args: Vec<String>) -> Result<(), BoxError> {
    let router = ROUTER.get().ok_or("router not ready")?;

    let text = match args.first() {
        Some(token) => match router.reload_one(token) {
            Ok(handler) => format!("Reloaded `{}`.", handler.id()),
            Err(e) => format!("Reload failed: {e}"),
        },
        None => {
            let report = router.reload_all();
            format!(
                "Reloaded {} handlers, {} failed.",
                report.loaded(),
                report.failures.len()
            )
        }
    };
    ctx.reply(text).await?;
    Ok(())
}

#[astron::command("kick")]
async fn kick(ctx: CommandContext, args: Vec<String>) -> Result<(), BoxError> {
    match args.first() {
        Some(user) => ctx.reply(format!("Kicked {user} (not really).")).await?,
        None => ctx.reply("Who should I kick?").await?,
    }
    Ok(())
}

#[astron::listener("ready")]
async fn ready(ctx: ListenerContext, payload: Arc<serde_json::Value>) -> Result<(), BoxError> {
    info!(
        emitter = ctx.emitter(),
        user = %payload["user"],
        "Bot is ready, type a command (e.g. !ping)"
    );
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new()
        .file(&args.config)
        .load()
        .with_context(|| format!("loading {}", args.config.display()))?;

    // Relative handler directories are relative to the config file.
    let base = args.config.parent().unwrap_or(Path::new("."));
    config.router.directory = config
        .router
        .directory
        .take()
        .map(|dir| if dir.is_relative() { base.join(dir) } else { dir });

    let runtime = AstronRuntime::builder().config(config).build()?;
    if ROUTER.set(runtime.router().clone()).is_err() {
        warn!("Router handle was already set");
    }

    let ready = TransportEvent::event("ready", serde_json::json!({ "user": args.user }));
    let lines = FramedRead::new(tokio::io::stdin(), LinesCodec::new()).filter_map(|line| {
        let event = match line {
            Ok(line) if line.trim().is_empty() => None,
            Ok(line) => Some(to_event(line, &args)),
            Err(e) => Some(TransportEvent::Error(TransportError::Other(e.to_string()))),
        };
        futures::future::ready(event)
    });

    runtime
        .run(futures::stream::iter([ready]).chain(lines))
        .await?;
    Ok(())
}
