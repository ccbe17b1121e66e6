//! Inbound message abstraction.
//!
//! The router does not know which chat platform it runs on. Transports wrap
//! their native message objects in a type implementing [`InboundMessage`],
//! which exposes exactly what the dispatch gates need: who sent it, what it
//! says, where it was sent, the permissions in effect, and two ways to answer.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportResult;
use crate::permission::PermissionSet;

/// The identity that sent a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Platform user id.
    pub id: String,
    /// Whether the author is an automated account.
    pub is_bot: bool,
}

impl Author {
    /// Creates a human author.
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: false,
        }
    }

    /// Creates an automated author.
    pub fn bot(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_bot: true,
        }
    }
}

/// Kind of channel a message arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    /// A one-to-one conversation with the bot.
    Direct,
    /// A channel shared by several members (a guild/group channel).
    Shared,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Shared => f.write_str("shared"),
        }
    }
}

/// Permission information for a message sent inside a guild.
#[derive(Debug, Clone, Default)]
pub struct GuildContext {
    /// Permissions the bot itself holds in the channel.
    pub own_permissions: PermissionSet,
    /// Permissions the author holds in the channel.
    pub member_permissions: PermissionSet,
}

/// A message delivered by the external transport.
///
/// Implementations must be cheap to share; the router keeps an
/// `Arc<dyn InboundMessage>` alive for as long as the command runs.
#[async_trait]
pub trait InboundMessage: Send + Sync + 'static {
    /// The sender.
    fn author(&self) -> &Author;

    /// The raw text content.
    fn content(&self) -> &str;

    /// Where the message was sent.
    fn channel_kind(&self) -> ChannelKind;

    /// Guild permissions, present only for messages sent inside a guild.
    fn guild(&self) -> Option<&GuildContext> {
        None
    }

    /// Sends text back into the originating channel.
    async fn reply(&self, text: &str) -> TransportResult<()>;

    /// Sends text privately to the author.
    async fn direct_message(&self, text: &str) -> TransportResult<()>;
}

/// Shared handle to an inbound message.
pub type BoxedMessage = Arc<dyn InboundMessage>;

impl fmt::Debug for dyn InboundMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InboundMessage")
            .field("author", self.author())
            .field("channel_kind", &self.channel_kind())
            .field("content", &self.content())
            .finish_non_exhaustive()
    }
}
