//! Test doubles shared by the framework's unit tests.

use std::sync::Arc;

use astron_core::{
    Author, ChannelKind, GuildContext, InboundMessage, PermissionSet, TransportResult,
};
use async_trait::async_trait;
use parking_lot::Mutex;

/// An inbound message that records everything sent back through it.
pub(crate) struct MockMessage {
    author: Author,
    content: String,
    channel_kind: ChannelKind,
    guild: Option<GuildContext>,
    replies: Mutex<Vec<String>>,
    direct_messages: Mutex<Vec<String>>,
}

impl MockMessage {
    /// A guild message where the bot may reply and the author holds nothing.
    pub(crate) fn shared(author: Author, content: &str) -> Self {
        Self {
            author,
            content: content.to_string(),
            channel_kind: ChannelKind::Shared,
            guild: Some(GuildContext {
                own_permissions: ["SEND_MESSAGES"].into_iter().collect(),
                member_permissions: PermissionSet::new(),
            }),
            replies: Mutex::new(Vec::new()),
            direct_messages: Mutex::new(Vec::new()),
        }
    }

    /// A direct message.
    pub(crate) fn direct(author: Author, content: &str) -> Self {
        Self {
            channel_kind: ChannelKind::Direct,
            guild: None,
            ..Self::shared(author, content)
        }
    }

    pub(crate) fn own_permissions(mut self, granted: &[&str]) -> Self {
        if let Some(guild) = self.guild.as_mut() {
            guild.own_permissions = granted.iter().copied().collect();
        }
        self
    }

    pub(crate) fn member_permissions(mut self, granted: &[&str]) -> Self {
        if let Some(guild) = self.guild.as_mut() {
            guild.member_permissions = granted.iter().copied().collect();
        }
        self
    }

    pub(crate) fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn replies(&self) -> Vec<String> {
        self.replies.lock().clone()
    }

    pub(crate) fn direct_messages(&self) -> Vec<String> {
        self.direct_messages.lock().clone()
    }
}

#[async_trait]
impl InboundMessage for MockMessage {
    fn author(&self) -> &Author {
        &self.author
    }

    fn content(&self) -> &str {
        &self.content
    }

    fn channel_kind(&self) -> ChannelKind {
        self.channel_kind
    }

    fn guild(&self) -> Option<&GuildContext> {
        self.guild.as_ref()
    }

    async fn reply(&self, text: &str) -> TransportResult<()> {
        self.replies.lock().push(text.to_string());
        Ok(())
    }

    async fn direct_message(&self, text: &str) -> TransportResult<()> {
        self.direct_messages.lock().push(text.to_string());
        Ok(())
    }
}
