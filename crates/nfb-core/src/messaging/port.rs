use std::path::Path;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, MessageRef},
    messaging::types::{ChatAction, CommandSpec, MessagingCapabilities},
    Result,
};

/// Outbound side of the chat transport.
///
/// Telegram is the only implementation; the dispatcher and delivery code talk
/// to this trait so they can be exercised against an in-memory fake.
#[async_trait]
pub trait MessagingPort: Send + Sync {
    fn capabilities(&self) -> MessagingCapabilities;

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef>;

    /// Upload a local file as a document attachment.
    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef>;

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()>;

    /// Register the bot command menu.
    async fn set_commands(&self, commands: &[CommandSpec]) -> Result<()>;
}
