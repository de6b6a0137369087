//! Telegram adapter (teloxide).
//!
//! This crate implements the `nfb-core` MessagingPort over Telegram Bot API.

use std::path::Path;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{BotCommand, InputFile, ParseMode},
};

use tokio::time::sleep;

pub mod handlers;
pub mod router;

use nfb_core::{
    domain::{ChatId, MessageId, MessageRef},
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, CommandSpec, MessagingCapabilities},
    },
    Result,
};

/// Bot API hard limit for a single text message.
pub const TELEGRAM_MAX_MESSAGE_LEN: usize = 4096;

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
}

impl TelegramMessenger {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }

    fn tg_chat(chat_id: ChatId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(chat_id.0)
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        tracing::warn!(retry_after = ?d, "telegram rate limit hit, retrying");
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

fn bot_commands(commands: &[CommandSpec]) -> Vec<BotCommand> {
    commands
        .iter()
        .map(|c| BotCommand::new(c.name, c.description))
        .collect()
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            supports_chat_actions: true,
            max_message_len: TELEGRAM_MAX_MESSAGE_LEN,
        }
    }

    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_message(Self::tg_chat(chat_id), html.to_string())
                    .parse_mode(ParseMode::Html)
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_document(
        &self,
        chat_id: ChatId,
        path: &Path,
        caption: &str,
    ) -> Result<MessageRef> {
        let msg = self
            .with_retry(|| {
                self.bot
                    .send_document(Self::tg_chat(chat_id), InputFile::file(path.to_path_buf()))
                    .caption(caption.to_string())
            })
            .await?;

        Ok(MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0),
        })
    }

    async fn send_chat_action(&self, chat_id: ChatId, action: ChatAction) -> Result<()> {
        let tg_action = match action {
            ChatAction::Typing => teloxide::types::ChatAction::Typing,
            ChatAction::UploadDocument => teloxide::types::ChatAction::UploadDocument,
        };
        self.with_retry(|| self.bot.send_chat_action(Self::tg_chat(chat_id), tg_action))
            .await?;
        Ok(())
    }

    async fn set_commands(&self, commands: &[CommandSpec]) -> Result<()> {
        let commands = bot_commands(commands);
        self.with_retry(|| self.bot.set_my_commands(commands.clone()))
            .await?;
        Ok(())
    }
}
