//! Turns a non-follower set into chat output.

use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use crate::{
    domain::{ChatId, UserId},
    formatting::escape_html,
    messaging::{port::MessagingPort, types::ChatAction},
    Result,
};

pub const LIST_HEADER: &str = "These people don't follow you back:\n";
pub const EVERYONE_FOLLOWS_BACK: &str = "Everyone follows you back!";
pub const ATTACHMENT_CAPTION: &str = "List of people who don't follow you back.";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeliveryPlan {
    Congratulate,
    Inline(String),
    /// Write `contents` to `path`, upload it, then delete it.
    Attachment { path: PathBuf, contents: String },
}

/// Decides between an inline reply and a file attachment based on size.
#[derive(Clone, Debug)]
pub struct ResponseFormatter {
    message_limit: usize,
    temp_dir: PathBuf,
}

impl ResponseFormatter {
    pub fn new(message_limit: usize, temp_dir: impl Into<PathBuf>) -> Self {
        Self {
            message_limit,
            temp_dir: temp_dir.into(),
        }
    }

    pub fn plan(&self, user_id: UserId, non_followers: &BTreeSet<String>) -> DeliveryPlan {
        if non_followers.is_empty() {
            return DeliveryPlan::Congratulate;
        }
        let text = render(non_followers);
        if text.chars().count() > self.message_limit {
            return DeliveryPlan::Attachment {
                path: self.temp_dir.join(artifact_name(user_id)),
                contents: text,
            };
        }
        DeliveryPlan::Inline(text)
    }

    /// Execute `plan`. An attachment file is removed even when the upload fails.
    pub async fn deliver(
        &self,
        messenger: &dyn MessagingPort,
        chat_id: ChatId,
        plan: DeliveryPlan,
    ) -> Result<()> {
        match plan {
            DeliveryPlan::Congratulate => {
                messenger.send_html(chat_id, EVERYONE_FOLLOWS_BACK).await?;
            }
            DeliveryPlan::Inline(text) => {
                messenger.send_html(chat_id, &escape_html(&text)).await?;
            }
            DeliveryPlan::Attachment { path, contents } => {
                let artifact = TempArtifact::write(path, &contents).await?;
                if messenger.capabilities().supports_chat_actions {
                    let _ = messenger
                        .send_chat_action(chat_id, ChatAction::UploadDocument)
                        .await;
                }
                messenger
                    .send_document(chat_id, artifact.path(), ATTACHMENT_CAPTION)
                    .await?;
                tracing::info!(chat_id = chat_id.0, bytes = contents.len(), "sent attachment");
            }
        }
        Ok(())
    }
}

/// Header plus one username per line.
pub fn render(non_followers: &BTreeSet<String>) -> String {
    let names: Vec<&str> = non_followers.iter().map(String::as_str).collect();
    format!("{LIST_HEADER}{}", names.join("\n"))
}

/// Unique per requesting user so concurrent users never share a file.
pub fn artifact_name(user_id: UserId) -> String {
    format!("non_followers_{user_id}.txt")
}

/// A file that is deleted when dropped.
struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    async fn write(path: PathBuf, contents: &str) -> Result<Self> {
        tokio::fs::write(&path, contents).await?;
        Ok(Self { path })
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), error = %e, "failed to remove temp file");
            }
        }
    }
}
