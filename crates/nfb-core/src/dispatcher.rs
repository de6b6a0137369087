//! Routes inbound chat updates to the bot's operations.
//!
//! Transport-neutral: the Telegram adapter converts its messages into
//! [`IncomingUpdate`] and calls [`CommandDispatcher::handle`].

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use zeroize::Zeroize;

use crate::{
    activity::{self, ActivityLog},
    cipher::CredentialCipher,
    config::Config,
    delivery::ResponseFormatter,
    directory::ProfileDirectory,
    domain::{ChatId, UserId},
    executor::{JobError, WorkerPool},
    formatting::escape_html,
    messaging::{
        port::MessagingPort,
        types::{ChatAction, Command, CommandSpec, IncomingUpdate, TextMessage},
    },
    resolver::{NonFollowerResolver, ResolveError},
    tasks::TaskRegistry,
    Result,
};

/// Bot command menu, in display order.
pub const COMMANDS: &[CommandSpec] = &[
    CommandSpec {
        name: "start",
        description: "Start the bot and see instructions",
    },
    CommandSpec {
        name: "help",
        description: "Get a list of commands and usage instructions",
    },
    CommandSpec {
        name: "stop",
        description: "Stop any ongoing operation",
    },
    CommandSpec {
        name: "schedule",
        description: "Schedule regular non-follower checks",
    },
];

const START_TEXT: &str = "Welcome to the Instagram Non-Follower Checker Bot! 🤖\n\n\
To get started, send your Instagram username and password separated by a space.\n\
Commands available:\n\
/help - List of commands\n\
/stop - Stop the current operation\n\
/schedule - Schedule regular checks (future update)\n\n\
<b>Note</b>: If you have two-factor authentication (2FA) enabled, please disable it before using this bot.";

const HELP_TEXT: &str = "<b>Available Commands:</b>\n\
/start - Start the bot and see instructions\n\
/stop - Stop the current operation\n\
/help - Display this help message\n\
/schedule - Schedule regular checks (coming soon)\n\n\
<b>Usage:</b>\n\
Send your Instagram credentials as <code>username password</code> to check for non-followers.\n\n\
<b>Note:</b>\n\
If you have two-factor authentication (2FA) enabled, please disable it before using this bot.";

const STOPPED_TEXT: &str = "The operation has been stopped.";
const NOTHING_TO_STOP_TEXT: &str = "No ongoing task found to stop.";
const SCHEDULE_TEXT: &str =
    "Scheduled checks are not implemented yet, but stay tuned for updates!";
const USAGE_TEXT: &str = "Please provide both your username and password separated by a space.";
const CHECKING_TEXT: &str = "Checking non-followers... This may take a while.";

/// Shared state the dispatcher operates on. Owned by the caller so tests (and
/// the adapter) can inspect it.
pub struct DispatcherParts {
    pub messenger: Arc<dyn MessagingPort>,
    pub cipher: Arc<CredentialCipher>,
    pub resolver: Arc<NonFollowerResolver>,
    pub tasks: Arc<TaskRegistry>,
    pub activity: Arc<ActivityLog>,
    pub pool: WorkerPool,
    pub formatter: ResponseFormatter,
}

pub struct CommandDispatcher {
    messenger: Arc<dyn MessagingPort>,
    cipher: Arc<CredentialCipher>,
    resolver: Arc<NonFollowerResolver>,
    tasks: Arc<TaskRegistry>,
    activity: Arc<ActivityLog>,
    pool: WorkerPool,
    formatter: ResponseFormatter,
}

impl CommandDispatcher {
    pub fn new(parts: DispatcherParts) -> Self {
        let DispatcherParts {
            messenger,
            cipher,
            resolver,
            tasks,
            activity,
            pool,
            formatter,
        } = parts;
        Self {
            messenger,
            cipher,
            resolver,
            tasks,
            activity,
            pool,
            formatter,
        }
    }

    /// Wire the dispatcher from configuration and the two external ports.
    pub fn from_config(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        directory: Arc<dyn ProfileDirectory>,
    ) -> Self {
        let cipher = Arc::new(CredentialCipher::new(&cfg.encryption_key));
        let resolver = Arc::new(NonFollowerResolver::new(directory, cipher.clone()));
        // Never plan an inline reply the transport would reject.
        let limit = cfg
            .telegram_message_limit
            .min(messenger.capabilities().max_message_len);
        Self::new(DispatcherParts {
            messenger,
            cipher,
            resolver,
            tasks: Arc::new(TaskRegistry::new()),
            activity: Arc::new(ActivityLog::new(cfg.activity_log_capacity)),
            pool: WorkerPool::new(cfg.resolver_workers),
            formatter: ResponseFormatter::new(limit, cfg.temp_dir.clone()),
        })
    }

    pub fn tasks(&self) -> &TaskRegistry {
        &self.tasks
    }

    pub fn activity(&self) -> &ActivityLog {
        &self.activity
    }

    /// Register the command menu with the transport.
    pub async fn register_commands(&self) -> Result<()> {
        self.messenger.set_commands(COMMANDS).await
    }

    pub async fn handle(&self, update: IncomingUpdate) -> Result<()> {
        match update {
            IncomingUpdate::Command(cmd) => self.handle_command(cmd).await,
            IncomingUpdate::Text(msg) => self.check_non_followers(msg).await,
        }
    }

    async fn handle_command(&self, cmd: Command) -> Result<()> {
        let Command {
            chat_id,
            user_id,
            name,
            ..
        } = cmd;

        match name.as_str() {
            "start" => {
                self.reply(chat_id, START_TEXT).await?;
                self.activity.record(user_id, activity::START_ISSUED).await;
            }
            "help" => {
                self.reply(chat_id, HELP_TEXT).await?;
                self.activity.record(user_id, activity::HELP_ISSUED).await;
            }
            "stop" => {
                let text = if self.tasks.stop(user_id).await {
                    tracing::info!(user_id = user_id.0, "check stopped by user");
                    STOPPED_TEXT
                } else {
                    NOTHING_TO_STOP_TEXT
                };
                self.reply(chat_id, text).await?;
                self.activity.record(user_id, activity::STOP_ISSUED).await;
            }
            "schedule" => {
                self.reply(chat_id, SCHEDULE_TEXT).await?;
                self.activity
                    .record(user_id, activity::SCHEDULE_ISSUED)
                    .await;
            }
            other => {
                let msg = format!(
                    "Unknown command: /{}\nSend /help for the list of commands.",
                    escape_html(other)
                );
                self.reply(chat_id, &msg).await?;
            }
        }
        Ok(())
    }

    async fn check_non_followers(&self, mut msg: TextMessage) -> Result<()> {
        let chat_id = msg.chat_id;
        let user_id = msg.user_id;

        let Some((username, password)) = parse_credentials(&msg.text) else {
            return self.reply(chat_id, USAGE_TEXT).await;
        };
        let username = username.to_string();
        let encrypted = self.cipher.encrypt(password);
        msg.text.zeroize();

        let encrypted = match encrypted {
            Ok(ct) => ct,
            Err(e) => {
                tracing::error!(user_id = user_id.0, error = %e, "failed to encrypt credentials");
                let text = format!("Error: {}", ResolveError::Decryption.user_message());
                return self.reply(chat_id, &text).await;
            }
        };

        // Advisory only: a second submission while one is running is not refused.
        let cancel = self.tasks.start(user_id).await;
        let outcome = self.run_check(chat_id, user_id, username, encrypted, cancel).await;
        self.tasks.finish(user_id).await;
        self.activity
            .record(user_id, activity::CHECK_COMPLETED)
            .await;
        outcome
    }

    async fn run_check(
        &self,
        chat_id: ChatId,
        user_id: UserId,
        username: String,
        encrypted: String,
        cancel: CancellationToken,
    ) -> Result<()> {
        if self.messenger.capabilities().supports_chat_actions {
            let _ = self
                .messenger
                .send_chat_action(chat_id, ChatAction::Typing)
                .await;
        }
        self.reply(chat_id, CHECKING_TEXT).await?;

        let resolver = Arc::clone(&self.resolver);
        let token = cancel.clone();
        let job = self.pool.submit(cancel, async move {
            resolver.resolve(&username, &encrypted, &token).await
        });

        match job.join().await {
            Ok(Ok(non_followers)) => {
                tracing::info!(
                    user_id = user_id.0,
                    count = non_followers.len(),
                    "non-follower check succeeded"
                );
                let plan = self.formatter.plan(user_id, &non_followers);
                let delivered = self
                    .formatter
                    .deliver(self.messenger.as_ref(), chat_id, plan)
                    .await;
                if let Err(e) = delivered {
                    tracing::error!(user_id = user_id.0, error = %e, "failed to deliver result");
                    let e = ResolveError::Unknown("the result could not be sent".to_string());
                    return self
                        .reply(chat_id, &format!("Error: {}", e.user_message()))
                        .await;
                }
                Ok(())
            }
            Ok(Err(ResolveError::Cancelled)) | Err(JobError::Cancelled) => {
                tracing::info!(user_id = user_id.0, "non-follower check cancelled");
                Ok(())
            }
            Ok(Err(e)) => {
                tracing::warn!(user_id = user_id.0, error = %e, "non-follower check failed");
                self.reply(chat_id, &format!("Error: {}", escape_html(&e.user_message())))
                    .await
            }
            Err(JobError::Panicked) => {
                tracing::error!(user_id = user_id.0, "non-follower check panicked");
                let e = ResolveError::Unknown("internal failure".to_string());
                self.reply(chat_id, &format!("Error: {}", e.user_message()))
                    .await
            }
        }
    }

    async fn reply(&self, chat_id: ChatId, html: &str) -> Result<()> {
        self.messenger.send_html(chat_id, html).await.map(|_| ())
    }
}

/// Split `"<username> <password>"` on the first whitespace character.
///
/// The password keeps any further whitespace. Returns `None` when there is no
/// separator or the username is empty.
fn parse_credentials(text: &str) -> Option<(&str, &str)> {
    let (username, password) = text.trim_start().split_once(char::is_whitespace)?;
    if username.is_empty() {
        return None;
    }
    Some((username, password))
}
