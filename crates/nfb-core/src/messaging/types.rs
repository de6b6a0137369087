use crate::domain::{ChatId, UserId};

/// Cross-messenger incoming update model.
///
/// Telegram-specific fields live in the Telegram adapter.
#[derive(Clone, Debug)]
pub enum IncomingUpdate {
    Command(Command),
    Text(TextMessage),
}

impl IncomingUpdate {
    /// Classify raw message text: `/name args` becomes a command, anything
    /// else is plain text.
    pub fn from_text(
        chat_id: ChatId,
        user_id: UserId,
        username: Option<String>,
        text: &str,
    ) -> Self {
        if text.starts_with('/') {
            let (name, args) = parse_command(text);
            return IncomingUpdate::Command(Command {
                chat_id,
                user_id,
                username,
                name,
                args,
            });
        }
        IncomingUpdate::Text(TextMessage {
            chat_id,
            user_id,
            username,
            text: text.to_string(),
        })
    }

    pub fn user_id(&self) -> UserId {
        match self {
            IncomingUpdate::Command(c) => c.user_id,
            IncomingUpdate::Text(t) => t.user_id,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Command {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    /// Lower-cased, without the leading `/` or a `@botname` suffix.
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug)]
pub struct TextMessage {
    pub chat_id: ChatId,
    pub user_id: UserId,
    pub username: Option<String>,
    pub text: String,
}

/// Outgoing "chat action" (typing indicator, etc).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    UploadDocument,
}

/// One entry of the bot command menu.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub description: &'static str,
}

/// Capabilities / feature flags of a messenger implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    pub supports_chat_actions: bool,
    pub max_message_len: usize,
}

fn parse_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_bot_suffix_and_lowercases() {
        assert_eq!(
            parse_command("/Stop@non_follower_bot now"),
            ("stop".to_string(), "now".to_string())
        );
        assert_eq!(parse_command("/help"), ("help".to_string(), String::new()));
    }

    #[test]
    fn plain_text_is_not_a_command() {
        let up = IncomingUpdate::from_text(ChatId(1), UserId(2), None, "alice hunter22");
        match up {
            IncomingUpdate::Text(t) => assert_eq!(t.text, "alice hunter22"),
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn slash_text_is_a_command() {
        let up = IncomingUpdate::from_text(ChatId(1), UserId(2), None, "/schedule");
        match up {
            IncomingUpdate::Command(c) => {
                assert_eq!(c.name, "schedule");
                assert!(c.args.is_empty());
            }
            other => panic!("expected command, got {other:?}"),
        }
    }
}
