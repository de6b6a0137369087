/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the dispatcher
/// can report failures consistently. Request-level failures (login, profile,
/// decryption) have their own typed enums and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
