use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{cipher::EncryptionKey, errors::Error, Result};

const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Typed configuration for the bot.
///
/// Secrets are required at startup; everything else has a default.
#[derive(Clone)]
pub struct Config {
    // Core
    pub telegram_bot_token: String,
    pub encryption_key: EncryptionKey,

    // Runtime
    pub temp_dir: PathBuf,
    pub resolver_workers: usize,
    pub activity_log_capacity: usize,

    // Telegram limits
    pub telegram_message_limit: usize,

    // Instagram directory
    pub instagram_user_agent: String,
    pub instagram_page_size: u32,
    pub instagram_page_delay: Duration,
    pub instagram_timeout: Duration,
}

impl Config {
    /// Load from `.env` (if present) and the process environment.
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        let cfg = Self::from_lookup(|key| env::var(key).ok())?;
        fs::create_dir_all(&cfg.temp_dir)?;
        Ok(cfg)
    }

    /// Parse configuration from an arbitrary key lookup.
    ///
    /// Does not touch the filesystem; `load()` creates `temp_dir`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).and_then(non_empty);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN").ok_or_else(|| {
            Error::Config("TELEGRAM_BOT_TOKEN environment variable is required".to_string())
        })?;

        let raw_key = get("ENCRYPTION_KEY").ok_or_else(|| {
            Error::Config("ENCRYPTION_KEY environment variable is required".to_string())
        })?;
        let encryption_key = EncryptionKey::from_base64(&raw_key)
            .map_err(|e| Error::Config(format!("ENCRYPTION_KEY: {e}")))?;

        let temp_dir = get("TEMP_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("/tmp/nfb"));
        let resolver_workers = parse::<usize>(get("RESOLVER_WORKERS")).unwrap_or(4).max(1);
        let activity_log_capacity = parse::<usize>(get("ACTIVITY_LOG_CAPACITY"))
            .unwrap_or(256)
            .max(1);

        let telegram_message_limit =
            parse::<usize>(get("TELEGRAM_MESSAGE_LIMIT")).unwrap_or(4096);

        let instagram_user_agent =
            get("INSTAGRAM_USER_AGENT").unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let instagram_page_size = parse::<u32>(get("INSTAGRAM_PAGE_SIZE"))
            .unwrap_or(50)
            .clamp(1, 50);
        let instagram_page_delay =
            Duration::from_millis(parse::<u64>(get("INSTAGRAM_PAGE_DELAY_MS")).unwrap_or(500));
        let instagram_timeout =
            Duration::from_secs(parse::<u64>(get("INSTAGRAM_TIMEOUT_SECS")).unwrap_or(30));

        Ok(Self {
            telegram_bot_token,
            encryption_key,
            temp_dir,
            resolver_workers,
            activity_log_capacity,
            telegram_message_limit,
            instagram_user_agent,
            instagram_page_size,
            instagram_page_delay,
            instagram_timeout,
        })
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_bot_token", &"<redacted>")
            .field("encryption_key", &self.encryption_key)
            .field("temp_dir", &self.temp_dir)
            .field("resolver_workers", &self.resolver_workers)
            .field("activity_log_capacity", &self.activity_log_capacity)
            .field("telegram_message_limit", &self.telegram_message_limit)
            .field("instagram_user_agent", &self.instagram_user_agent)
            .field("instagram_page_size", &self.instagram_page_size)
            .field("instagram_page_delay", &self.instagram_page_delay)
            .field("instagram_timeout", &self.instagram_timeout)
            .finish()
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse<T: std::str::FromStr>(v: Option<String>) -> Option<T> {
    v.and_then(|s| s.trim().parse::<T>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    const KEY: &str = "q83vEjRWeJCrze8SNFZ4kKvN7xI0VniQq83vEjRWeJA=";

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn missing_token_is_fatal() {
        let err = Config::from_lookup(lookup(&[("ENCRYPTION_KEY", KEY)])).unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }

    #[test]
    fn missing_or_bad_key_is_fatal() {
        let err = Config::from_lookup(lookup(&[("TELEGRAM_BOT_TOKEN", "t")])).unwrap_err();
        assert!(err.to_string().contains("ENCRYPTION_KEY"));

        let err = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ENCRYPTION_KEY", "c2hvcnQ="),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn defaults_apply() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ENCRYPTION_KEY", KEY),
        ]))
        .unwrap();
        assert_eq!(cfg.telegram_message_limit, 4096);
        assert_eq!(cfg.resolver_workers, 4);
        assert_eq!(cfg.instagram_page_size, 50);
        assert_eq!(cfg.temp_dir, PathBuf::from("/tmp/nfb"));
    }

    #[test]
    fn overrides_are_clamped() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "t"),
            ("ENCRYPTION_KEY", KEY),
            ("RESOLVER_WORKERS", "0"),
            ("INSTAGRAM_PAGE_SIZE", "500"),
            ("INSTAGRAM_PAGE_DELAY_MS", "0"),
        ]))
        .unwrap();
        assert_eq!(cfg.resolver_workers, 1);
        assert_eq!(cfg.instagram_page_size, 50);
        assert_eq!(cfg.instagram_page_delay, Duration::ZERO);
    }

    #[test]
    fn debug_output_hides_secrets() {
        let cfg = Config::from_lookup(lookup(&[
            ("TELEGRAM_BOT_TOKEN", "123:secret-token"),
            ("ENCRYPTION_KEY", KEY),
        ]))
        .unwrap();
        let dbg = format!("{cfg:?}");
        assert!(!dbg.contains("secret-token"));
        assert!(!dbg.contains(KEY));
    }

    #[test]
    fn quotes_are_stripped_from_dotenv_values() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("abc"), "abc");
    }
}
