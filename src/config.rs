//! Configuration types.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default Telegram long-poll timeout in seconds.
pub const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;

/// Bot configuration, read from the environment.
#[derive(Debug)]
pub struct BotConfig {
    /// Telegram bot token. The Telegram channel runs only when set.
    pub telegram_token: Option<SecretString>,
    /// Whether the stdin/stdout channel runs.
    pub cli_enabled: bool,
    /// Port for the records HTTP API. No API when unset.
    pub http_port: Option<u16>,
    /// Telegram `getUpdates` long-poll timeout.
    pub poll_timeout_secs: u64,
    /// Directory for daily rolling log files, in addition to stderr.
    pub log_dir: Option<PathBuf>,
}

impl BotConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let telegram_token = get("TELEGRAM_BOT_TOKEN").map(SecretString::from);

        let cli_enabled = match get("FORM_BOT_CLI") {
            Some(v) => parse_flag("FORM_BOT_CLI", &v)?,
            None => telegram_token.is_none(),
        };

        let http_port = get("FORM_BOT_HTTP_PORT")
            .map(|v| parse_number::<u16>("FORM_BOT_HTTP_PORT", &v))
            .transpose()?;

        let poll_timeout_secs = get("FORM_BOT_POLL_TIMEOUT_SECS")
            .map(|v| parse_number::<u64>("FORM_BOT_POLL_TIMEOUT_SECS", &v))
            .transpose()?
            .unwrap_or(DEFAULT_POLL_TIMEOUT_SECS);

        let log_dir = get("FORM_BOT_LOG_DIR").map(PathBuf::from);

        if telegram_token.is_none() && !cli_enabled {
            return Err(ConfigError::MissingRequired {
                key: "TELEGRAM_BOT_TOKEN".into(),
                hint: "Set a bot token or enable the CLI channel with FORM_BOT_CLI=1".into(),
            });
        }

        Ok(Self {
            telegram_token,
            cli_enabled,
            http_port,
            poll_timeout_secs,
            log_dir,
        })
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.into(),
            message: format!("expected true or false, got '{value}'"),
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.into(),
        message: format!("'{value}': {e}"),
    })
}
