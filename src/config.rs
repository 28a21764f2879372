//! Configuration types, built from environment variables.

use std::time::Duration;

use secrecy::SecretString;

use crate::channels::telegram;
use crate::error::ConfigError;

/// How the bot receives updates from Telegram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Long-poll `getUpdates` (local development).
    Polling,
    /// Serve the webhook endpoint and register it with Telegram.
    Webhook,
}

impl RunMode {
    fn parse(value: &str) -> Result<Self, ConfigError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "polling" | "poll" => Ok(Self::Polling),
            "webhook" => Ok(Self::Webhook),
            other => Err(ConfigError::InvalidValue {
                key: "BOT_MODE".to_string(),
                message: format!("expected `polling` or `webhook`, got `{other}`"),
            }),
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Polling => write!(f, "polling"),
            Self::Webhook => write!(f, "webhook"),
        }
    }
}

/// Retry policy for external calls (sheet appends, outbound messages).
///
/// `max_attempts` counts the first try, so the default of 1 never retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::from_millis(500),
        }
    }
}

/// Google Sheets sink configuration.
#[derive(Debug, Clone)]
pub struct SheetsConfig {
    pub spreadsheet_id: String,
    /// Sheet to append to. `None` means the first sheet of the document.
    pub sheet_title: Option<String>,
    /// Service account key JSON as downloaded from the Cloud console.
    pub service_account_key: SecretString,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: SecretString,
    /// Bot API root; a self-hosted Bot API server can stand in for the public one.
    pub telegram_api_url: String,
    pub mode: RunMode,
    pub webhook_url: Option<String>,
    pub port: u16,
    /// Chat that receives a notification for every submitted project.
    pub admin_chat_id: Option<i64>,
    pub sheets: SheetsConfig,
    /// Upper bound for every external call.
    pub call_timeout: Duration,
    pub retry: RetryPolicy,
    /// Sessions untouched for this long are treated as abandoned and pruned.
    pub session_idle_timeout: Duration,
}

impl BotConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.into()));

        let bot_token = SecretString::from(require("BOT_TOKEN")?);
        let telegram_api_url =
            get("TELEGRAM_API_URL").unwrap_or_else(|| telegram::DEFAULT_API_URL.to_string());

        let mode = match get("BOT_MODE") {
            Some(value) => RunMode::parse(&value)?,
            None if get("NODE_ENV").as_deref() == Some("development") => RunMode::Polling,
            None => RunMode::Webhook,
        };

        let webhook_url = get("WEBHOOK_URL");
        let port = parse_or(get("PORT"), "PORT", 3000u16)?;
        let admin_chat_id = get("ADMIN_CHAT_ID")
            .map(|v| parse_value::<i64>(&v, "ADMIN_CHAT_ID"))
            .transpose()?;

        let sheets = SheetsConfig {
            spreadsheet_id: require("GOOGLE_SHEET_ID")?,
            sheet_title: get("GOOGLE_SHEET_TITLE"),
            service_account_key: SecretString::from(require("GOOGLE_SERVICE_ACCOUNT_KEY")?),
        };

        let call_timeout = Duration::from_secs(parse_or(
            get("CALL_TIMEOUT_SECS"),
            "CALL_TIMEOUT_SECS",
            15u64,
        )?);

        let max_attempts: u32 = parse_or(get("RETRY_MAX_ATTEMPTS"), "RETRY_MAX_ATTEMPTS", 1)?;
        if max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "RETRY_MAX_ATTEMPTS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        let retry = RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(parse_or(
                get("RETRY_BACKOFF_MS"),
                "RETRY_BACKOFF_MS",
                500u64,
            )?),
        };

        let session_idle_timeout = Duration::from_secs(parse_or(
            get("SESSION_IDLE_TIMEOUT_SECS"),
            "SESSION_IDLE_TIMEOUT_SECS",
            3600u64, // 1 hour
        )?);

        Ok(Self {
            bot_token,
            telegram_api_url,
            mode,
            webhook_url,
            port,
            admin_chat_id,
            sheets,
            call_timeout,
            retry,
            session_idle_timeout,
        })
    }
}

fn parse_value<T>(value: &str, key: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(v) => parse_value(&v, key),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("BOT_TOKEN", "123:ABC"),
        ("GOOGLE_SHEET_ID", "sheet-1"),
        ("GOOGLE_SERVICE_ACCOUNT_KEY", "{}"),
    ];

    #[test]
    fn defaults_with_required_only() {
        let config = BotConfig::from_lookup(lookup(&REQUIRED)).unwrap();
        assert_eq!(config.bot_token.expose_secret(), "123:ABC");
        assert_eq!(config.telegram_api_url, "https://api.telegram.org");
        assert_eq!(config.mode, RunMode::Webhook);
        assert_eq!(config.port, 3000);
        assert_eq!(config.admin_chat_id, None);
        assert_eq!(config.sheets.spreadsheet_id, "sheet-1");
        assert!(config.sheets.sheet_title.is_none());
        assert_eq!(config.call_timeout, Duration::from_secs(15));
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.session_idle_timeout, Duration::from_secs(3600));
    }

    #[test]
    fn missing_token_is_reported() {
        let err = BotConfig::from_lookup(lookup(&REQUIRED[1..])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "BOT_TOKEN"));
    }

    #[test]
    fn blank_value_counts_as_missing() {
        let mut pairs = REQUIRED.to_vec();
        pairs[1] = ("GOOGLE_SHEET_ID", "  ");
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "GOOGLE_SHEET_ID"));
    }

    #[test]
    fn development_env_selects_polling() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NODE_ENV", "development"));
        let config = BotConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mode, RunMode::Polling);
    }

    #[test]
    fn explicit_mode_wins_over_node_env() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("NODE_ENV", "development"));
        pairs.push(("BOT_MODE", "Webhook"));
        let config = BotConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.mode, RunMode::Webhook);
    }

    #[test]
    fn invalid_mode_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("BOT_MODE", "carrier-pigeon"));
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "BOT_MODE"));
    }

    #[test]
    fn optional_values_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("ADMIN_CHAT_ID", "-100200300"),
            ("PORT", "8080"),
            ("GOOGLE_SHEET_TITLE", "Projects"),
            ("CALL_TIMEOUT_SECS", "5"),
            ("RETRY_MAX_ATTEMPTS", "3"),
            ("RETRY_BACKOFF_MS", "250"),
            ("WEBHOOK_URL", "https://bot.example.com/api/webhook"),
        ]);
        let config = BotConfig::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.admin_chat_id, Some(-100200300));
        assert_eq!(config.port, 8080);
        assert_eq!(config.sheets.sheet_title.as_deref(), Some("Projects"));
        assert_eq!(config.call_timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff, Duration::from_millis(250));
        assert_eq!(
            config.webhook_url.as_deref(),
            Some("https://bot.example.com/api/webhook")
        );
    }

    #[test]
    fn bad_number_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ADMIN_CHAT_ID", "admin"));
        let err = BotConfig::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ADMIN_CHAT_ID"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RETRY_MAX_ATTEMPTS", "0"));
        assert!(BotConfig::from_lookup(lookup(&pairs)).is_err());
    }
}
