//! Configuration types, loaded from the environment.

use std::path::PathBuf;
use std::time::Duration;

use chrono_tz::Tz;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Default summarization endpoint (OpenRouter, OpenAI-compatible).
pub const DEFAULT_AI_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default Bot API base.
pub const DEFAULT_TELEGRAM_API_BASE: &str = "https://api.telegram.org";

/// Default base for public channel web previews.
pub const DEFAULT_CHANNEL_WEB_BASE: &str = "https://t.me/s";

/// Bot API connection and routing settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    /// Chat that receives drafts and error reports.
    pub admin_chat_id: String,
    /// Channel that approved drafts are published to.
    pub target_channel_id: String,
    /// Usernames or numeric ids allowed to use `/preview`. `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Summarization endpoint settings.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub api_url: String,
    pub api_key: SecretString,
    pub model: String,
    pub timeout: Duration,
}

/// Daily fire time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    pub hour: u32,
    pub minute: u32,
    pub timezone: Tz,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            hour: 19,
            minute: 30,
            timezone: chrono_tz::Europe::Moscow,
        }
    }
}

/// Where and how much to collect.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub channels_file: PathBuf,
    pub posts_per_channel: usize,
    pub web_base: String,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            channels_file: PathBuf::from("channels.txt"),
            posts_per_channel: 10,
            web_base: DEFAULT_CHANNEL_WEB_BASE.to_string(),
        }
    }
}

/// Full bot configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub llm: LlmConfig,
    pub schedule: ScheduleConfig,
    pub collector: CollectorConfig,
    /// How long an undecided draft stays approvable.
    pub draft_ttl: Duration,
}

impl Config {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let require =
            |key: &str| get(key).ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()));

        let allowed_users: Vec<String> = get("TELEGRAM_ALLOWED_USERS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let telegram = TelegramConfig {
            bot_token: SecretString::from(require("TELEGRAM_BOT_TOKEN")?),
            api_base: get("TELEGRAM_API_BASE")
                .unwrap_or_else(|| DEFAULT_TELEGRAM_API_BASE.to_string()),
            admin_chat_id: require("ADMIN_USER_ID")?,
            target_channel_id: require("TARGET_CHANNEL_ID")?,
            allowed_users,
        };

        let llm = LlmConfig {
            api_url: get("AI_API_URL").unwrap_or_else(|| DEFAULT_AI_API_URL.to_string()),
            api_key: SecretString::from(require("AI_API_KEY")?),
            model: require("AI_MODEL")?,
            timeout: Duration::from_secs(120),
        };

        let defaults = ScheduleConfig::default();
        let hour = parse_or(get("SCHEDULE_HOUR"), "SCHEDULE_HOUR", defaults.hour)?;
        if hour > 23 {
            return Err(invalid("SCHEDULE_HOUR", format!("{hour} is not in 0..=23")));
        }
        let minute = parse_or(get("SCHEDULE_MIN"), "SCHEDULE_MIN", defaults.minute)?;
        if minute > 59 {
            return Err(invalid("SCHEDULE_MIN", format!("{minute} is not in 0..=59")));
        }
        let timezone = match get("TZ") {
            Some(name) => name
                .parse::<Tz>()
                .map_err(|e| invalid("TZ", format!("unknown time zone '{name}': {e}")))?,
            None => defaults.timezone,
        };

        let collector_defaults = CollectorConfig::default();
        let collector = CollectorConfig {
            channels_file: get("CHANNELS_FILE")
                .map(PathBuf::from)
                .unwrap_or(collector_defaults.channels_file),
            posts_per_channel: parse_or(
                get("POSTS_PER_CHANNEL"),
                "POSTS_PER_CHANNEL",
                collector_defaults.posts_per_channel,
            )?,
            web_base: get("CHANNEL_WEB_BASE").unwrap_or(collector_defaults.web_base),
        };

        let ttl_hours: u64 = parse_or(get("DRAFT_TTL_HOURS"), "DRAFT_TTL_HOURS", 24)?;
        if ttl_hours == 0 {
            return Err(invalid("DRAFT_TTL_HOURS", "must be at least 1".into()));
        }
        let draft_ttl = ttl_hours
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| invalid("DRAFT_TTL_HOURS", format!("{ttl_hours} hours is too long")))?;

        Ok(Self {
            telegram,
            llm,
            schedule: ScheduleConfig {
                hour,
                minute,
                timezone,
            },
            collector,
            draft_ttl,
        })
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .parse()
            .map_err(|e: T::Err| invalid(key, format!("'{raw}': {e}"))),
        None => Ok(default),
    }
}

fn invalid(key: &str, message: String) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    }
}
