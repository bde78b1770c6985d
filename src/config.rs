use std::env::var;
use std::str::FromStr;
use std::time::Duration;

use dotenvy::dotenv;
use notification_dispatch::{
    domain::value_objects::RateSpec, infrastructure::messaging::telegram::TelegramConfig,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("An error occured while getting {0} env param")]
    Missing(&'static str),
    #[error("An error occured while parsing {name} env param: {reason}")]
    Invalid { name: &'static str, reason: String },
}

pub struct Config {
    pub database_url: String,
    pub telegram: TelegramConfig,
    pub max_retries_per_message: u32,
    pub tasks_interval: Duration,
}

impl Config {
    pub fn try_parse() -> Result<Config, ConfigError> {
        let _ = dotenv();

        let tasks_interval = tasks_interval(optional("TASKS_INTERVAL_MINUTES", 5)?)?;

        Ok(Config {
            database_url: required("DATABASE_URL")?,
            telegram: TelegramConfig {
                bot_token: required("TELEGRAM_BOT_TOKEN")?,
                base_url: var("TELEGRAM_API_URL")
                    .unwrap_or_else(|_| TelegramConfig::DEFAULT_BASE_URL.to_string()),
                chat_limit: optional("TELEGRAM_CHAT_LIMIT", TelegramConfig::chat_limit_default())?,
                global_limit: optional(
                    "TELEGRAM_GLOBAL_LIMIT",
                    TelegramConfig::global_limit_default(),
                )?,
            },
            max_retries_per_message: optional("MAX_RETRIES_PER_MESSAGE", 3)?,
            tasks_interval,
        })
    }
}

fn tasks_interval(minutes: u64) -> Result<Duration, ConfigError> {
    let invalid = |reason: &str| ConfigError::Invalid {
        name: "TASKS_INTERVAL_MINUTES",
        reason: reason.to_string(),
    };
    if minutes == 0 {
        return Err(invalid("must be at least 1"));
    }
    minutes
        .checked_mul(60)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid("too large"))
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    var(name).map_err(|_| ConfigError::Missing(name))
}

fn optional<T>(name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(name) {
        Ok(value) => parse(name, &value),
        Err(_) => Ok(default),
    }
}

fn parse<T>(name: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}
