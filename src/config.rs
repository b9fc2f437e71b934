use std::env;

use crate::engine::formatter::Locale;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub countdown_refresh_secs: u64,
    pub event_buffer_size: usize,
    pub locale: Locale,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let countdown_refresh_secs: u64 = parse_or_default(&lookup, "COUNTDOWN_REFRESH_SECS", 60)?;
        if countdown_refresh_secs == 0 {
            return Err(AppError::Internal(
                "invalid COUNTDOWN_REFRESH_SECS: must be > 0".to_string(),
            ));
        }

        let event_buffer_size: usize = parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?;
        if event_buffer_size == 0 {
            return Err(AppError::Internal(
                "invalid EVENT_BUFFER_SIZE: must be > 0".to_string(),
            ));
        }

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            countdown_refresh_secs,
            event_buffer_size,
            locale: parse_or_default(&lookup, "DEADLINE_LOCALE", Locale::De)?,
        })
    }
}

fn parse_or_default<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
