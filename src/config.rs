use std::env;

use crate::engine::selection::PolicyKind;
use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub notification_queue_size: usize,
    pub topic_buffer_size: usize,
    pub selection_policy: PolicyKind,
    pub base_fee_cents: u64,
    pub per_km_fee_cents: u64,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub reconnect_max_attempts: u32,
    pub reconnect_stable_after_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            notification_queue_size: 1024,
            topic_buffer_size: 256,
            selection_policy: PolicyKind::Scored,
            base_fee_cents: 250,
            per_km_fee_cents: 80,
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 30_000,
            reconnect_max_attempts: 8,
            reconnect_stable_after_ms: 10_000,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT") {
            Ok(raw) => parse_log_format(&raw)?,
            Err(_) => defaults.log_format,
        };

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            notification_queue_size: parse_or_default(
                "NOTIFICATION_QUEUE_SIZE",
                defaults.notification_queue_size,
            )?,
            topic_buffer_size: parse_or_default("TOPIC_BUFFER_SIZE", defaults.topic_buffer_size)?,
            selection_policy: parse_or_default("SELECTION_POLICY", defaults.selection_policy)?,
            base_fee_cents: parse_or_default("BASE_FEE_CENTS", defaults.base_fee_cents)?,
            per_km_fee_cents: parse_or_default("PER_KM_FEE_CENTS", defaults.per_km_fee_cents)?,
            reconnect_initial_delay_ms: parse_or_default(
                "RECONNECT_INITIAL_DELAY_MS",
                defaults.reconnect_initial_delay_ms,
            )?,
            reconnect_max_delay_ms: parse_or_default(
                "RECONNECT_MAX_DELAY_MS",
                defaults.reconnect_max_delay_ms,
            )?,
            reconnect_max_attempts: parse_or_default(
                "RECONNECT_MAX_ATTEMPTS",
                defaults.reconnect_max_attempts,
            )?,
            reconnect_stable_after_ms: parse_or_default(
                "RECONNECT_STABLE_AFTER_MS",
                defaults.reconnect_stable_after_ms,
            )?,
        })
        .and_then(Self::validated)
    }

    fn validated(self) -> Result<Self, AppError> {
        if self.notification_queue_size == 0 || self.topic_buffer_size == 0 {
            return Err(AppError::Internal(
                "queue and topic sizes must be > 0".to_string(),
            ));
        }
        if self.reconnect_initial_delay_ms > self.reconnect_max_delay_ms {
            return Err(AppError::Internal(
                "RECONNECT_INITIAL_DELAY_MS must not exceed RECONNECT_MAX_DELAY_MS".to_string(),
            ));
        }
        Ok(self)
    }
}

fn parse_log_format(raw: &str) -> Result<LogFormat, AppError> {
    match raw.to_ascii_lowercase().as_str() {
        "compact" => Ok(LogFormat::Compact),
        "json" => Ok(LogFormat::Json),
        other => Err(AppError::Internal(format!(
            "invalid LOG_FORMAT: {other}, expected compact/json"
        ))),
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, LogFormat, parse_log_format};

    #[test]
    fn log_format_is_case_insensitive() {
        assert_eq!(parse_log_format("JSON").unwrap(), LogFormat::Json);
        assert_eq!(parse_log_format("compact").unwrap(), LogFormat::Compact);
        assert!(parse_log_format("pretty").is_err());
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let config = Config {
            reconnect_initial_delay_ms: 10_000,
            reconnect_max_delay_ms: 1_000,
            ..Config::default()
        };
        assert!(config.validated().is_err());
    }
}
