use std::env;
use std::time::Duration;

use rust_decimal::Decimal;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub order_queue_size: usize,
    pub event_buffer_size: usize,
    pub notification_queue_size: usize,
    pub policy: DispatchPolicy,
}

/// Knobs of the dispatch core that product may want to tune per deployment.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Share of the delivery fee paid to the rider.
    pub commission_rate: Decimal,
    pub tracking_code_attempts: u32,
    pub release_retry_attempts: u32,
    pub release_retry_backoff: Duration,
    pub tracking_base_url: String,
    pub default_country: String,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self {
            commission_rate: Decimal::new(70, 2),
            tracking_code_attempts: 5,
            release_retry_attempts: 5,
            release_retry_backoff: Duration::from_millis(50),
            tracking_base_url: "https://track.example.com".to_string(),
            default_country: "US".to_string(),
        }
    }
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
        let defaults = DispatchPolicy::default();

        let commission_rate: Decimal =
            parse_or_default(&lookup, "RIDER_COMMISSION_RATE", defaults.commission_rate)?;
        if commission_rate < Decimal::ZERO || commission_rate > Decimal::ONE {
            return Err(AppError::Internal(format!(
                "invalid RIDER_COMMISSION_RATE: {commission_rate} is outside 0..=1"
            )));
        }

        let policy = DispatchPolicy {
            commission_rate,
            tracking_code_attempts: parse_or_default(
                &lookup,
                "TRACKING_CODE_ATTEMPTS",
                defaults.tracking_code_attempts,
            )?
            .max(1),
            release_retry_attempts: parse_or_default(
                &lookup,
                "RELEASE_RETRY_ATTEMPTS",
                defaults.release_retry_attempts,
            )?
            .max(1),
            release_retry_backoff: Duration::from_millis(parse_or_default(
                &lookup,
                "RELEASE_RETRY_BACKOFF_MS",
                50u64,
            )?),
            tracking_base_url: lookup("TRACKING_BASE_URL")
                .unwrap_or(defaults.tracking_base_url)
                .trim_end_matches('/')
                .to_string(),
            default_country: lookup("DEFAULT_COUNTRY").unwrap_or(defaults.default_country),
        };

        Ok(Self {
            http_port: parse_or_default(&lookup, "HTTP_PORT", 3000)?,
            log_level: lookup("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            order_queue_size: parse_or_default(&lookup, "ORDER_QUEUE_SIZE", 1024)?,
            event_buffer_size: parse_or_default(&lookup, "EVENT_BUFFER_SIZE", 1024)?,
            notification_queue_size: parse_or_default(&lookup, "NOTIFICATION_QUEUE_SIZE", 1024)?,
            policy,
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
            .trim()
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        None => Ok(default),
    }
}
