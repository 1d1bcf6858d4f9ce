use anyhow::{Context, Result};
use serde::Deserialize;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub music_info_base_url: String,
    /// Upper bound for one service operation, including the lookup call.
    pub request_timeout: Duration,
    pub retry: RetryConfig,
}

/// Backoff policy for calls to the music info API.
#[derive(Debug, Clone, Deserialize)]
pub struct RetryConfig {
    pub delay: Duration,
    pub max_delay: Duration,
    pub max_duration: Duration,
    pub factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            max_duration: Duration::from_millis(10_000),
            factor: 2.0,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = RetryConfig::default();

        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .context("DATABASE_URL must be set")?,
            server_host: env::var("SERVER_HOST")
                .unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            music_info_base_url: env::var("MUSIC_INFO_BASE_URL")
                .context("MUSIC_INFO_BASE_URL must be set")?,
            request_timeout: Duration::from_secs(
                env_or("REQUEST_TIMEOUT_SECS", 15)
                    .context("REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            ),
            retry: RetryConfig {
                delay: Duration::from_millis(
                    env_or("GATEWAY_RETRY_DELAY_MS", defaults.delay.as_millis() as u64)
                        .context("GATEWAY_RETRY_DELAY_MS must be a number of milliseconds")?,
                ),
                max_delay: Duration::from_millis(
                    env_or("GATEWAY_RETRY_MAX_DELAY_MS", defaults.max_delay.as_millis() as u64)
                        .context("GATEWAY_RETRY_MAX_DELAY_MS must be a number of milliseconds")?,
                ),
                max_duration: Duration::from_millis(
                    env_or(
                        "GATEWAY_RETRY_MAX_DURATION_MS",
                        defaults.max_duration.as_millis() as u64,
                    )
                    .context("GATEWAY_RETRY_MAX_DURATION_MS must be a number of milliseconds")?,
                ),
                factor: env_or("GATEWAY_RETRY_FACTOR", defaults.factor)
                    .context("GATEWAY_RETRY_FACTOR must be a number")?,
            },
        })
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => Ok(raw.trim().parse()?),
        Err(_) => Ok(default),
    }
}
