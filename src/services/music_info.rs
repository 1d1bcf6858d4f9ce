use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Deserializer};
use std::time::Duration;
use tokio::time::{sleep, Instant};

use crate::config::RetryConfig;
use crate::error::{AppError, Result};
use crate::models::TrackInfo;

/// Date layout used by the music info API, e.g. `16.07.2006`.
pub const RELEASE_DATE_FORMAT: &str = "%d.%m.%Y";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Source of release date, lyric text and link for a track.
#[async_trait]
pub trait TrackInfoProvider: Send + Sync {
    async fn info(&self, artist: &str, title: &str) -> Result<TrackInfo>;
}

/// Client for the external music info API (`GET /info?group=..&song=..`).
#[derive(Clone)]
pub struct MusicInfoService {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(rename = "releaseDate", deserialize_with = "deserialize_release_date")]
    release_date: DateTime<Utc>,
    text: String,
    link: String,
}

enum FetchError {
    Retryable(String),
    Fatal(String),
}

impl MusicInfoService {
    pub fn new(base_url: impl Into<String>, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("track-catalog/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry,
        })
    }

    /// Single GET against the info endpoint.
    async fn fetch_once(&self, artist: &str, title: &str) -> std::result::Result<String, FetchError> {
        let url = format!("{}/info", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[("group", artist), ("song", title)])
            .send()
            .await
            .map_err(|e| FetchError::Retryable(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::BAD_REQUEST || status.is_server_error() {
            return Err(FetchError::Retryable(format!("music info API returned {}", status)));
        }
        if !status.is_success() {
            return Err(FetchError::Fatal(format!("music info API returned {}", status)));
        }

        response
            .text()
            .await
            .map_err(|e| FetchError::Retryable(e.to_string()))
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let factor = if self.retry.factor.is_finite() && self.retry.factor >= 1.0 {
            self.retry.factor
        } else {
            1.0
        };

        if current >= self.retry.max_delay {
            return self.retry.max_delay;
        }
        current.mul_f64(factor).min(self.retry.max_delay)
    }
}

#[async_trait]
impl TrackInfoProvider for MusicInfoService {
    async fn info(&self, artist: &str, title: &str) -> Result<TrackInfo> {
        let started = Instant::now();
        let mut delay = self.retry.delay;
        let mut attempt: u32 = 1;

        let body = loop {
            match self.fetch_once(artist, title).await {
                Ok(body) => break body,
                Err(FetchError::Fatal(reason)) => {
                    return Err(AppError::EnrichmentFailed(format!(
                        "info for '{}' by '{}': {}",
                        title, artist, reason
                    )));
                }
                Err(FetchError::Retryable(reason)) => {
                    if started.elapsed() + delay > self.retry.max_duration {
                        return Err(AppError::EnrichmentFailed(format!(
                            "info for '{}' by '{}' after {} attempts: {}",
                            title, artist, attempt, reason
                        )));
                    }

                    tracing::warn!(attempt, ?delay, "Music info request failed: {}", reason);
                    sleep(delay).await;
                    delay = self.next_delay(delay);
                    attempt += 1;
                }
            }
        };

        let response: InfoResponse = serde_json::from_str(&body).map_err(|e| {
            AppError::EnrichmentFailed(format!("malformed music info response: {}", e))
        })?;

        tracing::debug!(artist, title, attempt, "Fetched track info");

        Ok(TrackInfo {
            release_date: response.release_date,
            text: response.text,
            link: response.link,
        })
    }
}

/// Parses a `DD.MM.YYYY` date as midnight UTC.
pub fn parse_release_date(value: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(value.trim(), RELEASE_DATE_FORMAT).ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

fn deserialize_release_date<'de, D>(deserializer: D) -> std::result::Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_release_date(&raw)
        .ok_or_else(|| serde::de::Error::custom(format!("invalid release date '{}'", raw)))
}
