//! Upstream data source abstractions

use super::model::{CurrencyRates, PrayerTimes, WeatherSnapshot};
use async_trait::async_trait;
use thiserror::Error;

/// Every way a live fetch can fail. Adapters never surface anything else.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("request failed: {0}")]
    Transport(reqwest::Error),

    #[error("upstream answered with HTTP {0}")]
    Status(reqwest::StatusCode),

    #[error("malformed upstream response: {0}")]
    Malformed(String),

    #[error("upstream returned no usable data")]
    Empty,

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout
        } else if e.is_decode() {
            FetchError::Malformed(e.to_string())
        } else {
            FetchError::Transport(e)
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(e: serde_json::Error) -> Self {
        FetchError::Malformed(e.to_string())
    }
}

pub type FetchResult<T> = std::result::Result<T, FetchError>;

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn fetch_weather(&self) -> FetchResult<WeatherSnapshot>;
}

#[async_trait]
pub trait PrayerSource: Send + Sync {
    async fn fetch_prayer_times(&self) -> FetchResult<PrayerTimes>;
}

#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self) -> FetchResult<CurrencyRates>;
}
