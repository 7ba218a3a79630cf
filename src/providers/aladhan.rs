use super::util::{build_url, decode_json, http_client};
use crate::core::config::PrayerProviderConfig;
use crate::core::model::PrayerTimes;
use crate::core::source::{FetchError, FetchResult, PrayerSource};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

#[derive(Debug, Deserialize)]
struct TimingsResponse {
    data: TimingsData,
}

#[derive(Debug, Deserialize)]
struct TimingsData {
    timings: Timings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct Timings {
    fajr: String,
    sunrise: String,
    dhuhr: String,
    asr: String,
    maghrib: String,
    isha: String,
}

pub struct AladhanProvider {
    config: PrayerProviderConfig,
}

impl AladhanProvider {
    pub fn new(config: &PrayerProviderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

// Some calculation methods append a zone, e.g. "05:12 (CEST)".
fn clock(raw: String) -> String {
    match raw.split_once(' ') {
        Some((time, _)) => time.to_string(),
        None => raw,
    }
}

#[async_trait]
impl PrayerSource for AladhanProvider {
    #[instrument(
        name = "AladhanFetch",
        skip(self),
        fields(lat = self.config.latitude, lon = self.config.longitude)
    )]
    async fn fetch_prayer_times(&self) -> FetchResult<PrayerTimes> {
        let client = http_client(Duration::from_secs(self.config.timeout_secs))?;
        let url = build_url(
            &self.config.base_url,
            "/v1/timings",
            &[
                ("latitude", self.config.latitude.to_string()),
                ("longitude", self.config.longitude.to_string()),
                ("method", self.config.method.to_string()),
            ],
        )?;
        debug!("Requesting prayer timings");

        let response: TimingsResponse = decode_json(client.get(url).send().await?).await?;
        let t = response.data.timings;
        let times = PrayerTimes {
            fajr: clock(t.fajr),
            sunrise: clock(t.sunrise),
            dhuhr: clock(t.dhuhr),
            asr: clock(t.asr),
            maghrib: clock(t.maghrib),
            isha: clock(t.isha),
            last_upd_namaz: String::new(),
        };

        if times.entries().iter().all(|(_, time)| time.is_empty()) {
            return Err(FetchError::Empty);
        }
        Ok(times)
    }
}
