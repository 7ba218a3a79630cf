//! Typed payloads for the three report categories and the currency history.

use chrono::{DateTime, Local};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Format used for every `last_upd_*` stamp and history sample timestamp.
pub const TIMESTAMP_FORMAT: &str = "%d.%m.%Y %H:%M:%S";

/// Stamp written over a cached payload when it is served without a fresh fetch.
pub const STALE_MARKER: &str = "from cache, no fresh date";

pub fn format_stamp(at: &DateTime<Local>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp: f64,
    pub icon_code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    pub day_name: String,
    /// Signed, rounded temperature such as `+12` or `-3`.
    pub temp: String,
    pub icon_code: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub current: CurrentConditions,
    /// Up to three upcoming days, soonest first.
    #[serde(default)]
    pub forecast: Vec<ForecastDay>,
    #[serde(default)]
    pub last_upd_weather: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrayerTimes {
    pub fajr: String,
    pub sunrise: String,
    pub dhuhr: String,
    pub asr: String,
    pub maghrib: String,
    pub isha: String,
    #[serde(default)]
    pub last_upd_namaz: String,
}

impl PrayerTimes {
    /// Display name and time for each prayer, in daily order.
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("Fajr", &self.fajr),
            ("Sunrise", &self.sunrise),
            ("Dhuhr", &self.dhuhr),
            ("Asr", &self.asr),
            ("Maghrib", &self.maghrib),
            ("Isha", &self.isha),
        ]
    }
}

/// Buy and sale quotes as the upstream reports them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatePair {
    #[serde(deserialize_with = "numeric_string")]
    pub buy: String,
    #[serde(deserialize_with = "numeric_string")]
    pub sale: String,
}

impl RatePair {
    pub fn new(buy: impl Into<String>, sale: impl Into<String>) -> Self {
        Self {
            buy: buy.into(),
            sale: sale.into(),
        }
    }

    /// Both quotes parsed as finite numbers, `None` when either is not.
    pub fn parsed(&self) -> Option<(f64, f64)> {
        Some((quote(&self.buy)?, quote(&self.sale)?))
    }
}

fn quote(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CurrencyRates {
    #[serde(flatten)]
    pub rates: BTreeMap<String, RatePair>,
    #[serde(default)]
    pub last_upd_currency: String,
}

impl CurrencyRates {
    pub fn get(&self, code: &str) -> Option<&RatePair> {
        self.rates.get(code)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistorySample {
    pub timestamp: String,
    pub buy: f64,
    pub sale: f64,
}

/// Which side of the quote is highlighted in reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Buy,
    #[default]
    Sale,
}

impl Operation {
    pub fn pick(&self, sample: &HistorySample) -> f64 {
        match self {
            Operation::Buy => sample.buy,
            Operation::Sale => sample.sale,
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Buy => write!(f, "buy"),
            Operation::Sale => write!(f, "sale"),
        }
    }
}

// Kaspi has served quotes both as JSON numbers and as strings.
fn numeric_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumOrStr {
        Num(serde_json::Number),
        Str(String),
    }

    Ok(match NumOrStr::deserialize(deserializer)? {
        NumOrStr::Num(n) => n.to_string(),
        NumOrStr::Str(s) => s,
    })
}
