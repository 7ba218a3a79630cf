//! The persisted store document and the abstractions the pipeline uses to read
//! and replace it.

use super::model::{CurrencyRates, HistorySample, PrayerTimes, WeatherSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use tracing::warn;

/// The whole store, read and written as one JSON object.
///
/// Each known key is decoded on its own: a category that cannot be decoded is
/// logged and treated as missing instead of failing the load. Unknown keys are
/// carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub weather: Option<WeatherSnapshot>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub namaz: Option<PrayerTimes>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub currency_rates: Option<CurrencyRates>,
    #[serde(
        default,
        deserialize_with = "lenient_or_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub currency_history: BTreeMap<String, Vec<HistorySample>>,
    #[serde(
        default,
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_history_update: Option<NaiveDate>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Document {
    pub fn history(&self, code: &str) -> &[HistorySample] {
        self.currency_history
            .get(code)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Samples of `code` recorded on `day`. A window left over from an
    /// earlier day reads as empty.
    pub fn history_on(&self, code: &str, day: NaiveDate) -> &[HistorySample] {
        if self.last_history_update == Some(day) {
            self.history(code)
        } else {
            &[]
        }
    }
}

fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(value.and_then(|v| match serde_json::from_value(v) {
        Ok(decoded) => Some(decoded),
        Err(e) => {
            warn!(
                kind = std::any::type_name::<T>(),
                error = %e,
                "Discarding undecodable store entry"
            );
            None
        }
    }))
}

fn lenient_or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    Ok(lenient(deserializer)?.unwrap_or_default())
}

/// A payload that lives under its own top-level key of the [`Document`].
pub trait Category: Clone + Send + Sync + 'static {
    const KEY: &'static str;

    fn slot(doc: &mut Document) -> &mut Option<Self>;

    /// The `last_upd_*` field of this payload.
    fn stamp_mut(&mut self) -> &mut String;

    fn is_empty(&self) -> bool;
}

impl Category for WeatherSnapshot {
    const KEY: &'static str = "weather";

    fn slot(doc: &mut Document) -> &mut Option<Self> {
        &mut doc.weather
    }

    fn stamp_mut(&mut self) -> &mut String {
        &mut self.last_upd_weather
    }

    fn is_empty(&self) -> bool {
        self.current.icon_code.is_empty() && self.forecast.is_empty()
    }
}

impl Category for PrayerTimes {
    const KEY: &'static str = "namaz";

    fn slot(doc: &mut Document) -> &mut Option<Self> {
        &mut doc.namaz
    }

    fn stamp_mut(&mut self) -> &mut String {
        &mut self.last_upd_namaz
    }

    fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, time)| time.is_empty())
    }
}

impl Category for CurrencyRates {
    const KEY: &'static str = "currency_rates";

    fn slot(doc: &mut Document) -> &mut Option<Self> {
        &mut doc.currency_rates
    }

    fn stamp_mut(&mut self) -> &mut String {
        &mut self.last_upd_currency
    }

    fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }
}

/// Whole-document persistence. Neither operation fails from the caller's point
/// of view: `load` falls back to an empty document and `save` logs errors.
pub trait DocumentStore: Send + Sync {
    fn load(&self) -> Document;

    /// Returns whether the document reached the backing storage.
    fn save(&self, doc: &Document) -> bool;
}
