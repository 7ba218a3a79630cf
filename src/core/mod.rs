//! Core domain types and collaborator abstractions

pub mod config;
pub mod log;
pub mod model;
pub mod notify;
pub mod source;
pub mod store;

// Re-export main types for cleaner imports
pub use model::{CurrencyRates, HistorySample, Operation, PrayerTimes, RatePair, WeatherSnapshot};
pub use notify::{Message, Notifier};
pub use source::{FetchError, FetchResult, PrayerSource, RateSource, WeatherSource};
pub use store::{Category, Document, DocumentStore};
