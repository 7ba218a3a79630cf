//! Run modes of the batch job, wired over the collaborator traits.

use crate::cli::render::{self, ReportView};
use crate::core::config::{AppConfig, Delivery};
use crate::core::model::{
    CurrencyRates, HistorySample, PrayerTimes, WeatherSnapshot, format_stamp,
};
use crate::core::notify::{Message, Notifier};
use crate::core::source::{PrayerSource, RateSource, WeatherSource};
use crate::core::store::DocumentStore;
use crate::history::HistoryTracker;
use crate::refresh::{Refreshed, Refresher};
use anyhow::{Context, Result};
use chrono::{DateTime, Local, Timelike};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// At least one category had neither live nor cached data; nothing was
    /// written or sent.
    Aborted { missing: Vec<&'static str> },
    /// The report artifact was produced. `delivered` is `None` when delivery
    /// is disabled.
    Completed { delivered: Option<usize> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated { used_fallback: bool },
    Unavailable,
    OutsideWindow,
}

#[derive(Serialize)]
struct ReportArtifact<'a> {
    weather: &'a WeatherSnapshot,
    currency_rates: &'a CurrencyRates,
    namaz_times: &'a PrayerTimes,
    generated_at: String,
}

pub struct App<'a> {
    pub config: &'a AppConfig,
    pub store: &'a dyn DocumentStore,
    pub weather: &'a dyn WeatherSource,
    pub prayer: &'a dyn PrayerSource,
    pub rates: &'a dyn RateSource,
    pub notifier: &'a dyn Notifier,
    pub report_path: PathBuf,
}

impl App<'_> {
    fn refresher(&self) -> Refresher<'_> {
        Refresher::new(self.store, self.config.live)
    }

    fn tracker(&self) -> HistoryTracker<'_> {
        HistoryTracker::new(self.store, self.notifier, &self.config.history)
    }

    async fn refresh_weather(&self) -> Refreshed<WeatherSnapshot> {
        self.refresher()
            .refresh(|| self.weather.fetch_weather())
            .await
    }

    async fn refresh_prayer_times(&self) -> Refreshed<PrayerTimes> {
        self.refresher()
            .refresh(|| self.prayer.fetch_prayer_times())
            .await
    }

    /// Refreshes rates and feeds a live result to the history tracker.
    ///
    /// Also returns today's history as recorded by this run, or `None` when
    /// the rates were not fetched live.
    async fn refresh_rates(
        &self,
        now: DateTime<Local>,
    ) -> (Refreshed<CurrencyRates>, Option<Vec<HistorySample>>) {
        let refreshed = self.refresher().refresh(|| self.rates.fetch_rates()).await;
        let recorded = match refreshed.payload.as_ref() {
            Some(rates) if !refreshed.used_fallback => {
                Some(self.tracker().record_at(rates, now).await)
            }
            _ => None,
        };
        (refreshed, recorded)
    }

    pub async fn full_report(&self) -> ReportOutcome {
        self.full_report_at(Local::now()).await
    }

    #[instrument(name = "FullReport", skip_all)]
    pub async fn full_report_at(&self, now: DateTime<Local>) -> ReportOutcome {
        info!("Collecting report data");
        let weather = self.refresh_weather().await;
        let namaz = self.refresh_prayer_times().await;
        let (rates, recorded) = self.refresh_rates(now).await;

        let (Some(weather), Some(namaz), Some(rates)) = (
            weather.payload.as_ref(),
            namaz.payload.as_ref(),
            rates.payload.as_ref(),
        ) else {
            let missing: Vec<&'static str> = [
                ("weather", weather.is_missing()),
                ("namaz", namaz.is_missing()),
                ("currency_rates", rates.is_missing()),
            ]
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect();
            error!(?missing, "Report aborted, data unavailable even from cache");
            return ReportOutcome::Aborted { missing };
        };

        let artifact = ReportArtifact {
            weather,
            currency_rates: rates,
            namaz_times: namaz,
            generated_at: format_stamp(&now),
        };
        match write_artifact(&self.report_path, &artifact) {
            Ok(()) => info!(path = %self.report_path.display(), "JSON report saved"),
            Err(e) => error!(error = ?e, "Failed to save JSON report"),
        }

        if self.config.report.delivery == Delivery::None {
            info!("Report delivery disabled");
            return ReportOutcome::Completed { delivered: None };
        }

        let doc;
        let history = match &recorded {
            Some(history) => history.as_slice(),
            None => {
                doc = self.store.load();
                doc.history_on(&self.config.history.currency, now.date_naive())
            }
        };
        let view = ReportView {
            weather,
            namaz,
            rates,
            currencies: &self.config.providers.rates.currencies,
            monitored: &self.config.history.currency,
            operation: self.config.history.operation,
            history,
        };
        let message = Message::Html(render::full_report(&view, &now));
        let delivered = self.notifier.deliver(&message).await;
        ReportOutcome::Completed {
            delivered: Some(delivered),
        }
    }

    #[instrument(name = "UpdateNamaz", skip_all)]
    pub async fn update_namaz(&self) -> UpdateOutcome {
        let namaz = self.refresh_prayer_times().await;
        match namaz.payload {
            Some(times) => {
                info!(stamp = %times.last_upd_namaz, "Prayer times updated");
                UpdateOutcome::Updated {
                    used_fallback: namaz.used_fallback,
                }
            }
            None => {
                error!("Failed to update prayer times");
                UpdateOutcome::Unavailable
            }
        }
    }

    pub async fn update_currency(&self) -> UpdateOutcome {
        self.update_currency_at(Local::now()).await
    }

    #[instrument(name = "UpdateCurrency", skip_all)]
    pub async fn update_currency_at(&self, now: DateTime<Local>) -> UpdateOutcome {
        let window = self.config.update_window;
        if !window.contains(now.hour()) {
            info!(
                start = window.start_hour,
                end = window.end_hour,
                "Currency updates only run inside the update window"
            );
            return UpdateOutcome::OutsideWindow;
        }

        let (rates, _) = self.refresh_rates(now).await;
        match rates.payload {
            Some(_) if rates.used_fallback => {
                warn!("Rates unavailable live, cache left as is");
                UpdateOutcome::Updated {
                    used_fallback: true,
                }
            }
            Some(_) => UpdateOutcome::Updated {
                used_fallback: false,
            },
            None => {
                error!("Failed to update currency rates");
                UpdateOutcome::Unavailable
            }
        }
    }

    pub async fn send_photo(&self, path: &Path, caption: Option<String>) -> usize {
        let message = Message::Photo {
            path: path.to_path_buf(),
            caption,
        };
        self.notifier.deliver(&message).await
    }
}

fn write_artifact(path: &Path, artifact: &ReportArtifact<'_>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(artifact).context("Failed to serialize report")?;
    fs::write(path, json).with_context(|| format!("Failed to write report: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{CurrentConditions, RatePair, STALE_MARKER};
    use crate::core::source::{FetchError, FetchResult};
    use crate::core::store::Document;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct StubWeather(Option<WeatherSnapshot>);
    struct StubPrayer(Option<PrayerTimes>);

    /// Serves the queued quotes one per call, then fails.
    struct StubRates {
        queue: Mutex<Vec<CurrencyRates>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl WeatherSource for StubWeather {
        async fn fetch_weather(&self) -> FetchResult<WeatherSnapshot> {
            self.0.clone().ok_or(FetchError::Timeout)
        }
    }

    #[async_trait]
    impl PrayerSource for StubPrayer {
        async fn fetch_prayer_times(&self) -> FetchResult<PrayerTimes> {
            self.0.clone().ok_or(FetchError::Empty)
        }
    }

    #[async_trait]
    impl RateSource for StubRates {
        async fn fetch_rates(&self) -> FetchResult<CurrencyRates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut queue = self.queue.lock().unwrap();
            if queue.is_empty() {
                Err(FetchError::Malformed("no body".into()))
            } else {
                Ok(queue.remove(0))
            }
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn deliver(&self, message: &Message) -> usize {
            self.sent.lock().unwrap().push(message.clone());
            1
        }
    }

    fn weather() -> WeatherSnapshot {
        WeatherSnapshot {
            current: CurrentConditions {
                temp: 9.2,
                icon_code: "10d".to_string(),
                description: "light rain".to_string(),
            },
            forecast: vec![],
            last_upd_weather: String::new(),
        }
    }

    fn namaz() -> PrayerTimes {
        PrayerTimes {
            fajr: "06:32".to_string(),
            sunrise: "08:05".to_string(),
            dhuhr: "13:35".to_string(),
            asr: "16:32".to_string(),
            maghrib: "19:04".to_string(),
            isha: "20:31".to_string(),
            last_upd_namaz: String::new(),
        }
    }

    fn usd(buy: &str, sale: &str) -> CurrencyRates {
        let mut rates = CurrencyRates::default();
        rates.rates.insert("USD".to_string(), RatePair::new(buy, sale));
        rates
    }

    fn stub_rates(queue: Vec<CurrencyRates>) -> StubRates {
        StubRates {
            queue: Mutex::new(queue),
            calls: AtomicUsize::new(0),
        }
    }

    fn at(hour: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 10, 16, hour, 0, 0).unwrap()
    }

    struct Fixture {
        config: AppConfig,
        store: MemoryStore,
        weather: StubWeather,
        prayer: StubPrayer,
        rates: StubRates,
        notifier: RecordingNotifier,
        dir: TempDir,
    }

    impl Fixture {
        fn new(weather: Option<WeatherSnapshot>, rates: Vec<CurrencyRates>) -> Self {
            Self {
                config: AppConfig::default(),
                store: MemoryStore::new(),
                weather: StubWeather(weather),
                prayer: StubPrayer(Some(namaz())),
                rates: stub_rates(rates),
                notifier: RecordingNotifier::default(),
                dir: TempDir::new().unwrap(),
            }
        }

        fn app(&self) -> App<'_> {
            App {
                config: &self.config,
                store: &self.store,
                weather: &self.weather,
                prayer: &self.prayer,
                rates: &self.rates,
                notifier: &self.notifier,
                report_path: self.dir.path().join("report.json"),
            }
        }

        fn sent(&self) -> Vec<Message> {
            self.notifier.sent.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_full_report_sends_and_writes_artifact() {
        let fx = Fixture::new(Some(weather()), vec![usd("475.0", "480.0")]);

        let outcome = fx.app().full_report_at(at(9)).await;

        assert_eq!(outcome, ReportOutcome::Completed { delivered: Some(1) });
        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        let Message::Html(text) = &sent[0] else {
            panic!("expected a text report");
        };
        assert!(text.contains("Report for 16.10.2026 09:00"));
        assert!(text.contains("USD sale today:</b> 480.00 → 480.00"));

        let raw = fs::read_to_string(fx.dir.path().join("report.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["generated_at"], "16.10.2026 09:00:00");
        assert_eq!(json["namaz_times"]["fajr"], "06:32");
        assert_eq!(json["currency_rates"]["USD"]["buy"], "475.0");
        assert!(json.get("currency_history").is_none());

        let doc = fx.store.snapshot();
        assert!(doc.weather.is_some());
        assert_eq!(doc.history("USD").len(), 1);
    }

    #[tokio::test]
    async fn test_report_aborts_without_weather() {
        let fx = Fixture::new(None, vec![usd("475.0", "480.0")]);

        let outcome = fx.app().full_report_at(at(9)).await;

        assert_eq!(
            outcome,
            ReportOutcome::Aborted {
                missing: vec!["weather"]
            }
        );
        assert!(fx.sent().is_empty());
        assert!(!fx.dir.path().join("report.json").exists());
    }

    #[tokio::test]
    async fn test_report_uses_cache_when_live_fails() {
        let mut fx = Fixture::new(None, vec![]);
        fx.store = MemoryStore::with_document(Document {
            weather: Some(weather()),
            currency_rates: Some(usd("470.0", "474.0")),
            ..Default::default()
        });

        let outcome = fx.app().full_report_at(at(9)).await;

        assert_eq!(outcome, ReportOutcome::Completed { delivered: Some(1) });
        let Message::Html(text) = &fx.sent()[0] else {
            panic!("expected a text report");
        };
        assert!(text.contains(&format!("Exchange rates ({STALE_MARKER})")));
        // Cached rates are not history samples.
        assert!(fx.store.snapshot().history("USD").is_empty());
    }

    /// Accepts reads but fails every write.
    struct ReadOnlyStore(MemoryStore);

    impl DocumentStore for ReadOnlyStore {
        fn load(&self) -> Document {
            self.0.load()
        }

        fn save(&self, _doc: &Document) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn test_report_trend_survives_failed_store_write() {
        let fx = Fixture::new(Some(weather()), vec![usd("475.0", "480.0")]);
        let store = ReadOnlyStore(MemoryStore::new());
        let app = App {
            store: &store,
            ..fx.app()
        };

        let outcome = app.full_report_at(at(9)).await;

        assert_eq!(outcome, ReportOutcome::Completed { delivered: Some(1) });
        let Message::Html(text) = &fx.sent()[0] else {
            panic!("expected a text report");
        };
        assert!(
            text.contains("USD sale today:</b> 480.00 → 480.00"),
            "trend missing: {text}"
        );
        assert!(store.0.snapshot().history("USD").is_empty());
    }

    #[tokio::test]
    async fn test_cached_rates_do_not_show_yesterdays_trend() {
        let mut fx = Fixture::new(Some(weather()), vec![]);
        let mut doc = Document {
            currency_rates: Some(usd("470.0", "474.0")),
            last_history_update: NaiveDate::from_ymd_opt(2026, 10, 15),
            ..Default::default()
        };
        doc.currency_history.insert(
            "USD".to_string(),
            vec![HistorySample {
                timestamp: "15.10.2026 09:00:00".to_string(),
                buy: 470.0,
                sale: 474.0,
            }],
        );
        fx.store = MemoryStore::with_document(doc);

        let outcome = fx.app().full_report_at(at(9)).await;

        assert_eq!(outcome, ReportOutcome::Completed { delivered: Some(1) });
        let Message::Html(text) = &fx.sent()[0] else {
            panic!("expected a text report");
        };
        assert!(text.contains(&format!("Exchange rates ({STALE_MARKER})")));
        assert!(!text.contains("today:"), "stale trend shown: {text}");
    }

    #[tokio::test]
    async fn test_cached_rates_keep_todays_trend() {
        let mut fx = Fixture::new(Some(weather()), vec![]);
        let mut doc = Document {
            currency_rates: Some(usd("470.0", "474.0")),
            last_history_update: NaiveDate::from_ymd_opt(2026, 10, 16),
            ..Default::default()
        };
        doc.currency_history.insert(
            "USD".to_string(),
            vec![HistorySample {
                timestamp: "16.10.2026 07:00:00".to_string(),
                buy: 470.0,
                sale: 474.0,
            }],
        );
        fx.store = MemoryStore::with_document(doc);

        fx.app().full_report_at(at(9)).await;

        let Message::Html(text) = &fx.sent()[0] else {
            panic!("expected a text report");
        };
        assert!(text.contains("USD sale today:</b> 474.00 → 474.00"));
    }

    #[tokio::test]
    async fn test_delivery_disabled_only_writes_artifact() {
        let mut fx = Fixture::new(Some(weather()), vec![usd("475.0", "480.0")]);
        fx.config.report.delivery = Delivery::None;

        let outcome = fx.app().full_report_at(at(9)).await;

        assert_eq!(outcome, ReportOutcome::Completed { delivered: None });
        assert!(fx.sent().is_empty());
        assert!(fx.dir.path().join("report.json").exists());
    }

    #[tokio::test]
    async fn test_currency_update_respects_window() {
        let fx = Fixture::new(None, vec![usd("475.0", "480.0")]);

        assert_eq!(fx.app().update_currency_at(at(4)).await, UpdateOutcome::OutsideWindow);
        assert_eq!(fx.app().update_currency_at(at(16)).await, UpdateOutcome::OutsideWindow);
        assert_eq!(fx.rates.calls.load(Ordering::SeqCst), 0);

        assert_eq!(
            fx.app().update_currency_at(at(15)).await,
            UpdateOutcome::Updated {
                used_fallback: false
            }
        );
        assert_eq!(fx.rates.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_currency_updates_build_history_and_alert() {
        let fx = Fixture::new(
            None,
            vec![
                usd("475.0", "480.0"),
                usd("475.0", "480.0"),
                usd("476.0", "480.0"),
            ],
        );
        let app = fx.app();

        app.update_currency_at(at(9)).await;
        app.update_currency_at(at(10)).await;
        assert!(fx.sent().is_empty());

        app.update_currency_at(at(11)).await;
        let sent = fx.sent();
        assert_eq!(sent.len(), 1);
        let Message::Html(text) = &sent[0] else {
            panic!("expected a text alert");
        };
        assert!(text.contains("+1.00"));
        assert_eq!(fx.store.snapshot().history("USD").len(), 2);

        // Live failure: served from cache, history untouched.
        assert_eq!(
            app.update_currency_at(at(12)).await,
            UpdateOutcome::Updated {
                used_fallback: true
            }
        );
        assert_eq!(fx.store.snapshot().history("USD").len(), 2);
    }

    #[tokio::test]
    async fn test_update_namaz() {
        let fx = Fixture::new(None, vec![]);
        assert_eq!(
            fx.app().update_namaz().await,
            UpdateOutcome::Updated {
                used_fallback: false
            }
        );
        assert_eq!(fx.store.snapshot().namaz.unwrap().fajr, "06:32");

        let mut fx = Fixture::new(None, vec![]);
        fx.prayer = StubPrayer(None);
        assert_eq!(fx.app().update_namaz().await, UpdateOutcome::Unavailable);
    }
}
