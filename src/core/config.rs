use super::model::Operation;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct WeatherProviderConfig {
    pub base_url: String,
    pub api_key: String,
    pub city_id: String,
    pub units: String,
    pub lang: String,
    pub timeout_secs: u64,
}

impl Default for WeatherProviderConfig {
    fn default() -> Self {
        WeatherProviderConfig {
            base_url: "https://api.openweathermap.org".to_string(),
            api_key: String::new(),
            city_id: "2994160".to_string(),
            units: "metric".to_string(),
            lang: "en".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PrayerProviderConfig {
    pub base_url: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Aladhan calculation method id, 3 is Muslim World League.
    pub method: u8,
    pub timeout_secs: u64,
}

impl Default for PrayerProviderConfig {
    fn default() -> Self {
        PrayerProviderConfig {
            base_url: "https://api.aladhan.com".to_string(),
            latitude: 49.1193,
            longitude: 6.1757,
            method: 3,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct RatesProviderConfig {
    pub base_url: String,
    pub currencies: Vec<String>,
    pub timeout_secs: u64,
}

impl Default for RatesProviderConfig {
    fn default() -> Self {
        RatesProviderConfig {
            base_url: "https://guide.kaspi.kz/client/api/v2/intgr/currency/rate/aggregate"
                .to_string(),
            currencies: vec!["USD".to_string(), "EUR".to_string()],
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ProvidersConfig {
    pub weather: WeatherProviderConfig,
    pub prayer: PrayerProviderConfig,
    pub rates: RatesProviderConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TelegramConfig {
    pub base_url: String,
    pub token: String,
    pub recipients: Vec<i64>,
    pub attempts: usize,
    pub retry_delay_ms: u64,
    pub timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        TelegramConfig {
            base_url: "https://api.telegram.org".to_string(),
            token: String::new(),
            recipients: Vec::new(),
            attempts: 3,
            retry_delay_ms: 2000,
            timeout_secs: 20,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// The monitored currency.
    pub currency: String,
    pub operation: Operation,
    pub limit: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        HistoryConfig {
            currency: "USD".to_string(),
            operation: Operation::Sale,
            limit: 24,
        }
    }
}

/// Local hours, both ends inclusive, during which rate-only updates may run.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct UpdateWindow {
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for UpdateWindow {
    fn default() -> Self {
        UpdateWindow {
            start_hour: 5,
            end_hour: 15,
        }
    }
}

impl UpdateWindow {
    pub fn contains(&self, hour: u32) -> bool {
        (self.start_hour..=self.end_hour).contains(&hour)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Delivery {
    #[default]
    Text,
    /// Only write the JSON report artifact.
    None,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub delivery: Delivery,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// When false every category is served from the store.
    pub live: bool,
    pub data_path: Option<String>,
    pub providers: ProvidersConfig,
    pub telegram: TelegramConfig,
    pub history: HistoryConfig,
    pub update_window: UpdateWindow,
    pub report: ReportConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            live: true,
            data_path: None,
            providers: ProvidersConfig::default(),
            telegram: TelegramConfig::default(),
            history: HistoryConfig::default(),
            update_window: UpdateWindow::default(),
            report: ReportConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!(path = %config_path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "daybrief", "daybrief")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "daybrief", "daybrief")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }

    /// Secrets are usually injected by the scheduler's environment rather
    /// than written to the config file.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OW_API_KEY").filter(|v| !v.is_empty()) {
            self.providers.weather.api_key = key;
        }
        if let Some(city) = lookup("CITY_ID").filter(|v| !v.is_empty()) {
            self.providers.weather.city_id = city;
        }
        if let Some(token) = lookup("TELEGRAM_BOT_TOKEN").filter(|v| !v.is_empty()) {
            self.telegram.token = token;
        }
        if let Some(ids) = lookup("TELEGRAM_USER_IDS") {
            let parsed: Vec<i64> = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .filter_map(|id| match id.parse() {
                    Ok(id) => Some(id),
                    Err(_) => {
                        warn!(id, "Ignoring malformed Telegram recipient id");
                        None
                    }
                })
                .collect();
            if !parsed.is_empty() {
                self.telegram.recipients = parsed;
            }
        }
    }

    /// Switches the monitored currency if it is one of the fetched ones.
    pub fn set_monitored_currency(&mut self, code: &str) -> bool {
        let code = code.to_uppercase();
        if self.providers.rates.currencies.contains(&code) {
            self.history.currency = code;
            true
        } else {
            false
        }
    }
}
