pub mod app;
pub mod cli;
pub mod core;
pub mod history;
pub mod providers;
pub mod refresh;
pub mod store;

use crate::app::{App, ReportOutcome, UpdateOutcome};
use crate::core::config::AppConfig;
use crate::core::model::Operation;
use anyhow::Result;
use std::path::PathBuf;
use tracing::{debug, info, warn};

pub enum AppCommand {
    Report,
    UpdateNamaz,
    UpdateCurrency,
    SendPhoto {
        path: PathBuf,
        caption: Option<String>,
    },
}

/// Command line adjustments applied on top of the file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cache_only: bool,
    pub currency: Option<String>,
    pub operation: Option<Operation>,
}

impl Overrides {
    fn apply(&self, config: &mut AppConfig) {
        if self.cache_only {
            config.live = false;
        }
        if let Some(code) = &self.currency
            && !config.set_monitored_currency(code)
        {
            warn!(
                currency = %code,
                available = ?config.providers.rates.currencies,
                "Unknown currency, keeping {}",
                config.history.currency
            );
        }
        if let Some(operation) = self.operation {
            config.history.operation = operation;
        }
    }
}

pub fn load_config(config_path: Option<&str>, overrides: &Overrides) -> Result<AppConfig> {
    let mut config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    config.apply_env();
    overrides.apply(&mut config);
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    overrides: &Overrides,
) -> Result<()> {
    info!("Daybrief starting...");
    let config = load_config(config_path, overrides)?;

    let store = store::JsonFileStore::new(store::store_path(&config)?);
    let weather = providers::OpenWeatherProvider::new(&config.providers.weather);
    let prayer = providers::AladhanProvider::new(&config.providers.prayer);
    let rates = providers::KaspiRateProvider::new(&config.providers.rates);
    let notifier = providers::TelegramNotifier::new(&config.telegram)?;

    let app = App {
        config: &config,
        store: &store,
        weather: &weather,
        prayer: &prayer,
        rates: &rates,
        notifier: &notifier,
        report_path: store::report_path(&config)?,
    };

    match command {
        AppCommand::Report => match app.full_report().await {
            ReportOutcome::Completed {
                delivered: Some(delivered),
            } => info!(delivered, "Report finished"),
            ReportOutcome::Completed { delivered: None } => info!("Report finished"),
            // Already logged; a missing category is not a process failure.
            ReportOutcome::Aborted { .. } => {}
        },
        AppCommand::UpdateNamaz => log_update("Prayer times", app.update_namaz().await),
        AppCommand::UpdateCurrency => log_update("Currency rates", app.update_currency().await),
        AppCommand::SendPhoto { path, caption } => {
            if !path.is_file() {
                anyhow::bail!("Photo not found: {}", path.display());
            }
            let delivered = app.send_photo(&path, caption).await;
            info!(delivered, path = %path.display(), "Photo sent");
        }
    }
    Ok(())
}

fn log_update(what: &str, outcome: UpdateOutcome) {
    match outcome {
        UpdateOutcome::Updated {
            used_fallback: false,
        } => info!("{what} updated"),
        UpdateOutcome::Updated {
            used_fallback: true,
        } => warn!("{what} not updated, cached copy kept"),
        UpdateOutcome::Unavailable => warn!("{what} unavailable"),
        UpdateOutcome::OutsideWindow => debug!("{what} skipped outside the update window"),
    }
}
