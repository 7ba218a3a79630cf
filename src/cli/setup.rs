//! First-run helper that drops the commented example config in place.

use crate::core::config::AppConfig;
use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;
use tracing::info;

/// Every key at its default value, with the provider, Telegram, history and
/// update window sections documented inline.
pub const EXAMPLE_CONFIG: &str = include_str!("../../docs/example_config.yaml");

/// Writes the example config to the platform config dir, where the report
/// and update commands look for it when `--config-path` is not given.
pub fn setup() -> Result<()> {
    setup_at_path(AppConfig::default_config_path()?)
}

/// Refuses to overwrite an existing file: it may hold a bot token and
/// recipient ids.
pub fn setup_at_path<P: AsRef<Path>>(path: P) -> Result<()> {
    let path = path.as_ref();
    if path.exists() {
        bail!("Configuration file already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    fs::write(path, EXAMPLE_CONFIG)
        .with_context(|| format!("Failed to write example config to {}", path.display()))?;

    info!(path = %path.display(), "Example configuration written");
    info!("Set OW_API_KEY, TELEGRAM_BOT_TOKEN and TELEGRAM_USER_IDS or fill in the file");
    Ok(())
}
