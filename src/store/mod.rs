pub mod disk;
pub mod memory;

pub use disk::JsonFileStore;
pub use memory::MemoryStore;

use crate::core::config::AppConfig;
use anyhow::Result;
use std::path::PathBuf;

pub const STORE_FILE: &str = "store.json";
pub const REPORT_FILE: &str = "report.json";

/// Location of the store document for this configuration.
pub fn store_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(config.default_data_path()?.join(STORE_FILE))
}

/// Location of the generated JSON report artifact.
pub fn report_path(config: &AppConfig) -> Result<PathBuf> {
    Ok(config.default_data_path()?.join(REPORT_FILE))
}
