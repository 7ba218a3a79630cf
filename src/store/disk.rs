use crate::core::store::{Document, DocumentStore};
use anyhow::{Context, Result};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error};

/// Keeps the [`Document`] as one indented JSON file.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Document> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Store file absent, starting empty");
                return Ok(Document::default());
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read store: {}", self.path.display()));
            }
        };

        if content.trim().is_empty() {
            return Ok(Document::default());
        }

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse store: {}", self.path.display()))
    }

    fn write(&self, doc: &Document) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(doc).context("Failed to serialize store")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write store: {}", self.path.display()))
    }
}

impl DocumentStore for JsonFileStore {
    fn load(&self) -> Document {
        match self.read() {
            Ok(doc) => doc,
            Err(e) => {
                error!(error = ?e, "Store unreadable, continuing with an empty document");
                Document::default()
            }
        }
    }

    fn save(&self, doc: &Document) -> bool {
        match self.write(doc) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Store saved");
                true
            }
            Err(e) => {
                error!(error = ?e, "Failed to persist store");
                false
            }
        }
    }
}
