use crate::core::store::{Document, DocumentStore};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// In-memory store, used when nothing should touch the disk.
#[derive(Default)]
pub struct MemoryStore {
    doc: Mutex<Document>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
            saves: AtomicUsize::new(0),
        }
    }

    /// Number of completed `save` calls.
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn snapshot(&self) -> Document {
        self.load()
    }
}

impl DocumentStore for MemoryStore {
    fn load(&self) -> Document {
        self.doc
            .lock()
            .map(|doc| doc.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    fn save(&self, doc: &Document) -> bool {
        let mut guard = self
            .doc
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = doc.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        debug!("Memory store PUT");
        true
    }
}
