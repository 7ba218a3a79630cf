//! Live-or-cached refresh of a single category.

use crate::core::model::{STALE_MARKER, format_stamp};
use crate::core::source::FetchResult;
use crate::core::store::{Category, DocumentStore};
use chrono::Local;
use std::future::Future;
use tracing::{debug, error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct Refreshed<P> {
    /// `None` when neither a live fetch nor the store produced anything.
    pub payload: Option<P>,
    pub used_fallback: bool,
}

impl<P> Refreshed<P> {
    pub fn is_missing(&self) -> bool {
        self.payload.is_none()
    }
}

pub struct Refresher<'a> {
    store: &'a dyn DocumentStore,
    live: bool,
}

impl<'a> Refresher<'a> {
    pub fn new(store: &'a dyn DocumentStore, live: bool) -> Self {
        Self { store, live }
    }

    /// Fetches one category live and merges it into the store, or serves the
    /// last stored value when the fetch fails or live mode is off.
    ///
    /// Only the category's own key is replaced on a successful fetch. A
    /// fallback never writes.
    #[instrument(name = "Refresh", skip_all, fields(category = P::KEY))]
    pub async fn refresh<P, F, Fut>(&self, fetch: F) -> Refreshed<P>
    where
        P: Category,
        F: FnOnce() -> Fut,
        Fut: Future<Output = FetchResult<P>>,
    {
        if self.live {
            match fetch().await {
                Ok(payload) if !payload.is_empty() => {
                    return Refreshed {
                        payload: Some(self.merge(payload)),
                        used_fallback: false,
                    };
                }
                Ok(_) => error!("Live fetch returned an empty payload, falling back to cache"),
                Err(e) => error!(error = %e, "Live fetch failed, falling back to cache"),
            }
        } else {
            debug!("Live mode disabled, reading cache");
        }

        self.fallback()
    }

    fn merge<P: Category>(&self, mut payload: P) -> P {
        let stamp = format_stamp(&Local::now());
        *payload.stamp_mut() = stamp.clone();

        let mut doc = self.store.load();
        *P::slot(&mut doc) = Some(payload.clone());
        if !self.store.save(&doc) {
            warn!("Fresh data kept in memory only");
        }
        info!(%stamp, "Category refreshed");
        payload
    }

    fn fallback<P: Category>(&self) -> Refreshed<P> {
        let mut doc = self.store.load();
        let payload = match P::slot(&mut doc).take() {
            Some(mut cached) if !cached.is_empty() => {
                *cached.stamp_mut() = STALE_MARKER.to_string();
                warn!("Serving cached data");
                Some(cached)
            }
            _ => {
                error!("No cached data available");
                None
            }
        };

        Refreshed {
            payload,
            used_fallback: true,
        }
    }
}
