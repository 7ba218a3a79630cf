//! Intraday rate history for the monitored currency.

use crate::cli::render;
use crate::core::config::HistoryConfig;
use crate::core::model::{CurrencyRates, HistorySample, format_stamp};
use crate::core::notify::{Message, Notifier};
use crate::core::store::DocumentStore;
use chrono::{DateTime, Local};
use std::cmp::Ordering;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Increase,
    Decrease,
    Unchanged,
}

/// Movement of one side of the quote between two consecutive samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldChange {
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

impl FieldChange {
    pub fn between(previous: f64, current: f64) -> Self {
        Self {
            previous,
            current,
            delta: current - previous,
        }
    }

    pub fn direction(&self) -> Direction {
        match self.current.partial_cmp(&self.previous) {
            Some(Ordering::Greater) => Direction::Increase,
            Some(Ordering::Less) => Direction::Decrease,
            _ => Direction::Unchanged,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RateChange {
    pub currency: String,
    pub timestamp: String,
    pub buy: FieldChange,
    pub sale: FieldChange,
}

pub struct HistoryTracker<'a> {
    store: &'a dyn DocumentStore,
    notifier: &'a dyn Notifier,
    currency: String,
    limit: usize,
}

impl<'a> HistoryTracker<'a> {
    pub fn new(
        store: &'a dyn DocumentStore,
        notifier: &'a dyn Notifier,
        config: &HistoryConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            currency: config.currency.clone(),
            limit: config.limit.max(1),
        }
    }

    pub async fn record(&self, rates: &CurrencyRates) -> Vec<HistorySample> {
        self.record_at(rates, Local::now()).await
    }

    /// Appends the monitored currency's quote to today's history.
    ///
    /// The window restarts on the first record of a new local day. A quote
    /// identical to the last sample is ignored entirely. Any other quote that
    /// follows an earlier sample is announced through the notifier before it
    /// is stored.
    #[instrument(name = "RecordHistory", skip_all, fields(currency = %self.currency))]
    pub async fn record_at(
        &self,
        rates: &CurrencyRates,
        now: DateTime<Local>,
    ) -> Vec<HistorySample> {
        let mut doc = self.store.load();
        let today = now.date_naive();

        let Some(pair) = rates.get(&self.currency) else {
            debug!("Monitored currency not in this fetch");
            return doc.history_on(&self.currency, today).to_vec();
        };
        let Some((buy, sale)) = pair.parsed() else {
            warn!(buy = %pair.buy, sale = %pair.sale, "Quote is not numeric, skipping");
            return doc.history_on(&self.currency, today).to_vec();
        };

        if doc.last_history_update != Some(today) {
            info!(%today, "Starting a new history window");
            doc.currency_history.remove(&self.currency);
            doc.last_history_update = Some(today);
        }

        let timestamp = format_stamp(&now);
        let history = doc
            .currency_history
            .entry(self.currency.clone())
            .or_default();

        if let Some(last) = history.last() {
            if last.buy == buy && last.sale == sale {
                debug!(buy, sale, "Quote unchanged");
                return history.clone();
            }

            let change = RateChange {
                currency: self.currency.clone(),
                timestamp: timestamp.clone(),
                buy: FieldChange::between(last.buy, buy),
                sale: FieldChange::between(last.sale, sale),
            };
            info!(
                buy_delta = change.buy.delta,
                sale_delta = change.sale.delta,
                "Rate moved"
            );
            let message = Message::Html(render::rate_change(&change));
            if self.notifier.deliver(&message).await == 0 {
                warn!("Rate change notification reached nobody");
            }
        }

        history.push(HistorySample {
            timestamp,
            buy,
            sale,
        });
        if history.len() > self.limit {
            let excess = history.len() - self.limit;
            history.drain(..excess);
        }
        let snapshot = history.clone();

        self.store.save(&doc);
        snapshot
    }
}
