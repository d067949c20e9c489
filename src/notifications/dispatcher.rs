use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use utoipa::ToSchema;

use crate::formatting;
use crate::market_data::SnapshotFetcher;
use crate::models::{Locale, PairKey};
use crate::persistence::SubscriptionStore;
use crate::scheduler::TickHandler;
use crate::transport::{ChatTransport, DeliveryError, MessageFormat};

/// Tick body: fetch, render, send
///
/// Failures never escape `on_tick`. A failed fetch turns into a short notice
/// for the user and the next tick tries again; a failed delivery is logged.
pub struct NotificationDispatcher {
    fetcher: Arc<SnapshotFetcher>,
    transport: Arc<dyn ChatTransport>,
    store: Arc<SubscriptionStore>,
    default_locale: Locale,
    /// Upper bound for a single `send_message` call
    send_timeout: Duration,
    /// Last delivered price per pair, for the "since last update" line
    last_prices: DashMap<PairKey, f64>,
    ticks: AtomicU64,
    delivered: AtomicU64,
    unavailable: AtomicU64,
    delivery_failures: AtomicU64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct DispatcherStats {
    pub ticks: u64,
    /// Market updates delivered
    pub delivered: u64,
    /// "Data unavailable" notices produced by failed fetches
    pub unavailable: u64,
    pub delivery_failures: u64,
}

impl NotificationDispatcher {
    pub fn new(
        fetcher: Arc<SnapshotFetcher>,
        transport: Arc<dyn ChatTransport>,
        store: Arc<SubscriptionStore>,
        default_locale: Locale,
        send_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            transport,
            store,
            default_locale,
            send_timeout,
            last_prices: DashMap::new(),
            ticks: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            unavailable: AtomicU64::new(0),
            delivery_failures: AtomicU64::new(0),
        }
    }

    pub fn default_locale(&self) -> Locale {
        self.default_locale
    }

    /// Stored locale of the user, or the configured default
    pub fn locale_for(&self, user_id: &str) -> Locale {
        self.store.language(user_id).unwrap_or(self.default_locale)
    }

    /// Drop the remembered price of an unsubscribed pair
    pub fn forget(&self, user_id: &str, asset_id: &str) {
        self.last_prices.remove(&PairKey::new(user_id, asset_id));
    }

    pub fn forget_user(&self, user_id: &str) {
        self.last_prices.retain(|key, _| key.user_id != user_id);
    }

    pub fn last_price(&self, user_id: &str, asset_id: &str) -> Option<f64> {
        self.last_prices
            .get(&PairKey::new(user_id, asset_id))
            .map(|price| *price)
    }

    pub fn stats(&self) -> DispatcherStats {
        DispatcherStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
            delivery_failures: self.delivery_failures.load(Ordering::Relaxed),
        }
    }

    /// Send one message; returns whether the transport accepted it
    async fn deliver(&self, user_id: &str, text: &str, format: MessageFormat) -> bool {
        let result = match tokio::time::timeout(
            self.send_timeout,
            self.transport.send_message(user_id, text, format),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Timeout(self.send_timeout)),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                self.delivery_failures.fetch_add(1, Ordering::Relaxed);
                if e.is_permanent() {
                    tracing::warn!("⚠️  Delivery to {} rejected permanently: {}", user_id, e);
                } else {
                    tracing::warn!("⚠️  Delivery to {} failed: {}", user_id, e);
                }
                false
            }
        }
    }
}

#[async_trait::async_trait]
impl TickHandler for NotificationDispatcher {
    async fn on_tick(&self, user_id: &str, asset_id: &str) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
        let locale = self.locale_for(user_id);

        let snapshot = match self.fetcher.get(asset_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("⚠️  No data for {} (user {}): {}", asset_id, user_id, e);
                self.unavailable.fetch_add(1, Ordering::Relaxed);
                let notice = formatting::render_unavailable(locale, asset_id);
                self.deliver(user_id, &notice, MessageFormat::Plain).await;
                return;
            }
        };

        let key = PairKey::new(user_id, asset_id);
        let mut text = formatting::render(&snapshot, locale);
        let previous = self.last_price(user_id, asset_id);
        if let (Some(previous), Some(current)) = (previous, snapshot.price) {
            if let Some(line) = formatting::render_price_change(locale, previous, current) {
                text.push_str("\n\n");
                text.push_str(&line);
            }
        }

        if self.deliver(user_id, &text, MessageFormat::Html).await {
            self.delivered.fetch_add(1, Ordering::Relaxed);
            if let Some(price) = snapshot.price {
                self.last_prices.insert(key, price);
            }
            tracing::debug!("📨 Delivered {} update to {}", asset_id, user_id);
        }
    }
}
