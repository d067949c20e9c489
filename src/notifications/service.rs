use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::dispatcher::NotificationDispatcher;
use crate::models::{Locale, NotificationInterval};
use crate::persistence::{PersistenceError, SubscriptionStore};
use crate::scheduler::{RecurringScheduler, TickHandler};

/// Owner of the subscription lifecycle
///
/// Every edit persists first and only then touches the scheduler, under one
/// lock, so the state file and the armed timers describe the same set of
/// subscriptions.
pub struct NotificationService {
    store: Arc<SubscriptionStore>,
    scheduler: Arc<RecurringScheduler>,
    dispatcher: Arc<NotificationDispatcher>,
    edit_lock: Mutex<()>,
}

impl NotificationService {
    pub fn new(
        store: Arc<SubscriptionStore>,
        scheduler: Arc<RecurringScheduler>,
        dispatcher: Arc<NotificationDispatcher>,
    ) -> Self {
        Self {
            store,
            scheduler,
            dispatcher,
            edit_lock: Mutex::new(()),
        }
    }

    fn handler(&self) -> Arc<dyn TickHandler> {
        self.dispatcher.clone()
    }

    /// Create or replace the subscription of a pair
    ///
    /// Returns the replaced interval. When the write fails nothing is armed
    /// and the previous subscription stays in effect.
    pub fn subscribe(
        &self,
        user_id: &str,
        asset_id: &str,
        interval: NotificationInterval,
    ) -> Result<Option<NotificationInterval>, PersistenceError> {
        let _guard = self.edit_lock.lock();

        let previous = self.store.add(user_id, asset_id, interval)?;
        self.scheduler.arm(user_id, asset_id, interval, self.handler());

        tracing::info!("✅ {} subscribed to {} every {}", user_id, asset_id, interval);
        Ok(previous)
    }

    /// Remove one subscription. Returns false when it did not exist.
    pub fn unsubscribe(&self, user_id: &str, asset_id: &str) -> Result<bool, PersistenceError> {
        let _guard = self.edit_lock.lock();

        let removed = self.store.remove(user_id, asset_id)?;
        self.scheduler.cancel(user_id, asset_id);
        self.dispatcher.forget(user_id, asset_id);

        if removed {
            tracing::info!("✅ {} unsubscribed from {}", user_id, asset_id);
        }
        Ok(removed)
    }

    /// Remove every subscription of a user in one write
    pub fn clear_all(&self, user_id: &str) -> Result<usize, PersistenceError> {
        let _guard = self.edit_lock.lock();

        let removed = self.store.clear_all(user_id)?;
        self.scheduler.cancel_user(user_id);
        self.dispatcher.forget_user(user_id);

        tracing::info!("✅ Cleared {} subscription(s) of {}", removed, user_id);
        Ok(removed)
    }

    pub fn set_language(&self, user_id: &str, locale: Locale) -> Result<(), PersistenceError> {
        self.store.set_language(user_id, locale)
    }

    /// Effective locale of a user (stored or default)
    pub fn language(&self, user_id: &str) -> Locale {
        self.dispatcher.locale_for(user_id)
    }

    pub fn list_for(&self, user_id: &str) -> BTreeMap<String, NotificationInterval> {
        self.store.list_for(user_id)
    }

    /// Start dispatching and re-arm every persisted subscription
    ///
    /// Returns the number of restored timers; 0 when already started.
    pub fn start(&self) -> usize {
        let _guard = self.edit_lock.lock();

        if !self.scheduler.start() {
            return 0;
        }

        let subscriptions = self.store.subscriptions();
        for sub in &subscriptions {
            self.scheduler
                .arm(&sub.user_id, &sub.asset_id, sub.interval, self.handler());
        }

        tracing::info!("🔄 Restored {} subscription(s)", subscriptions.len());
        subscriptions.len()
    }

    /// Cancel all timers; persisted subscriptions are kept for the next start
    pub fn stop(&self) {
        let _guard = self.edit_lock.lock();
        self.scheduler.stop();
    }

    pub fn store(&self) -> &Arc<SubscriptionStore> {
        &self.store
    }

    pub fn scheduler(&self) -> &Arc<RecurringScheduler> {
        &self.scheduler
    }

    pub fn dispatcher(&self) -> &Arc<NotificationDispatcher> {
        &self.dispatcher
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::dispatcher::tests::{harness, Harness};
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);

    fn service(h: &Harness) -> NotificationService {
        NotificationService::new(
            h.store.clone(),
            Arc::new(RecurringScheduler::new()),
            h.dispatcher.clone(),
        )
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribe_ticks_then_unsubscribe() {
        let h = harness(&[("bitcoin", 67000.0)]);
        let service = service(&h);
        service.start();

        let previous = service
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        assert_eq!(previous, None);
        settle().await;
        assert_eq!(h.transport.sent_to("42").len(), 1);

        tokio::time::sleep(15 * MINUTE).await;
        assert_eq!(h.transport.sent_to("42").len(), 2);

        assert!(service.unsubscribe("42", "bitcoin").unwrap());
        tokio::time::sleep(60 * MINUTE).await;
        assert_eq!(h.transport.sent_to("42").len(), 2);
        assert!(service.list_for("42").is_empty());
        assert_eq!(service.scheduler().armed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replacement_keeps_one_entry_and_one_timer() {
        let h = harness(&[("bitcoin", 67000.0)]);
        let service = service(&h);
        service.start();

        service
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        settle().await;
        let previous = service
            .subscribe("42", "bitcoin", NotificationInterval::Hour1)
            .unwrap();
        assert_eq!(previous, Some(NotificationInterval::Minutes15));
        settle().await;

        let listed = service.list_for("42");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed.get("bitcoin"), Some(&NotificationInterval::Hour1));
        assert_eq!(service.scheduler().armed_count(), 1);
        assert_eq!(
            service.scheduler().armed("42", "bitcoin").unwrap().interval,
            NotificationInterval::Hour1
        );

        let before = h.transport.count();
        tokio::time::sleep(45 * MINUTE).await;
        assert_eq!(h.transport.count(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_asset_does_not_block_others() {
        let h = harness(&[("ethereum", 3500.0)]);
        let service = service(&h);
        service.start();

        service
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        service
            .subscribe("42", "ethereum", NotificationInterval::Minutes15)
            .unwrap();
        settle().await;
        tokio::time::sleep(15 * MINUTE).await;

        let sent = h.transport.sent_to("42");
        let unavailable = sent.iter().filter(|m| m.text.contains("bitcoin")).count();
        let updates = sent.iter().filter(|m| m.text.contains("ETHEREUM")).count();
        assert_eq!(unavailable, 2);
        assert_eq!(updates, 2);

        // Still armed: failures never unsubscribe
        assert!(service.scheduler().armed("42", "bitcoin").is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_restores_persisted_subscriptions_once() {
        let h = harness(&[("bitcoin", 1.0), ("ethereum", 1.0)]);
        h.store
            .add("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        h.store
            .add("42", "ethereum", NotificationInterval::Hour1)
            .unwrap();
        h.store
            .add("7", "bitcoin", NotificationInterval::Hours24)
            .unwrap();

        let service = service(&h);
        assert_eq!(service.start(), 3);
        assert_eq!(service.start(), 0);
        assert_eq!(service.scheduler().armed_count(), 3);

        settle().await;
        assert_eq!(h.transport.count(), 3);

        service.stop();
        assert_eq!(service.scheduler().armed_count(), 0);
        assert_eq!(h.store.subscriptions().len(), 3);

        assert_eq!(service.start(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_rearms_subscriptions_from_state_file() {
        let h = harness(&[("bitcoin", 1.0), ("ethereum", 1.0)]);
        let before_restart = service(&h);
        before_restart.start();
        before_restart
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        before_restart
            .subscribe("42", "ethereum", NotificationInterval::Hour1)
            .unwrap();
        before_restart.set_language("42", Locale::En).unwrap();
        before_restart
            .subscribe("7", "bitcoin", NotificationInterval::Hours24)
            .unwrap();
        before_restart.stop();
        settle().await;
        let sent_before = h.transport.count();

        // Fresh process: everything is rebuilt from the file alone
        let store = Arc::new(SubscriptionStore::open(h.store.path()));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            h.fetcher.clone(),
            h.transport.clone(),
            store.clone(),
            Locale::Ru,
            Duration::from_secs(15),
        ));
        let restarted =
            NotificationService::new(store, Arc::new(RecurringScheduler::new()), dispatcher);

        assert_eq!(restarted.start(), 3);
        assert_eq!(restarted.start(), 0);
        assert_eq!(restarted.scheduler().armed_count(), 3);
        assert_eq!(
            restarted.scheduler().armed("42", "ethereum").unwrap().interval,
            NotificationInterval::Hour1
        );
        assert_eq!(restarted.language("42"), Locale::En);

        settle().await;
        assert_eq!(h.transport.count(), sent_before + 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_all_cancels_every_timer_of_user() {
        let h = harness(&[("bitcoin", 1.0), ("ethereum", 1.0)]);
        let service = service(&h);
        service.start();

        service
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();
        service
            .subscribe("42", "ethereum", NotificationInterval::Minutes30)
            .unwrap();
        service
            .subscribe("7", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();

        assert_eq!(service.clear_all("42").unwrap(), 2);
        assert!(service.list_for("42").is_empty());
        assert_eq!(service.scheduler().armed_count(), 1);
        assert!(service.scheduler().armed("7", "bitcoin").is_some());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_prior_state() {
        let h = harness(&[("bitcoin", 1.0)]);
        let service = service(&h);
        service.start();
        service
            .subscribe("42", "bitcoin", NotificationInterval::Minutes15)
            .unwrap();

        // Replace the state file's directory with a regular file
        let dir = h.store.path().parent().unwrap().to_path_buf();
        std::fs::remove_dir_all(&dir).unwrap();
        std::fs::write(&dir, b"not a directory").unwrap();

        let result = service.subscribe("42", "bitcoin", NotificationInterval::Hour1);
        assert!(result.is_err());
        assert_eq!(
            service.list_for("42").get("bitcoin"),
            Some(&NotificationInterval::Minutes15)
        );
        assert_eq!(
            service.scheduler().armed("42", "bitcoin").unwrap().interval,
            NotificationInterval::Minutes15
        );

        std::fs::remove_file(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_language_falls_back_to_default() {
        let h = harness(&[]);
        let service = service(&h);

        assert_eq!(service.language("42"), Locale::Ru);
        service.set_language("42", Locale::De).unwrap();
        assert_eq!(service.language("42"), Locale::De);
    }
}
