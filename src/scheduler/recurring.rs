use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use utoipa::ToSchema;

use super::timer::{ArmedTimer, ArmedTimerInfo, PairGates, TimerContext};
use super::TickHandler;
use crate::models::{NotificationInterval, PairKey};

/// Registry of armed timers, at most one per `(user, asset)` pair
pub struct RecurringScheduler {
    timers: DashMap<PairKey, ArmedTimer>,
    /// Gate shared by every timer task; ticks only start while `true`
    running: watch::Sender<bool>,
    started: AtomicBool,
    total_ticks: Arc<AtomicU64>,
    /// Serializes ticks of one pair across re-arms
    gates: PairGates,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SchedulerStats {
    pub running: bool,
    pub armed: usize,
    pub total_ticks: u64,
}

impl RecurringScheduler {
    pub fn new() -> Self {
        let (running, _) = watch::channel(false);

        Self {
            timers: DashMap::new(),
            running,
            started: AtomicBool::new(false),
            total_ticks: Arc::new(AtomicU64::new(0)),
            gates: PairGates::default(),
        }
    }

    /// Arm a timer for the pair, replacing any existing one
    ///
    /// Returns the interval of the replaced timer. The old timer is canceled
    /// before this returns, so the pair never has two live timers.
    pub fn arm(
        &self,
        user_id: &str,
        asset_id: &str,
        interval: NotificationInterval,
        handler: Arc<dyn TickHandler>,
    ) -> Option<NotificationInterval> {
        let key = PairKey::new(user_id, asset_id);
        let timer = ArmedTimer::spawn(
            key.clone(),
            interval,
            TimerContext {
                running: self.running.subscribe(),
                handler,
                total_ticks: Arc::clone(&self.total_ticks),
                gates: Arc::clone(&self.gates),
            },
        );
        let id = timer.id;

        let replaced = self.timers.insert(key.clone(), timer).map(|old| {
            old.cancel();
            old.interval
        });

        match replaced {
            Some(previous) => tracing::info!(
                "🔁 Re-armed {} ({} → {}, timer {})",
                key,
                previous,
                interval,
                id
            ),
            None => tracing::info!("⏰ Armed {} every {} (timer {})", key, interval, id),
        }

        replaced
    }

    /// Cancel the pair's timer. Returns false when nothing was armed.
    pub fn cancel(&self, user_id: &str, asset_id: &str) -> bool {
        match self.timers.remove(&PairKey::new(user_id, asset_id)) {
            Some((key, timer)) => {
                timer.cancel();
                tracing::info!("🛑 Canceled {} (timer {})", key, timer.id);
                true
            }
            None => false,
        }
    }

    /// Cancel every timer of one user
    pub fn cancel_user(&self, user_id: &str) -> usize {
        let mut canceled = 0;
        self.timers.retain(|key, timer| {
            if key.user_id == user_id {
                timer.cancel();
                canceled += 1;
                false
            } else {
                true
            }
        });

        if canceled > 0 {
            tracing::info!("🛑 Canceled {} timer(s) of user {}", canceled, user_id);
        }
        canceled
    }

    /// Open the dispatch gate
    ///
    /// Returns true only on the transition from stopped to started, which is
    /// the caller's signal to restore persisted subscriptions.
    pub fn start(&self) -> bool {
        if self
            .started
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return false;
        }

        self.running.send_replace(true);
        tracing::info!("▶️  Scheduler started");
        true
    }

    /// Cancel every timer and close the gate
    pub fn stop(&self) {
        self.running.send_replace(false);

        let mut canceled = 0;
        self.timers.retain(|_, timer| {
            timer.cancel();
            canceled += 1;
            false
        });

        self.started.store(false, Ordering::Release);
        tracing::info!("⏹️  Scheduler stopped ({} timer(s) canceled)", canceled);
    }

    pub fn is_running(&self) -> bool {
        *self.running.borrow()
    }

    pub fn armed(&self, user_id: &str, asset_id: &str) -> Option<ArmedTimerInfo> {
        self.timers
            .get(&PairKey::new(user_id, asset_id))
            .map(|timer| timer.info())
    }

    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    /// Every armed timer, ordered by pair
    pub fn armed_timers(&self) -> Vec<ArmedTimerInfo> {
        let mut timers: Vec<ArmedTimerInfo> =
            self.timers.iter().map(|entry| entry.value().info()).collect();
        timers.sort_by(|a, b| (&a.user_id, &a.asset_id).cmp(&(&b.user_id, &b.asset_id)));
        timers
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            running: self.is_running(),
            armed: self.armed_count(),
            total_ticks: self.total_ticks.load(Ordering::Relaxed),
        }
    }
}

impl Default for RecurringScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RecurringScheduler {
    fn drop(&mut self) {
        for timer in self.timers.iter() {
            timer.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const MINUTE: Duration = Duration::from_secs(60);

    #[derive(Default)]
    struct RecordingHandler {
        ticks: Mutex<Vec<(String, String)>>,
    }

    impl RecordingHandler {
        fn count_for(&self, user_id: &str, asset_id: &str) -> usize {
            self.ticks
                .lock()
                .iter()
                .filter(|(u, a)| u == user_id && a == asset_id)
                .count()
        }

        fn total(&self) -> usize {
            self.ticks.lock().len()
        }
    }

    #[async_trait::async_trait]
    impl TickHandler for RecordingHandler {
        async fn on_tick(&self, user_id: &str, asset_id: &str) {
            self.ticks
                .lock()
                .push((user_id.to_string(), asset_id.to_string()));
        }
    }

    /// Sleeps longer than the interval and tracks overlapping calls
    #[derive(Default)]
    struct SlowHandler {
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TickHandler for SlowHandler {
        async fn on_tick(&self, _user_id: &str, _asset_id: &str) {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(20 * MINUTE).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct PanicOnceHandler {
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TickHandler for PanicOnceHandler {
        async fn on_tick(&self, _user_id: &str, _asset_id: &str) {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                panic!("first tick blows up");
            }
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_immediately_then_every_period() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        assert!(scheduler.start());
        settle().await;
        assert_eq!(handler.count_for("42", "bitcoin"), 1);

        tokio::time::sleep(15 * MINUTE).await;
        assert_eq!(handler.count_for("42", "bitcoin"), 2);

        tokio::time::sleep(15 * MINUTE).await;
        assert_eq!(handler.count_for("42", "bitcoin"), 3);
        assert_eq!(scheduler.stats().total_ticks, 3);
        assert_eq!(scheduler.armed("42", "bitcoin").unwrap().ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_ticks_before_start() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        tokio::time::sleep(MINUTE).await;
        assert_eq!(handler.total(), 0);
        assert!(!scheduler.is_running());

        assert!(scheduler.start());
        assert!(!scheduler.start());
        settle().await;
        assert_eq!(handler.total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_double_arm_keeps_single_timer() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.start();

        let first =
            scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        assert_eq!(first, None);
        settle().await;

        let replaced =
            scheduler.arm("42", "bitcoin", NotificationInterval::Hour1, handler.clone());
        assert_eq!(replaced, Some(NotificationInterval::Minutes15));
        settle().await;

        // One immediate tick from each arm
        assert_eq!(handler.total(), 2);
        assert_eq!(scheduler.armed_count(), 1);
        assert_eq!(
            scheduler.armed("42", "bitcoin").unwrap().interval,
            NotificationInterval::Hour1
        );

        // The 15m timer is gone
        tokio::time::sleep(30 * MINUTE).await;
        assert_eq!(handler.total(), 2);

        tokio::time::sleep(30 * MINUTE).await;
        assert_eq!(handler.total(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_ticks() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        settle().await;
        assert_eq!(handler.total(), 1);

        assert!(scheduler.cancel("42", "bitcoin"));
        assert!(!scheduler.cancel("42", "bitcoin"));
        assert!(scheduler.armed("42", "bitcoin").is_none());

        tokio::time::sleep(60 * MINUTE).await;
        assert_eq!(handler.total(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_user_leaves_other_users() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        scheduler.arm("42", "ethereum", NotificationInterval::Minutes15, handler.clone());
        scheduler.arm("7", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        settle().await;

        assert_eq!(scheduler.cancel_user("42"), 2);
        assert_eq!(scheduler.armed_count(), 1);

        tokio::time::sleep(15 * MINUTE).await;
        assert_eq!(handler.count_for("42", "bitcoin"), 1);
        assert_eq!(handler.count_for("42", "ethereum"), 1);
        assert_eq!(handler.count_for("7", "bitcoin"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_all_and_allows_restart() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(RecordingHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        scheduler.arm("7", "ethereum", NotificationInterval::Hour1, handler.clone());
        settle().await;
        assert_eq!(handler.total(), 2);

        scheduler.stop();
        assert_eq!(scheduler.armed_count(), 0);
        assert!(!scheduler.stats().running);

        tokio::time::sleep(60 * MINUTE).await;
        assert_eq!(handler.total(), 2);

        assert!(scheduler.start());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_handler_never_overlaps_itself() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(SlowHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        tokio::time::sleep(90 * MINUTE).await;

        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
        // Each call takes 20 minutes, so ticks are spaced by the handler
        assert!(handler.calls.load(Ordering::SeqCst) <= 5);
        assert!(handler.calls.load(Ordering::SeqCst) >= 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rearm_waits_for_in_flight_tick() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(SlowHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        // The first tick is still inside its 20 minute handler
        scheduler.arm("42", "bitcoin", NotificationInterval::Hour1, handler.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(30 * MINUTE).await;
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsubscribe_then_resubscribe_does_not_overlap() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(SlowHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(scheduler.cancel("42", "bitcoin"));
        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());

        tokio::time::sleep(30 * MINUTE).await;
        assert_eq!(handler.max_in_flight.load(Ordering::SeqCst), 1);
        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_panicking_handler_keeps_timer_alive() {
        let scheduler = RecurringScheduler::new();
        let handler = Arc::new(PanicOnceHandler::default());
        scheduler.start();

        scheduler.arm("42", "bitcoin", NotificationInterval::Minutes15, handler.clone());
        settle().await;
        tokio::time::sleep(15 * MINUTE).await;

        assert_eq!(handler.calls.load(Ordering::SeqCst), 2);
        assert!(scheduler.armed("42", "bitcoin").unwrap().active);
    }
}
