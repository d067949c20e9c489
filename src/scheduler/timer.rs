use chrono::{DateTime, Utc};
use dashmap::DashMap;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use utoipa::ToSchema;
use uuid::Uuid;

use super::TickHandler;
use crate::models::{NotificationInterval, PairKey};

/// A live recurring timer for one `(user, asset)` pair
///
/// Owned by the scheduler registry. Dropping it does not stop the task;
/// `cancel()` does.
pub struct ArmedTimer {
    /// New for every arm, so a replaced timer can be told apart in logs
    pub id: Uuid,
    pub key: PairKey,
    pub interval: NotificationInterval,
    pub armed_at: DateTime<Utc>,
    token: CancellationToken,
    handle: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
}

/// Read-only view of an armed timer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ArmedTimerInfo {
    pub id: Uuid,
    pub user_id: String,
    pub asset_id: String,
    pub interval: NotificationInterval,
    pub armed_at: DateTime<Utc>,
    /// Ticks started by this timer so far
    pub ticks: u64,
    /// False once the task has exited
    pub active: bool,
}

/// Per-pair locks held around the tick handler
///
/// A gate outlives the timer that created it, so a replacement timer waits for
/// the replaced timer's in-flight tick before running its own.
pub(super) type PairGates = Arc<DashMap<PairKey, Arc<Mutex<()>>>>;

/// Everything a timer task needs besides its own identity
pub(super) struct TimerContext {
    pub running: watch::Receiver<bool>,
    pub handler: Arc<dyn TickHandler>,
    pub total_ticks: Arc<AtomicU64>,
    pub gates: PairGates,
}

impl ArmedTimer {
    pub(super) fn spawn(
        key: PairKey,
        interval: NotificationInterval,
        ctx: TimerContext,
    ) -> Self {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();
        let ticks = Arc::new(AtomicU64::new(0));

        let handle = tokio::spawn(run_timer(
            id,
            key.clone(),
            interval.duration(),
            token.clone(),
            Arc::clone(&ticks),
            ctx,
        ));

        Self {
            id,
            key,
            interval,
            armed_at: Utc::now(),
            token,
            handle,
            ticks,
        }
    }

    /// Stop the timer; no tick starts after this returns
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn info(&self) -> ArmedTimerInfo {
        ArmedTimerInfo {
            id: self.id,
            user_id: self.key.user_id.clone(),
            asset_id: self.key.asset_id.clone(),
            interval: self.interval,
            armed_at: self.armed_at,
            ticks: self.ticks(),
            active: !self.handle.is_finished(),
        }
    }
}

async fn run_timer(
    id: Uuid,
    key: PairKey,
    period: Duration,
    token: CancellationToken,
    ticks: Arc<AtomicU64>,
    mut ctx: TimerContext,
) {
    let gate = Arc::clone(ctx.gates.entry(key.clone()).or_default().value());

    tick_loop(id, &key, period, &token, &ticks, &gate, &mut ctx).await;

    // Left only in the map: no other timer of this pair holds it
    drop(gate);
    ctx.gates.remove_if(&key, |_, gate| Arc::strong_count(gate) == 1);

    tracing::debug!("⏹️  Timer {} for {} stopped", id, key);
}

async fn tick_loop(
    id: Uuid,
    key: &PairKey,
    period: Duration,
    token: &CancellationToken,
    ticks: &AtomicU64,
    gate: &Mutex<()>,
    ctx: &mut TimerContext,
) {
    // Nothing is dispatched until the scheduler has been started
    tokio::select! {
        biased;
        _ = token.cancelled() => return,
        opened = ctx.running.wait_for(|running| *running).map(|gate| gate.is_ok()) => {
            if !opened {
                return;
            }
        }
    }

    tracing::debug!("⏱️  Timer {} for {} running every {:?}", id, key, period);

    // First tick completes immediately
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => return,
            _ = interval.tick() => {}
        }

        // Waits for a replaced timer's tick that is still running
        let _serial = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            guard = gate.lock() => guard,
        };

        if token.is_cancelled() {
            return;
        }

        ticks.fetch_add(1, Ordering::Relaxed);
        ctx.total_ticks.fetch_add(1, Ordering::Relaxed);

        let outcome = AssertUnwindSafe(ctx.handler.on_tick(&key.user_id, &key.asset_id))
            .catch_unwind()
            .await;

        if outcome.is_err() {
            tracing::error!("❌ Tick handler panicked for {} (timer {})", key, id);
        }
    }
}
