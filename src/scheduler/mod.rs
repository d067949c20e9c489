/// Per-pair recurring timers
///
/// One tokio task per armed `(user, asset)` pair. Each task fires immediately,
/// then every interval, and awaits its handler before the next tick.

pub mod recurring;
pub mod timer;

pub use recurring::{RecurringScheduler, SchedulerStats};
pub use timer::{ArmedTimer, ArmedTimerInfo};

/// Work performed on every tick
///
/// Receives only the pair identity; the timer itself stays private to the
/// scheduler.
#[async_trait::async_trait]
pub trait TickHandler: Send + Sync {
    async fn on_tick(&self, user_id: &str, asset_id: &str);
}
