//! Cancellable periodic timers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Shortest period a timer will run at; `interval_at` panics on zero.
pub const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A timer that runs a callback every `period` until cancelled or dropped.
///
/// The first tick fires one full period after spawning. Ticks that are
/// late (e.g. the runtime was busy) are delayed rather than bunched up.
pub struct RepeatingTask {
    name: &'static str,
    handle: JoinHandle<()>,
}

impl RepeatingTask {
    /// Spawn on the current tokio runtime.
    pub fn spawn<F>(name: &'static str, period: Duration, tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        Self::spawn_after(name, period, period, tick)
    }

    /// Like [`RepeatingTask::spawn`] but the first tick fires after `first`.
    ///
    /// Periods below [`MIN_PERIOD`] are raised to it.
    pub fn spawn_after<F>(name: &'static str, first: Duration, period: Duration, mut tick: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        if period < MIN_PERIOD {
            warn!(task = name, ?period, "Timer period too short, using {:?}", MIN_PERIOD);
        }
        let period = period.max(MIN_PERIOD);
        let handle = tokio::spawn(async move {
            let mut interval = interval_at(Instant::now() + first, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tick();
            }
        });
        debug!(task = name, ?first, ?period, "Repeating task started");
        Self { name, handle }
    }

    /// Stop the timer. No further ticks run after this returns.
    pub fn cancel(self) {
        drop(self);
    }
}

impl Drop for RepeatingTask {
    fn drop(&mut self) {
        self.handle.abort();
        debug!(task = self.name, "Repeating task cancelled");
    }
}
