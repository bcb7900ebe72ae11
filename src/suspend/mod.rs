//! Suspend/resume detection by watching for wall-clock jumps.
//!
//! Tokio timers run on the monotonic clock, which stops while the host is
//! suspended. The wall clock does not, so a tick that observes far more wall
//! time than it slept for means the host was asleep in between.

use crate::config::SuspendConfig;
use crate::coordinator::CoordinatorHandle;
use chrono::{DateTime, Utc};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub struct SuspendWatcher {
    coordinator: CoordinatorHandle,
    check: Duration,
    gap: Duration,
    cancel: Mutex<Option<CancellationToken>>,
}

impl SuspendWatcher {
    pub fn new(coordinator: CoordinatorHandle, config: &SuspendConfig) -> Self {
        Self {
            coordinator,
            check: Duration::from_secs(config.check_secs.max(1)),
            gap: Duration::from_secs(config.gap_secs),
            cancel: Mutex::new(None),
        }
    }

    pub fn start(&self) {
        self.stop();
        let token = CancellationToken::new();
        if let Ok(mut cancel) = self.cancel.lock() {
            *cancel = Some(token.clone());
        }

        let coordinator = self.coordinator.clone();
        let (check, gap) = (self.check, self.gap);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(check);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            let mut last = Utc::now();

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        let now = Utc::now();
                        if let Some(slept) = suspended_for(last, now, check, gap) {
                            info!("Host resumed after ~{}s asleep", slept.as_secs());
                            coordinator.handle_sleep();
                            coordinator.handle_wake();
                        }
                        last = now;
                    }
                }
            }
            debug!("Suspend watcher stopped");
        });
        debug!(
            "Suspend watcher started (check {}s, gap {}s)",
            check.as_secs(),
            gap.as_secs()
        );
    }

    pub fn stop(&self) {
        if let Ok(mut cancel) = self.cancel.lock() {
            if let Some(token) = cancel.take() {
                token.cancel();
            }
        }
    }
}

impl Drop for SuspendWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// How long the host was asleep between two ticks `expected` apart, if the
/// wall clock moved more than `gap` past the expected interval.
pub fn suspended_for(
    last: DateTime<Utc>,
    now: DateTime<Utc>,
    expected: Duration,
    gap: Duration,
) -> Option<Duration> {
    let elapsed = (now - last).to_std().ok()?;
    let excess = elapsed.checked_sub(expected)?;
    (excess > gap).then_some(excess)
}
