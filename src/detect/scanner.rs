//! Shared window-list fan-out.
//!
//! Listing on-screen windows is the most expensive sensor, so one scanner
//! queries the OS per cycle and hands the same snapshot to every registered
//! consumer. Consumers are held weakly: a dropped detector disappears from
//! the fan-out on the next cycle without needing to unregister.

use crate::detect::window::{WindowConsumer, WindowInfo, WindowSource};
use crate::platform::Platform;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_WINDOW_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Handle returned by [`WindowScanner::register`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConsumerId(u64);

struct Registration {
    id: ConsumerId,
    consumer: Weak<dyn WindowConsumer>,
}

struct ScannerInner {
    source: Arc<dyn WindowSource>,
    interval: Duration,
    consumers: Mutex<Vec<Registration>>,
    next_id: AtomicU64,
    should_poll: AtomicBool,
    wake: Notify,
    cancel: Mutex<Option<CancellationToken>>,
}

impl ScannerInner {
    /// Query once and deliver to every live consumer. Returns how many were served.
    fn poll(&self) -> usize {
        let live: Vec<Arc<dyn WindowConsumer>> = {
            let Ok(mut consumers) = self.consumers.lock() else {
                return 0;
            };
            consumers.retain(|r| r.consumer.strong_count() > 0);
            consumers.iter().filter_map(|r| r.consumer.upgrade()).collect()
        };

        if live.is_empty() {
            return 0;
        }

        let windows: Vec<WindowInfo> = match self.source.list_windows() {
            Ok(windows) => windows,
            Err(e) => {
                warn!("Window list query failed: {}", e);
                return 0;
            }
        };

        for consumer in &live {
            consumer.process_windows(&windows);
        }
        live.len()
    }
}

#[derive(Clone)]
pub struct WindowScanner {
    inner: Arc<ScannerInner>,
}

impl WindowScanner {
    pub fn new(source: Arc<dyn WindowSource>, interval: Duration) -> Self {
        Self {
            inner: Arc::new(ScannerInner {
                source,
                interval,
                consumers: Mutex::new(Vec::new()),
                next_id: AtomicU64::new(1),
                should_poll: AtomicBool::new(true),
                wake: Notify::new(),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn register<C>(&self, consumer: &Arc<C>) -> ConsumerId
    where
        C: WindowConsumer + 'static,
    {
        let weak: Weak<dyn WindowConsumer> = Arc::downgrade(consumer) as Weak<dyn WindowConsumer>;
        let id = ConsumerId(self.inner.next_id.fetch_add(1, Ordering::SeqCst));
        if let Ok(mut consumers) = self.inner.consumers.lock() {
            consumers.push(Registration { id, consumer: weak });
        }
        id
    }

    pub fn unregister(&self, id: ConsumerId) {
        if let Ok(mut consumers) = self.inner.consumers.lock() {
            consumers.retain(|r| r.id != id);
        }
    }

    /// Registered consumers that are still alive.
    pub fn consumer_count(&self) -> usize {
        self.inner
            .consumers
            .lock()
            .map(|c| c.iter().filter(|r| r.consumer.strong_count() > 0).count())
            .unwrap_or(0)
    }

    pub fn set_should_poll(&self, should_poll: bool) {
        self.inner.should_poll.store(should_poll, Ordering::SeqCst);
    }

    pub fn should_poll(&self) -> bool {
        self.inner.should_poll.load(Ordering::SeqCst)
    }

    /// Poll synchronously on the calling thread, ignoring the presence gate.
    pub fn poll_once(&self) -> usize {
        self.inner.poll()
    }

    /// Ask the background loop for an immediate cycle, ignoring the presence gate.
    pub fn poll_now(&self) {
        self.inner.wake.notify_one();
    }

    /// Gate periodic polling on whether any meeting app is running.
    ///
    /// Every change in the running set also triggers one immediate cycle, so
    /// consumers see the windows disappear when the last app quits.
    pub fn follow_app_presence(&self, mut running: watch::Receiver<HashSet<Platform>>) {
        let scanner = self.clone();
        scanner.set_should_poll(!running.borrow_and_update().is_empty());

        tokio::spawn(async move {
            while running.changed().await.is_ok() {
                let any = !running.borrow_and_update().is_empty();
                if any != scanner.should_poll() {
                    debug!("Window polling {}", if any { "resumed" } else { "paused" });
                }
                scanner.set_should_poll(any);
                scanner.poll_now();
            }
        });
    }

    /// Start the periodic poll loop. Restarting replaces the previous loop.
    pub fn start(&self) {
        let token = CancellationToken::new();
        if let Ok(mut cancel) = self.inner.cancel.lock() {
            if let Some(previous) = cancel.replace(token.clone()) {
                previous.cancel();
            }
        }

        let inner = self.inner.clone();
        info!(
            "Window scanner started ({}s interval)",
            inner.interval.as_secs_f32()
        );

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                let forced = tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => false,
                    _ = inner.wake.notified() => true,
                };

                if !forced && !inner.should_poll.load(Ordering::SeqCst) {
                    continue;
                }

                let worker = inner.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || worker.poll()).await {
                    warn!("Window poll task failed: {}", e);
                }
            }
            debug!("Window scanner stopped");
        });
    }

    pub fn stop(&self) {
        if let Ok(mut cancel) = self.inner.cancel.lock() {
            if let Some(token) = cancel.take() {
                token.cancel();
            }
        }
    }
}
