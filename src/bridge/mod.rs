//! Browser extension bridge.
//!
//! The extension pushes heartbeats (the full set of meeting tabs) and
//! begin/end events over a loopback WebSocket. All browser meetings are
//! folded into the single [`Platform::Browser`] signal.
//!
//! Several browser profiles may be connected at once, and one profile's
//! empty heartbeat must not end a meeting another profile still reports.
//! An inactive verdict is therefore only emitted once no message has
//! reported an active meeting for the grace period. A suppressed verdict is
//! re-checked when the grace period runs out, so a meeting still ends when
//! the browser goes quiet afterwards.

pub mod message;

use crate::detect::{Detector, SignalSink};
use crate::platform::Platform;
use crate::signal::{Confidence, Signal, SignalSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use message::{BridgeMessage, BridgeMessageError, BrowserMeeting, MeetingEvent};

pub const DEFAULT_GRACE: Duration = Duration::from_secs(30);

pub struct BrowserBridge {
    sink: SignalSink,
    grace: Duration,
    enabled: bool,
    this: Weak<BrowserBridge>,
    running: AtomicBool,
    last_active: Mutex<Option<Instant>>,
    /// Deferred inactive verdict, aborted by the next active report.
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl BrowserBridge {
    pub fn new(sink: SignalSink, grace: Duration, enabled: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            sink,
            grace,
            enabled,
            this: this.clone(),
            running: AtomicBool::new(false),
            last_active: Mutex::new(None),
            pending: Mutex::new(None),
        })
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Handle one raw frame from the extension.
    pub fn handle_text(&self, text: &str) {
        self.handle_text_at(text, Instant::now());
    }

    pub fn handle_text_at(&self, text: &str, now: Instant) {
        match BridgeMessage::parse(text) {
            Ok(message) => {
                self.handle_message_at(&message, now);
            }
            Err(e) => warn!("Discarding browser message: {}", e),
        }
    }

    /// Apply a parsed message. Returns the verdict that was emitted, if any.
    pub fn handle_message_at(&self, message: &BridgeMessage, now: Instant) -> Option<bool> {
        if !self.is_running() {
            debug!("Bridge stopped; ignoring message");
            return None;
        }
        debug!("{}", message.describe());
        self.report(message.is_active(), now)
    }

    /// The last extension connection closed. Counts as an inactive report,
    /// so an ongoing browser meeting ends after the grace period.
    pub fn connection_closed(&self) {
        let seen_active = self
            .last_active
            .lock()
            .map(|last| last.is_some())
            .unwrap_or(false);
        if self.is_running() && seen_active {
            debug!("No extension connected; treating as inactive");
            self.report(false, Instant::now());
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn report(&self, active: bool, now: Instant) -> Option<bool> {
        let Ok(mut last_active) = self.last_active.lock() else {
            return None;
        };

        if active {
            *last_active = Some(now);
            self.cancel_pending();
        } else if let Some(seen) = *last_active {
            let since = now.saturating_duration_since(seen);
            if since < self.grace {
                debug!(
                    "Suppressing inactive browser verdict ({}s since last active)",
                    since.as_secs()
                );
                self.defer_inactive(seen);
                return None;
            }
        }
        drop(last_active);

        self.emit(active);
        Some(active)
    }

    /// Re-check at `seen + grace`; emit inactive if nothing active arrived since.
    fn defer_inactive(&self, seen: Instant) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            debug!("No runtime; suppressed browser verdict will not be re-checked");
            return;
        };
        let Ok(mut pending) = self.pending.lock() else {
            return;
        };
        if pending.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let weak = self.this.clone();
        let deadline = seen + self.grace;
        *pending = Some(handle.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(bridge) = weak.upgrade() {
                bridge.expire_grace(seen);
            }
        }));
    }

    fn expire_grace(&self, seen: Instant) {
        if !self.is_running() {
            return;
        }
        let still_quiet = self
            .last_active
            .lock()
            .map(|last| *last == Some(seen))
            .unwrap_or(false);
        if still_quiet {
            debug!("Browser grace period elapsed");
            self.emit(false);
        }
    }

    fn cancel_pending(&self) {
        if let Ok(mut pending) = self.pending.lock() {
            if let Some(task) = pending.take() {
                task.abort();
            }
        }
    }

    fn emit(&self, active: bool) {
        (self.sink)(Signal::new(
            Platform::Browser,
            active,
            Confidence::High,
            SignalSource::BrowserBridge,
        ));
    }
}

impl Detector for BrowserBridge {
    fn platform(&self) -> Platform {
        Platform::Browser
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn start(&self) {
        self.cancel_pending();
        if let Ok(mut last_active) = self.last_active.lock() {
            *last_active = None;
        }
        self.running.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.cancel_pending();
    }
}

impl Drop for BrowserBridge {
    fn drop(&mut self) {
        self.cancel_pending();
    }
}
