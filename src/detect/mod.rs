//! Meeting detectors.
//!
//! Each detector watches one platform and turns OS observations into
//! [`Signal`]s for the coordinator. Native-app detectors combine several
//! independent sub-signals (audio device activity, power assertions, window
//! titles, UDP socket counts); window titles come from the shared
//! [`WindowScanner`] so one OS query per cycle serves every detector.

pub mod app_monitor;
pub mod composite;
pub mod platforms;
pub mod profile;
pub mod scanner;
pub mod sensors;
pub mod window;

use crate::platform::Platform;
use crate::signal::Signal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use app_monitor::AppMonitor;
pub use composite::CompositeDetector;
pub use profile::{AssertionRule, CombineMode, PlatformProfile, UdpRule, WindowRule};
pub use scanner::{ConsumerId, WindowScanner, DEFAULT_WINDOW_POLL_INTERVAL};
pub use sensors::{
    AudioActivitySource, PowerAssertion, PowerAssertionSource, Sensors, SocketCounter,
};
pub use window::{WindowConsumer, WindowInfo, WindowSource};

/// Where detectors deliver their signals.
pub type SignalSink = Arc<dyn Fn(Signal) + Send + Sync + 'static>;

pub fn new_sink<F>(f: F) -> SignalSink
where
    F: Fn(Signal) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Lifecycle contract shared by every detector.
///
/// `start`/`stop` take `&self`: detectors are shared between the coordinator
/// (which owns them) and the window fan-out (which only observes).
pub trait Detector: Send + Sync {
    fn platform(&self) -> Platform;
    fn is_enabled(&self) -> bool;
    fn start(&self);
    fn stop(&self);
}

/// Last value reported by one sub-signal.
///
/// `update` returns true only when the value flips, which is what makes
/// detectors edge-triggered.
#[derive(Debug, Default)]
pub struct EdgeLatch {
    last: AtomicBool,
}

impl EdgeLatch {
    pub fn update(&self, value: bool) -> bool {
        self.last.swap(value, Ordering::SeqCst) != value
    }

    pub fn get(&self) -> bool {
        self.last.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.last.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_latch_reports_flips_only() {
        let latch = EdgeLatch::default();
        assert!(!latch.update(false));
        assert!(latch.update(true));
        assert!(!latch.update(true));
        assert!(latch.update(false));
        assert!(!latch.get());
    }

    #[test]
    fn test_edge_latch_reset() {
        let latch = EdgeLatch::default();
        latch.update(true);
        latch.reset();
        assert!(!latch.get());
        assert!(latch.update(true));
    }
}
