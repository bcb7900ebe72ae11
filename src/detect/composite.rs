//! Native-app detector built from a [`PlatformProfile`].

use crate::detect::profile::{CombineMode, PlatformProfile};
use crate::detect::sensors::{PowerAssertion, Sensors};
use crate::detect::window::{WindowConsumer, WindowInfo};
use crate::detect::{Detector, EdgeLatch, SignalSink};
use crate::platform::Platform;
use crate::signal::{Confidence, Signal, SignalSource};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct AllOfInputs {
    assertion: bool,
    window: bool,
}

/// Watches one native app through every sub-signal its profile configures.
///
/// Window titles arrive from the shared scanner; assertions and UDP counts
/// are polled by a task started in [`Detector::start`]; audio device state is
/// pushed by the audio sensor.
pub struct CompositeDetector {
    platform: Platform,
    profile: PlatformProfile,
    sensors: Sensors,
    sink: SignalSink,
    poll_interval: Duration,
    this: Weak<CompositeDetector>,
    running: AtomicBool,
    cancel: Mutex<Option<CancellationToken>>,
    audio: EdgeLatch,
    assertion: EdgeLatch,
    window: EdgeLatch,
    network: EdgeLatch,
    all_of: Mutex<AllOfInputs>,
    combined: EdgeLatch,
}

impl CompositeDetector {
    pub fn new(
        platform: Platform,
        profile: PlatformProfile,
        sensors: Sensors,
        sink: SignalSink,
        poll_interval: Duration,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            platform,
            profile,
            sensors,
            sink,
            poll_interval,
            this: this.clone(),
            running: AtomicBool::new(false),
            cancel: Mutex::new(None),
            audio: EdgeLatch::default(),
            assertion: EdgeLatch::default(),
            window: EdgeLatch::default(),
            network: EdgeLatch::default(),
            all_of: Mutex::new(AllOfInputs::default()),
            combined: EdgeLatch::default(),
        })
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    fn emit(&self, is_active: bool, source: SignalSource, confidence: Confidence) {
        if !self.is_running() {
            return;
        }
        debug!(
            "{} {} -> {}",
            self.platform,
            source.as_str(),
            if is_active { "active" } else { "inactive" }
        );
        (self.sink)(Signal::new(self.platform, is_active, confidence, source));
    }

    fn observe_all_of(&self, update: impl FnOnce(&mut AllOfInputs)) {
        let Ok(mut inputs) = self.all_of.lock() else {
            return;
        };
        update(&mut inputs);
        let active = inputs.assertion && inputs.window;
        if self.combined.update(active) {
            self.emit(active, SignalSource::PowerAssertion, Confidence::High);
        }
    }

    pub fn observe_audio(&self, running: bool) {
        if self.audio.update(running) {
            self.emit(running, SignalSource::AudioDevice, Confidence::High);
        }
    }

    pub fn observe_assertions(&self, assertions: &[PowerAssertion]) {
        let Some(rule) = &self.profile.assertion else {
            return;
        };
        let held = rule.any_match(assertions);
        match self.profile.mode {
            CombineMode::Independent => {
                if self.assertion.update(held) {
                    self.emit(held, SignalSource::PowerAssertion, Confidence::High);
                }
            }
            CombineMode::AllOf => self.observe_all_of(|inputs| inputs.assertion = held),
        }
    }

    pub fn observe_socket_count(&self, count: usize) {
        let Some(rule) = &self.profile.udp else {
            return;
        };
        let active = rule.is_active(count);
        if self.network.update(active) {
            self.emit(active, SignalSource::NetworkUdp, Confidence::Medium);
        }
    }

    fn reset_latches(&self) {
        self.audio.reset();
        self.assertion.reset();
        self.window.reset();
        self.network.reset();
        self.combined.reset();
        if let Ok(mut inputs) = self.all_of.lock() {
            *inputs = AllOfInputs::default();
        }
    }

    async fn poll_sensors(&self) {
        if self.profile.assertion.is_some() {
            let source = self.sensors.assertions.clone();
            match tokio::task::spawn_blocking(move || source.assertions()).await {
                Ok(Ok(assertions)) => self.observe_assertions(&assertions),
                Ok(Err(e)) => debug!("{}: assertion sensor failed: {}", self.platform, e),
                Err(e) => warn!("{}: assertion sensor task failed: {}", self.platform, e),
            }
        }

        if let Some(rule) = &self.profile.udp {
            let counter = self.sensors.sockets.clone();
            let process = rule.process.clone();
            match tokio::task::spawn_blocking(move || counter.count_udp(&process)).await {
                Ok(Ok(count)) => self.observe_socket_count(count),
                Ok(Err(e)) => debug!("{}: socket sensor failed: {}", self.platform, e),
                Err(e) => warn!("{}: socket sensor task failed: {}", self.platform, e),
            }
        }
    }

    fn spawn_tasks(&self, handle: &tokio::runtime::Handle, token: &CancellationToken) {
        if self.profile.needs_polling() {
            let weak = self.this.clone();
            let token = token.clone();
            let interval = self.poll_interval;
            handle.spawn(async move {
                let mut ticker = tokio::time::interval(interval);
                ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }
                    let Some(detector) = weak.upgrade() else {
                        break;
                    };
                    detector.poll_sensors().await;
                }
            });
        }

        if let Some(device) = &self.profile.audio_device {
            let Some(mut rx) = self.sensors.audio.watch(device) else {
                debug!("{}: audio device '{}' not present", self.platform, device);
                return;
            };
            let weak = self.this.clone();
            let token = token.clone();
            handle.spawn(async move {
                let initial = *rx.borrow_and_update();
                if let Some(detector) = weak.upgrade() {
                    detector.observe_audio(initial);
                }
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        changed = rx.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                    let running = *rx.borrow_and_update();
                    let Some(detector) = weak.upgrade() else {
                        break;
                    };
                    detector.observe_audio(running);
                }
            });
        }
    }
}

impl WindowConsumer for CompositeDetector {
    fn process_windows(&self, windows: &[WindowInfo]) {
        if !self.is_running() {
            return;
        }
        let Some(rule) = &self.profile.window else {
            return;
        };
        let visible = rule.any_match(windows);
        match self.profile.mode {
            CombineMode::Independent => {
                if self.window.update(visible) {
                    self.emit(visible, SignalSource::WindowList, Confidence::High);
                }
            }
            CombineMode::AllOf => self.observe_all_of(|inputs| inputs.window = visible),
        }
    }
}

impl Detector for CompositeDetector {
    fn platform(&self) -> Platform {
        self.platform
    }

    fn is_enabled(&self) -> bool {
        self.profile.enabled
    }

    fn start(&self) {
        if !self.profile.enabled {
            debug!("{} detector disabled", self.platform);
            return;
        }
        self.stop();
        self.reset_latches();
        self.running.store(true, Ordering::SeqCst);

        let token = CancellationToken::new();
        if let Ok(mut cancel) = self.cancel.lock() {
            *cancel = Some(token.clone());
        }

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => self.spawn_tasks(&handle, &token),
            Err(_) => debug!("{}: no runtime, sensor polling skipped", self.platform),
        }
        info!("{} detector started", self.platform.display_name());
    }

    fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Ok(mut cancel) = self.cancel.lock() {
            if let Some(token) = cancel.take() {
                token.cancel();
                debug!("{} detector stopped", self.platform);
            }
        }
    }
}

impl Drop for CompositeDetector {
    fn drop(&mut self) {
        if let Ok(mut cancel) = self.cancel.lock() {
            if let Some(token) = cancel.take() {
                token.cancel();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::new_sink;
    use crate::detect::profile::{AssertionRule, UdpRule, WindowRule};
    use std::sync::Mutex as StdMutex;

    fn collecting_sink() -> (SignalSink, Arc<StdMutex<Vec<Signal>>>) {
        let seen = Arc::new(StdMutex::new(Vec::new()));
        let captured = seen.clone();
        let sink = new_sink(move |signal| captured.lock().unwrap().push(signal));
        (sink, seen)
    }

    fn zoom_profile() -> PlatformProfile {
        PlatformProfile {
            window: Some(WindowRule {
                owner: "zoom.us".to_string(),
                title_contains: vec!["Zoom Meeting".to_string()],
                ..Default::default()
            }),
            udp: Some(UdpRule {
                process: "zoom.us".to_string(),
                threshold: 2,
            }),
            ..Default::default()
        }
    }

    fn facetime_profile() -> PlatformProfile {
        PlatformProfile {
            mode: CombineMode::AllOf,
            assertion: Some(AssertionRule {
                kind: Some("PreventUserIdleSystemSleep".to_string()),
                process: Some("FaceTime".to_string()),
                ..Default::default()
            }),
            window: Some(WindowRule {
                owner: "FaceTime".to_string(),
                layer_zero_only: true,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn facetime_assertion() -> PowerAssertion {
        PowerAssertion {
            kind: "PreventUserIdleSystemSleep".to_string(),
            name: "call".to_string(),
            process_name: "FaceTime".to_string(),
            pid: 9,
        }
    }

    #[test]
    fn test_window_signal_is_edge_triggered() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::Zoom,
            zoom_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        detector.start();

        let meeting = [WindowInfo::new("zoom.us", "Zoom Meeting")];
        detector.process_windows(&meeting);
        detector.process_windows(&meeting);
        detector.process_windows(&[]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_active);
        assert_eq!(seen[0].source, SignalSource::WindowList);
        assert_eq!(seen[0].confidence, Confidence::High);
        assert!(!seen[1].is_active);
    }

    #[test]
    fn test_socket_count_uses_medium_confidence() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::Zoom,
            zoom_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        detector.start();

        detector.observe_socket_count(2);
        detector.observe_socket_count(5);
        detector.observe_socket_count(4);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].source, SignalSource::NetworkUdp);
        assert_eq!(seen[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_sub_signals_are_independent() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::Zoom,
            zoom_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        detector.start();

        detector.process_windows(&[WindowInfo::new("zoom.us", "Zoom Meeting")]);
        detector.observe_socket_count(3);

        let sources: Vec<SignalSource> = seen.lock().unwrap().iter().map(|s| s.source).collect();
        assert_eq!(sources, vec![SignalSource::WindowList, SignalSource::NetworkUdp]);
    }

    #[test]
    fn test_all_of_requires_both_inputs() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::FaceTime,
            facetime_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        detector.start();

        detector.observe_assertions(&[facetime_assertion()]);
        assert!(seen.lock().unwrap().is_empty());

        detector.process_windows(&[WindowInfo::new("FaceTime", "")]);
        detector.process_windows(&[]);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen[0].is_active);
        assert_eq!(seen[0].source, SignalSource::PowerAssertion);
        assert!(!seen[1].is_active);
    }

    #[test]
    fn test_stopped_detector_is_silent() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::Zoom,
            zoom_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        detector.process_windows(&[WindowInfo::new("zoom.us", "Zoom Meeting")]);
        detector.start();
        detector.stop();
        detector.observe_socket_count(10);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn test_restart_reemits_current_truth() {
        let (sink, seen) = collecting_sink();
        let detector = CompositeDetector::new(
            Platform::Zoom,
            zoom_profile(),
            Sensors::null(),
            sink,
            Duration::from_secs(3),
        );
        let meeting = [WindowInfo::new("zoom.us", "Zoom Meeting")];
        detector.start();
        detector.process_windows(&meeting);
        detector.stop();
        detector.start();
        detector.process_windows(&meeting);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert!(seen.iter().all(|s| s.is_active));
    }

    #[test]
    fn test_disabled_profile_never_starts() {
        let (sink, seen) = collecting_sink();
        let profile = PlatformProfile {
            enabled: false,
            ..zoom_profile()
        };
        let detector =
            CompositeDetector::new(Platform::Zoom, profile, Sensors::null(), sink, Duration::from_secs(3));
        detector.start();
        assert!(!detector.is_running());
        detector.process_windows(&[WindowInfo::new("zoom.us", "Zoom Meeting")]);
        assert!(seen.lock().unwrap().is_empty());
    }
}
