//! Detection coordinator.
//!
//! Owns the state machine, the detectors and the timers. Every input
//! (signals, timer fires, error reports, sleep/wake) arrives as a command on
//! one channel and is processed by a single task, so the state machine never
//! sees concurrent mutations. Side effects are dispatched without awaiting:
//! recorder commands go to the recorder worker queue.

mod timers;

pub use timers::{FireFn, TimerSet};

use crate::detect::{new_sink, Detector, SignalSink, WindowScanner};
use crate::logs::ObservabilitySink;
use crate::machine::{ErrorKind, MachineTimings, MeetingState, MeetingStateMachine, SideEffect, TimerId};
use crate::recorder::worker::run_worker;
use crate::recorder::{RecorderBackend, RecorderCommand, RecorderQueue};
use crate::signal::Signal;
use crate::status::StatusHandle;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

#[derive(Debug)]
enum Command {
    Signal(Signal),
    TimerFired { id: TimerId, generation: u64 },
    ReportError(ErrorKind),
    ClearError,
    Start,
    Stop,
    Sleep,
    Wake,
    Shutdown,
}

/// Cheap, cloneable way into the coordinator. Every method enqueues and
/// returns immediately, so it is safe to call from any thread or callback.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl CoordinatorHandle {
    fn send(&self, command: Command) {
        if let Err(e) = self.tx.send(command) {
            debug!("Coordinator stopped; dropping {:?}", e.0);
        }
    }

    pub fn handle_signal(&self, signal: Signal) {
        self.send(Command::Signal(signal));
    }

    pub fn report_error(&self, kind: ErrorKind) {
        self.send(Command::ReportError(kind));
    }

    pub fn clear_error(&self) {
        self.send(Command::ClearError);
    }

    pub fn start(&self) {
        self.send(Command::Start);
    }

    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    pub fn handle_sleep(&self) {
        self.send(Command::Sleep);
    }

    pub fn handle_wake(&self) {
        self.send(Command::Wake);
    }

    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    /// Sink that forwards detector signals into this coordinator.
    pub fn signal_sink(&self) -> SignalSink {
        let handle = self.clone();
        new_sink(move |signal| handle.handle_signal(signal))
    }
}

pub struct Coordinator {
    machine: MeetingStateMachine,
    detectors: Vec<Arc<dyn Detector>>,
    scanner: Option<WindowScanner>,
    timers: TimerSet,
    rx: mpsc::UnboundedReceiver<Command>,
    handle: CoordinatorHandle,
    backend: Arc<dyn RecorderBackend>,
    recorder: RecorderQueue,
    recorder_rx: Option<mpsc::UnboundedReceiver<RecorderCommand>>,
    status: StatusHandle,
    sink: Arc<dyn ObservabilitySink>,
}

impl Coordinator {
    pub fn new(
        timings: MachineTimings,
        backend: Arc<dyn RecorderBackend>,
        status: StatusHandle,
        sink: Arc<dyn ObservabilitySink>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = CoordinatorHandle { tx };

        let fire_handle = handle.clone();
        let timers = TimerSet::new(Arc::new(move |id, generation| {
            fire_handle.send(Command::TimerFired { id, generation });
        }));
        let (recorder, recorder_rx) = RecorderQueue::channel();

        Self {
            machine: MeetingStateMachine::new(timings),
            detectors: Vec::new(),
            scanner: None,
            timers,
            rx,
            handle,
            backend,
            recorder,
            recorder_rx: Some(recorder_rx),
            status,
            sink,
        }
    }

    pub fn handle(&self) -> CoordinatorHandle {
        self.handle.clone()
    }

    pub fn register_detector(&mut self, detector: Arc<dyn Detector>) {
        info!("Registered {} detector", detector.platform().display_name());
        self.detectors.push(detector);
    }

    /// Scanner to poll immediately after wake so window state resyncs.
    pub fn set_window_scanner(&mut self, scanner: WindowScanner) {
        self.scanner = Some(scanner);
    }

    pub fn state(&self) -> &MeetingState {
        self.machine.state()
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Process commands until [`CoordinatorHandle::shutdown`].
    pub async fn run(mut self) {
        if let Some(rx) = self.recorder_rx.take() {
            tokio::spawn(run_worker(
                self.backend.clone(),
                rx,
                self.handle.clone(),
                self.status.clone(),
                self.sink.clone(),
            ));
        }

        self.publish();
        while let Some(command) = self.rx.recv().await {
            if matches!(command, Command::Shutdown) {
                self.stop_detectors();
                break;
            }
            self.process(command);
        }
        info!("Coordinator stopped");
    }

    fn process(&mut self, command: Command) {
        match command {
            Command::Signal(signal) => self.process_signal(signal),
            Command::TimerFired { id, generation } => {
                if !self.timers.complete(id, generation) {
                    debug!("Ignoring stale {} timer", id.as_str());
                    return;
                }
                let effects = self.machine.timer_fired(id);
                self.publish();
                self.dispatch(effects);
            }
            Command::ReportError(kind) => {
                let effects = self.machine.set_error(kind);
                self.publish();
                self.dispatch(effects);
            }
            Command::ClearError => {
                let effects = self.machine.clear_error();
                self.publish();
                self.dispatch(effects);
            }
            Command::Start => self.start_detectors(),
            Command::Stop => self.stop_detectors(),
            Command::Sleep => {
                self.sink.lifecycle("System sleep: stopping detection");
                self.stop_detectors();
                let effects = self.machine.reset();
                self.publish();
                self.dispatch(effects);
            }
            Command::Wake => {
                self.sink.lifecycle("System wake: restarting detection");
                let effects = self.machine.reset();
                self.publish();
                self.dispatch(effects);
                self.timers.cancel_all();
                for detector in &self.detectors {
                    detector.stop();
                    if detector.is_enabled() {
                        detector.start();
                    }
                }
                if let Some(scanner) = &self.scanner {
                    scanner.poll_now();
                }
            }
            Command::Shutdown => {}
        }
    }

    fn process_signal(&mut self, signal: Signal) {
        self.sink.signal(&signal, self.machine.state());
        let effects = self.machine.transition(&signal);
        self.publish();
        self.status
            .add_activity(signal.describe(), Some(signal.platform));
        self.dispatch(effects);
    }

    fn dispatch(&mut self, effects: Vec<SideEffect>) {
        for effect in effects {
            match effect {
                SideEffect::StartRecording(platform) => {
                    self.recorder.send(RecorderCommand::Start(platform));
                }
                SideEffect::StopRecording => self.recorder.send(RecorderCommand::Stop),
                SideEffect::StartTimer { duration, id } => {
                    self.timers.start(id, duration);
                }
                SideEffect::CancelTimer(id) => self.timers.cancel(id),
                SideEffect::LogTransition { from, to } => self.sink.transition(&from, &to),
            }
        }
    }

    fn publish(&self) {
        self.status.set_state(self.machine.state().clone());
    }

    fn start_detectors(&mut self) {
        for detector in &self.detectors {
            if detector.is_enabled() {
                detector.start();
            }
        }
        info!("Started {} detectors", self.detectors.len());
    }

    fn stop_detectors(&mut self) {
        for detector in &self.detectors {
            detector.stop();
        }
        self.timers.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::LogEntry;
    use crate::platform::Platform;
    use crate::recorder::AutomationError;
    use crate::signal::SignalSource;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct FakeRecorder {
        calls: Mutex<Vec<String>>,
        fail_start: Mutex<Option<AutomationError>>,
        fail_stop: Mutex<Option<AutomationError>>,
        stop_delay: Mutex<Duration>,
    }

    #[async_trait]
    impl RecorderBackend for FakeRecorder {
        async fn start_recording(&self, platform: Platform) -> Result<(), AutomationError> {
            self.calls.lock().unwrap().push(format!("start:{platform}"));
            match self.fail_start.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }

        async fn stop_recording(&self) -> Result<(), AutomationError> {
            let delay = *self.stop_delay.lock().unwrap();
            tokio::time::sleep(delay).await;
            self.calls.lock().unwrap().push("stop".to_string());
            match self.fail_stop.lock().unwrap().clone() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    #[derive(Default)]
    struct MemorySink {
        entries: Mutex<Vec<LogEntry>>,
    }

    impl ObservabilitySink for MemorySink {
        fn record(&self, entry: LogEntry) {
            self.entries.lock().unwrap().push(entry);
        }
    }

    struct FakeDetector {
        enabled: bool,
        starts: AtomicUsize,
        stops: AtomicUsize,
    }

    impl Detector for FakeDetector {
        fn platform(&self) -> Platform {
            Platform::Zoom
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn start(&self) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Harness {
        handle: CoordinatorHandle,
        status: StatusHandle,
        recorder: Arc<FakeRecorder>,
        sink: Arc<MemorySink>,
        detector: Arc<FakeDetector>,
    }

    impl Harness {
        fn calls(&self) -> Vec<String> {
            self.recorder.calls.lock().unwrap().clone()
        }
    }

    fn spawn_coordinator() -> Harness {
        let status = StatusHandle::new();
        let recorder = Arc::new(FakeRecorder::default());
        let sink = Arc::new(MemorySink::default());
        let detector = Arc::new(FakeDetector {
            enabled: true,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        });

        let mut coordinator = Coordinator::new(
            MachineTimings::default(),
            recorder.clone(),
            status.clone(),
            sink.clone(),
        );
        coordinator.register_detector(detector.clone());
        let handle = coordinator.handle();
        coordinator.spawn();

        Harness {
            handle,
            status,
            recorder,
            sink,
            detector,
        }
    }

    async fn advance(secs: f64) {
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_sustained_signal_starts_recording() {
        let h = spawn_coordinator();
        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(1.0).await;
        assert!(matches!(
            h.status.state(),
            MeetingState::Detecting {
                platform: Platform::Zoom,
                ..
            }
        ));
        assert!(h.calls().is_empty());

        advance(5.0).await;
        assert!(h.status.state().is_recording());
        assert_eq!(h.calls(), vec!["start:zoom"]);

        let activity = h.status.get().activity;
        assert!(activity
            .iter()
            .any(|a| a.message == "window_list: Zoom active"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_short_blip_never_records() {
        let h = spawn_coordinator();
        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(2.0).await;
        h.handle
            .handle_signal(Signal::inactive(Platform::Zoom, SignalSource::WindowList));
        advance(10.0).await;

        assert!(h.status.state().is_idle());
        assert!(h.calls().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_absorbs_dropout() {
        let h = spawn_coordinator();
        h.handle
            .handle_signal(Signal::active(Platform::Teams, SignalSource::AudioDevice));
        advance(6.0).await;
        assert!(h.status.state().is_recording());

        h.handle
            .handle_signal(Signal::inactive(Platform::Teams, SignalSource::AudioDevice));
        advance(10.0).await;
        h.handle
            .handle_signal(Signal::active(Platform::Teams, SignalSource::AudioDevice));
        advance(30.0).await;

        assert!(h.status.state().is_recording());
        assert_eq!(h.calls(), vec!["start:teams"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_expiry_stops_recording() {
        let h = spawn_coordinator();
        h.handle
            .handle_signal(Signal::active(Platform::Slack, SignalSource::WindowList));
        advance(6.0).await;
        h.handle
            .handle_signal(Signal::inactive(Platform::Slack, SignalSource::WindowList));
        advance(16.0).await;

        assert!(h.status.state().is_idle());
        assert_eq!(h.calls(), vec!["start:slack", "stop"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_failure_enters_error_until_cleared() {
        let h = spawn_coordinator();
        *h.recorder.fail_start.lock().unwrap() = Some(AutomationError::NotRunning);

        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(6.0).await;
        assert!(matches!(
            h.status.state(),
            MeetingState::Error {
                kind: ErrorKind::AutomationNotRunning
            }
        ));

        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(10.0).await;
        assert!(h.status.state().is_error());

        h.handle.clear_error();
        advance(0.1).await;
        assert!(h.status.state().is_idle());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sleep_stops_recording_and_wake_restarts_detectors() {
        let h = spawn_coordinator();
        h.handle.start();
        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(6.0).await;
        assert!(h.status.state().is_recording());

        h.handle.handle_sleep();
        advance(0.1).await;
        assert!(h.status.state().is_idle());
        assert_eq!(h.calls(), vec!["start:zoom", "stop"]);
        assert_eq!(h.detector.stops.load(Ordering::SeqCst), 1);

        h.handle.handle_wake();
        advance(0.1).await;
        assert!(h.status.state().is_idle());
        assert_eq!(h.detector.starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transitions_are_logged() {
        let h = spawn_coordinator();
        h.handle
            .handle_signal(Signal::active(Platform::Chime, SignalSource::WindowList));
        advance(6.0).await;

        let actions: Vec<String> = h
            .sink
            .entries
            .lock()
            .unwrap()
            .iter()
            .filter_map(|e| e.action.clone())
            .filter(|a| a.contains("->"))
            .collect();
        assert_eq!(
            actions,
            vec!["idle -> detecting(chime)", "detecting(chime) -> recording(chime)"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_switch_over_stops_before_starting_next() {
        let h = spawn_coordinator();
        // Stop outlasts the debounce, so the next start is queued behind it.
        *h.recorder.stop_delay.lock().unwrap() = Duration::from_secs(8);

        h.handle
            .handle_signal(Signal::active(Platform::Teams, SignalSource::AudioDevice));
        advance(6.0).await;
        assert!(h.status.state().is_recording());

        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(6.0).await;
        assert_eq!(h.calls(), vec!["start:teams"]);

        advance(4.0).await;
        assert_eq!(h.calls(), vec!["start:teams", "stop", "start:zoom"]);
        assert!(matches!(
            h.status.state(),
            MeetingState::Recording {
                platform: Platform::Zoom
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_failure_is_not_escalated() {
        let h = spawn_coordinator();
        *h.recorder.fail_stop.lock().unwrap() =
            Some(AutomationError::ActionFailed("menu item missing".to_string()));

        h.handle
            .handle_signal(Signal::active(Platform::Teams, SignalSource::AudioDevice));
        advance(6.0).await;
        h.handle
            .handle_signal(Signal::active(Platform::Zoom, SignalSource::WindowList));
        advance(1.0).await;

        assert_eq!(h.calls(), vec!["start:teams", "stop"]);
        assert!(matches!(
            h.status.state(),
            MeetingState::Detecting {
                platform: Platform::Zoom,
                ..
            }
        ));
        assert!(h
            .status
            .get()
            .activity
            .iter()
            .any(|a| a.message.starts_with("Stop failed")));

        advance(5.0).await;
        assert!(h.status.state().is_recording());
        assert_eq!(h.calls(), vec!["start:teams", "stop", "start:zoom"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wake_leaves_disabled_detectors_stopped() {
        let status = StatusHandle::new();
        let detector = Arc::new(FakeDetector {
            enabled: false,
            starts: AtomicUsize::new(0),
            stops: AtomicUsize::new(0),
        });
        let mut coordinator = Coordinator::new(
            MachineTimings::default(),
            Arc::new(FakeRecorder::default()),
            status,
            Arc::new(MemorySink::default()),
        );
        coordinator.register_detector(detector.clone());
        let handle = coordinator.handle();
        coordinator.spawn();

        handle.start();
        handle.handle_sleep();
        handle.handle_wake();
        advance(0.1).await;

        assert_eq!(detector.starts.load(Ordering::SeqCst), 0);
        assert_eq!(detector.stops.load(Ordering::SeqCst), 2);
    }
}
