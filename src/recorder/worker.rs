//! Ordered execution of recorder commands off the coordinator's path.

use super::RecorderBackend;
use crate::coordinator::CoordinatorHandle;
use crate::logs::{LogCategory, LogEntry, LogLevel, ObservabilitySink};
use crate::platform::Platform;
use crate::status::StatusHandle;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderCommand {
    Start(Platform),
    Stop,
}

/// Sending side of the recorder worker. Never blocks.
#[derive(Clone)]
pub struct RecorderQueue {
    tx: mpsc::UnboundedSender<RecorderCommand>,
}

impl RecorderQueue {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RecorderCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn send(&self, command: RecorderCommand) {
        if self.tx.send(command).is_err() {
            warn!("Recorder worker stopped; dropping {:?}", command);
        }
    }
}

/// Run recorder commands one at a time in issue order.
///
/// A switch-over queues a stop then a start; running them sequentially keeps
/// the new recording from racing the old one's teardown. A failed start puts
/// the machine into the error state; a failed stop is only logged because the
/// recording may already have ended.
pub async fn run_worker(
    backend: Arc<dyn RecorderBackend>,
    mut rx: mpsc::UnboundedReceiver<RecorderCommand>,
    coordinator: CoordinatorHandle,
    status: StatusHandle,
    sink: Arc<dyn ObservabilitySink>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            RecorderCommand::Start(platform) => {
                sink.record(
                    LogEntry::new(
                        LogCategory::Automation,
                        LogLevel::Info,
                        format!("Starting recording via {}", platform.automation_target()),
                    )
                    .with_platform(platform)
                    .with_action("start_recording"),
                );

                match backend.start_recording(platform).await {
                    Ok(()) => {
                        status.add_activity(
                            format!("Recording started: {}", platform.display_name()),
                            Some(platform),
                        );
                    }
                    Err(e) => {
                        error!("Failed to start recording for {}: {}", platform, e);
                        sink.automation(
                            LogLevel::Error,
                            &format!("Start failed: {e}"),
                            "start_recording",
                        );
                        status.add_activity(format!("Start failed: {e}"), Some(platform));
                        coordinator.report_error(e.to_error_kind());
                    }
                }
            }
            RecorderCommand::Stop => {
                sink.automation(LogLevel::Info, "Stopping recording", "stop_recording");
                match backend.stop_recording().await {
                    Ok(()) => status.add_activity("Recording stopped", None),
                    Err(e) => {
                        warn!("Failed to stop recording: {}", e);
                        sink.automation(
                            LogLevel::Warn,
                            &format!("Stop failed: {e}"),
                            "stop_recording",
                        );
                        status.add_activity(format!("Stop failed: {e}"), None);
                    }
                }
            }
        }
    }
    debug!("Recorder worker exiting");
}
