use super::writer::JsonlWriter;
use super::{LogEntry, LogLevel, ObservabilitySink};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Emits every entry through `tracing` and, when a log directory is
/// configured, queues it for the JSONL writer thread.
pub struct DetectionLogger {
    file_tx: Option<mpsc::UnboundedSender<LogEntry>>,
}

impl DetectionLogger {
    /// Console-only logger.
    pub fn console() -> Self {
        Self { file_tx: None }
    }

    /// Logger that also writes `detection.jsonl` under `dir`.
    pub fn with_file(dir: impl Into<PathBuf>, max_bytes: u64) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<LogEntry>();
        let mut writer = JsonlWriter::new(dir, max_bytes);

        let spawned = std::thread::Builder::new()
            .name("meetrec-detection-log".to_string())
            .spawn(move || {
                while let Some(entry) = rx.blocking_recv() {
                    if let Err(e) = writer.write(&entry) {
                        warn!("Detection log write failed: {:#}", e);
                    }
                }
            });

        match spawned {
            Ok(_) => Self { file_tx: Some(tx) },
            Err(e) => {
                warn!("Failed to start detection log writer: {}", e);
                Self::console()
            }
        }
    }

    pub fn writes_file(&self) -> bool {
        self.file_tx.is_some()
    }
}

impl ObservabilitySink for DetectionLogger {
    fn record(&self, entry: LogEntry) {
        let line = entry.summary();
        let cat = entry.cat.as_str();
        match entry.level {
            LogLevel::Debug => debug!(target: "meetrec::detection", cat = %cat, "{}", line),
            LogLevel::Info => info!(target: "meetrec::detection", cat = %cat, "{}", line),
            LogLevel::Warn => warn!(target: "meetrec::detection", cat = %cat, "{}", line),
            LogLevel::Error => error!(target: "meetrec::detection", cat = %cat, "{}", line),
        }

        if let Some(tx) = &self.file_tx {
            let _ = tx.send(entry);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logs::{LogCategory, LOG_FILE_NAME};
    use crate::machine::MeetingState;
    use crate::platform::Platform;
    use std::time::{Duration, Instant};

    #[test]
    fn test_console_logger_accepts_entries() {
        let logger = DetectionLogger::console();
        assert!(!logger.writes_file());
        logger.lifecycle("started");
    }

    #[test]
    fn test_file_logger_writes_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let logger = DetectionLogger::with_file(dir.path(), 1024 * 1024);
        assert!(logger.writes_file());

        logger.transition(
            &MeetingState::Idle,
            &MeetingState::Recording {
                platform: Platform::Chime,
            },
        );
        logger.record(LogEntry::new(
            LogCategory::Bridge,
            LogLevel::Info,
            "extension connected",
        ));

        let path = dir.path().join(LOG_FILE_NAME);
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut lines = Vec::new();
        while Instant::now() < deadline {
            lines = crate::logs::read_recent(&path, 10).unwrap();
            if lines.len() == 2 {
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        assert_eq!(lines.len(), 2);
        let first: LogEntry = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(first.cat, LogCategory::StateMachine);
        assert_eq!(first.state.as_deref(), Some("recording(chime)"));
    }
}
