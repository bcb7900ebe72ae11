//! Structured detection log.
//!
//! Every signal, transition and automation attempt is recorded twice: as a
//! `tracing` event for the console/journal, and as one JSON line in
//! `detection.jsonl` for after-the-fact debugging of missed or spurious
//! recordings. The file side is written on a background thread.

mod logger;
mod writer;

use crate::machine::MeetingState;
use crate::platform::Platform;
use crate::signal::{Signal, SignalSource};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

pub use logger::DetectionLogger;
pub use writer::{JsonlWriter, DEFAULT_MAX_BYTES};

pub const LOG_FILE_NAME: &str = "detection.jsonl";
pub const ROTATED_FILE_NAME: &str = "detection.1.jsonl";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    Detection,
    StateMachine,
    Automation,
    Bridge,
    Lifecycle,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::StateMachine => "state_machine",
            Self::Automation => "automation",
            Self::Bridge => "bridge",
            Self::Lifecycle => "lifecycle",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One line of `detection.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub ts: DateTime<Utc>,
    pub cat: LogCategory,
    pub level: LogLevel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signal: Option<SignalSource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    pub message: String,
}

impl LogEntry {
    pub fn new(cat: LogCategory, level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            cat,
            level,
            platform: None,
            signal: None,
            active: None,
            action: None,
            state: None,
            message: message.into(),
        }
    }

    pub fn transition(from: &MeetingState, to: &MeetingState) -> Self {
        let (from, to) = (from.label(), to.label());
        let mut entry = Self::new(
            LogCategory::StateMachine,
            LogLevel::Info,
            format!("{from} -> {to}"),
        );
        entry.action = Some(format!("{from} -> {to}"));
        entry.state = Some(to);
        entry
    }

    /// A received signal and the state it was applied to.
    pub fn signal(signal: &Signal, state: &MeetingState) -> Self {
        let mut entry = Self::new(
            LogCategory::Detection,
            LogLevel::Debug,
            format!(
                "{} via {} active={}",
                signal.platform,
                signal.source.as_str(),
                signal.is_active
            ),
        );
        entry.platform = Some(signal.platform);
        entry.signal = Some(signal.source);
        entry.active = Some(signal.is_active);
        entry.state = Some(state.label());
        entry
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Single-line rendering for the console, e.g. `msg platform=zoom active=true`.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.message.clone()];
        if let Some(platform) = self.platform {
            parts.push(format!("platform={platform}"));
        }
        if let Some(signal) = self.signal {
            parts.push(format!("signal={}", signal.as_str()));
        }
        if let Some(active) = self.active {
            parts.push(format!("active={active}"));
        }
        if let Some(action) = &self.action {
            parts.push(format!("action={action}"));
        }
        if let Some(state) = &self.state {
            parts.push(format!("state={state}"));
        }
        parts.join(" ")
    }
}

/// Where the coordinator and its collaborators report what happened.
pub trait ObservabilitySink: Send + Sync {
    fn record(&self, entry: LogEntry);

    fn transition(&self, from: &MeetingState, to: &MeetingState) {
        self.record(LogEntry::transition(from, to));
    }

    fn signal(&self, signal: &Signal, state: &MeetingState) {
        self.record(LogEntry::signal(signal, state));
    }

    fn automation(&self, level: LogLevel, message: &str, action: &str) {
        self.record(LogEntry::new(LogCategory::Automation, level, message).with_action(action));
    }

    fn lifecycle(&self, message: &str) {
        self.record(LogEntry::new(LogCategory::Lifecycle, LogLevel::Info, message));
    }
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsOptions {
    /// Number of log entries to retrieve
    pub lines: usize,
}

impl LogsOptions {
    pub fn new(lines: usize) -> Self {
        Self { lines }
    }
}

/// Combined service journal and detection log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResult {
    /// Application logs from systemd journal
    pub app_logs: Vec<String>,
    /// Raw JSON lines from the detection log, oldest first
    pub detections: Vec<String>,
}

pub fn get_logs(options: &LogsOptions, logs_dir: &Path) -> Result<LogsResult> {
    Ok(LogsResult {
        app_logs: get_app_logs(options.lines)?,
        detections: read_recent(&logs_dir.join(LOG_FILE_NAME), options.lines)?,
    })
}

/// Get application logs from systemd journal.
///
/// Returns an empty vec if the journal is unavailable.
pub fn get_app_logs(lines: usize) -> Result<Vec<String>> {
    let output = match Command::new("journalctl")
        .arg("--user")
        .arg("-u")
        .arg("meetrec.service")
        .arg("-n")
        .arg(lines.to_string())
        .arg("--output=short-iso")
        .arg("--no-pager")
        .output()
    {
        Ok(output) => output,
        Err(_) => return Ok(Vec::new()),
    };

    if output.status.success() {
        let logs = String::from_utf8_lossy(&output.stdout);
        Ok(logs
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect())
    } else {
        Ok(Vec::new())
    }
}

/// Last `lines` lines of a JSONL file. A missing file yields nothing.
pub fn read_recent(path: &Path, lines: usize) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let all: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();
    let skip = all.len().saturating_sub(lines);
    Ok(all[skip..].iter().map(|l| l.to_string()).collect())
}
