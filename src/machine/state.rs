//! Meeting state, error taxonomy, and the side effects a transition can request.

use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Permission the recorder automation depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Accessibility,
    ScreenRecording,
}

impl Permission {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accessibility => "accessibility",
            Self::ScreenRecording => "screen_recording",
        }
    }
}

/// Persistent failures that move the machine into the sticky error state.
///
/// The `Display` text is what the status surface shows to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum ErrorKind {
    #[error("Recorder automation is not responding")]
    AutomationUnresponsive,
    #[error("Recorder is not running")]
    AutomationNotRunning,
    #[error("UI element not found: {0}")]
    ElementNotFound(String),
    #[error("{} permission denied", .0.as_str())]
    PermissionDenied(Permission),
    #[error("Browser bridge transport unavailable")]
    TransportUnavailable,
}

impl ErrorKind {
    pub fn label(&self) -> String {
        match self {
            Self::AutomationUnresponsive => "automation_unresponsive".to_string(),
            Self::AutomationNotRunning => "automation_not_running".to_string(),
            Self::ElementNotFound(desc) => format!("element_not_found:{desc}"),
            Self::PermissionDenied(perm) => format!("permission_denied:{}", perm.as_str()),
            Self::TransportUnavailable => "transport_unavailable".to_string(),
        }
    }
}

/// The single authoritative meeting state.
///
/// Intentionally not `PartialEq`: two `Detecting` states for the same platform
/// must compare equal regardless of `since`, so comparisons go through
/// [`MeetingState::same_as`].
#[derive(Debug, Clone, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum MeetingState {
    #[default]
    Idle,
    Detecting {
        platform: Platform,
        since: DateTime<Utc>,
    },
    Recording {
        platform: Platform,
    },
    Error {
        kind: ErrorKind,
    },
}

impl MeetingState {
    /// State equality that ignores when detection started.
    pub fn same_as(&self, other: &MeetingState) -> bool {
        match (self, other) {
            (Self::Idle, Self::Idle) => true,
            (Self::Detecting { platform: a, .. }, Self::Detecting { platform: b, .. }) => a == b,
            (Self::Recording { platform: a }, Self::Recording { platform: b }) => a == b,
            (Self::Error { kind: a }, Self::Error { kind: b }) => a == b,
            _ => false,
        }
    }

    pub fn platform(&self) -> Option<Platform> {
        match self {
            Self::Detecting { platform, .. } | Self::Recording { platform } => Some(*platform),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, Self::Recording { .. })
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    /// Compact label used in logs, e.g. `recording(zoom)`.
    pub fn label(&self) -> String {
        match self {
            Self::Idle => "idle".to_string(),
            Self::Detecting { platform, .. } => format!("detecting({platform})"),
            Self::Recording { platform } => format!("recording({platform})"),
            Self::Error { kind } => format!("error({})", kind.label()),
        }
    }

    /// Human-readable status line.
    pub fn description(&self) -> String {
        match self {
            Self::Idle => "Idle - No meeting detected".to_string(),
            Self::Detecting { platform, .. } => {
                format!("Detecting {}...", platform.display_name())
            }
            Self::Recording { platform } => format!("Recording {}", platform.display_name()),
            Self::Error { kind } => format!("Error: {kind}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerId {
    StartDebounce,
    StopGrace,
}

impl TimerId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartDebounce => "start_debounce",
            Self::StopGrace => "stop_grace",
        }
    }
}

/// Instruction returned by the state machine for the coordinator to execute.
#[derive(Debug, Clone)]
pub enum SideEffect {
    StartRecording(Platform),
    StopRecording,
    StartTimer { duration: Duration, id: TimerId },
    CancelTimer(TimerId),
    LogTransition { from: MeetingState, to: MeetingState },
}

impl SideEffect {
    pub fn is_log(&self) -> bool {
        matches!(self, Self::LogTransition { .. })
    }
}
