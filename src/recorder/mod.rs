//! External recorder automation.
//!
//! The service never records anything itself; it asks an external recorder
//! to start or stop. The backend is a trait so the shell-command backend can
//! be swapped for a dry-run one (or a fake in tests).

pub mod shell;
pub mod worker;

use crate::machine::{ErrorKind, Permission};
use crate::platform::Platform;
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use shell::ShellCommandRecorder;
pub use worker::{RecorderCommand, RecorderQueue};

/// Failure reported by a recorder backend.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AutomationError {
    #[error("recorder is not running")]
    NotRunning,
    #[error("UI element not found: {0}")]
    ElementNotFound(String),
    #[error("permission denied")]
    PermissionDenied,
    #[error("automation timed out")]
    Timeout,
    #[error("automation failed: {0}")]
    ActionFailed(String),
}

impl AutomationError {
    /// The persistent error a failed start puts the machine into.
    pub fn to_error_kind(&self) -> ErrorKind {
        match self {
            Self::NotRunning => ErrorKind::AutomationNotRunning,
            Self::ElementNotFound(desc) => ErrorKind::ElementNotFound(desc.clone()),
            Self::PermissionDenied => ErrorKind::PermissionDenied(Permission::Accessibility),
            Self::Timeout | Self::ActionFailed(_) => ErrorKind::AutomationUnresponsive,
        }
    }
}

#[async_trait]
pub trait RecorderBackend: Send + Sync {
    async fn start_recording(&self, platform: Platform) -> Result<(), AutomationError>;
    async fn stop_recording(&self) -> Result<(), AutomationError>;
}

/// Logs what it would do. Used when no recorder command is configured.
pub struct DryRunRecorder;

#[async_trait]
impl RecorderBackend for DryRunRecorder {
    async fn start_recording(&self, platform: Platform) -> Result<(), AutomationError> {
        info!(
            "[dry-run] start recording {} ({})",
            platform.display_name(),
            platform.automation_target()
        );
        Ok(())
    }

    async fn stop_recording(&self) -> Result<(), AutomationError> {
        info!("[dry-run] stop recording");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(
            AutomationError::NotRunning.to_error_kind(),
            ErrorKind::AutomationNotRunning
        );
        assert_eq!(
            AutomationError::ElementNotFound("Record Zoom".to_string()).to_error_kind(),
            ErrorKind::ElementNotFound("Record Zoom".to_string())
        );
        assert_eq!(
            AutomationError::PermissionDenied.to_error_kind(),
            ErrorKind::PermissionDenied(Permission::Accessibility)
        );
        assert_eq!(
            AutomationError::Timeout.to_error_kind(),
            ErrorKind::AutomationUnresponsive
        );
        assert_eq!(
            AutomationError::ActionFailed("boom".to_string()).to_error_kind(),
            ErrorKind::AutomationUnresponsive
        );
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let recorder = DryRunRecorder;
        assert!(recorder.start_recording(Platform::Teams).await.is_ok());
        assert!(recorder.stop_recording().await.is_ok());
    }
}
