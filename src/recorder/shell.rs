//! Recorder backend that shells out to user-configured commands.

use super::{AutomationError, RecorderBackend};
use crate::platform::Platform;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Environment variables describing the meeting, set for every command.
pub mod recorder_env {
    pub const PLATFORM: &str = "MEETREC_PLATFORM";
    pub const TARGET: &str = "MEETREC_TARGET";
    pub const DISPLAY_NAME: &str = "MEETREC_DISPLAY_NAME";
}

/// Exit codes a command uses to report specific failures.
pub mod exit_code {
    pub const NOT_RUNNING: i32 = 3;
    pub const ELEMENT_NOT_FOUND: i32 = 4;
    pub const PERMISSION_DENIED: i32 = 5;
}

/// Runs `sh -c <command>` to start or stop the recorder.
/// - Kills the process on timeout
/// - Maps exit codes onto [`AutomationError`]
pub struct ShellCommandRecorder {
    start_command: String,
    stop_command: String,
    timeout: Duration,
}

impl ShellCommandRecorder {
    pub fn new(start_command: String, stop_command: String, timeout_seconds: u64) -> Self {
        Self {
            start_command,
            stop_command,
            timeout: Duration::from_secs(timeout_seconds),
        }
    }

    async fn run(&self, command: &str, platform: Option<Platform>) -> Result<(), AutomationError> {
        if command.trim().is_empty() {
            debug!("No recorder command configured; skipping");
            return Ok(());
        }

        let mut cmd = tokio::process::Command::new("sh");
        cmd.arg("-c")
            .arg(command)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(platform) = platform {
            cmd.env(recorder_env::PLATFORM, platform.as_str())
                .env(recorder_env::TARGET, platform.automation_target())
                .env(recorder_env::DISPLAY_NAME, platform.display_name());
        }

        let child = cmd
            .spawn()
            .map_err(|e| AutomationError::ActionFailed(format!("failed to spawn: {e}")))?;

        // kill_on_drop handles cleanup on timeout
        match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                if !stdout.trim().is_empty() {
                    info!("Recorder command stdout: {}", stdout.trim());
                }
                let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                match output.status.code() {
                    Some(0) => Ok(()),
                    code => {
                        warn!(
                            "Recorder command exited with status {}: {}",
                            output.status, stderr
                        );
                        Err(map_exit_code(code, stderr))
                    }
                }
            }
            Ok(Err(e)) => Err(AutomationError::ActionFailed(e.to_string())),
            Err(_) => {
                warn!(
                    "Recorder command timed out after {}s (process will be killed)",
                    self.timeout.as_secs()
                );
                Err(AutomationError::Timeout)
            }
        }
    }
}

fn map_exit_code(code: Option<i32>, stderr: String) -> AutomationError {
    match code {
        Some(exit_code::NOT_RUNNING) => AutomationError::NotRunning,
        Some(exit_code::ELEMENT_NOT_FOUND) => AutomationError::ElementNotFound(stderr),
        Some(exit_code::PERMISSION_DENIED) => AutomationError::PermissionDenied,
        Some(code) => AutomationError::ActionFailed(format!("exit code {code}: {stderr}")),
        None => AutomationError::ActionFailed(format!("terminated by signal: {stderr}")),
    }
}

#[async_trait]
impl RecorderBackend for ShellCommandRecorder {
    async fn start_recording(&self, platform: Platform) -> Result<(), AutomationError> {
        info!(
            "Starting recorder for {} ({})",
            platform.display_name(),
            platform.automation_target()
        );
        self.run(&self.start_command, Some(platform)).await
    }

    async fn stop_recording(&self) -> Result<(), AutomationError> {
        info!("Stopping recorder");
        self.run(&self.stop_command, None).await
    }
}
