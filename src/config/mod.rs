use crate::bridge::DEFAULT_GRACE;
use crate::detect::platforms;
use crate::detect::PlatformProfile;
use crate::global;
use crate::logs::DEFAULT_MAX_BYTES;
use crate::machine::MachineTimings;
use crate::platform::Platform;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub timing: TimingConfig,
    pub bridge: BridgeConfig,
    pub automation: AutomationConfig,
    pub logging: LoggingConfig,
    pub suspend: SuspendConfig,
    pub detectors: DetectorsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub start_debounce_secs: u64,
    pub stop_grace_secs: u64,
    pub window_poll_secs: u64,
    pub sensor_poll_secs: u64,
    pub app_scan_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            start_debounce_secs: 5,
            stop_grace_secs: 15,
            window_poll_secs: 3,
            sensor_poll_secs: 3,
            app_scan_secs: 5,
        }
    }
}

impl TimingConfig {
    pub fn machine_timings(&self) -> MachineTimings {
        MachineTimings {
            start_debounce: Duration::from_secs(self.start_debounce_secs),
            stop_grace: Duration::from_secs(self.stop_grace_secs),
        }
    }

    pub fn window_poll(&self) -> Duration {
        Duration::from_secs(self.window_poll_secs.max(1))
    }

    pub fn sensor_poll(&self) -> Duration {
        Duration::from_secs(self.sensor_poll_secs.max(1))
    }

    pub fn app_scan(&self) -> Duration {
        Duration::from_secs(self.app_scan_secs.max(1))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    /// How long an inactive browser verdict is held back after the last
    /// active report. Must exceed the extension's heartbeat interval.
    pub grace_secs: u64,
    pub heartbeat_interval_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8765,
            grace_secs: DEFAULT_GRACE.as_secs(),
            heartbeat_interval_secs: 20,
        }
    }
}

impl BridgeConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationConfig {
    /// Shell command that starts a recording.
    /// Env vars: MEETREC_PLATFORM, MEETREC_TARGET, MEETREC_DISPLAY_NAME
    pub start_command: String,
    /// Shell command that stops the current recording.
    pub stop_command: String,
    pub timeout_secs: u64,
}

impl Default for AutomationConfig {
    fn default() -> Self {
        Self {
            start_command: String::new(),
            stop_command: String::new(),
            timeout_secs: 10,
        }
    }
}

impl AutomationConfig {
    /// No commands configured means recordings are only logged.
    pub fn is_dry_run(&self) -> bool {
        self.start_command.trim().is_empty() && self.stop_command.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append detection events to detection.jsonl.
    pub file: bool,
    pub max_bytes: u64,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: true,
            max_bytes: DEFAULT_MAX_BYTES,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuspendConfig {
    pub enabled: bool,
    pub check_secs: u64,
    pub gap_secs: u64,
}

impl Default for SuspendConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_secs: 5,
            gap_secs: 30,
        }
    }
}

/// Per-platform heuristics. A section present in the file replaces the
/// built-in profile for that platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorsConfig {
    #[serde(default = "platforms::teams::profile")]
    pub teams: PlatformProfile,
    #[serde(default = "platforms::zoom::profile")]
    pub zoom: PlatformProfile,
    #[serde(default = "platforms::slack::profile")]
    pub slack: PlatformProfile,
    #[serde(default = "platforms::facetime::profile")]
    pub facetime: PlatformProfile,
    #[serde(default = "platforms::chime::profile")]
    pub chime: PlatformProfile,
}

impl Default for DetectorsConfig {
    fn default() -> Self {
        Self {
            teams: platforms::teams::profile(),
            zoom: platforms::zoom::profile(),
            slack: platforms::slack::profile(),
            facetime: platforms::facetime::profile(),
            chime: platforms::chime::profile(),
        }
    }
}

impl DetectorsConfig {
    pub fn profile(&self, platform: Platform) -> Option<&PlatformProfile> {
        match platform {
            Platform::Teams => Some(&self.teams),
            Platform::Zoom => Some(&self.zoom),
            Platform::Slack => Some(&self.slack),
            Platform::FaceTime => Some(&self.facetime),
            Platform::Chime => Some(&self.chime),
            Platform::Browser => None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load from `path`, writing the defaults there first if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("Config file not found, creating default at {:?}", path);
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        global::config_file()
    }

    /// Settings that load fine but will misbehave at runtime.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.bridge.enabled && self.bridge.grace_secs <= self.bridge.heartbeat_interval_secs {
            warnings.push(format!(
                "bridge.grace_secs ({}) should exceed bridge.heartbeat_interval_secs ({}); \
                 browser meetings may flap between heartbeats",
                self.bridge.grace_secs, self.bridge.heartbeat_interval_secs
            ));
        }
        if self.timing.start_debounce_secs == 0 {
            warnings.push("timing.start_debounce_secs is 0; every blip will record".to_string());
        }
        if self.suspend.enabled && self.suspend.gap_secs <= self.suspend.check_secs {
            warnings.push(format!(
                "suspend.gap_secs ({}) should exceed suspend.check_secs ({})",
                self.suspend.gap_secs, self.suspend.check_secs
            ));
        }
        let any_native = Platform::native()
            .any(|p| self.detectors.profile(p).is_some_and(|profile| profile.enabled));
        if !any_native && !self.bridge.enabled {
            warnings.push("every detector is disabled; nothing will be recorded".to_string());
        }

        warnings
    }

    pub fn log_warnings(&self) {
        for warning in self.warnings() {
            warn!("{}", warning);
        }
    }
}
