//! OS sensors behind the native-app detectors.
//!
//! Each sensor is a trait with a command-backed implementation and a null
//! implementation used when the backing tool is missing (or in tests). Tools
//! are located once at startup with `which`.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// One system power assertion held by a process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerAssertion {
    /// Assertion type, e.g. `PreventUserIdleSystemSleep`.
    pub kind: String,
    /// Name the owning process gave the assertion.
    pub name: String,
    pub process_name: String,
    pub pid: u32,
}

pub trait PowerAssertionSource: Send + Sync {
    fn assertions(&self) -> Result<Vec<PowerAssertion>>;
}

/// Counts open UDP sockets for a process name.
pub trait SocketCounter: Send + Sync {
    fn count_udp(&self, process_name: &str) -> Result<usize>;
}

/// Reports whether a named audio device is currently running.
pub trait AudioActivitySource: Send + Sync {
    /// Subscribe to the running state of the first device whose name contains
    /// `device`. `None` means no such device exists. Must be called from
    /// within a tokio runtime.
    fn watch(&self, device: &str) -> Option<watch::Receiver<bool>>;
}

pub struct NullAssertionSource;

impl PowerAssertionSource for NullAssertionSource {
    fn assertions(&self) -> Result<Vec<PowerAssertion>> {
        Ok(Vec::new())
    }
}

pub struct NullSocketCounter;

impl SocketCounter for NullSocketCounter {
    fn count_udp(&self, _process_name: &str) -> Result<usize> {
        Ok(0)
    }
}

pub struct NullAudioSource;

impl AudioActivitySource for NullAudioSource {
    fn watch(&self, _device: &str) -> Option<watch::Receiver<bool>> {
        None
    }
}

/// Reads assertions from `pmset -g assertions`.
pub struct PmsetAssertionSource {
    binary: PathBuf,
}

impl PmsetAssertionSource {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl PowerAssertionSource for PmsetAssertionSource {
    fn assertions(&self) -> Result<Vec<PowerAssertion>> {
        let output = Command::new(&self.binary)
            .args(["-g", "assertions"])
            .output()
            .context("Failed to execute pmset")?;

        if !output.status.success() {
            bail!("pmset exited with status {}", output.status);
        }

        Ok(parse_pmset_assertions(&String::from_utf8_lossy(
            &output.stdout,
        )))
    }
}

fn assertion_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r#"pid (\d+)\(([^)]*)\):\s+\[[^\]]*\]\s+\S+\s+(\w+)\s+named:\s+"([^"]*)""#)
            .expect("assertion pattern is valid")
    })
}

/// Parse the "Listed by owning process" section of `pmset -g assertions`.
pub fn parse_pmset_assertions(output: &str) -> Vec<PowerAssertion> {
    output
        .lines()
        .filter_map(|line| {
            let caps = assertion_line().captures(line)?;
            Some(PowerAssertion {
                pid: caps[1].parse().ok()?,
                process_name: caps[2].to_string(),
                kind: caps[3].to_string(),
                name: caps[4].to_string(),
            })
        })
        .collect()
}

/// Counts UDP sockets with `lsof -a -i UDP -c <name>`.
pub struct LsofSocketCounter {
    binary: PathBuf,
}

impl LsofSocketCounter {
    pub fn new(binary: PathBuf) -> Self {
        Self { binary }
    }
}

impl SocketCounter for LsofSocketCounter {
    fn count_udp(&self, process_name: &str) -> Result<usize> {
        let output = Command::new(&self.binary)
            .args(["-a", "-n", "-P", "-i", "UDP", "-c", process_name])
            .output()
            .context("Failed to execute lsof")?;

        // lsof exits 1 when nothing matched.
        if !output.status.success() && !output.stdout.is_empty() {
            bail!("lsof exited with status {}", output.status);
        }

        Ok(count_lsof_rows(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Number of socket rows in lsof output, excluding the header.
pub fn count_lsof_rows(output: &str) -> usize {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter(|line| !line.starts_with("COMMAND"))
        .count()
}

/// Polls `pactl` for sink/source state and publishes changes on a watch channel.
pub struct PactlAudioSource {
    binary: PathBuf,
    interval: Duration,
}

impl PactlAudioSource {
    pub fn new(binary: PathBuf, interval: Duration) -> Self {
        Self { binary, interval }
    }

    fn query(binary: &Path) -> Result<Vec<(String, bool)>> {
        let mut devices = Vec::new();
        for kind in ["sinks", "sources"] {
            let output = Command::new(binary)
                .args(["list", "short", kind])
                .output()
                .context("Failed to execute pactl")?;
            if !output.status.success() {
                bail!("pactl exited with status {}", output.status);
            }
            devices.extend(parse_pactl_short(&String::from_utf8_lossy(&output.stdout)));
        }
        Ok(devices)
    }
}

/// Parse `pactl list short sinks|sources` into (name, running) pairs.
pub fn parse_pactl_short(output: &str) -> Vec<(String, bool)> {
    output
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split('\t').collect();
            let name = fields.get(1)?;
            let state = fields.last()?;
            Some((name.to_string(), state.trim() == "RUNNING"))
        })
        .collect()
}

fn device_matches(name: &str, device: &str) -> bool {
    let normalize = |s: &str| s.to_lowercase().replace([' ', '_', '-'], "");
    normalize(name).contains(&normalize(device))
}

impl AudioActivitySource for PactlAudioSource {
    fn watch(&self, device: &str) -> Option<watch::Receiver<bool>> {
        let devices = Self::query(&self.binary)
            .map_err(|e| debug!("pactl query failed: {}", e))
            .ok()?;
        let (_, running) = devices
            .iter()
            .find(|(name, _)| device_matches(name, device))?;

        let (tx, rx) = watch::channel(*running);
        let binary = self.binary.clone();
        let device = device.to_string();
        let interval = self.interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if tx.is_closed() {
                    break;
                }
                let bin = binary.clone();
                let result = tokio::task::spawn_blocking(move || Self::query(&bin)).await;
                match result {
                    Ok(Ok(devices)) => {
                        let running = devices
                            .iter()
                            .any(|(name, running)| *running && device_matches(name, &device));
                        tx.send_if_modified(|current| {
                            let changed = *current != running;
                            *current = running;
                            changed
                        });
                    }
                    Ok(Err(e)) => debug!("pactl poll failed: {}", e),
                    Err(e) => warn!("pactl poll task failed: {}", e),
                }
            }
            debug!("Stopped audio watch for '{}'", device);
        });

        Some(rx)
    }
}

/// The sensor set handed to every composite detector.
#[derive(Clone)]
pub struct Sensors {
    pub assertions: Arc<dyn PowerAssertionSource>,
    pub sockets: Arc<dyn SocketCounter>,
    pub audio: Arc<dyn AudioActivitySource>,
}

impl Sensors {
    pub fn null() -> Self {
        Self {
            assertions: Arc::new(NullAssertionSource),
            sockets: Arc::new(NullSocketCounter),
            audio: Arc::new(NullAudioSource),
        }
    }

    /// Sensors backed by whichever system tools are installed.
    pub fn system(audio_poll: Duration) -> Self {
        let mut sensors = Self::null();

        match which::which("pmset") {
            Ok(path) => {
                info!("Power assertions via {}", path.display());
                sensors.assertions = Arc::new(PmsetAssertionSource::new(path));
            }
            Err(_) => warn!("pmset not found; power assertion sensor disabled"),
        }

        match which::which("lsof") {
            Ok(path) => {
                info!("UDP socket counts via {}", path.display());
                sensors.sockets = Arc::new(LsofSocketCounter::new(path));
            }
            Err(_) => warn!("lsof not found; network sensor disabled"),
        }

        match which::which("pactl") {
            Ok(path) => {
                info!("Audio device state via {}", path.display());
                sensors.audio = Arc::new(PactlAudioSource::new(path, audio_poll));
            }
            Err(_) => warn!("pactl not found; audio device sensor disabled"),
        }

        sensors
    }
}
