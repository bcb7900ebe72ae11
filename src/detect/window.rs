//! On-screen window enumeration.

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Mutex, OnceLock};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// One entry of the OS window list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowInfo {
    pub owner_name: String,
    pub owner_pid: u32,
    pub title: String,
    /// Stacking layer; 0 is the normal application layer.
    pub layer: i32,
}

impl WindowInfo {
    pub fn new(owner_name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            owner_name: owner_name.into(),
            owner_pid: 0,
            title: title.into(),
            layer: 0,
        }
    }
}

/// A detector that wants the window list every fan-out cycle.
pub trait WindowConsumer: Send + Sync {
    fn process_windows(&self, windows: &[WindowInfo]);
}

/// The (expensive) OS query the fan-out amortizes.
pub trait WindowSource: Send + Sync {
    fn list_windows(&self) -> Result<Vec<WindowInfo>>;
}

/// Used when no window listing tool is available.
pub struct NullWindowSource;

impl WindowSource for NullWindowSource {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        Ok(Vec::new())
    }
}

/// Lists managed windows through `wmctrl -lp`, resolving owner names by pid.
pub struct WmctrlWindowSource {
    binary: PathBuf,
    system: Mutex<System>,
}

impl WmctrlWindowSource {
    pub fn new(binary: PathBuf) -> Self {
        Self {
            binary,
            system: Mutex::new(System::new()),
        }
    }

    fn owner_names(&self, pids: &[u32]) -> Vec<(u32, String)> {
        let Ok(mut system) = self.system.lock() else {
            return Vec::new();
        };
        let pids: Vec<Pid> = pids.iter().map(|pid| Pid::from_u32(*pid)).collect();
        system.refresh_processes(ProcessesToUpdate::Some(&pids), true);

        pids.iter()
            .filter_map(|pid| {
                let process = system.process(*pid)?;
                Some((pid.as_u32(), process.name().to_string_lossy().into_owned()))
            })
            .collect()
    }
}

impl WindowSource for WmctrlWindowSource {
    fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        let output = std::process::Command::new(&self.binary)
            .arg("-lp")
            .output()
            .context("Failed to execute wmctrl")?;

        if !output.status.success() {
            bail!("wmctrl exited with status {}", output.status);
        }

        let mut windows = parse_wmctrl(&String::from_utf8_lossy(&output.stdout));
        let mut pids: Vec<u32> = windows.iter().map(|w| w.owner_pid).collect();
        pids.sort_unstable();
        pids.dedup();

        let names = self.owner_names(&pids);
        for window in &mut windows {
            if let Some((_, name)) = names.iter().find(|(pid, _)| *pid == window.owner_pid) {
                window.owner_name = name.clone();
            }
        }
        Ok(windows)
    }
}

fn wmctrl_line() -> &'static Regex {
    static LINE: OnceLock<Regex> = OnceLock::new();
    LINE.get_or_init(|| {
        Regex::new(r"^0x[0-9a-fA-F]+\s+(-?\d+)\s+(\d+)\s+\S+\s?(.*)$")
            .expect("wmctrl line pattern is valid")
    })
}

/// Parse `wmctrl -lp` output. Owner names are filled in later from the pid.
pub fn parse_wmctrl(output: &str) -> Vec<WindowInfo> {
    output
        .lines()
        .filter_map(|line| {
            let caps = wmctrl_line().captures(line.trim_end())?;
            let desktop: i32 = caps[1].parse().ok()?;
            let pid: u32 = caps[2].parse().ok()?;
            Some(WindowInfo {
                owner_name: String::new(),
                owner_pid: pid,
                title: caps[3].trim().to_string(),
                // Sticky windows (desktop -1) sit above the normal layer.
                layer: if desktop < 0 { 1 } else { 0 },
            })
        })
        .collect()
}
