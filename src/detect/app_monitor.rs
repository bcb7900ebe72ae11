//! Tracks which meeting apps are running.

use crate::platform::Platform;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Periodically scans the process table and publishes the set of meeting
/// platforms with a running process.
pub struct AppMonitor {
    tx: Arc<watch::Sender<HashSet<Platform>>>,
    interval: Duration,
    cancel: Mutex<Option<CancellationToken>>,
}

impl AppMonitor {
    pub fn new(interval: Duration) -> Self {
        let (tx, _rx) = watch::channel(HashSet::new());
        Self {
            tx: Arc::new(tx),
            interval,
            cancel: Mutex::new(None),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<HashSet<Platform>> {
        self.tx.subscribe()
    }

    pub fn running(&self) -> HashSet<Platform> {
        self.tx.borrow().clone()
    }

    /// Replace the running set, logging launches and exits. Returns true on change.
    pub fn publish(&self, running: HashSet<Platform>) -> bool {
        publish_running(&self.tx, running)
    }

    pub fn start(&self) {
        let token = CancellationToken::new();
        if let Ok(mut cancel) = self.cancel.lock() {
            if let Some(previous) = cancel.replace(token.clone()) {
                previous.cancel();
            }
        }

        let tx = self.tx.clone();
        let interval = self.interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                match tokio::task::spawn_blocking(scan_processes).await {
                    Ok(running) => {
                        publish_running(&tx, running);
                    }
                    Err(e) => warn!("Process scan failed: {}", e),
                }
            }
        });
    }

    pub fn stop(&self) {
        if let Ok(mut cancel) = self.cancel.lock() {
            if let Some(token) = cancel.take() {
                token.cancel();
            }
        }
    }
}

fn publish_running(tx: &watch::Sender<HashSet<Platform>>, running: HashSet<Platform>) -> bool {
    tx.send_if_modified(|current| {
        if *current == running {
            return false;
        }
        for platform in running.difference(current) {
            info!("{} launched", platform.display_name());
        }
        for platform in current.difference(&running) {
            info!("{} quit", platform.display_name());
        }
        *current = running;
        true
    })
}

/// Map process names onto the platforms they belong to.
pub fn platforms_for<I, S>(names: I) -> HashSet<Platform>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    names
        .into_iter()
        .filter_map(|name| Platform::from_process_name(name.as_ref()))
        .collect()
}

pub fn scan_processes() -> HashSet<Platform> {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);
    platforms_for(
        system
            .processes()
            .values()
            .map(|process| process.name().to_string_lossy().into_owned()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platforms_for_process_names() {
        let running = platforms_for(["zoom.us", "bash", "MSTeams", "CptHost"]);
        assert_eq!(running, HashSet::from([Platform::Zoom, Platform::Teams]));
        assert!(platforms_for(["bash", "sshd"]).is_empty());
    }

    #[test]
    fn test_publish_only_notifies_on_change() {
        let monitor = AppMonitor::new(Duration::from_secs(5));
        let mut rx = monitor.subscribe();

        assert!(monitor.publish(HashSet::from([Platform::Slack])));
        assert!(rx.has_changed().unwrap());
        let _ = rx.borrow_and_update();

        assert!(!monitor.publish(HashSet::from([Platform::Slack])));
        assert!(!rx.has_changed().unwrap());
        assert_eq!(monitor.running(), HashSet::from([Platform::Slack]));
    }
}
