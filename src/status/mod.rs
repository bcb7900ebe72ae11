//! Read-only status mirror for UI and HTTP consumers.

use crate::machine::MeetingState;
use crate::platform::Platform;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use uuid::Uuid;

/// Newest entries kept in the activity log.
pub const ACTIVITY_LIMIT: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct ActivityEntry {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub platform: Option<Platform>,
}

impl ActivityEntry {
    pub fn new(message: impl Into<String>, platform: Option<Platform>) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            message: message.into(),
            platform,
        }
    }
}

/// Everything an observer can see about the service.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    pub state: MeetingState,
    pub extension_connected: bool,
    /// Newest first.
    pub activity: Vec<ActivityEntry>,
}

impl StatusSnapshot {
    pub fn active_platform(&self) -> Option<Platform> {
        self.state.platform()
    }

    pub fn description(&self) -> String {
        self.state.description()
    }
}

/// Cloneable handle; the coordinator writes, everyone else reads or subscribes.
#[derive(Clone)]
pub struct StatusHandle {
    tx: Arc<watch::Sender<StatusSnapshot>>,
}

impl Default for StatusHandle {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(StatusSnapshot::default());
        Self { tx: Arc::new(tx) }
    }
}

impl StatusHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> StatusSnapshot {
        self.tx.borrow().clone()
    }

    pub fn state(&self) -> MeetingState {
        self.tx.borrow().state.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.tx.subscribe()
    }

    /// Publish a new state; observers are only woken when it actually changed.
    pub fn set_state(&self, state: MeetingState) {
        self.tx.send_if_modified(|snapshot| {
            if snapshot.state.same_as(&state) {
                return false;
            }
            snapshot.state = state;
            true
        });
    }

    pub fn set_extension_connected(&self, connected: bool) {
        self.tx.send_if_modified(|snapshot| {
            let changed = snapshot.extension_connected != connected;
            snapshot.extension_connected = connected;
            changed
        });
    }

    pub fn add_activity(&self, message: impl Into<String>, platform: Option<Platform>) {
        let entry = ActivityEntry::new(message, platform);
        self.tx.send_modify(|snapshot| {
            snapshot.activity.insert(0, entry);
            snapshot.activity.truncate(ACTIVITY_LIMIT);
        });
    }
}
