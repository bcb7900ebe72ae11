//! Pure meeting state machine.
//!
//! Evidence and timer expirations go in; the new state and an ordered list of
//! side effects come out. Nothing here performs I/O or owns a timer: timers
//! are requested through [`SideEffect::StartTimer`] and fired by the caller.

use std::time::Duration;

use super::state::{ErrorKind, MeetingState, SideEffect, TimerId};
use crate::signal::Signal;

pub const DEFAULT_START_DEBOUNCE: Duration = Duration::from_secs(5);
pub const DEFAULT_STOP_GRACE: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy)]
pub struct MachineTimings {
    /// Continuous evidence required before recording starts.
    pub start_debounce: Duration,
    /// Silence tolerated before an active recording is stopped.
    pub stop_grace: Duration,
}

impl Default for MachineTimings {
    fn default() -> Self {
        Self {
            start_debounce: DEFAULT_START_DEBOUNCE,
            stop_grace: DEFAULT_STOP_GRACE,
        }
    }
}

#[derive(Debug, Default)]
pub struct MeetingStateMachine {
    state: MeetingState,
    timings: MachineTimings,
}

impl MeetingStateMachine {
    pub fn new(timings: MachineTimings) -> Self {
        Self {
            state: MeetingState::Idle,
            timings,
        }
    }

    pub fn state(&self) -> &MeetingState {
        &self.state
    }

    pub fn timings(&self) -> MachineTimings {
        self.timings
    }

    /// Apply one piece of evidence.
    pub fn transition(&mut self, signal: &Signal) -> Vec<SideEffect> {
        let old = self.state.clone();
        let mut effects = Vec::new();

        let next = match (&self.state, signal.is_active) {
            (MeetingState::Idle, true) => {
                effects.push(self.start_debounce());
                Some(MeetingState::Detecting {
                    platform: signal.platform,
                    since: signal.timestamp,
                })
            }
            (MeetingState::Idle, false) => None,

            // Debounce is already running for this platform.
            (MeetingState::Detecting { platform, .. }, true) if *platform == signal.platform => {
                None
            }
            (MeetingState::Detecting { .. }, true) => {
                effects.push(SideEffect::CancelTimer(TimerId::StartDebounce));
                effects.push(self.start_debounce());
                Some(MeetingState::Detecting {
                    platform: signal.platform,
                    since: signal.timestamp,
                })
            }
            (MeetingState::Detecting { .. }, false) => {
                effects.push(SideEffect::CancelTimer(TimerId::StartDebounce));
                Some(MeetingState::Idle)
            }

            // Grace may or may not be running; cancelling is harmless either way.
            (MeetingState::Recording { platform }, true) if *platform == signal.platform => {
                effects.push(SideEffect::CancelTimer(TimerId::StopGrace));
                None
            }
            (MeetingState::Recording { .. }, true) => {
                effects.push(SideEffect::StopRecording);
                effects.push(SideEffect::CancelTimer(TimerId::StopGrace));
                effects.push(self.start_debounce());
                Some(MeetingState::Detecting {
                    platform: signal.platform,
                    since: signal.timestamp,
                })
            }
            (MeetingState::Recording { .. }, false) => {
                effects.push(SideEffect::StartTimer {
                    duration: self.timings.stop_grace,
                    id: TimerId::StopGrace,
                });
                None
            }

            // Sticky until clear_error.
            (MeetingState::Error { .. }, _) => None,
        };

        if let Some(next) = next {
            self.state = next;
        }
        self.log_if_changed(old, &mut effects);
        effects
    }

    /// The start-debounce timer elapsed.
    pub fn debounce_fired(&mut self) -> Vec<SideEffect> {
        let MeetingState::Detecting { platform, .. } = self.state else {
            return Vec::new();
        };
        let old = std::mem::replace(&mut self.state, MeetingState::Recording { platform });
        vec![
            SideEffect::StartRecording(platform),
            SideEffect::LogTransition {
                from: old,
                to: self.state.clone(),
            },
        ]
    }

    /// The stop-grace timer elapsed.
    pub fn grace_fired(&mut self) -> Vec<SideEffect> {
        if !self.state.is_recording() {
            return Vec::new();
        }
        let old = std::mem::replace(&mut self.state, MeetingState::Idle);
        vec![
            SideEffect::StopRecording,
            SideEffect::LogTransition {
                from: old,
                to: MeetingState::Idle,
            },
        ]
    }

    pub fn timer_fired(&mut self, id: TimerId) -> Vec<SideEffect> {
        match id {
            TimerId::StartDebounce => self.debounce_fired(),
            TimerId::StopGrace => self.grace_fired(),
        }
    }

    /// Enter the sticky error state. An in-progress recording is left running.
    pub fn set_error(&mut self, kind: ErrorKind) -> Vec<SideEffect> {
        let old = std::mem::replace(&mut self.state, MeetingState::Error { kind });
        let mut effects = Vec::new();
        self.log_if_changed(old, &mut effects);
        effects
    }

    pub fn clear_error(&mut self) -> Vec<SideEffect> {
        if !self.state.is_error() {
            return Vec::new();
        }
        let old = std::mem::replace(&mut self.state, MeetingState::Idle);
        vec![SideEffect::LogTransition {
            from: old,
            to: MeetingState::Idle,
        }]
    }

    /// Force `Idle` across a sleep/wake boundary.
    pub fn reset(&mut self) -> Vec<SideEffect> {
        let old = std::mem::replace(&mut self.state, MeetingState::Idle);
        let mut effects = Vec::new();
        if old.is_recording() {
            effects.push(SideEffect::StopRecording);
        }
        effects.push(SideEffect::CancelTimer(TimerId::StartDebounce));
        effects.push(SideEffect::CancelTimer(TimerId::StopGrace));
        self.log_if_changed(old, &mut effects);
        effects
    }

    fn start_debounce(&self) -> SideEffect {
        SideEffect::StartTimer {
            duration: self.timings.start_debounce,
            id: TimerId::StartDebounce,
        }
    }

    fn log_if_changed(&self, old: MeetingState, effects: &mut Vec<SideEffect>) {
        if !old.same_as(&self.state) {
            effects.push(SideEffect::LogTransition {
                from: old,
                to: self.state.clone(),
            });
        }
    }
}
