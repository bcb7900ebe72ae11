//! Meeting state machine.
//!
//! Turns signals and timer expirations into a single authoritative
//! [`MeetingState`] plus the side effects the coordinator must execute.

pub mod meeting_machine;
pub mod state;

pub use meeting_machine::{
    MachineTimings, MeetingStateMachine, DEFAULT_START_DEBOUNCE, DEFAULT_STOP_GRACE,
};
pub use state::{ErrorKind, MeetingState, Permission, SideEffect, TimerId};
