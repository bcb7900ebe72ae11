//! Automatic meeting detection.
//!
//! Native app detectors and a browser extension bridge feed [`signal::Signal`]s
//! into the [`coordinator`], which runs them through the meeting state machine
//! and drives an external recorder.

pub mod api;
pub mod app;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod detect;
pub mod global;
pub mod logs;
pub mod machine;
pub mod platform;
pub mod recorder;
pub mod signal;
pub mod status;
pub mod suspend;
