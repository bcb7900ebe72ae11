//! API route modules.

pub mod control;
pub mod extension;
pub mod logs;
pub mod status;
