mod args;
mod config;
mod logs;

pub use args::{Cli, CliCommand, LogsCliArgs};
pub use config::handle_config_command;
pub use logs::handle_logs_command;
