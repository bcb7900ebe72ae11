use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "meetrec")]
#[command(about = "Detects meetings and drives a recorder", long_about = None)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Config file to use instead of the default location
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<CliCommand>,
}

#[derive(Subcommand, Debug)]
pub enum CliCommand {
    /// Print version information
    Version,
    /// Show recent service and detection logs
    Logs(LogsCliArgs),
    /// Print the effective config path and contents
    Config,
}

#[derive(ClapArgs, Debug)]
pub struct LogsCliArgs {
    /// Number of log entries to show
    #[arg(short = 'n', long, default_value = "50")]
    pub lines: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_runs_daemon() {
        let cli = Cli::try_parse_from(["meetrec"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_logs_line_count() {
        let cli = Cli::try_parse_from(["meetrec", "logs", "-n", "10"]).unwrap();
        match cli.command {
            Some(CliCommand::Logs(args)) => assert_eq!(args.lines, 10),
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["meetrec", "config", "-v", "-c", "/tmp/m.toml"]).unwrap();
        assert!(matches!(cli.command, Some(CliCommand::Config)));
        assert!(cli.verbose);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/m.toml")));
    }

    #[test]
    fn test_command_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
