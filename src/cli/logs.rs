//! CLI handler for viewing logs.
//!
//! This module handles terminal presentation.
//! Core logic is delegated to the `logs` module.

use crate::global;
use crate::logs::{self, LogEntry, LogsOptions};
use anyhow::Result;

use super::args::LogsCliArgs;

pub fn handle_logs_command(args: LogsCliArgs) -> Result<()> {
    let options = LogsOptions::new(args.lines);
    let result = logs::get_logs(&options, &global::logs_dir()?)?;

    println!("=== Application Logs (last {} entries) ===\n", args.lines);

    if result.app_logs.is_empty() {
        println!("No application logs found.");
    } else {
        for line in &result.app_logs {
            println!("{}", line);
        }
    }

    println!("\n=== Detection Log (last {} entries) ===\n", args.lines);

    if result.detections.is_empty() {
        println!("No detection events recorded yet.");
    } else {
        for line in &result.detections {
            println!("{}", format_detection(line));
        }
    }

    Ok(())
}

/// Render one JSONL line; lines that fail to parse are shown raw.
fn format_detection(line: &str) -> String {
    match serde_json::from_str::<LogEntry>(line) {
        Ok(entry) => format!(
            "{} [{}] {}",
            entry.ts.format("%Y-%m-%d %H:%M:%S"),
            entry.cat.as_str(),
            entry.summary()
        ),
        Err(_) => line.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_detection_line() {
        let line = r#"{"ts":"2024-05-01T10:00:00Z","cat":"state_machine","level":"info","action":"idle -> detecting(zoom)","state":"detecting(zoom)","message":"idle -> detecting(zoom)"}"#;
        assert_eq!(
            format_detection(line),
            "2024-05-01 10:00:00 [state_machine] idle -> detecting(zoom) \
             action=idle -> detecting(zoom) state=detecting(zoom)"
        );
    }

    #[test]
    fn test_unparseable_line_is_shown_raw() {
        assert_eq!(format_detection("garbage"), "garbage");
    }
}
