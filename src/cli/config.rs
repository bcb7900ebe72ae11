use crate::config::Config;
use anyhow::{Context, Result};
use std::path::PathBuf;

pub fn handle_config_command(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let config = Config::load_from(&path)?;

    println!("# {}", path.display());
    println!(
        "{}",
        toml::to_string_pretty(&config).context("Failed to serialize config")?
    );

    let warnings = config.warnings();
    if !warnings.is_empty() {
        println!("# Warnings:");
        for warning in warnings {
            println!("#   {}", warning);
        }
    }

    Ok(())
}
