//! Config command implementation - print or write an example configuration

use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;

pub fn execute(output: Option<PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            Config::default().save_to_file(&path)?;
            log::info!("Example configuration written to: {}", path.display());
        }
        None => print!("{}", Config::example_toml()?),
    }
    Ok(())
}
