//! Configuration handling for the modfeat CLI
//!
//! Loads `modfeat.toml`; command-line flags override whatever it sets.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CliError;

/// Looked up in the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "modfeat.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default number of worker threads
    #[serde(default = "default_threads")]
    pub threads: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Width of the reference one-hot window
    #[serde(default = "default_seq_window")]
    pub seq_window: u64,

    /// Width of the per-read alignment window
    #[serde(default = "default_ali_window")]
    pub ali_window: u64,

    /// Redo regions whose outputs already exist
    #[serde(default)]
    pub overwrite: bool,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_seq_window() -> u64 { 201 }
fn default_ali_window() -> u64 { 21 }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self { threads: default_threads() }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            seq_window: default_seq_window(),
            ali_window: default_ali_window(),
            overwrite: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .map_err(CliError::from)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }

    /// Window sizes must be positive
    pub fn validate(&self) -> Result<(), CliError> {
        if self.extract.seq_window == 0 {
            return Err(CliError::config("extract.seq_window must be at least 1"));
        }
        if self.extract.ali_window == 0 {
            return Err(CliError::config("extract.ali_window must be at least 1"));
        }
        Ok(())
    }

    /// Generate example configuration file content
    pub fn example_toml() -> Result<String> {
        toml::to_string_pretty(&Self::default()).context("Failed to serialize default configuration")
    }
}
