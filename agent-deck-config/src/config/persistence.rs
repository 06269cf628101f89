//! Config persistence and path resolution for `Config`.
//!
//! Covers:
//! - `load` / `save` (YAML file I/O with atomic write)
//! - XDG-style path helpers (`config_path`, `config_dir`, `snapshot_file_path`)

use super::Config;
use crate::ConfigError;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

impl Config {
    /// Load configuration from the default location, creating it when missing
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();
        log::info!("Config path: {:?}", config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            log::info!("Config file not found, creating default at {:?}", config_path);
            let config = Self::default();
            if let Err(e) = config.save_to(&config_path) {
                log::error!("Failed to save default config: {}", e);
                return Err(e);
            }
            Ok(config)
        }
    }

    /// Load and validate configuration from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        if contents.trim().is_empty() {
            log::info!("Config file {:?} is empty, using defaults", path);
            return Ok(Self::default());
        }

        let config: Config = serde_yaml_ng::from_str(&contents)
            .map_err(ConfigError::from)
            .with_context(|| format!("Failed to parse config from {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path())
    }

    /// Save configuration to a specific file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let yaml = serde_yaml_ng::to_string(self).context("Failed to serialize config")?;

        // Atomic save: write to temp file then rename to prevent corruption on crash
        let temp_path = path.with_extension("yaml.tmp");
        fs::write(&temp_path, &yaml)
            .with_context(|| format!("Failed to write config to {:?}", temp_path))?;
        fs::rename(&temp_path, path)
            .with_context(|| format!("Failed to move config into place at {:?}", path))?;

        Ok(())
    }

    /// Get the configuration directory path (`~/.config/agent-deck`)
    pub fn config_dir() -> PathBuf {
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir()
                .map(|dir| dir.join("agent-deck"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
        #[cfg(not(target_os = "windows"))]
        {
            dirs::home_dir()
                .map(|home| home.join(".config").join("agent-deck"))
                .unwrap_or_else(|| PathBuf::from("."))
        }
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.yaml")
    }

    /// Get the workspace snapshot path, honouring `snapshot_path`
    pub fn snapshot_file_path(&self) -> PathBuf {
        self.snapshot_path
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("workspaces.json"))
    }
}
