use crate::models::SyncConfig;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// File name of the sync configuration
pub const CONFIG_FILE_NAME: &str = "tabsync.yaml";

/// Configuration manager for loading and saving `tabsync.yaml`.
///
/// The config directory is not created until a config is saved; a missing
/// file simply means defaults.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    config_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager for the specified configuration directory.
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Self {
        let config_dir = config_dir.as_ref().to_path_buf();
        Self {
            config_path: config_dir.join(CONFIG_FILE_NAME),
            config_dir,
        }
    }

    /// Load and validate the sync configuration.
    ///
    /// # Returns
    /// The loaded SyncConfig, or defaults if the file doesn't exist
    pub fn load_sync_config(&self) -> Result<SyncConfig> {
        if !self.config_path.exists() {
            tracing::warn!(
                "Config file not found at {}, using defaults",
                self.config_path
            );
            return Ok(SyncConfig::default());
        }

        let file_contents = fs::read_to_string(&self.config_path)
            .with_context(|| format!("Failed to read config: {}", self.config_path))?;

        // An empty file deserializes as unit, not as an empty map
        let config: SyncConfig = if file_contents.trim().is_empty() {
            SyncConfig::default()
        } else {
            serde_yaml_ng::from_str(&file_contents)
                .with_context(|| format!("Failed to parse config: {}", self.config_path))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid config: {}", self.config_path))?;

        tracing::info!("Loaded config from {}", self.config_path);
        Ok(config)
    }

    /// Save the sync configuration, creating the config directory if needed.
    pub fn save_sync_config(&self, config: &SyncConfig) -> Result<()> {
        if !self.config_dir.exists() {
            fs::create_dir_all(&self.config_dir).with_context(|| {
                format!("Failed to create config directory: {}", self.config_dir)
            })?;
        }

        let yaml_string =
            serde_yaml_ng::to_string(config).context("Failed to serialize config to YAML")?;

        fs::write(&self.config_path, yaml_string)
            .with_context(|| format!("Failed to write config: {}", self.config_path))?;

        tracing::info!("Saved config to {}", self.config_path);
        Ok(())
    }

    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    pub fn config_path(&self) -> &Utf8Path {
        &self.config_path
    }
}
