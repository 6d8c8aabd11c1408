use crate::services::status::{MODIFIED_FILES_COMMAND, UNTRACKED_FILES_COMMAND};
use crate::services::synthesis::DEFAULT_MARKER;
use crate::services::workspace::{DEFAULT_META_DIR, DEFAULT_RULES_FILE};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration from tabsync.yaml
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(rename = "Sync_Settings", default)]
    pub sync_settings: SyncSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSettings {
    #[serde(rename = "Marker", default = "default_marker")]
    pub marker: String,

    #[serde(rename = "Extension", default = "default_extension")]
    pub extension: String,

    #[serde(rename = "Escape Fragments", default)]
    pub escape_fragments: bool,

    #[serde(rename = "Modified Command", default = "default_modified_command")]
    pub modified_command: String,

    #[serde(rename = "Untracked Command", default = "default_untracked_command")]
    pub untracked_command: String,

    /// Seconds a single query may run before it is killed
    #[serde(rename = "Command Timeout", default = "default_command_timeout")]
    pub command_timeout: u32,

    #[serde(rename = "Meta Dir", default = "default_meta_dir")]
    pub meta_dir: String,

    #[serde(rename = "Rules File", default = "default_rules_file")]
    pub rules_file: String,

    #[serde(rename = "Debug Mode", default)]
    pub debug_mode: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            extension: default_extension(),
            escape_fragments: false,
            modified_command: default_modified_command(),
            untracked_command: default_untracked_command(),
            command_timeout: default_command_timeout(),
            meta_dir: default_meta_dir(),
            rules_file: default_rules_file(),
            debug_mode: false,
        }
    }
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_extension() -> String {
    "cs".to_string()
}

fn default_modified_command() -> String {
    MODIFIED_FILES_COMMAND.to_string()
}

fn default_untracked_command() -> String {
    UNTRACKED_FILES_COMMAND.to_string()
}

fn default_command_timeout() -> u32 {
    60
}

fn default_meta_dir() -> String {
    DEFAULT_META_DIR.to_string()
}

fn default_rules_file() -> String {
    DEFAULT_RULES_FILE.to_string()
}

/// Invalid configuration values
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Marker must not be empty")]
    EmptyMarker,

    #[error("Marker must be a single line: {0:?}")]
    MultiLineMarker(String),

    #[error("Extension must not be empty")]
    EmptyExtension,

    #[error("{0} must not be empty")]
    EmptyCommand(&'static str),

    #[error("{0} must not be empty")]
    EmptyPathComponent(&'static str),

    #[error("Command Timeout must be at least 1 second")]
    ZeroTimeout,
}

impl SyncConfig {
    /// Check the settings that would otherwise produce an unusable rule or path
    pub fn validate(&self) -> Result<(), ConfigError> {
        let settings = &self.sync_settings;

        if settings.marker.trim().is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        if settings.marker.contains(['\n', '\r']) {
            return Err(ConfigError::MultiLineMarker(settings.marker.clone()));
        }
        if settings.extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::EmptyExtension);
        }
        if settings.modified_command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand("Modified Command"));
        }
        if settings.untracked_command.trim().is_empty() {
            return Err(ConfigError::EmptyCommand("Untracked Command"));
        }
        if settings.command_timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        if settings.meta_dir.is_empty() {
            return Err(ConfigError::EmptyPathComponent("Meta Dir"));
        }
        if settings.rules_file.is_empty() {
            return Err(ConfigError::EmptyPathComponent("Rules File"));
        }

        Ok(())
    }
}
