//! Persistent user settings.
//!
//! Stored as a single JSON object under the `settings` key of the config
//! table. Missing or unreadable settings fall back to defaults.

use serde::{Deserialize, Serialize};
use sieve_core::{ExportFormat, RuleMode};
use sieve_storage::{Database, StorageError};
use thiserror::Error;

/// Config key holding the settings object.
const CONFIG_KEY_SETTINGS: &str = "settings";

/// Setting names accepted by [`AppSettings::set`].
pub const SETTING_KEYS: [&str; 2] = ["default_mode", "default_export_format"];

/// Errors that can occur while reading or changing settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// No setting with this name.
    #[error("unknown setting '{0}' (expected one of: default_mode, default_export_format)")]
    UnknownKey(String),

    /// The value does not parse for this setting.
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: String, value: String },

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

/// User preferences applied when a command leaves them unspecified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Mode used by `filter` and `export` without `--mode`.
    pub default_mode: RuleMode,
    /// Format used by `export` without `--format`.
    pub default_export_format: ExportFormat,
}

impl AppSettings {
    /// Loads settings, falling back to defaults.
    pub fn load(db: &Database) -> Result<Self> {
        Ok(db.get_config_or_default(CONFIG_KEY_SETTINGS, Self::default())?)
    }

    /// Saves settings.
    pub fn save(&self, db: &Database) -> Result<()> {
        db.set_config(CONFIG_KEY_SETTINGS, &serde_json::to_value(self)?)?;
        Ok(())
    }

    /// Changes one setting by name.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || SettingsError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "default_mode" => self.default_mode = RuleMode::parse(value).ok_or_else(invalid)?,
            "default_export_format" => {
                self.default_export_format = ExportFormat::parse(value).ok_or_else(invalid)?
            }
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }

    /// Returns `(name, value)` pairs for display.
    pub fn entries(&self) -> Vec<(&'static str, String)> {
        vec![
            ("default_mode", self.default_mode.to_string()),
            ("default_export_format", self.default_export_format.to_string()),
        ]
    }
}
