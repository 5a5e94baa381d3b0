//! Configuration file support for Medley.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/medley/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Reminder presentation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

/// Dashboard aggregation limits
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_upcoming_window_hours")]
    pub upcoming_window_hours: u32,

    #[serde(default = "default_upcoming_limit")]
    pub upcoming_limit: usize,

    #[serde(default = "default_recent_symptoms")]
    pub recent_symptoms: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            upcoming_window_hours: default_upcoming_window_hours(),
            upcoming_limit: default_upcoming_limit(),
            recent_symptoms: default_recent_symptoms(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("medley")
}

fn default_title() -> String {
    crate::scheduler::DEFAULT_REMINDER_TITLE.to_string()
}

fn default_upcoming_window_hours() -> u32 {
    24
}

fn default_upcoming_limit() -> usize {
    3
}

fn default_recent_symptoms() -> usize {
    3
}

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject values that would make the application misbehave
    pub fn validate(&self) -> Result<()> {
        if self.reminders.title.trim().is_empty() {
            return Err(Error::Config("reminders.title must not be empty".into()));
        }
        if self.dashboard.upcoming_window_hours == 0 {
            return Err(Error::Config(
                "dashboard.upcoming_window_hours must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("medley").join("config.toml")
    }

    /// Save the current configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Medication, journal and reminder files live here
    pub fn data_dir(&self) -> &Path {
        &self.data.data_dir
    }
}
