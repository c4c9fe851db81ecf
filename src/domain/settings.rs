use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::dsu::server::DSU_DEFAULT_PORT;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSettings {
    #[serde(default = "default_level")]
    pub level: String, // "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_true")]
    pub console_logging_enabled: bool,
    #[serde(default = "default_false")]
    pub file_logging_enabled: bool,
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
    #[serde(default = "default_prefix")]
    pub file_name_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_logging_enabled: default_true(),
            file_logging_enabled: default_false(),
            log_dir: default_log_dir(),
            file_name_prefix: default_prefix(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_prefix() -> String {
    "gearvr_dsu_bridge".to_string()
}
fn default_dsu_port() -> u16 {
    DSU_DEFAULT_PORT
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// UDP port the DSU server listens on.
    #[serde(default = "default_dsu_port")]
    pub dsu_port: u16,

    #[serde(default)]
    pub log_settings: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dsu_port: default_dsu_port(),
            log_settings: LogSettings::default(),
        }
    }
}

/// Loads settings from the platform config directory, falling back to
/// defaults when the file is missing or unreadable. Nothing is written back;
/// the bridge keeps no state across restarts.
pub struct SettingsService {
    settings: Settings,
}

impl SettingsService {
    pub fn new() -> Self {
        let settings = Self::settings_path()
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default();
        Self { settings }
    }

    fn settings_path() -> Option<PathBuf> {
        let mut path = dirs::config_dir()?;
        path.push("GearVRDsuBridge");
        path.push("settings.json");
        Some(path)
    }

    fn load_from_file(path: &PathBuf) -> anyhow::Result<Settings> {
        let contents = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&contents)?;
        Ok(settings)
    }

    pub fn get(&self) -> &Settings {
        &self.settings
    }
}
