//! Configuration management
//!
//! Shell settings live in settings.json as a flat key-value blob:
//! ```json
//! {
//!   "geometry": "1024x768+40+40",
//!   "network": { "listenPort": 30303, "upnp": true, ... },
//!   "enabledPlugins": ["log-panel"]
//! }
//! ```
//! Keys the shell does not manage are preserved on save.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::NetworkPreferences;

pub const SETTINGS_FILE: &str = "settings.json";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    geometry: Option<String>,
    #[serde(default)]
    network: NetworkPreferences,
    #[serde(default)]
    enabled_plugins: Vec<String>,
    #[serde(flatten)]
    other: BTreeMap<String, serde_json::Value>,
}

/// Which parts of settings.json to read at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadScope {
    #[default]
    All,
    /// Everything except the window geometry
    SkipGeometry,
    /// Only the window geometry
    OnlyGeometry,
}

impl ReadScope {
    fn reads_geometry(self) -> bool {
        self != ReadScope::SkipGeometry
    }

    fn reads_shell_settings(self) -> bool {
        self != ReadScope::OnlyGeometry
    }
}

/// Shell configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub geometry: Option<String>,
    pub network: NetworkPreferences,
    pub enabled_plugins: Vec<String>,
    // Parts outside the scope are never written back
    scope: ReadScope,
    // Keep the raw settings for preservation when saving
    _raw_settings: SettingsFile,
}

impl Config {
    /// Load the full config from the hearth directory
    pub fn load(hearth_dir: &Path) -> Result<Self> {
        Self::read_settings(hearth_dir, ReadScope::All)
    }

    /// Read settings once at startup, optionally skipping or isolating the
    /// window geometry. Parts not read keep their defaults here and keep
    /// their stored values on save.
    pub fn read_settings(hearth_dir: &Path, scope: ReadScope) -> Result<Self> {
        let settings_path = hearth_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)
                .with_context(|| format!("Failed to read {}", settings_path.display()))?;
            serde_json::from_str(&content).unwrap_or_default()
        } else {
            SettingsFile::default()
        };

        let mut config = Self {
            scope,
            ..Self::default()
        };
        if scope.reads_geometry() {
            config.geometry = raw.geometry.clone();
        }
        if scope.reads_shell_settings() {
            config.network = raw.network.clone();
            config.enabled_plugins = raw.enabled_plugins.clone();
        }
        config._raw_settings = raw;
        Ok(config)
    }

    /// Save config to the hearth directory
    /// Preserves other settings that the shell doesn't manage
    pub fn save(&self, hearth_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(hearth_dir)
            .with_context(|| format!("Failed to create {}", hearth_dir.display()))?;
        let settings_path = hearth_dir.join(SETTINGS_FILE);

        // Load existing settings to preserve fields we don't manage
        let mut settings = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str::<SettingsFile>(&content).unwrap_or_default()
        } else {
            self._raw_settings.clone()
        };

        // Update only the fields we manage and actually read
        if self.scope.reads_geometry() && self.geometry.is_some() {
            settings.geometry = self.geometry.clone();
        }
        if self.scope.reads_shell_settings() {
            settings.network = self.network.clone();
            settings.enabled_plugins = self.enabled_plugins.clone();
        }

        let content = serde_json::to_string_pretty(&settings)?;
        std::fs::write(&settings_path, content)
            .with_context(|| format!("Failed to write {}", settings_path.display()))?;
        Ok(())
    }

    pub fn is_plugin_enabled(&self, name: &str) -> bool {
        self.enabled_plugins.iter().any(|p| p == name)
    }

    /// Returns false if the plugin was already enabled
    pub fn enable_plugin(&mut self, name: &str) -> bool {
        if self.is_plugin_enabled(name) {
            return false;
        }
        self.enabled_plugins.push(name.to_string());
        true
    }

    /// Returns false if the plugin was not enabled
    pub fn disable_plugin(&mut self, name: &str) -> bool {
        let before = self.enabled_plugins.len();
        self.enabled_plugins.retain(|p| p != name);
        before != self.enabled_plugins.len()
    }
}
