//! # teflon-config
//!
//! Configuration management for the teflon launcher.
//!
//! Loads configuration from:
//! 1. `~/.teflon/config.toml` (global)
//! 2. `.teflon/config.toml` (project-local, overrides global)
//! 3. Environment variables (highest priority)

pub mod logging;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::logging::Component;

/// Environment variable the dynamic loader reads to preload shared objects.
#[cfg(not(target_os = "macos"))]
pub const PRELOAD_VAR: &str = "LD_PRELOAD";
#[cfg(target_os = "macos")]
pub const PRELOAD_VAR: &str = "DYLD_INSERT_LIBRARIES";

/// File name of the built inception layer.
#[cfg(not(target_os = "macos"))]
pub const LIBRARY_FILE: &str = "libteflon_inception_layer.so";
#[cfg(target_os = "macos")]
pub const LIBRARY_FILE: &str = "libteflon_inception_layer.dylib";

/// Substring identifying our entries in the preload list.
pub const DEFAULT_MARKER: &str = "teflon";

pub const ENV_LIBRARY: &str = "TEFLON_LIBRARY";
pub const ENV_MARKER: &str = "TEFLON_MARKER";
pub const ENV_LOG_LEVEL: &str = "TEFLON_LOG_LEVEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("preload marker must not be empty (it would match every entry)")]
    EmptyMarker,
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub preload: PreloadConfig,
    pub log: LogConfig,
}

impl Config {
    /// Load config from standard locations
    pub fn load() -> Result<Self, ConfigError> {
        let mut layers = Vec::new();

        // 1. Load global config (~/.teflon/config.toml)
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                debug!(component = Component::CONFIG, path = ?global_path, "Loading global config");
                layers.push(Self::read_layer(&global_path)?);
            }
        }

        // 2. Load project config (.teflon/config.toml) - overrides global
        let project_path = Path::new(".teflon/config.toml");
        if project_path.exists() {
            debug!(component = Component::CONFIG, path = ?project_path, "Loading project config");
            layers.push(Self::read_layer(project_path)?);
        }

        let mut config = Self::from_layers(layers)?;

        // 3. Apply environment variable overrides
        config.apply_env_overrides();

        config.validate()?;
        Ok(config)
    }

    /// Parse a single config file without merging or env overrides.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Read a config file as a raw table, keeping track of which keys it sets.
    pub fn read_layer(path: &Path) -> Result<toml::Table, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    /// Build a config from layers, later layers overriding earlier ones key
    /// by key. A key a layer spells out wins even if it equals the default.
    pub fn from_layers(layers: impl IntoIterator<Item = toml::Table>) -> Result<Self, ConfigError> {
        let mut merged = toml::Table::new();
        for layer in layers {
            merge_tables(&mut merged, layer);
        }
        Ok(toml::Value::Table(merged).try_into()?)
    }

    /// Global config path: ~/.teflon/config.toml
    pub fn global_config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".teflon/config.toml"))
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(path) = std::env::var_os(ENV_LIBRARY) {
            if !path.is_empty() {
                self.preload.library = Some(PathBuf::from(path));
            }
        }
        if let Ok(marker) = std::env::var(ENV_MARKER) {
            self.preload.marker = marker;
        }
        if let Ok(level) = std::env::var(ENV_LOG_LEVEL) {
            self.log.level = level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.preload.marker.is_empty() {
            return Err(ConfigError::EmptyMarker);
        }
        Ok(())
    }

    /// Render as TOML (unset optional fields are omitted)
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Generate default config TOML string
    pub fn default_toml() -> String {
        Config::default().to_toml().unwrap_or_default()
    }
}

/// Overlay `overlay` onto `base`; nested tables merge, everything else replaces.
fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match value {
            toml::Value::Table(inner) => match base.get_mut(&key) {
                Some(toml::Value::Table(existing)) => merge_tables(existing, inner),
                _ => {
                    base.insert(key, toml::Value::Table(inner));
                }
            },
            value => {
                base.insert(key, value);
            }
        }
    }
}

/// Preload list configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreloadConfig {
    /// Explicit path to the inception layer (skips discovery)
    pub library: Option<PathBuf>,
    /// Entries containing this text are removed by `teflon unwrap`
    pub marker: String,
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            library: None,
            marker: DEFAULT_MARKER.to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when neither TEFLON_LOG nor RUST_LOG is set
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}
