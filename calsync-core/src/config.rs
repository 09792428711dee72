//! Global calsync configuration.

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{CalSyncError, CalSyncResult};

static DEFAULT_STORE_PATH: &str = "~/.local/share/calsync/store.json";
const DEFAULT_WINDOW_DAYS: i64 = 180;
const DEFAULT_MAX_OCCURRENCES: usize = 365;

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

fn default_window_days() -> i64 {
    DEFAULT_WINDOW_DAYS
}

fn default_max_occurrences() -> usize {
    DEFAULT_MAX_OCCURRENCES
}

/// How far recurring series are expanded into occurrences.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExpansionConfig {
    #[serde(default = "default_window_days")]
    pub window_days: i64,
    #[serde(default = "default_max_occurrences")]
    pub max_occurrences: usize,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        ExpansionConfig {
            window_days: DEFAULT_WINDOW_DAYS,
            max_occurrences: DEFAULT_MAX_OCCURRENCES,
        }
    }
}

/// Global configuration at ~/.config/calsync/config.toml
///
/// Every key can be overridden from the environment, e.g.
/// `CALSYNC_STORE_PATH` or `CALSYNC_EXPANSION__WINDOW_DAYS`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CalSyncConfig {
    #[serde(default = "default_store_path")]
    pub store_path: PathBuf,

    #[serde(default)]
    pub expansion: ExpansionConfig,
}

impl Default for CalSyncConfig {
    fn default() -> Self {
        CalSyncConfig {
            store_path: default_store_path(),
            expansion: ExpansionConfig::default(),
        }
    }
}

impl CalSyncConfig {
    pub fn config_path() -> CalSyncResult<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| CalSyncError::Config("Could not determine config directory".into()))?
            .join("calsync");

        Ok(config_dir.join("config.toml"))
    }

    /// Load ~/.config/calsync/config.toml, creating a commented default on first run.
    pub fn load() -> CalSyncResult<Self> {
        let config_path = Self::config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
        }

        Self::load_from(&config_path)
    }

    /// Load from an explicit file (missing is fine) plus `CALSYNC_` overrides.
    pub fn load_from(path: &Path) -> CalSyncResult<Self> {
        Self::load_with_env(path, Self::environment())
    }

    /// `CALSYNC_STORE_PATH`, `CALSYNC_EXPANSION__WINDOW_DAYS` and so on.
    fn environment() -> Environment {
        Environment::with_prefix("CALSYNC")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
    }

    fn load_with_env(path: &Path, environment: Environment) -> CalSyncResult<Self> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(environment)
            .build()
            .map_err(|e| CalSyncError::Config(e.to_string()))?
            .try_deserialize()
            .map_err(|e| CalSyncError::Config(e.to_string()))
    }

    /// Store location with `~` expanded.
    pub fn store_path(&self) -> PathBuf {
        let full_path_str = shellexpand::tilde(&self.store_path.to_string_lossy()).into_owned();

        PathBuf::from(full_path_str)
    }

    /// Create a default config file with all options commented out.
    pub fn create_default_config(path: &Path) -> CalSyncResult<()> {
        let contents = format!(
            "\
# calsync configuration

# Where synced records are kept:
# store_path = \"{}\"

# How far recurring events are expanded:
# [expansion]
# window_days = {}
# max_occurrences = {}
",
            DEFAULT_STORE_PATH, DEFAULT_WINDOW_DAYS, DEFAULT_MAX_OCCURRENCES
        );

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CalSyncError::Config(format!("Could not create config directory: {e}"))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| CalSyncError::Config(format!("Could not write config file: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_file_loads_as_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        CalSyncConfig::create_default_config(&path).unwrap();
        assert!(path.exists());

        let config = CalSyncConfig::load_from(&path).unwrap();
        assert_eq!(config.expansion, ExpansionConfig::default());
        assert_eq!(config.store_path, default_store_path());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[expansion]\nwindow_days = 30\n").unwrap();

        let config = CalSyncConfig::load_from(&path).unwrap();
        assert_eq!(config.expansion.window_days, 30);
        assert_eq!(config.expansion.max_occurrences, DEFAULT_MAX_OCCURRENCES);
    }

    #[test]
    fn test_store_path_expands_tilde() {
        let config = CalSyncConfig::default();
        let expanded = config.store_path();
        assert!(!expanded.to_string_lossy().starts_with('~'));
        assert!(expanded.ends_with(".local/share/calsync/store.json"));
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[expansion]\nwindow_days = 30\n").unwrap();

        let mut vars = config::Map::new();
        vars.insert("CALSYNC_STORE_PATH".to_string(), "/tmp/elsewhere.json".to_string());
        vars.insert("CALSYNC_EXPANSION__WINDOW_DAYS".to_string(), "7".to_string());
        let environment = CalSyncConfig::environment().source(Some(vars));

        let config = CalSyncConfig::load_with_env(&path, environment).unwrap();
        assert_eq!(config.store_path, PathBuf::from("/tmp/elsewhere.json"));
        assert_eq!(config.expansion.window_days, 7);
        assert_eq!(config.expansion.max_occurrences, DEFAULT_MAX_OCCURRENCES);
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[expansion]\nwindow_days = \"soon\"\n").unwrap();

        assert!(matches!(
            CalSyncConfig::load_from(&path),
            Err(CalSyncError::Config(_))
        ));
    }
}
