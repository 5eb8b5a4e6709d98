use crate::error::{LockError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "lockwarden.toml";
const DEFAULT_HYGIENE_AGE_SECS: u64 = 3600;

pub const ENV_RESOURCE_ROOT: &str = "LOCKWARDEN_RESOURCE_ROOT";
pub const ENV_SNAPSHOT_DIR: &str = "LOCKWARDEN_SNAPSHOT_DIR";
pub const ENV_HYGIENE_AGE_SECS: &str = "LOCKWARDEN_HYGIENE_AGE_SECS";

/// Settings for the lock manager and its snapshot storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockingConfig {
    /// Directory that relative resource URIs are resolved against.
    #[serde(default = "default_resource_root")]
    pub resource_root: PathBuf,

    /// Directory receiving immutable-read snapshot copies.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Minimum age before the startup sweep deletes an orphaned snapshot.
    #[serde(default = "default_hygiene_age_secs")]
    pub hygiene_age_secs: u64,
}

impl Default for LockingConfig {
    fn default() -> Self {
        Self {
            resource_root: default_resource_root(),
            snapshot_dir: default_snapshot_dir(),
            hygiene_age_secs: DEFAULT_HYGIENE_AGE_SECS,
        }
    }
}

fn default_resource_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_snapshot_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("lockwarden")
        .join("snapshots")
}

fn default_hygiene_age_secs() -> u64 {
    DEFAULT_HYGIENE_AGE_SECS
}

impl LockingConfig {
    /// Loads `lockwarden.toml` from `dir`, then applies environment overrides.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut config = Self::load_file(dir)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Loads `lockwarden.toml` from `dir` without consulting the environment.
    pub fn load_file(dir: &Path) -> Result<Self> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            log::debug!("Config file not found at {config_path:?}, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path)?;
        let config: LockingConfig = toml::from_str(&contents).map_err(|e| {
            LockError::ConfigError(format!("Failed to parse {CONFIG_FILE_NAME}: {e}"))
        })?;

        log::debug!("Loaded config from {config_path:?}");
        Ok(config)
    }

    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;
        let config_path = dir.join(CONFIG_FILE_NAME);

        let contents = toml::to_string_pretty(self)
            .map_err(|e| LockError::ConfigError(format!("Failed to serialize config: {e}")))?;

        fs::write(&config_path, contents)?;
        log::debug!("Saved config to {config_path:?}");
        Ok(())
    }

    /// Environment variables take precedence over the configuration file.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(root) = non_empty_var(ENV_RESOURCE_ROOT) {
            self.resource_root = PathBuf::from(root);
        }
        if let Some(dir) = non_empty_var(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = PathBuf::from(dir);
        }
        if let Some(age) = non_empty_var(ENV_HYGIENE_AGE_SECS) {
            self.hygiene_age_secs = age.trim().parse().map_err(|_| {
                LockError::ConfigError(format!(
                    "{ENV_HYGIENE_AGE_SECS} must be a whole number of seconds, got '{age}'"
                ))
            })?;
        }
        Ok(())
    }

    pub fn hygiene_age(&self) -> Duration {
        Duration::from_secs(self.hygiene_age_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}
