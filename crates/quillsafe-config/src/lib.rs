use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Backup interval used when nothing (or nothing valid) is configured
pub const DEFAULT_BACKUP_MINUTES: u32 = 2;

/// File extension for serialized documents and backup snapshots
pub const DEFAULT_SNAPSHOT_EXTENSION: &str = "qdoc";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {config_path}: {source}")]
    ConfigReadError {
        config_path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {config_path}: {source}")]
    ConfigParseError {
        config_path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root holding the `index/` and `backups/` trees
    pub storage_root: PathBuf,
    #[serde(default = "default_backup_minutes")]
    pub default_backup_minutes: u32,
    #[serde(default = "default_periodic_backups")]
    pub periodic_backups: bool,
    #[serde(default = "default_snapshot_extension")]
    pub snapshot_extension: String,
}

fn default_backup_minutes() -> u32 {
    DEFAULT_BACKUP_MINUTES
}

fn default_periodic_backups() -> bool {
    true
}

fn default_snapshot_extension() -> String {
    DEFAULT_SNAPSHOT_EXTENSION.to_string()
}

impl Config {
    /// Config rooted at `storage_root` with every other field defaulted
    pub fn with_storage_root<P: Into<PathBuf>>(storage_root: P) -> Self {
        Self {
            storage_root: storage_root.into(),
            default_backup_minutes: default_backup_minutes(),
            periodic_backups: default_periodic_backups(),
            snapshot_extension: default_snapshot_extension(),
        }
    }

    pub fn load_from_path<P: AsRef<Path>>(config_path: P) -> Result<Option<Self>, ConfigError> {
        let config_path = config_path.as_ref();
        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(config_path).map_err(|source| {
            ConfigError::ConfigReadError {
                config_path: config_path.to_path_buf(),
                source,
            }
        })?;

        let mut config: Config =
            toml::from_str(&content).map_err(|source| ConfigError::ConfigParseError {
                config_path: config_path.to_path_buf(),
                source,
            })?;

        // Expand shell variables and tilde in the storage root
        config.storage_root =
            Self::expand_path(&config.storage_root).unwrap_or(config.storage_root);

        Ok(Some(config))
    }

    pub fn load() -> Result<Option<Self>, ConfigError> {
        let config_path = Self::config_path();
        Self::load_from_path(&config_path)
    }

    pub fn save_to_path<P: AsRef<Path>>(&self, config_path: P) -> anyhow::Result<()> {
        let config_path = config_path.as_ref();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        let config_dir = shellexpand::tilde("~/.config/quillsafe");
        PathBuf::from(config_dir.as_ref()).join("config.toml")
    }

    /// Location of the identity → display name index
    pub fn index_path(&self) -> PathBuf {
        self.storage_root.join("index").join("index.json")
    }

    /// Directory holding one backup set per display name
    pub fn backups_dir(&self) -> PathBuf {
        self.storage_root.join("backups")
    }

    fn expand_path(path: &Path) -> Option<PathBuf> {
        let path_str = path.to_string_lossy();
        match shellexpand::full(&path_str) {
            Ok(expanded) => Some(PathBuf::from(expanded.as_ref())),
            Err(_) => None,
        }
    }
}
