//! Configuration for the sq operator tool

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Path to the queue root
    #[serde(default = "default_queue_dir")]
    pub queue_dir: PathBuf,

    /// Archived bundles kept after pruning
    #[serde(default = "default_archive_keep")]
    pub archive_keep: usize,
}

/// Queue location shared with the coordinator daemon
pub fn default_queue_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("robosanta")
        .join("queue")
}

fn default_archive_keep() -> usize {
    crate::DEFAULT_ARCHIVE_KEEP
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue_dir: default_queue_dir(),
            archive_keep: default_archive_keep(),
        }
    }
}

impl Config {
    /// Load config from file, or use defaults
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        if let Some(config_path) = path {
            return Self::load_from_file(config_path);
        }

        let default_paths = [
            dirs::config_dir().map(|p| p.join("segmentqueue").join("config.yml")),
            Some(PathBuf::from("segmentqueue.yml")),
        ];

        for path in default_paths.iter().flatten() {
            if path.exists() {
                return Self::load_from_file(path);
            }
        }

        Ok(Config::default())
    }

    fn load_from_file(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).context(format!("Failed to read config file: {}", path.display()))?;
        let config: Config =
            serde_yaml::from_str(&content).context(format!("Failed to parse config file: {}", path.display()))?;
        Ok(config)
    }
}
