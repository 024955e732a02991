//! RoboSanta configuration types and loading

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::coordinator::CoordinatorConfig;

/// Main RoboSanta configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Segment queue location and retention
    pub queue: QueueConfig,

    /// Engagement thresholds
    pub engagement: EngagementConfig,

    /// Coordinator actor tuning
    pub coordinator: CoordinatorConfig,

    /// Audio output
    pub audio: AudioConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level", skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Config {
    /// Reject values the coordinator cannot run with
    pub fn validate(&self) -> Result<()> {
        let e = &self.engagement;
        if !e.strict_angle_deg.is_finite() || !e.lenient_angle_deg.is_finite() {
            return Err(eyre!("engagement angles must be finite numbers"));
        }
        if e.lenient_angle_deg < e.strict_angle_deg {
            return Err(eyre!(
                "engagement.lenient-angle-deg ({}) must not be below strict-angle-deg ({})",
                e.lenient_angle_deg,
                e.strict_angle_deg
            ));
        }
        if e.strict_angle_deg < 0.0 {
            return Err(eyre!("engagement.strict-angle-deg must not be negative"));
        }
        if self.coordinator.tick_ms == 0 {
            return Err(eyre!("coordinator.tick-ms must be greater than zero"));
        }
        if self.coordinator.inbox_buffer == 0 || self.coordinator.state_buffer == 0 {
            return Err(eyre!("coordinator buffers must be greater than zero"));
        }
        if !self.audio.volume.is_finite() || !(0.0..=1.0).contains(&self.audio.volume) {
            return Err(eyre!("audio.volume must be within 0.0..=1.0, got {}", self.audio.volume));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        for candidate in Self::default_paths() {
            if candidate.exists() {
                match Self::load_from_file(&candidate) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", candidate.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed; the full load reports them once logging works.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        #[derive(Deserialize)]
        struct LogLevelOnly {
            #[serde(rename = "log-level")]
            log_level: Option<String>,
        }

        let path = match config_path {
            Some(path) => path.clone(),
            None => Self::default_paths().into_iter().find(|p| p.exists())?,
        };
        let content = fs::read_to_string(path).ok()?;
        serde_yaml::from_str::<LogLevelOnly>(&content).ok()?.log_level
    }

    fn default_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from(".robosanta.yml")];
        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("robosanta").join("robosanta.yml"));
        }
        paths
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Segment queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Queue root directory
    pub dir: PathBuf,

    /// Archived bundles kept after each completion
    #[serde(rename = "archive-keep")]
    pub archive_keep: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            dir: segmentqueue::config::default_queue_dir(),
            archive_keep: segmentqueue::DEFAULT_ARCHIVE_KEEP,
        }
    }
}

/// Engagement thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngagementConfig {
    /// Continuous presence (or absence) needed before acting on it
    #[serde(rename = "presence-hold-ms")]
    pub presence_hold_ms: u64,

    /// Attention tolerance before greeting, in degrees
    #[serde(rename = "strict-angle-deg")]
    pub strict_angle_deg: f32,

    /// Attention tolerance once greeting has started, in degrees
    #[serde(rename = "lenient-angle-deg")]
    pub lenient_angle_deg: f32,

    /// How long a glance away still counts as attentive
    #[serde(rename = "attentive-memory-ms")]
    pub attentive_memory_ms: u64,

    /// How long after leaving a subject still gets a farewell
    #[serde(rename = "farewell-grace-ms")]
    pub farewell_grace_ms: u64,
}

impl Default for EngagementConfig {
    fn default() -> Self {
        Self {
            presence_hold_ms: 2_000,
            strict_angle_deg: 20.0,
            lenient_angle_deg: 45.0,
            attentive_memory_ms: 3_000,
            farewell_grace_ms: 4_000,
        }
    }
}

impl EngagementConfig {
    pub fn presence_hold(&self) -> Duration {
        Duration::from_millis(self.presence_hold_ms)
    }

    pub fn attentive_memory(&self) -> Duration {
        Duration::from_millis(self.attentive_memory_ms)
    }

    pub fn farewell_grace(&self) -> Duration {
        Duration::from_millis(self.farewell_grace_ms)
    }
}

/// Audio backend selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioBackend {
    /// System output device
    #[default]
    Rodio,
    /// No output; each segment takes a fixed time
    Silent,
}

/// Audio output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub backend: AudioBackend,

    /// Output volume, 0.0 to 1.0
    pub volume: f32,

    /// Duration of every segment on the silent backend
    #[serde(rename = "silent-segment-ms")]
    pub silent_segment_ms: u64,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            backend: AudioBackend::Rodio,
            volume: 1.0,
            silent_segment_ms: 1_500,
        }
    }
}
