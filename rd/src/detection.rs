//! Scripted presence source
//!
//! Stands in for the face detector on hosts without a camera. A script is a
//! YAML list of timed steps:
//!
//! ```yaml
//! interval-ms: 200
//! repeat: true
//! steps:
//!   - for-ms: 3000
//!     present: false
//!   - for-ms: 12000
//!     present: true
//!     angle: 4.5
//! ```

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::coordinator::CoordinatorHandle;
use crate::presence::PresenceSample;

#[derive(Debug, Error)]
pub enum DetectionError {
    #[error("Failed to read presence script {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse presence script {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid presence script: {0}")]
    Invalid(String),
}

/// One stretch of constant presence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptStep {
    #[serde(rename = "for-ms")]
    pub for_ms: u64,

    pub present: bool,

    /// Degrees off-axis while present
    #[serde(default)]
    pub angle: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceScript {
    #[serde(rename = "interval-ms", default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Start over after the last step
    #[serde(default)]
    pub repeat: bool,

    pub steps: Vec<ScriptStep>,
}

fn default_interval_ms() -> u64 {
    200
}

impl PresenceScript {
    pub fn load(path: &Path) -> Result<Self, DetectionError> {
        let content = std::fs::read_to_string(path).map_err(|source| DetectionError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let script: Self = serde_yaml::from_str(&content).map_err(|source| DetectionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        script.validate()?;
        Ok(script)
    }

    pub fn validate(&self) -> Result<(), DetectionError> {
        if self.interval_ms == 0 {
            return Err(DetectionError::Invalid("interval-ms must be greater than zero".to_string()));
        }
        if self.steps.is_empty() {
            return Err(DetectionError::Invalid("at least one step is required".to_string()));
        }
        Ok(())
    }

    /// Emission interval; never zero even for an unvalidated script
    fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms.max(1))
    }

    /// One pass over the script as timestamped samples starting at `start`
    ///
    /// Every step yields at least one sample; `tracked_for` grows across
    /// consecutive present steps and resets on absence.
    pub fn samples(&self, start: Instant) -> Vec<PresenceSample> {
        let interval = self.interval();
        let interval_ms = self.interval_ms.max(1);
        let mut samples = Vec::new();
        let mut offset = Duration::ZERO;
        let mut tracking_since: Option<Duration> = None;

        for step in &self.steps {
            let count = (step.for_ms / interval_ms).max(1);
            for _ in 0..count {
                let observed_at = start + offset;
                let sample = if step.present {
                    let since = *tracking_since.get_or_insert(offset);
                    PresenceSample::present(step.angle, observed_at, offset - since)
                } else {
                    tracking_since = None;
                    PresenceSample::absent(observed_at)
                };
                samples.push(sample);
                offset += interval;
            }
        }
        samples
    }

    /// Push samples to the coordinator in real time until the script ends
    pub async fn run(self, handle: CoordinatorHandle) -> eyre::Result<()> {
        self.validate()?;
        info!(steps = self.steps.len(), repeat = self.repeat, "Presence script started");
        loop {
            for sample in self.samples(Instant::now()) {
                tokio::time::sleep_until(tokio::time::Instant::from_std(sample.observed_at)).await;
                handle.push_presence(sample).await?;
            }
            if !self.repeat {
                break;
            }
            debug!("run: script pass complete, repeating");
            tokio::time::sleep(self.interval()).await;
        }
        info!("Presence script finished");
        Ok(())
    }
}
