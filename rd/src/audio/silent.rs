//! Silent backend for headless runs

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::debug;

use super::player::{AudioPlayer, PlaybackOutcome};
use crate::config::AudioConfig;

/// Pretends every segment lasts a fixed duration
pub struct SilentPlayer {
    segment: Duration,
    stop_tx: watch::Sender<u64>,
}

impl SilentPlayer {
    pub fn new(segment: Duration) -> Self {
        let (stop_tx, _) = watch::channel(0);
        Self { segment, stop_tx }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(Duration::from_millis(config.silent_segment_ms))
    }
}

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self, path: &Path) -> PlaybackOutcome {
        debug!(path = %path.display(), "SilentPlayer::play: called");
        if !path.is_file() {
            return PlaybackOutcome::Failed(format!("{} does not exist", path.display()));
        }

        let mut stop_rx = self.stop_tx.subscribe();
        tokio::select! {
            _ = tokio::time::sleep(self.segment) => PlaybackOutcome::Finished,
            _ = stop_rx.changed() => PlaybackOutcome::Stopped,
        }
    }

    fn stop(&self) {
        self.stop_tx.send_modify(|generation| *generation += 1);
    }
}
