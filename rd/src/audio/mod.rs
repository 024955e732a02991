//! Audio playback for speech segments
//!
//! Provides the [`AudioPlayer`] trait the coordinator plays segments through,
//! plus a rodio backend and a silent stand-in.

use std::sync::Arc;

use tracing::debug;

mod error;
mod output;
mod player;
mod silent;

pub use error::AudioError;
pub use output::RodioPlayer;
pub use player::{AudioPlayer, PlaybackOutcome};
pub use silent::SilentPlayer;

use crate::config::{AudioBackend, AudioConfig};

/// Create an audio player for the configured backend
pub fn create_player(config: &AudioConfig) -> Result<Arc<dyn AudioPlayer>, AudioError> {
    debug!(backend = ?config.backend, "create_player: called");
    match config.backend {
        AudioBackend::Rodio => Ok(Arc::new(RodioPlayer::new(config.volume)?)),
        AudioBackend::Silent => Ok(Arc::new(SilentPlayer::from_config(config))),
    }
}
