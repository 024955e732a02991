//! AudioPlayer trait definition

use std::path::Path;

use async_trait::async_trait;

/// How a playback request ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Played to the end
    Finished,
    /// Cut short by [`AudioPlayer::stop`]
    Stopped,
    /// Could not be played
    Failed(String),
}

impl PlaybackOutcome {
    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

/// Plays one segment at a time
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    /// Play the file at `path`, resolving when playback ends
    async fn play(&self, path: &Path) -> PlaybackOutcome;

    /// Abort any playback in progress; the pending `play` resolves `Stopped`
    fn stop(&self);
}
