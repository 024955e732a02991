//! Message types for the Coordinator

use tokio::sync::oneshot;

use super::engine::PlaybackToken;
use crate::audio::PlaybackOutcome;
use crate::presence::PresenceSample;
use crate::state::InteractionState;

/// Requests to the Coordinator task, applied one at a time in arrival order
#[derive(Debug)]
pub enum CoordRequest {
    /// New reading from the detection collaborator
    Presence(PresenceSample),

    /// A playback task finished its segment
    SegmentFinished {
        token: PlaybackToken,
        outcome: PlaybackOutcome,
    },

    /// Get the current interaction state
    GetState {
        reply_tx: oneshot::Sender<InteractionState>,
    },

    /// Shutdown the coordinator
    Shutdown,
}
