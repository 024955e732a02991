//! Motion collaborator interface
//!
//! The coordinator only hints at idle behavior and gestures; servo control
//! lives elsewhere.

use tracing::info;

use crate::state::{Gesture, MotionMode};

/// Receives motion hints from the coordinator
///
/// Calls are fire-and-forget and must not block the coordinator.
pub trait MotionSink: Send + Sync {
    fn set_mode(&self, mode: MotionMode);

    fn gesture(&self, gesture: Gesture);
}

/// Motion sink that only logs, for hosts without a motion controller
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingMotion;

impl MotionSink for LoggingMotion {
    fn set_mode(&self, mode: MotionMode) {
        info!(%mode, "motion: mode");
    }

    fn gesture(&self, gesture: Gesture) {
        info!(%gesture, "motion: gesture");
    }
}
