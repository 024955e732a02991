//! RoboSanta - engagement and playback coordinator
//!
//! Decides when to greet a bystander, how long to keep talking and when to
//! stop, using speech bundles staged in a [`segmentqueue::SegmentQueue`] and
//! a noisy stream of presence samples from a detector.
//!
//! # Modules
//!
//! - [`coordinator`] - Engagement/playback state machine and its actor
//! - [`engagement`] - Tolerance and timeout rules over presence
//! - [`presence`] - Latest presence sample and derived timestamps
//! - [`audio`] - Audio playback trait and backends
//! - [`motion`] - Motion hint trait
//! - [`detection`] - Scripted presence source for headless runs
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod audio;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod detection;
pub mod engagement;
pub mod motion;
pub mod presence;
pub mod state;

pub use audio::{AudioError, AudioPlayer, PlaybackOutcome, RodioPlayer, SilentPlayer, create_player};
pub use config::{AudioBackend, AudioConfig, Config, EngagementConfig, QueueConfig};
pub use coordinator::{
    BundleSource, CoordRequest, Coordinator, CoordinatorConfig, CoordinatorHandle, Directive, Engine, PlaybackToken,
};
pub use detection::{DetectionError, PresenceScript, ScriptStep};
pub use engagement::{EngagementPolicy, Phase};
pub use motion::{LoggingMotion, MotionSink};
pub use presence::{PresenceSample, PresenceTracker};
pub use state::{Gesture, InteractionState, MotionMode, StateChange};
