//! Interaction Coordinator
//!
//! The [`Engine`] is the engagement/playback state machine; the
//! [`Coordinator`] actor owns it, feeds it presence, ticks and segment
//! completions from a single inbox, and carries out its directives.

mod config;
mod core;
mod engine;
mod handle;
mod messages;

pub use config::CoordinatorConfig;
pub use core::Coordinator;
pub use engine::{BundleSource, Directive, Engine, PlaybackToken};
pub use handle::CoordinatorHandle;
pub use messages::CoordRequest;
