//! Interaction states and motion hints

use std::fmt;

use serde::Serialize;

/// Coordinator state; exactly one is active at a time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case", tag = "state")]
pub enum InteractionState {
    /// Nothing queued
    #[default]
    Idle,
    /// Speech queued, waiting for someone to stop by
    Patrolling,
    /// Someone is present, waiting for presence to hold
    Approaching,
    /// Opening segment playing
    Greeting,
    /// Middle segment `phrase` of `total` playing (1-based)
    Conversing { phrase: usize, total: usize },
    /// Closing segment playing
    Farewell,
    /// Subject left mid-conversation with no farewell due
    Lost,
}

impl InteractionState {
    /// Whether a segment of the checked-out bundle is being played
    pub fn is_speaking(self) -> bool {
        matches!(self, Self::Greeting | Self::Conversing { .. } | Self::Farewell)
    }
}

impl fmt::Display for InteractionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Patrolling => f.write_str("patrolling"),
            Self::Approaching => f.write_str("approaching"),
            Self::Greeting => f.write_str("greeting"),
            Self::Conversing { phrase, total } => write!(f, "conversing({phrase}/{total})"),
            Self::Farewell => f.write_str("farewell"),
            Self::Lost => f.write_str("lost"),
        }
    }
}

/// Idle behavior requested from the motion collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MotionMode {
    Patrol,
    MinimalIdle,
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patrol => f.write_str("patrol"),
            Self::MinimalIdle => f.write_str("minimal-idle"),
        }
    }
}

/// One-shot gesture synchronized with speech
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Gesture {
    RaiseAttention,
    HoldAttention,
    Lower,
}

impl fmt::Display for Gesture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RaiseAttention => f.write_str("raise-attention"),
            Self::HoldAttention => f.write_str("hold-attention"),
            Self::Lower => f.write_str("lower"),
        }
    }
}

/// Published on every state transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StateChange {
    pub from: InteractionState,
    pub to: InteractionState,
}
