//! Engagement policy: tolerance and timeout rules over presence
//!
//! Pure arithmetic over a [`PresenceSample`] and the timestamps kept by
//! [`crate::presence::PresenceTracker`]. Every rule takes `now` explicitly so
//! the state machine stays deterministic under test.

use std::time::{Duration, Instant};

use crate::config::EngagementConfig;
use crate::presence::PresenceSample;

/// Which attention tolerance applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Deciding whether to greet at all
    BeforeGreeting,
    /// Greeting has started
    Engaged,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngagementPolicy {
    pub presence_hold: Duration,
    pub strict_angle_deg: f32,
    pub lenient_angle_deg: f32,
    pub attentive_memory: Duration,
    pub farewell_grace: Duration,
}

impl Default for EngagementPolicy {
    fn default() -> Self {
        Self::from_config(&EngagementConfig::default())
    }
}

impl EngagementPolicy {
    pub fn from_config(config: &EngagementConfig) -> Self {
        Self {
            presence_hold: config.presence_hold(),
            strict_angle_deg: config.strict_angle_deg,
            lenient_angle_deg: config.lenient_angle_deg,
            attentive_memory: config.attentive_memory(),
            farewell_grace: config.farewell_grace(),
        }
    }

    /// Maximum off-axis angle still counted as looking
    pub fn tolerance(&self, phase: Phase) -> f32 {
        match phase {
            Phase::BeforeGreeting => self.strict_angle_deg,
            Phase::Engaged => self.lenient_angle_deg,
        }
    }

    /// Present and facing within the phase tolerance; no angle is not attentive
    pub fn is_attentive(&self, sample: &PresenceSample, phase: Phase) -> bool {
        sample.present
            && sample
                .attention_angle
                .is_some_and(|angle| angle.abs() <= self.tolerance(phase))
    }

    /// Continuously tracked for at least the hold duration
    pub fn presence_held(&self, tracking_started_at: Option<Instant>, now: Instant) -> bool {
        tracking_started_at.is_some_and(|start| elapsed(now, start) >= self.presence_hold)
    }

    /// Continuously absent for at least the hold duration
    pub fn absence_held(&self, absent_since: Option<Instant>, now: Instant) -> bool {
        absent_since.is_some_and(|since| elapsed(now, since) >= self.presence_hold)
    }

    /// Last attentive strictly inside the memory window
    pub fn recently_attentive(&self, last_attentive_at: Option<Instant>, now: Instant) -> bool {
        last_attentive_at.is_some_and(|at| elapsed(now, at) < self.attentive_memory)
    }

    /// Last present strictly inside the farewell grace window
    pub fn recently_present(&self, last_present_at: Option<Instant>, now: Instant) -> bool {
        last_present_at.is_some_and(|at| elapsed(now, at) < self.farewell_grace)
    }
}

fn elapsed(now: Instant, then: Instant) -> Duration {
    now.saturating_duration_since(then)
}
