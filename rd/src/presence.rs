//! Presence samples and the timestamps derived from them

use std::time::{Duration, Instant};

/// One reading from the detection collaborator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PresenceSample {
    pub present: bool,
    /// Degrees off-axis; `None` when no face angle could be measured
    pub attention_angle: Option<f32>,
    pub observed_at: Instant,
    /// How long the detector has been tracking this subject
    pub tracked_for: Duration,
}

impl PresenceSample {
    pub fn present(attention_angle: Option<f32>, observed_at: Instant, tracked_for: Duration) -> Self {
        Self {
            present: true,
            attention_angle,
            observed_at,
            tracked_for,
        }
    }

    pub fn absent(observed_at: Instant) -> Self {
        Self {
            present: false,
            attention_angle: None,
            observed_at,
            tracked_for: Duration::ZERO,
        }
    }
}

/// Latest sample plus the timestamps the engagement rules read
#[derive(Debug, Clone, Default)]
pub struct PresenceTracker {
    latest: Option<PresenceSample>,
    tracking_started_at: Option<Instant>,
    last_attentive_at: Option<Instant>,
    last_present_at: Option<Instant>,
    absent_since: Option<Instant>,
}

impl PresenceTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sample in; `attentive` is judged by the caller for the current phase
    pub fn observe(&mut self, sample: PresenceSample, attentive: bool) {
        let at = sample.observed_at;
        if sample.present {
            if self.tracking_started_at.is_none() {
                self.tracking_started_at = Some(at.checked_sub(sample.tracked_for).unwrap_or(at));
            }
            self.last_present_at = Some(at);
            self.absent_since = None;
            if attentive {
                self.last_attentive_at = Some(at);
            }
        } else {
            self.tracking_started_at = None;
            if self.absent_since.is_none() {
                self.absent_since = Some(at);
            }
        }
        self.latest = Some(sample);
    }

    /// Start a fresh attentiveness window
    pub fn forget_attention(&mut self) {
        self.last_attentive_at = None;
    }

    pub fn latest(&self) -> Option<&PresenceSample> {
        self.latest.as_ref()
    }

    /// Whether the latest sample reports a subject
    pub fn is_present(&self) -> bool {
        self.latest.is_some_and(|s| s.present)
    }

    pub fn tracking_started_at(&self) -> Option<Instant> {
        self.tracking_started_at
    }

    pub fn last_attentive_at(&self) -> Option<Instant> {
        self.last_attentive_at
    }

    pub fn last_present_at(&self) -> Option<Instant> {
        self.last_present_at
    }

    pub fn absent_since(&self) -> Option<Instant> {
        self.absent_since
    }
}
