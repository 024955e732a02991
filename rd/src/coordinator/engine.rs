//! Engagement/playback state machine
//!
//! The [`Engine`] is synchronous and deterministic: every input carries its
//! own clock value and every side effect comes back as a [`Directive`] for
//! the caller to carry out. Playback is an explicit awaiting sub-state keyed
//! by a [`PlaybackToken`]; presence reported while a segment plays is only
//! recorded, and acted on at the next segment boundary.

use std::fmt;
use std::time::Instant;

use segmentqueue::{Bundle, BundleKind, Segment, SegmentQueue, SegmentRole};
use tracing::{debug, info, warn};

use crate::audio::PlaybackOutcome;
use crate::engagement::{EngagementPolicy, Phase};
use crate::presence::{PresenceSample, PresenceTracker};
use crate::state::{Gesture, InteractionState, MotionMode, StateChange};

/// Where the engine gets bundles from and returns them to
pub trait BundleSource: Send {
    fn has_pending(&self) -> bool;

    fn checkout(&self) -> Option<Bundle>;

    fn complete(&self, bundle: &Bundle) -> bool;

    fn release(&self, bundle: &Bundle) -> bool;
}

impl BundleSource for SegmentQueue {
    fn has_pending(&self) -> bool {
        SegmentQueue::has_pending(self)
    }

    fn checkout(&self) -> Option<Bundle> {
        SegmentQueue::checkout(self)
    }

    fn complete(&self, bundle: &Bundle) -> bool {
        SegmentQueue::complete(self, bundle)
    }

    fn release(&self, bundle: &Bundle) -> bool {
        SegmentQueue::release(self, bundle)
    }
}

/// Identifies one playback request; completions carrying any other token are stale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlaybackToken(u64);

impl fmt::Display for PlaybackToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Side effect requested by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Play `segment`, then report back with `token`
    Play { token: PlaybackToken, segment: Segment },
    Motion(MotionMode),
    Gesture(Gesture),
    Transition(StateChange),
}

#[derive(Debug, Clone, Copy)]
struct Awaiting {
    token: PlaybackToken,
    role: SegmentRole,
}

/// The checked-out bundle and its playback progress
#[derive(Debug)]
struct Conversation {
    bundle: Bundle,
    awaiting: Option<Awaiting>,
    /// Presence dropped while a segment played
    pending_loss: bool,
    gesture_raised: bool,
}

impl Conversation {
    fn new(bundle: Bundle) -> Self {
        Self {
            bundle,
            awaiting: None,
            pending_loss: false,
            gesture_raised: false,
        }
    }

    /// Middle phrases this bundle's kind plays
    fn total_phrases(&self) -> usize {
        match self.bundle.kind {
            BundleKind::Quip => 0,
            BundleKind::Attention => 2,
            BundleKind::Conversation | BundleKind::Aside => self.bundle.middles.len(),
        }
    }
}

pub struct Engine {
    policy: EngagementPolicy,
    queue: Box<dyn BundleSource>,
    state: InteractionState,
    presence: PresenceTracker,
    conversation: Option<Conversation>,
    next_token: u64,
}

impl Engine {
    pub fn new(policy: EngagementPolicy, queue: Box<dyn BundleSource>) -> Self {
        Self {
            policy,
            queue,
            state: InteractionState::Idle,
            presence: PresenceTracker::new(),
            conversation: None,
            next_token: 0,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn presence(&self) -> &PresenceTracker {
        &self.presence
    }

    /// Bundle currently checked out, if any
    pub fn bundle(&self) -> Option<&Bundle> {
        self.conversation.as_ref().map(|c| &c.bundle)
    }

    /// Token of the segment being played, if any
    pub fn awaiting(&self) -> Option<PlaybackToken> {
        self.conversation.as_ref()?.awaiting.map(|a| a.token)
    }

    pub fn pending_loss(&self) -> bool {
        self.conversation.as_ref().is_some_and(|c| c.pending_loss)
    }

    fn phase(&self) -> Phase {
        if self.state.is_speaking() {
            Phase::Engaged
        } else {
            Phase::BeforeGreeting
        }
    }

    /// Record a presence sample; never changes state by itself
    pub fn on_presence(&mut self, sample: PresenceSample) {
        let attentive = self.policy.is_attentive(&sample, self.phase());
        self.presence.observe(sample, attentive);

        if !sample.present
            && let Some(conversation) = self.conversation.as_mut()
            && conversation.awaiting.is_some()
            && !conversation.pending_loss
        {
            debug!(state = %self.state, "on_presence: subject lost mid-segment, deferring");
            conversation.pending_loss = true;
        }
    }

    /// Periodic evaluation of the non-speaking states
    pub fn on_tick(&mut self, now: Instant) -> Vec<Directive> {
        let mut out = Vec::new();
        match self.state {
            InteractionState::Idle => {
                if self.queue.has_pending() {
                    self.transition(InteractionState::Patrolling, &mut out);
                    out.push(Directive::Motion(MotionMode::Patrol));
                }
            }
            InteractionState::Patrolling => {
                if !self.queue.has_pending() {
                    self.transition(InteractionState::Idle, &mut out);
                    out.push(Directive::Motion(MotionMode::MinimalIdle));
                } else if self.policy.presence_held(self.presence.tracking_started_at(), now) {
                    self.transition(InteractionState::Approaching, &mut out);
                }
            }
            InteractionState::Approaching => {
                if self.policy.absence_held(self.presence.absent_since(), now) {
                    self.transition(InteractionState::Patrolling, &mut out);
                } else if !self.queue.has_pending() {
                    self.transition(InteractionState::Idle, &mut out);
                    out.push(Directive::Motion(MotionMode::MinimalIdle));
                } else if self.policy.presence_held(self.presence.tracking_started_at(), now) {
                    self.begin_greeting(&mut out);
                }
            }
            InteractionState::Lost => self.cleanup(&mut out),
            // Segment boundaries drive these
            InteractionState::Greeting | InteractionState::Conversing { .. } | InteractionState::Farewell => {}
        }
        out
    }

    /// Segment boundary: the only place speaking states move on
    pub fn on_segment_finished(
        &mut self,
        token: PlaybackToken,
        outcome: PlaybackOutcome,
        now: Instant,
    ) -> Vec<Directive> {
        let mut out = Vec::new();

        let Some(conversation) = self.conversation.as_mut() else {
            debug!(%token, "on_segment_finished: no conversation, ignoring");
            return out;
        };
        let awaiting = match conversation.awaiting {
            Some(awaiting) if awaiting.token == token => awaiting,
            _ => {
                debug!(%token, "on_segment_finished: stale token, ignoring");
                return out;
            }
        };
        conversation.awaiting = None;
        let pending_loss = std::mem::take(&mut conversation.pending_loss);

        debug!(%token, role = %awaiting.role, ?outcome, pending_loss, "on_segment_finished: boundary");

        if !outcome.is_finished() {
            warn!(id = %conversation.bundle.id, role = %awaiting.role, ?outcome, "Segment did not finish");
            if self.state == InteractionState::Farewell {
                self.cleanup(&mut out);
            } else {
                self.finish_conversation(now, &mut out);
            }
            return out;
        }

        match self.state {
            InteractionState::Farewell => self.cleanup(&mut out),
            InteractionState::Greeting | InteractionState::Conversing { .. } => {
                if pending_loss && !self.presence.is_present() {
                    info!(state = %self.state, "Subject left during segment");
                    self.farewell_or_lost(now, &mut out);
                } else if self.engaged(now) {
                    self.advance(now, &mut out);
                } else {
                    info!(state = %self.state, "Subject no longer engaged");
                    self.finish_conversation(now, &mut out);
                }
            }
            other => warn!(state = %other, "on_segment_finished: not in a speaking state"),
        }
        out
    }

    /// Orderly stop: hand the bundle back to the queue and go quiet
    pub fn shutdown(&mut self) -> Vec<Directive> {
        let mut out = Vec::new();
        if let Some(conversation) = self.conversation.take() {
            if conversation.gesture_raised {
                out.push(Directive::Gesture(Gesture::Lower));
            }
            if self.queue.release(&conversation.bundle) {
                info!(id = %conversation.bundle.id, "Released bundle on shutdown");
            }
        }
        self.transition(InteractionState::Idle, &mut out);
        out.push(Directive::Motion(MotionMode::MinimalIdle));
        out
    }

    fn engaged(&self, now: Instant) -> bool {
        let attentive_now = self
            .presence
            .latest()
            .is_some_and(|sample| self.policy.is_attentive(sample, Phase::Engaged));
        self.presence.is_present()
            && (attentive_now || self.policy.recently_attentive(self.presence.last_attentive_at(), now))
    }

    fn farewell_due(&self, now: Instant) -> bool {
        let Some(conversation) = self.conversation.as_ref() else {
            return false;
        };
        conversation.bundle.kind.has_farewell()
            && (self.presence.is_present() || self.policy.recently_present(self.presence.last_present_at(), now))
    }

    fn begin_greeting(&mut self, out: &mut Vec<Directive>) {
        let Some(bundle) = self.queue.checkout() else {
            debug!("begin_greeting: nothing checked out, retrying next tick");
            return;
        };
        info!(id = %bundle.id, kind = %bundle.kind, middles = bundle.middles.len(), "Greeting");

        self.presence.forget_attention();
        let opening = bundle.opening.clone();
        self.conversation = Some(Conversation::new(bundle));
        self.transition(InteractionState::Greeting, out);
        self.play(opening, out);
    }

    /// Next middle phrase, or wrap up after the last one
    fn advance(&mut self, now: Instant, out: &mut Vec<Directive>) {
        let next = match self.state {
            InteractionState::Conversing { phrase, .. } => phrase + 1,
            _ => 1,
        };
        let Some(conversation) = self.conversation.as_mut() else {
            return;
        };
        let total = conversation.total_phrases();
        if next > total {
            self.finish_conversation(now, out);
            return;
        }

        let Some(segment) = conversation.bundle.middle(next).cloned() else {
            warn!(id = %conversation.bundle.id, phrase = next, "advance: middle segment missing");
            self.finish_conversation(now, out);
            return;
        };
        if conversation.bundle.kind == BundleKind::Attention {
            let gesture = if next == 1 {
                Gesture::RaiseAttention
            } else {
                Gesture::HoldAttention
            };
            conversation.gesture_raised = true;
            out.push(Directive::Gesture(gesture));
        }

        self.transition(InteractionState::Conversing { phrase: next, total }, out);
        self.play(segment, out);
    }

    /// Farewell if one is due, otherwise straight to cleanup
    fn finish_conversation(&mut self, now: Instant, out: &mut Vec<Directive>) {
        self.lower_gesture(out);
        if self.farewell_due(now) {
            self.begin_farewell(out);
        } else {
            self.cleanup(out);
        }
    }

    /// Farewell if one is due, otherwise `Lost` until the next tick
    fn farewell_or_lost(&mut self, now: Instant, out: &mut Vec<Directive>) {
        self.lower_gesture(out);
        if self.farewell_due(now) {
            self.begin_farewell(out);
        } else {
            self.transition(InteractionState::Lost, out);
        }
    }

    fn begin_farewell(&mut self, out: &mut Vec<Directive>) {
        let Some(closing) = self.conversation.as_ref().map(|c| c.bundle.closing.clone()) else {
            return;
        };
        self.transition(InteractionState::Farewell, out);
        self.play(closing, out);
    }

    fn lower_gesture(&mut self, out: &mut Vec<Directive>) {
        if let Some(conversation) = self.conversation.as_mut()
            && conversation.gesture_raised
        {
            conversation.gesture_raised = false;
            out.push(Directive::Gesture(Gesture::Lower));
        }
    }

    /// Archive the bundle and fall back to patrol or idle
    fn cleanup(&mut self, out: &mut Vec<Directive>) {
        self.lower_gesture(out);
        if let Some(conversation) = self.conversation.take()
            && !self.queue.complete(&conversation.bundle)
        {
            warn!(id = %conversation.bundle.id, "cleanup: bundle not archived, recovery will return it");
        }

        let (next, mode) = if self.queue.has_pending() {
            (InteractionState::Patrolling, MotionMode::Patrol)
        } else {
            (InteractionState::Idle, MotionMode::MinimalIdle)
        };
        self.transition(next, out);
        out.push(Directive::Motion(mode));
    }

    fn play(&mut self, segment: Segment, out: &mut Vec<Directive>) {
        let Some(conversation) = self.conversation.as_mut() else {
            return;
        };
        let token = PlaybackToken(self.next_token);
        self.next_token += 1;

        debug!(%token, role = %segment.role, "play: requesting segment");
        conversation.awaiting = Some(Awaiting {
            token,
            role: segment.role,
        });
        out.push(Directive::Play { token, segment });
    }

    fn transition(&mut self, to: InteractionState, out: &mut Vec<Directive>) {
        if self.state == to {
            return;
        }
        let change = StateChange { from: self.state, to };
        info!(from = %change.from, to = %change.to, "State change");
        self.state = to;
        out.push(Directive::Transition(change));
    }
}
