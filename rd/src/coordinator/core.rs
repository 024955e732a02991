//! Main Coordinator task implementation

use std::sync::Arc;
use std::time::Instant;

use segmentqueue::SegmentQueue;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use super::config::CoordinatorConfig;
use super::engine::{Directive, Engine};
use super::handle::CoordinatorHandle;
use super::messages::CoordRequest;
use crate::audio::AudioPlayer;
use crate::engagement::EngagementPolicy;
use crate::motion::MotionSink;
use crate::state::{MotionMode, StateChange};

/// Owns the engine and carries out its directives
///
/// Presence samples and segment completions arrive through a single inbox and
/// are applied one at a time; a tick drives the non-speaking states.
pub struct Coordinator {
    config: CoordinatorConfig,
    engine: Engine,
    queue: SegmentQueue,
    audio: Arc<dyn AudioPlayer>,
    motion: Arc<dyn MotionSink>,
    tx: mpsc::Sender<CoordRequest>,
    rx: mpsc::Receiver<CoordRequest>,
    state_tx: broadcast::Sender<StateChange>,
}

impl Coordinator {
    pub fn new(
        config: CoordinatorConfig,
        policy: EngagementPolicy,
        queue: SegmentQueue,
        audio: Arc<dyn AudioPlayer>,
        motion: Arc<dyn MotionSink>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.inbox_buffer);
        let (state_tx, _) = broadcast::channel(config.state_buffer);
        let engine = Engine::new(policy, Box::new(queue.clone()));
        Self {
            config,
            engine,
            queue,
            audio,
            motion,
            tx,
            rx,
            state_tx,
        }
    }

    /// Get a handle for pushing presence and observing state
    pub fn handle(&self) -> CoordinatorHandle {
        CoordinatorHandle::new(self.tx.clone(), self.state_tx.clone())
    }

    /// Run the Coordinator task
    ///
    /// Consumes the Coordinator and runs until shutdown is requested or every
    /// handle is dropped.
    pub async fn run(self) {
        let Coordinator {
            config,
            mut engine,
            queue,
            audio,
            motion,
            tx,
            mut rx,
            state_tx,
        } = self;

        let stats = queue.recover_orphans();
        if stats.total() > 0 {
            info!("Recovered orphaned bundles: {}", stats);
        }

        // Playback tasks hold the inbox only while a segment plays
        let dispatcher = Dispatcher {
            audio,
            motion,
            state_tx,
            inbox: tx.downgrade(),
        };
        drop(tx);

        let mut ticker = tokio::time::interval(config.tick());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        dispatcher.motion.set_mode(MotionMode::MinimalIdle);
        info!(tick_ms = config.tick_ms, "Coordinator started");

        loop {
            tokio::select! {
                req = rx.recv() => match req {
                    Some(CoordRequest::Presence(sample)) => {
                        engine.on_presence(sample);
                    }
                    Some(CoordRequest::SegmentFinished { token, outcome }) => {
                        debug!(%token, ?outcome, "run: segment finished");
                        dispatcher.dispatch(engine.on_segment_finished(token, outcome, Instant::now()));
                    }
                    Some(CoordRequest::GetState { reply_tx }) => {
                        let _ = reply_tx.send(engine.state());
                    }
                    Some(CoordRequest::Shutdown) => {
                        info!("Coordinator shutdown requested");
                        break;
                    }
                    None => {
                        info!("Coordinator inbox closed");
                        break;
                    }
                },
                _ = ticker.tick() => {
                    dispatcher.dispatch(engine.on_tick(Instant::now()));
                }
            }
        }

        dispatcher.audio.stop();
        dispatcher.dispatch(engine.shutdown());
        info!("Coordinator stopped");
    }
}

/// Carries out engine directives against the collaborators
struct Dispatcher {
    audio: Arc<dyn AudioPlayer>,
    motion: Arc<dyn MotionSink>,
    state_tx: broadcast::Sender<StateChange>,
    inbox: mpsc::WeakSender<CoordRequest>,
}

impl Dispatcher {
    fn dispatch(&self, directives: Vec<Directive>) {
        for directive in directives {
            match directive {
                Directive::Play { token, segment } => {
                    let Some(tx) = self.inbox.upgrade() else {
                        warn!(%token, "dispatch: inbox closed, not playing");
                        continue;
                    };
                    let audio = self.audio.clone();
                    tokio::spawn(async move {
                        let outcome = audio.play(&segment.path).await;
                        if tx.send(CoordRequest::SegmentFinished { token, outcome }).await.is_err() {
                            debug!(%token, "playback: coordinator gone");
                        }
                    });
                }
                Directive::Motion(mode) => self.motion.set_mode(mode),
                Directive::Gesture(gesture) => self.motion.gesture(gesture),
                Directive::Transition(change) => {
                    // No subscribers is fine
                    let _ = self.state_tx.send(change);
                }
            }
        }
    }
}
