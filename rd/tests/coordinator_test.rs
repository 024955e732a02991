//! Integration tests for the RoboSanta coordinator
//!
//! These run the real Coordinator actor against an on-disk queue with a
//! silent audio backend and a recording motion sink.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use robosanta::coordinator::{Coordinator, CoordinatorConfig, CoordinatorHandle};
use robosanta::{
    AudioPlayer, EngagementPolicy, Gesture, InteractionState, MotionMode, MotionSink, PlaybackOutcome,
    PresenceSample, SilentPlayer, StateChange,
};
use segmentqueue::SegmentQueue;
use tempfile::TempDir;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

const ID: &str = "20251201120000";

// =============================================================================
// Fixtures
// =============================================================================

#[derive(Default)]
struct RecordingMotion {
    modes: Mutex<Vec<MotionMode>>,
    gestures: Mutex<Vec<Gesture>>,
}

impl MotionSink for RecordingMotion {
    fn set_mode(&self, mode: MotionMode) {
        self.modes.lock().unwrap().push(mode);
    }

    fn gesture(&self, gesture: Gesture) {
        self.gestures.lock().unwrap().push(gesture);
    }
}

/// Silent playback that remembers stop requests and how each segment ended
struct RecordingAudio {
    inner: SilentPlayer,
    stops: AtomicUsize,
    outcomes: Mutex<Vec<PlaybackOutcome>>,
}

impl RecordingAudio {
    fn new(segment: Duration) -> Self {
        Self {
            inner: SilentPlayer::new(segment),
            stops: AtomicUsize::new(0),
            outcomes: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl AudioPlayer for RecordingAudio {
    async fn play(&self, path: &Path) -> PlaybackOutcome {
        let outcome = self.inner.play(path).await;
        self.outcomes.lock().unwrap().push(outcome.clone());
        outcome
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
        self.inner.stop();
    }
}

fn stage(root: &Path, id: &str, kind: &str, middles: usize) {
    let dir = root.join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("bundle.yml"), format!("kind: {kind}\n")).unwrap();
    fs::write(dir.join("opening.audio"), b"RIFF").unwrap();
    for i in 1..=middles {
        fs::write(dir.join(format!("middle{i}.audio")), b"RIFF").unwrap();
    }
    fs::write(dir.join("closing.audio"), b"RIFF").unwrap();
}

fn fast_policy() -> EngagementPolicy {
    EngagementPolicy {
        presence_hold: Duration::from_millis(50),
        strict_angle_deg: 20.0,
        lenient_angle_deg: 45.0,
        attentive_memory: Duration::from_secs(2),
        farewell_grace: Duration::from_secs(2),
    }
}

fn fast_config() -> CoordinatorConfig {
    CoordinatorConfig {
        tick_ms: 10,
        ..Default::default()
    }
}

struct Running {
    handle: CoordinatorHandle,
    changes: broadcast::Receiver<StateChange>,
    task: JoinHandle<()>,
    motion: Arc<RecordingMotion>,
    audio: Arc<RecordingAudio>,
}

fn start(queue: &SegmentQueue, segment: Duration) -> Running {
    let motion = Arc::new(RecordingMotion::default());
    let audio = Arc::new(RecordingAudio::new(segment));
    let coordinator = Coordinator::new(
        fast_config(),
        fast_policy(),
        queue.clone(),
        audio.clone(),
        motion.clone(),
    );
    let handle = coordinator.handle();
    let changes = handle.subscribe();
    let task = tokio::spawn(coordinator.run());
    Running {
        handle,
        changes,
        task,
        motion,
        audio,
    }
}

/// Keep an attentive subject in front of the camera
fn attentive_subject(handle: &CoordinatorHandle) -> JoinHandle<()> {
    let handle = handle.clone();
    tokio::spawn(async move {
        let since = Instant::now();
        loop {
            let sample = PresenceSample::present(Some(0.0), Instant::now(), since.elapsed());
            if handle.push_presence(sample).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
}

/// Collect transitions until one lands on `to`
async fn wait_for(changes: &mut broadcast::Receiver<StateChange>, to: InteractionState) -> Vec<StateChange> {
    let mut seen = Vec::new();
    let result = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let change = changes.recv().await.expect("state channel open");
            seen.push(change);
            if change.to == to {
                break;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "never reached {to}; saw {seen:?}");
    seen
}

async fn stop(running: Running) {
    running.handle.shutdown().await.expect("coordinator accepts shutdown");
    let result = tokio::time::timeout(Duration::from_secs(5), running.task).await;
    assert!(result.is_ok(), "Coordinator should shut down gracefully");
}

// =============================================================================
// Coordinator Tests
// =============================================================================

#[tokio::test]
async fn test_coordinator_starts_idle_and_stops() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();

    let running = start(&queue, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(running.handle.state().await.unwrap(), InteractionState::Idle);
    assert_eq!(running.motion.modes.lock().unwrap().first(), Some(&MotionMode::MinimalIdle));
    stop(running).await;
}

#[tokio::test]
async fn test_conversation_plays_through_and_archives() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
    stage(queue.root(), ID, "conversation", 2);

    let mut running = start(&queue, Duration::from_millis(30));
    let subject = attentive_subject(&running.handle);

    let seen = wait_for(&mut running.changes, InteractionState::Idle).await;
    let states: Vec<InteractionState> = seen.iter().map(|c| c.to).collect();
    assert_eq!(
        states,
        vec![
            InteractionState::Patrolling,
            InteractionState::Approaching,
            InteractionState::Greeting,
            InteractionState::Conversing { phrase: 1, total: 2 },
            InteractionState::Conversing { phrase: 2, total: 2 },
            InteractionState::Farewell,
            InteractionState::Idle,
        ]
    );

    assert!(queue.is_empty());
    assert!(queue.checked_out().is_empty());
    assert_eq!(queue.archived(), vec![ID.to_string()]);

    subject.abort();
    stop(running).await;
}

#[tokio::test]
async fn test_attention_bundle_raises_and_lowers() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
    stage(queue.root(), ID, "attention", 2);

    let mut running = start(&queue, Duration::from_millis(30));
    let subject = attentive_subject(&running.handle);

    wait_for(&mut running.changes, InteractionState::Idle).await;
    assert_eq!(
        *running.motion.gestures.lock().unwrap(),
        vec![Gesture::RaiseAttention, Gesture::HoldAttention, Gesture::Lower]
    );
    assert_eq!(queue.archived(), vec![ID.to_string()]);

    subject.abort();
    stop(running).await;
}

#[tokio::test]
async fn test_shutdown_mid_segment_releases_bundle() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
    stage(queue.root(), ID, "conversation", 1);

    let mut running = start(&queue, Duration::from_secs(60));
    let subject = attentive_subject(&running.handle);

    wait_for(&mut running.changes, InteractionState::Greeting).await;
    assert_eq!(queue.checked_out(), vec![ID.to_string()]);

    subject.abort();
    let audio = running.audio.clone();
    let started = Instant::now();
    stop(running).await;

    // The opening was cut short, not played out
    assert_eq!(audio.stops.load(Ordering::SeqCst), 1);
    let cut = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if audio.outcomes.lock().unwrap().contains(&PlaybackOutcome::Stopped) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(cut.is_ok(), "playback was never stopped");
    assert!(started.elapsed() < Duration::from_secs(30));

    assert!(queue.checked_out().is_empty());
    assert_eq!(queue.len(), 1);
    assert!(queue.archived().is_empty());
}

#[tokio::test]
async fn test_second_coordinator_leaves_live_bundle_alone() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
    stage(queue.root(), ID, "conversation", 1);

    let mut first = start(&queue, Duration::from_secs(60));
    let subject = attentive_subject(&first.handle);
    wait_for(&mut first.changes, InteractionState::Greeting).await;

    let other_queue = SegmentQueue::open(queue.root()).unwrap();
    let second = start(&other_queue, Duration::from_millis(20));
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(second.handle.state().await.unwrap(), InteractionState::Idle);
    assert_eq!(first.handle.state().await.unwrap(), InteractionState::Greeting);
    assert_eq!(queue.checked_out(), vec![ID.to_string()]);
    assert_eq!(queue.len(), 0);

    stop(second).await;
    subject.abort();
    stop(first).await;
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_orphan_recovered_at_startup() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();
    stage(queue.root(), ID, "conversation", 1);
    fs::rename(queue.root().join(ID), queue.root().join(format!("{ID}.inuse"))).unwrap();
    assert!(queue.is_empty());

    let mut running = start(&queue, Duration::from_millis(20));
    wait_for(&mut running.changes, InteractionState::Patrolling).await;

    assert!(queue.checked_out().is_empty());
    assert_eq!(queue.len(), 1);
    stop(running).await;
}

#[tokio::test]
async fn test_coordinator_stops_when_handles_dropped() {
    let temp = TempDir::new().unwrap();
    let queue = SegmentQueue::open(temp.path().join("queue")).unwrap();

    let Running { handle, task, .. } = start(&queue, Duration::from_millis(20));
    drop(handle);

    let result = tokio::time::timeout(Duration::from_secs(5), task).await;
    assert!(result.is_ok(), "Coordinator should stop once every handle is gone");
}
