//! rodio backend
//!
//! rodio's output stream is not `Send`, so a dedicated thread owns it and
//! takes commands over a channel. While a segment plays the thread polls the
//! sink for completion and the channel for a stop request.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;

use async_trait::async_trait;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::error::AudioError;
use super::player::{AudioPlayer, PlaybackOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

enum Command {
    Play {
        path: PathBuf,
        reply: oneshot::Sender<PlaybackOutcome>,
    },
    Stop,
}

/// Plays segments on the default output device
pub struct RodioPlayer {
    tx: Sender<Command>,
}

impl RodioPlayer {
    /// Open the default output device at `volume` (0.0 to 1.0)
    pub fn new(volume: f32) -> Result<Self, AudioError> {
        let (tx, rx) = mpsc::channel::<Command>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);
        let volume = volume.clamp(0.0, 1.0);

        thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || audio_thread(rx, volume, ready_tx))
            .map_err(|e| AudioError::Output(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(volume, "Audio output ready");
                Ok(Self { tx })
            }
            Ok(Err(reason)) => Err(AudioError::Output(reason)),
            Err(_) => Err(AudioError::ThreadGone),
        }
    }
}

#[async_trait]
impl AudioPlayer for RodioPlayer {
    async fn play(&self, path: &Path) -> PlaybackOutcome {
        debug!(path = %path.display(), "RodioPlayer::play: called");
        let (reply, reply_rx) = oneshot::channel();
        let command = Command::Play {
            path: path.to_path_buf(),
            reply,
        };
        if self.tx.send(command).is_err() {
            return PlaybackOutcome::Failed(AudioError::ThreadGone.to_string());
        }
        reply_rx
            .await
            .unwrap_or_else(|_| PlaybackOutcome::Failed(AudioError::ThreadGone.to_string()))
    }

    fn stop(&self) {
        debug!("RodioPlayer::stop: called");
        let _ = self.tx.send(Command::Stop);
    }
}

fn audio_thread(rx: Receiver<Command>, volume: f32, ready: mpsc::SyncSender<Result<(), String>>) {
    let (_stream, handle) = match OutputStream::try_default() {
        Ok(output) => output,
        Err(e) => {
            let _ = ready.send(Err(format!("Failed to create audio output stream: {}", e)));
            return;
        }
    };
    let _ = ready.send(Ok(()));

    while let Ok(command) = rx.recv() {
        match command {
            Command::Play { path, reply } => {
                let outcome = play_segment(&handle, &rx, &path, volume);
                debug!(path = %path.display(), ?outcome, "audio_thread: segment done");
                let _ = reply.send(outcome);
            }
            // Nothing playing
            Command::Stop => {}
        }
    }
    debug!("audio_thread: channel closed, exiting");
}

fn play_segment(handle: &OutputStreamHandle, rx: &Receiver<Command>, path: &Path, volume: f32) -> PlaybackOutcome {
    let source = match open_source(path) {
        Ok(source) => source,
        Err(e) => return PlaybackOutcome::Failed(e.to_string()),
    };
    let sink = match Sink::try_new(handle) {
        Ok(sink) => sink,
        Err(e) => return PlaybackOutcome::Failed(format!("Failed to create audio sink: {}", e)),
    };
    sink.set_volume(volume);
    sink.append(source);

    loop {
        match rx.recv_timeout(POLL_INTERVAL) {
            Ok(Command::Stop) | Err(RecvTimeoutError::Disconnected) => {
                sink.stop();
                return PlaybackOutcome::Stopped;
            }
            Ok(Command::Play { path: other, reply }) => {
                warn!(path = %other.display(), "play_segment: already playing, rejecting");
                let _ = reply.send(PlaybackOutcome::Failed("Another segment is playing".to_string()));
            }
            Err(RecvTimeoutError::Timeout) => {
                if sink.empty() {
                    return PlaybackOutcome::Finished;
                }
            }
        }
    }
}

fn open_source(path: &Path) -> Result<Decoder<BufReader<File>>, AudioError> {
    let file = File::open(path).map_err(|source| AudioError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    Decoder::new(BufReader::new(file)).map_err(|e| AudioError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
