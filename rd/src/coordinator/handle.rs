//! CoordinatorHandle - client interface for the detection driver and observers

use eyre::{Result, eyre};
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::debug;

use super::messages::CoordRequest;
use crate::presence::PresenceSample;
use crate::state::{InteractionState, StateChange};

/// Handle for pushing presence and observing the Coordinator
///
/// Cloneable; the Coordinator stops once every handle is dropped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<CoordRequest>,
    state_tx: broadcast::Sender<StateChange>,
}

impl CoordinatorHandle {
    pub(crate) fn new(tx: mpsc::Sender<CoordRequest>, state_tx: broadcast::Sender<StateChange>) -> Self {
        Self { tx, state_tx }
    }

    /// Deliver a presence sample
    pub async fn push_presence(&self, sample: PresenceSample) -> Result<()> {
        self.tx
            .send(CoordRequest::Presence(sample))
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }

    /// Get the current interaction state
    pub async fn state(&self) -> Result<InteractionState> {
        let (reply_tx, reply_rx) = oneshot::channel();

        self.tx
            .send(CoordRequest::GetState { reply_tx })
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))?;

        reply_rx.await.map_err(|_| eyre!("Coordinator shutdown before reply"))
    }

    /// Subscribe to state transitions
    pub fn subscribe(&self) -> broadcast::Receiver<StateChange> {
        self.state_tx.subscribe()
    }

    /// Request shutdown of the Coordinator
    pub async fn shutdown(&self) -> Result<()> {
        debug!("CoordinatorHandle::shutdown: called");
        self.tx
            .send(CoordRequest::Shutdown)
            .await
            .map_err(|_| eyre!("Coordinator channel closed"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_push_presence_reaches_inbox() {
        let (tx, mut rx) = mpsc::channel(10);
        let (state_tx, _) = broadcast::channel(4);
        let handle = CoordinatorHandle::new(tx, state_tx);

        handle.push_presence(PresenceSample::absent(Instant::now())).await.unwrap();
        assert!(matches!(rx.recv().await, Some(CoordRequest::Presence(s)) if !s.present));
    }

    #[tokio::test]
    async fn test_closed_inbox_is_an_error() {
        let (tx, rx) = mpsc::channel(10);
        let (state_tx, _) = broadcast::channel(4);
        let handle = CoordinatorHandle::new(tx, state_tx);
        drop(rx);

        assert!(handle.shutdown().await.is_err());
        assert!(handle.state().await.is_err());
    }
}
