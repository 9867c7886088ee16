//! The shutdown coordinator: a one-shot stop broadcast used to bring down
//! the session's background tasks before the transport is abandoned.
//!
//! Each long-running task contributes a fresh depth-one channel; broadcast
//! pushes a stop signal carrying an acknowledgement handle into every one
//! of them and counts the participants that could not be reached or never
//! acknowledged within the window.

use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};
use tracing::debug;

use crate::error::ShutdownError;

/// How long broadcast waits for each participant to acknowledge.
const ACK_WINDOW: Duration = Duration::from_millis(500);

/// A stop signal. Receivers acknowledge by firing the handle, then exit.
#[derive(Debug)]
pub(crate) struct StopSignal {
    ack: oneshot::Sender<()>,
}

impl StopSignal {
    /// Confirm receipt. Dropping the signal without acknowledging counts
    /// the participant as stale on the broadcaster's side.
    pub(crate) fn acknowledge(self) {
        let _ = self.ack.send(());
    }
}

/// Registry of stop channels contributed by long-running tasks.
#[derive(Debug, Default)]
pub(crate) struct ShutdownCoordinator {
    participants: Mutex<Vec<mpsc::Sender<StopSignal>>>,
}

impl ShutdownCoordinator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Add a participant. The channel must be a fresh, empty, depth-one
    /// channel so a single buffered stop signal is always deliverable.
    pub(crate) fn join(&self, tx: mpsc::Sender<StopSignal>) -> Result<(), ShutdownError> {
        if tx.is_closed() || tx.max_capacity() != 1 || tx.capacity() != 1 {
            return Err(ShutdownError::DirtyChannel);
        }
        self.participants.lock().push(tx);
        Ok(())
    }

    /// Build a fresh stop channel, join its sender, return the receiver.
    pub(crate) fn subscribe(&self) -> Result<mpsc::Receiver<StopSignal>, ShutdownError> {
        let (tx, rx) = mpsc::channel(1);
        self.join(tx)?;
        Ok(rx)
    }

    /// Broadcast a stop signal to every participant and clear the set.
    ///
    /// Returns the number of stale participants: those whose channel was
    /// gone or full, plus those that never acknowledged within the window.
    pub(crate) async fn broadcast(&self) -> usize {
        let participants = std::mem::take(&mut *self.participants.lock());
        let mut stale = 0;
        let mut pending = Vec::with_capacity(participants.len());

        for tx in participants {
            let (ack, acked) = oneshot::channel();
            match tx.try_send(StopSignal { ack }) {
                Ok(()) => pending.push(acked),
                Err(_) => stale += 1,
            }
        }

        for acked in pending {
            if !matches!(timeout(ACK_WINDOW, acked).await, Ok(Ok(()))) {
                stale += 1;
            }
        }

        if stale > 0 {
            debug!(stale, "stop broadcast left unacknowledged participants");
        }
        stale
    }
}
