//! # Output hand-off: single-slot, end-of-stream-aware chunk channel.
//!
//! The hand-off is how inner runners deliver chunks to the join's consumer.
//! It is a capacity-1 channel plus a one-shot close token fired by the
//! termination signal.
//!
//! ## Rules
//! - A send parks until the single slot is free; producers get no buffer to
//!   run ahead into (backpressure).
//! - Receive is **biased toward data**: the slot is drained before the
//!   close is honoured. A chunk whose send completed before the stop
//!   transition is therefore never dropped.
//! - After the close has been observed and the slot drained, receives
//!   report end-of-stream; end-of-stream is reported exactly once.
//! - Senders blocked in `send` after the close are not released here: each
//!   producer selects its send against the termination signal, which is the
//!   interruption required for sends (never a pre-send predicate check).

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::chunk::Chunk;

/// Creates a connected hand-off pair wired to the given close token.
pub(crate) fn handoff<T>(closed: CancellationToken) -> (HandoffSender<T>, HandoffReceiver<T>) {
    let (tx, rx) = mpsc::channel(1);
    (
        HandoffSender { tx },
        HandoffReceiver {
            rx,
            closed,
            draining: false,
        },
    )
}

/// Producer side of the hand-off. Cheap to clone; one per runner.
pub(crate) struct HandoffSender<T> {
    tx: mpsc::Sender<Chunk<T>>,
}

impl<T> Clone for HandoffSender<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> HandoffSender<T> {
    /// Delivers one chunk, parking until the slot is free.
    ///
    /// Fails only when the consumer side is gone.
    pub(crate) async fn send(&self, chunk: Chunk<T>) -> Result<(), HandoffClosed> {
        self.tx.send(chunk).await.map_err(|_| HandoffClosed)
    }
}

/// The consumer side of the hand-off is gone.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct HandoffClosed;

/// Consumer side of the hand-off; owned by the join boundary.
pub(crate) struct HandoffReceiver<T> {
    rx: mpsc::Receiver<Chunk<T>>,
    closed: CancellationToken,
    draining: bool,
}

impl<T> HandoffReceiver<T> {
    /// Receives the next chunk; `None` is end-of-stream.
    ///
    /// Data is polled before the close token, and the slot is drained after
    /// the close fires, so no chunk that rendezvoused before the stop
    /// transition is lost.
    pub(crate) async fn recv(&mut self) -> Option<Chunk<T>> {
        if self.draining {
            return self.rx.try_recv().ok();
        }
        tokio::select! {
            biased;
            item = self.rx.recv() => item,
            _ = self.closed.cancelled() => {
                self.draining = true;
                self.rx.try_recv().ok()
            }
        }
    }
}
