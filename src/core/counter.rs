//! # Run counter: observable count of live producers.
//!
//! [`RunCounter`] tracks how many producers (the outer driver plus every
//! admitted inner runner) are still live. It starts at **1** because the
//! outer driver counts as a producer; this prevents premature shutdown when
//! the outer momentarily has zero live inners.
//!
//! ## Rules
//! - Each inner runner increments exactly once (at admission) and
//!   decrements exactly once (at exit); the outer driver decrements its
//!   initial unit at exit.
//! - Zero-detection is atomic with the decrement (both happen inside one
//!   `send_modify` closure), so two concurrent final decrements can never
//!   both observe themselves as last.
//! - The decrement that reaches zero triggers a graceful stop on the
//!   termination signal, which closes the output hand-off.

use tokio::sync::watch;

use crate::core::signal::StopSignal;

/// Observable live-producer counter.
#[derive(Clone)]
pub(crate) struct RunCounter {
    cell: watch::Sender<usize>,
    signal: StopSignal,
}

impl RunCounter {
    /// Creates a counter at 1 (the outer driver's unit).
    pub(crate) fn new(signal: StopSignal) -> Self {
        let (cell, _) = watch::channel(1usize);
        Self { cell, signal }
    }

    /// Registers one more live producer.
    pub(crate) fn increment(&self) {
        self.cell.send_modify(|n| *n += 1);
    }

    /// Deregisters a producer; the last one out stops the join.
    pub(crate) fn decrement(&self) {
        let mut last = false;
        self.cell.send_modify(|n| {
            debug_assert!(*n > 0, "run counter underflow");
            *n -= 1;
            last = *n == 0;
        });
        if last {
            self.signal.stop(None);
        }
    }

    /// Current number of live producers.
    #[cfg(test)]
    pub(crate) fn value(&self) -> usize {
        *self.cell.borrow()
    }

    /// Resolves once every producer has exited.
    pub(crate) async fn quiesced(&self) {
        let mut rx = self.cell.subscribe();
        let _ = rx.wait_for(|n| *n == 0).await;
    }
}
