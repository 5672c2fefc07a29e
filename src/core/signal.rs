//! # Termination signal: tri-state stop cell with error composition.
//!
//! [`StopSignal`] is the single source of truth for whether the join is
//! winding down and why. It is a watch-backed cell holding a [`StopState`]:
//!
//! ```text
//! Running ──► Stopping{failure: None}        (graceful)
//!         └─► Stopping{failure: Some(f)}     (failed)
//! ```
//!
//! ## Rules
//! - Transitions are **monotonic**: once stopping, never running again.
//! - A later error arriving while already stopping is **composed** into the
//!   existing failure (first error stays primary, later ones suppressed).
//! - Composition happens inside `watch::Sender::send_modify`, whose closure
//!   runs exactly once under the channel lock, so no error is ever composed
//!   twice.
//! - Every `stop` call also fires the one-shot hand-off close, which is the
//!   end-of-stream sentinel seen by the consumer. The close happens-after
//!   the state transition, so a consumer observing end-of-stream can read a
//!   stable terminal failure from the signal.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::error::JoinFailure;

/// Current phase of the join.
#[derive(Debug, Clone)]
pub(crate) enum StopState {
    /// Evaluation active.
    Running,
    /// Termination requested; `failure` is `None` for a graceful stop.
    Stopping { failure: Option<JoinFailure> },
}

impl StopState {
    fn is_stopping(&self) -> bool {
        matches!(self, StopState::Stopping { .. })
    }
}

/// Shared handle to the termination signal.
#[derive(Clone)]
pub(crate) struct StopSignal {
    cell: watch::Sender<StopState>,
    closer: CancellationToken,
}

impl StopSignal {
    /// Creates a running signal wired to the hand-off close token.
    pub(crate) fn new(closer: CancellationToken) -> Self {
        let (cell, _) = watch::channel(StopState::Running);
        Self { cell, closer }
    }

    /// Requests termination, composing `failure` into the current state.
    ///
    /// - `Running` → `Stopping{failure}`
    /// - `Stopping{None}` + error → `Stopping{Some(error)}`
    /// - `Stopping{Some(f)}` + error → `f` absorbs the error's causes
    /// - repeated clean stops are no-ops
    ///
    /// Always fires the hand-off close after the update (one-shot).
    pub(crate) fn stop(&self, failure: Option<JoinFailure>) {
        self.cell.send_modify(|state| match state {
            StopState::Running => {
                *state = StopState::Stopping { failure };
            }
            StopState::Stopping { failure: existing } => {
                if let Some(incoming) = failure {
                    match existing {
                        Some(f) => f.merge(incoming),
                        None => *existing = Some(incoming),
                    }
                }
            }
        });
        self.closer.cancel();
    }

    /// True once termination has been requested.
    #[cfg(test)]
    pub(crate) fn is_stopping(&self) -> bool {
        self.cell.borrow().is_stopping()
    }

    /// The terminal failure, if the join stopped with one.
    pub(crate) fn failure(&self) -> Option<JoinFailure> {
        match &*self.cell.borrow() {
            StopState::Running => None,
            StopState::Stopping { failure } => failure.clone(),
        }
    }

    /// Resolves once termination has been requested.
    ///
    /// Checks the current state first, so a stop that happened before this
    /// call is observed immediately.
    pub(crate) async fn stopped(&self) {
        let mut rx = self.cell.subscribe();
        let _ = rx.wait_for(|state| state.is_stopping()).await;
    }
}
