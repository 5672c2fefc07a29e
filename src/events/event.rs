//! # Lifecycle events emitted by the join engine.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Admission events**: inner streams entering the join (admitted, lease
//!   rejected)
//! - **Producer events**: inner/outer producers finishing or failing
//! - **Termination events**: stop requests and final quiescence
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! inner stream's admission index, and error messages.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically, so events can be ordered correctly even when delivered
//! out-of-order through async channels.
//!
//! ## Event flow example
//! ```text
//! InnerAdmitted{inner=0}
//!   → InnerAdmitted{inner=1}
//!   → InnerStopped{inner=0}
//!   → InnerFailed{inner=1, error}
//!   → OuterDrained
//!   → Quiesced
//! ```

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of join lifecycle events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Admission events ===
    /// An inner stream acquired its lease and permit and was spawned.
    InnerAdmitted,
    /// An inner stream was refused a lease because the scope had closed.
    LeaseRejected,

    // === Producer events ===
    /// An inner runner finished (drained, interrupted, or hand-off closed).
    InnerStopped,
    /// An inner runner failed (producer error and/or finalizer error).
    InnerFailed,
    /// The outer stream was fully drained.
    OuterDrained,
    /// The outer stream failed while producing inner streams.
    OuterFailed,

    // === Termination events ===
    /// Termination was requested externally (output stream dropped).
    StopRequested,
    /// The run counter reached zero and the scope was closed.
    Quiesced,
}

/// Join lifecycle event with optional metadata.
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp (may go backwards, use for logging only).
    pub at: SystemTime,
    /// The kind of event.
    pub kind: EventKind,
    /// Admission index of the inner stream, if applicable.
    pub inner: Option<u64>,
    /// Error message, if the event represents a failure.
    pub error: Option<String>,
}

impl Event {
    /// Creates a new event of the given kind with the next sequence number.
    pub fn now(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            inner: None,
            error: None,
        }
    }

    /// Attaches the admission index of an inner stream.
    pub fn with_inner(mut self, index: u64) -> Self {
        self.inner = Some(index);
        self
    }

    /// Attaches an error message.
    pub fn with_error(mut self, msg: impl Into<String>) -> Self {
        self.error = Some(msg.into());
        self
    }
}
