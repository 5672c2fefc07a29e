//! # Error types used by the join engine.
//!
//! This module defines two layers:
//!
//! - [`JoinError`] individual failures observed while the join runs.
//! - [`JoinFailure`] the composite carrier the join terminates with when
//!   one or more producers failed.
//!
//! Errors are never swallowed: every [`JoinError`] is routed into the
//! termination signal, composed into a single [`JoinFailure`], and re-raised
//! exactly once at the join boundary. [`JoinError`] provides an `as_label`
//! helper for logs/metrics.

use thiserror::Error;

/// # Failures observed by the join engine.
///
/// Producer failures carry an opaque `reason`; callers building inner or
/// outer streams map their own error types into [`JoinError::Inner`] /
/// [`JoinError::Outer`] (see the [`inner`](JoinError::inner) and
/// [`outer`](JoinError::outer) constructors).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    /// An inner stream failed while producing chunks.
    #[error("inner stream failed: {reason}")]
    Inner {
        /// Producer-supplied failure description.
        reason: String,
    },

    /// The outer stream failed while producing inner streams.
    #[error("outer stream failed: {reason}")]
    Outer {
        /// Producer-supplied failure description.
        reason: String,
    },

    /// A scope finalizer failed while a lease was being returned.
    #[error("finalizer failed: {reason}")]
    Finalizer {
        /// Finalizer failure description.
        reason: String,
    },

    /// A lease was requested from a scope that is already closed.
    ///
    /// This indicates a wiring bug in the caller: the scope backing the join
    /// must outlive every producer it admits.
    #[error("lease requested on closed scope")]
    LeaseOnClosedScope,

    /// The join was canceled externally (its output stream was dropped).
    ///
    /// This is **not an error** in the traditional sense, but signals
    /// intentional termination.
    #[error("join canceled")]
    Canceled,

    /// `max_open` precondition violated; the join refuses to start.
    #[error("max_open must be at least 1, got {max_open}")]
    InvalidMaxOpen {
        /// The rejected admission bound.
        max_open: usize,
    },
}

impl JoinError {
    /// Builds an inner-producer failure from any displayable reason.
    pub fn inner(reason: impl Into<String>) -> Self {
        JoinError::Inner {
            reason: reason.into(),
        }
    }

    /// Builds an outer-producer failure from any displayable reason.
    pub fn outer(reason: impl Into<String>) -> Self {
        JoinError::Outer {
            reason: reason.into(),
        }
    }

    /// Builds a finalizer failure from any displayable reason.
    pub fn finalizer(reason: impl Into<String>) -> Self {
        JoinError::Finalizer {
            reason: reason.into(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            JoinError::Inner { .. } => "inner_failed",
            JoinError::Outer { .. } => "outer_failed",
            JoinError::Finalizer { .. } => "finalizer_failed",
            JoinError::LeaseOnClosedScope => "lease_on_closed_scope",
            JoinError::Canceled => "join_canceled",
            JoinError::InvalidMaxOpen { .. } => "invalid_max_open",
        }
    }

    /// Indicates whether this error represents cooperative cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, JoinError::Canceled)
    }
}

/// # Composite failure the join terminates with.
///
/// The first error observed becomes [`primary`](JoinFailure::primary);
/// every error observed while the termination signal already holds a
/// failure is appended to [`suppressed`](JoinFailure::suppressed) in
/// arrival order. The composite stays inspectable so callers (and tests)
/// can assert on every retained cause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinFailure {
    primary: JoinError,
    suppressed: Vec<JoinError>,
}

impl JoinFailure {
    /// Wraps a single error as a composite with no suppressed causes.
    pub fn new(primary: JoinError) -> Self {
        Self {
            primary,
            suppressed: Vec::new(),
        }
    }

    /// Composes a producer error and a finalizer error from one runner.
    ///
    /// Returns `None` when both are absent. When both are present the
    /// producer error is primary and the finalizer error is suppressed.
    pub fn from_pair(producer: Option<JoinError>, finalizer: Option<JoinError>) -> Option<Self> {
        match (producer, finalizer) {
            (None, None) => None,
            (Some(p), None) => Some(Self::new(p)),
            (None, Some(f)) => Some(Self::new(f)),
            (Some(p), Some(f)) => {
                let mut failure = Self::new(p);
                failure.absorb(f);
                Some(failure)
            }
        }
    }

    /// Appends a later error as a suppressed cause.
    pub fn absorb(&mut self, err: JoinError) {
        self.suppressed.push(err);
    }

    /// Merges another composite into this one, keeping `self`'s primary.
    pub fn merge(&mut self, other: JoinFailure) {
        self.suppressed.push(other.primary);
        self.suppressed.extend(other.suppressed);
    }

    /// The first error observed.
    pub fn primary(&self) -> &JoinError {
        &self.primary
    }

    /// Errors observed after the primary, in arrival order.
    pub fn suppressed(&self) -> &[JoinError] {
        &self.suppressed
    }

    /// Iterates over every retained error, primary first.
    pub fn iter(&self) -> impl Iterator<Item = &JoinError> {
        std::iter::once(&self.primary).chain(self.suppressed.iter())
    }

    /// Returns true if any retained error carries the given label.
    pub fn contains_label(&self, label: &str) -> bool {
        self.iter().any(|e| e.as_label() == label)
    }
}

impl std::fmt::Display for JoinFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.suppressed.is_empty() {
            write!(f, "{}", self.primary)
        } else {
            write!(f, "{} (+{} suppressed)", self.primary, self.suppressed.len())
        }
    }
}

impl std::error::Error for JoinFailure {}

impl From<JoinError> for JoinFailure {
    fn from(err: JoinError) -> Self {
        JoinFailure::new(err)
    }
}
