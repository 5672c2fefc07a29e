//! # Join configuration.
//!
//! Provides [`JoinConfig`] centralized settings for a join instance.
//!
//! Config is used in two ways:
//! 1. **Joiner creation**: `Joiner::new(config, observers)`
//! 2. **One-off joins**: the [`par_join`](crate::par_join) family builds a
//!    config from its `max_open` argument.
//!
//! ## Preconditions
//! - `max_open = 0` is invalid and rejected synchronously, before any task
//!   is spawned (there is no "unlimited" sentinel: the unbounded variant
//!   passes `usize::MAX`, clamped to the semaphore's permit ceiling).

use crate::error::JoinError;

/// Configuration for a join instance.
///
/// ## Field semantics
/// - `max_open`: upper bound on concurrently evaluated inner streams
///   (must be ≥ 1; validated before the join starts)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
#[derive(Clone, Debug)]
pub struct JoinConfig {
    /// Maximum number of inner streams evaluated concurrently.
    ///
    /// Each admitted inner stream holds one semaphore permit for its whole
    /// lifetime; admission beyond this bound blocks the outer driver (FIFO).
    pub max_open: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow observers that lag behind more than `bus_capacity` events will
    /// skip older items. Minimum value is 1 (enforced at wiring time).
    pub bus_capacity: usize,
}

impl JoinConfig {
    /// Config bounding concurrency to `max_open` inner streams.
    pub fn bounded(max_open: usize) -> Self {
        Self {
            max_open,
            ..Self::default()
        }
    }

    /// Config with no practical concurrency bound.
    pub fn unbounded() -> Self {
        Self::bounded(usize::MAX)
    }

    /// Validates preconditions; called before any task is spawned.
    pub fn validate(&self) -> Result<(), JoinError> {
        if self.max_open < 1 {
            return Err(JoinError::InvalidMaxOpen {
                max_open: self.max_open,
            });
        }
        Ok(())
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for JoinConfig {
    /// Default configuration:
    ///
    /// - `max_open = 16` (modest parallelism baseline)
    /// - `bus_capacity = 1024` (good baseline)
    fn default() -> Self {
        Self {
            max_open: 16,
            bus_capacity: 1024,
        }
    }
}
