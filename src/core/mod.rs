//! Join core: coordination primitives and the engine wired around them.
//!
//! This module contains the embedded implementation of the join engine. The
//! only public API re-exported from here is [`Joiner`]. Everything else is
//! an internal building block that the supervisor wires together.
//!
//! ## Files & responsibilities
//! - **signal.rs**: termination signal `StopSignal` (tri-state, monotonic,
//!   composes errors exactly once, fires the hand-off close).
//! - **counter.rs**: run counter `RunCounter` (live producers; atomic
//!   zero-detection triggers the graceful stop).
//! - **handoff.rs**: single-slot chunk hand-off with one-shot close and
//!   drain-before-close receive.
//! - **inner.rs**: admission (lease → permit → increment, never abandoned
//!   half-way) and the spawned per-inner producer loop.
//! - **outer.rs**: outer driver (pulls inner streams, admits runners, exits
//!   on stop or outer failure).
//! - **supervisor.rs**: public facade [`Joiner`]; validates preconditions,
//!   wires the primitives, spawns the drivers, exposes the output stream,
//!   performs the idempotent shutdown release.
//!
//! ## Wiring (module-level flow)
//! ```text
//! Joiner::join(outer)
//!   ├─ validate max_open ≥ 1 (synchronous, before any spawn)
//!   ├─ wire StopSignal ◄──► RunCounter, Semaphore, Handoff, Scope, Bus
//!   ├─ spawn observer listener
//!   ├─ spawn outer driver ──► admit() per inner ──► spawn inner runner
//!   ├─ spawn watchdog (external cancellation + quiescence backstop)
//!   └─ return JoinStream (dequeues chunks, yields terminal failure)
//!
//! inner runner (per admitted inner stream)
//!   pull chunk (stop interrupts the pull)
//!   send chunk (stop interrupts the send, never checked before it)
//!   on exit: cancel lease → drop permit → stop(composed error)? → decrement
//!
//! shutdown release (join boundary, after end-of-stream)
//!   stop(None) → await R == 0 → close scope → read terminal failure
//! ```
//!
//! ## Rules
//! - `R = 0` implies the signal is stopping and the hand-off is closed.
//! - Each runner pairs exactly one permit acquire/release and one counter
//!   increment/decrement, in that nested order.
//! - The first stop transition closes the hand-off; later stops only
//!   compose errors.
//! - Chunks from one inner stream keep their order; interleaving across
//!   inner streams is non-deterministic.

pub(crate) mod counter;
pub(crate) mod handoff;
pub(crate) mod inner;
pub(crate) mod outer;
pub(crate) mod signal;
pub(crate) mod supervisor;

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::core::counter::RunCounter;
use crate::core::handoff::HandoffSender;
use crate::core::signal::StopSignal;
use crate::events::Bus;
use crate::scope::Scope;

pub use supervisor::Joiner;

/// Shared handles injected into every producer of one join instance.
///
/// The signal and counter are mutually coupled (the counter's final
/// decrement stops the signal); both are addressed as values captured here,
/// never as globals.
pub(crate) struct JoinContext<T> {
    pub(crate) signal: StopSignal,
    pub(crate) counter: RunCounter,
    pub(crate) admission: Arc<Semaphore>,
    pub(crate) output: HandoffSender<T>,
    pub(crate) scope: Scope,
    pub(crate) bus: Bus,
}

impl<T> Clone for JoinContext<T> {
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            counter: self.counter.clone(),
            admission: Arc::clone(&self.admission),
            output: self.output.clone(),
            scope: self.scope.clone(),
            bus: self.bus.clone(),
        }
    }
}
