//! # Supervisor: wires the join's primitives and drives its lifecycle.
//!
//! [`Joiner`] owns the construction of one join instance: it validates the
//! configuration, wires the termination signal, run counter, admission
//! semaphore, hand-off, scope, and event bus, spawns the outer driver, and
//! exposes the result as a [`JoinStream`].
//!
//! ## Architecture
//! ```text
//! Joiner::join(outer)
//!     │
//!     ├──► validate max_open ≥ 1 (fail synchronously, nothing spawned)
//!     │
//!     ├──► spawn observer_listener()
//!     │         └──► fans bus events out to registered observers
//!     │
//!     ├──► spawn outer driver (run counter starts at 1 on its behalf)
//!     │
//!     ├──► spawn watchdog:
//!     │         ├──► output stream dropped → stop(Canceled)
//!     │         └──► after quiescence → publish Quiesced, backstop close
//!     │
//!     └──► JoinStream:
//!           ├──► dequeues chunks from the hand-off
//!           └──► at end-of-stream: stop(None) → await R == 0
//!                → close scope → yield terminal failure (if any)
//! ```
//!
//! ## Rules
//! - The shutdown release is **idempotent**: stop composes, quiescence
//!   waits are repeatable, the scope closes once.
//! - The terminal failure is read only after `R == 0`, so it is stable.
//! - Dropping the [`JoinStream`] at any point cancels the join; runners
//!   wind down through the normal interruption path.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio::sync::{broadcast, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::config::JoinConfig;
use crate::core::counter::RunCounter;
use crate::core::handoff::{handoff, HandoffReceiver};
use crate::core::outer;
use crate::core::signal::StopSignal;
use crate::core::JoinContext;
use crate::error::{JoinError, JoinFailure};
use crate::events::{Bus, Event, EventKind};
use crate::join::{JoinStream, OuterStream};
use crate::observer::Observe;
use crate::scope::Scope;

/// Builds join instances from a configuration and a set of observers.
pub struct Joiner {
    cfg: JoinConfig,
    observers: Arc<Vec<Arc<dyn Observe>>>,
}

impl Joiner {
    /// Creates a new joiner with the given config and observers (maybe empty).
    pub fn new(cfg: JoinConfig, observers: Vec<Arc<dyn Observe>>) -> Self {
        Self {
            cfg,
            observers: Arc::new(observers),
        }
    }

    /// Merges the inner streams produced by `outer` into one output stream.
    ///
    /// At most `max_open` inner streams are evaluated concurrently; chunks
    /// from one inner stream keep their order, interleaving across inner
    /// streams is non-deterministic. The returned stream terminates
    /// normally iff every producer terminated normally, and otherwise
    /// yields the composed [`JoinFailure`] as its final item.
    ///
    /// Fails synchronously (before any task is spawned) when
    /// `max_open < 1`. Must be called within a tokio runtime.
    pub fn join<T: Send + 'static>(&self, outer: OuterStream<T>) -> Result<JoinStream<T>, JoinError> {
        self.join_scoped(outer, Scope::new())
    }

    /// [`join`](Joiner::join) under a caller-provided resource [`Scope`].
    ///
    /// Every inner runner leases `scope` for its lifetime, so resources the
    /// caller registered stay alive while producers run. The join **closes
    /// the scope** when it terminates: registered finalizers run once all
    /// leases are returned, and their errors are composed into the terminal
    /// failure. Handing over an already-closed scope fails the join with
    /// [`JoinError::LeaseOnClosedScope`] at first admission.
    pub fn join_scoped<T: Send + 'static>(
        &self,
        outer: OuterStream<T>,
        scope: Scope,
    ) -> Result<JoinStream<T>, JoinError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        self.spawn_observer_listener(&bus);

        let closer = CancellationToken::new();
        let (output, rx) = handoff(closer.clone());
        let signal = StopSignal::new(closer);
        let counter = RunCounter::new(signal.clone());

        let ctx = JoinContext {
            signal: signal.clone(),
            counter: counter.clone(),
            admission: self.build_admission(),
            output,
            scope: scope.clone(),
            bus: bus.clone(),
        };
        tokio::spawn(outer::drive(ctx, outer));

        let cancel = CancellationToken::new();
        spawn_watchdog(cancel.clone(), signal.clone(), counter.clone(), scope.clone(), bus);

        let boundary = Boundary {
            rx,
            signal,
            counter,
            scope,
            done: false,
        };
        let dequeued = stream::unfold(boundary, |mut b| async move {
            if b.done {
                return None;
            }
            if let Some(chunk) = b.rx.recv().await {
                return Some((Ok(chunk), b));
            }
            b.done = true;
            b.release().await.map(|failure| (Err(failure), b))
        });

        Ok(JoinStream::new(dequeued.boxed(), cancel.drop_guard()))
    }

    /// Builds the admission semaphore bounding concurrent inner streams.
    fn build_admission(&self) -> Arc<Semaphore> {
        Arc::new(Semaphore::new(self.cfg.max_open.min(Semaphore::MAX_PERMITS)))
    }

    /// Spawns the background task that fans bus events out to observers.
    ///
    /// Runs until the bus is closed (all producer handles dropped) and
    /// skips events it lagged behind on.
    fn spawn_observer_listener(&self, bus: &Bus) {
        if self.observers.is_empty() {
            return;
        }
        let mut rx = bus.subscribe();
        let observers = Arc::clone(&self.observers);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => {
                        for obs in observers.iter() {
                            obs.on_event(&ev).await;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                }
            }
        });
    }
}

/// Consumer-side state behind the output stream.
struct Boundary<T> {
    rx: HandoffReceiver<T>,
    signal: StopSignal,
    counter: RunCounter,
    scope: Scope,
    done: bool,
}

impl<T> Boundary<T> {
    /// Shutdown release: runs once, after end-of-stream is observed.
    ///
    /// Ensures the signal is stopping, waits for every producer to exit,
    /// closes the scope, and returns the stable terminal failure.
    async fn release(&mut self) -> Option<JoinFailure> {
        self.signal.stop(None);
        self.counter.quiesced().await;

        let close_err = self.scope.close().await;
        let mut failure = self.signal.failure();
        if let Some(e) = close_err {
            match &mut failure {
                Some(f) => f.absorb(e),
                None => failure = Some(JoinFailure::new(e)),
            }
        }
        failure
    }
}

/// Spawns the watchdog owning external cancellation and the quiesce event.
///
/// The `cancel` token fires when the [`JoinStream`] is dropped. If that
/// happens before natural completion, the watchdog converts it into
/// `stop(Canceled)` and the runners wind down through the normal
/// interruption path. Either way it publishes `Quiesced` once the run
/// counter reaches zero and backstops the scope close after the consumer
/// is gone (the boundary's own close is the one whose error is observable).
fn spawn_watchdog(
    cancel: CancellationToken,
    signal: StopSignal,
    counter: RunCounter,
    scope: Scope,
    bus: Bus,
) {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                bus.publish(
                    Event::now(EventKind::StopRequested).with_error(JoinError::Canceled.to_string()),
                );
                signal.stop(Some(JoinFailure::new(JoinError::Canceled)));
            }
            _ = counter.quiesced() => {}
        }
        counter.quiesced().await;
        bus.publish(Event::now(EventKind::Quiesced));

        cancel.cancelled().await;
        let _ = scope.close().await;
    });
}
