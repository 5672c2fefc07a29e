//! # Inner runner: admission and the per-inner producer loop.
//!
//! For every inner stream pulled by the outer driver, [`admit`] acquires
//! the resources that keep the runner accountable (scope lease, admission
//! permit, run-counter unit) and spawns the producer task.
//!
//! ## Rules
//! - Acquisition order is lease → permit → increment. None of these awaits
//!   races the termination signal, so acquisition is never abandoned
//!   half-way: partial state (a lease without a decrement, a permit without
//!   a runner) cannot leak.
//! - A runner that completed acquisition reaches its release path exactly
//!   once, whatever the inner stream does: cancel lease, drop permit, stop
//!   on composed error, decrement.
//! - The stop check interrupts the **send itself**, never ahead of it: a
//!   producer parked in the hand-off while a stop lands is woken, instead
//!   of deadlocking against a consumer that already saw end-of-stream.
//! - A lease refused because the scope closed is a wiring bug; it fails the
//!   whole join with [`JoinError::LeaseOnClosedScope`].

use futures::StreamExt;
use tokio::sync::OwnedSemaphorePermit;

use crate::core::JoinContext;
use crate::error::{JoinError, JoinFailure};
use crate::events::{Event, EventKind};
use crate::join::ChunkStream;
use crate::scope::Lease;

/// Admits one inner stream: lease, permit, counter unit, then spawn.
///
/// Parks on the admission semaphore while `max_open` runners are live;
/// admission is FIFO in arrival order.
pub(crate) async fn admit<T: Send + 'static>(ctx: &JoinContext<T>, id: u64, inner: ChunkStream<T>) {
    let lease = match ctx.scope.lease().await {
        Some(lease) => lease,
        None => {
            ctx.bus
                .publish(Event::now(EventKind::LeaseRejected).with_inner(id));
            ctx.signal
                .stop(Some(JoinFailure::new(JoinError::LeaseOnClosedScope)));
            return;
        }
    };

    let permit = match ctx.admission.clone().acquire_owned().await {
        Ok(permit) => permit,
        Err(_) => {
            // The engine never closes the semaphore; unreachable in practice.
            let _ = lease.cancel().await;
            return;
        }
    };

    ctx.counter.increment();
    ctx.bus
        .publish(Event::now(EventKind::InnerAdmitted).with_inner(id));

    let ctx = ctx.clone();
    tokio::spawn(run_inner(ctx, id, inner, lease, permit));
}

/// Drives one admitted inner stream to completion, interruption, or failure.
async fn run_inner<T: Send + 'static>(
    ctx: JoinContext<T>,
    id: u64,
    mut inner: ChunkStream<T>,
    lease: Lease,
    permit: OwnedSemaphorePermit,
) {
    let mut producer_err: Option<JoinError> = None;

    loop {
        let item = tokio::select! {
            biased;
            _ = ctx.signal.stopped() => break,
            item = inner.next() => item,
        };
        match item {
            Some(Ok(chunk)) => {
                let delivered = tokio::select! {
                    biased;
                    sent = ctx.output.send(chunk) => sent.is_ok(),
                    _ = ctx.signal.stopped() => false,
                };
                if !delivered {
                    break;
                }
            }
            Some(Err(e)) => {
                producer_err = Some(e);
                break;
            }
            None => break,
        }
    }

    let finalizer_err = lease.cancel().await;
    drop(permit);

    match JoinFailure::from_pair(producer_err, finalizer_err) {
        Some(failure) => {
            ctx.bus.publish(
                Event::now(EventKind::InnerFailed)
                    .with_inner(id)
                    .with_error(failure.to_string()),
            );
            ctx.signal.stop(Some(failure));
        }
        None => {
            ctx.bus
                .publish(Event::now(EventKind::InnerStopped).with_inner(id));
        }
    }
    ctx.counter.decrement();
}
