//! # Outer driver: consumes the outer stream, admits inner runners.
//!
//! The outer driver is the join's first producer (the run counter starts at
//! 1 on its behalf). It pulls inner streams under interruption by the
//! termination signal and hands each one to [`admit`](super::inner::admit).
//!
//! ## Rules
//! - The outer pull is interruptible: once the signal is stopping, no
//!   further inner streams are pulled or admitted.
//! - An outer failure stops the join with the outer's error; already
//!   admitted runners wind down through the normal interruption path.
//! - Exactly one decrement at exit, on every path.

use futures::StreamExt;

use crate::core::inner::admit;
use crate::core::JoinContext;
use crate::error::JoinFailure;
use crate::events::{Event, EventKind};
use crate::join::OuterStream;

/// Runs the outer stream to completion, failure, or interruption.
pub(crate) async fn drive<T: Send + 'static>(ctx: JoinContext<T>, mut outer: OuterStream<T>) {
    let mut next_id: u64 = 0;

    loop {
        let item = tokio::select! {
            biased;
            _ = ctx.signal.stopped() => break,
            item = outer.next() => item,
        };
        match item {
            Some(Ok(inner)) => {
                admit(&ctx, next_id, inner).await;
                next_id += 1;
            }
            Some(Err(e)) => {
                ctx.bus
                    .publish(Event::now(EventKind::OuterFailed).with_error(e.to_string()));
                ctx.signal.stop(Some(JoinFailure::new(e)));
                break;
            }
            None => {
                ctx.bus.publish(Event::now(EventKind::OuterDrained));
                break;
            }
        }
    }

    ctx.counter.decrement();
}
