//! # conflux
//!
//! **Conflux** is a bounded concurrent stream join engine.
//!
//! It merges a stream of inner streams into a single output stream,
//! evaluating at most `max_open` inner streams concurrently, with
//! backpressured hand-off, cancellation propagation, per-producer resource
//! leases, and inspectable error composition under partial failure.
//!
//! ## Features
//!
//! | Area              | Description                                                          | Key types / functions                        |
//! |-------------------|----------------------------------------------------------------------|----------------------------------------------|
//! | **Joining**       | Merge a stream of streams with a concurrency bound.                  | [`par_join`], [`par_join_unbounded`], [`Joiner`] |
//! | **Two-way merge** | Merge two differently-typed streams into a sum-typed one.            | [`either`], [`Either`]                       |
//! | **Chunks**        | Elements move in ordered batches.                                    | [`Chunk`]                                    |
//! | **Scopes**        | Leased resource scopes keep producer resources alive.                | [`Scope`], [`Lease`]                         |
//! | **Errors**        | Typed failures with an inspectable composite carrier.                | [`JoinError`], [`JoinFailure`]               |
//! | **Observer API**  | Hook into join lifecycle events (logging, metrics, tests).           | [`Observe`], [`Event`], [`EventKind`]        |
//! | **Configuration** | Centralize join settings.                                            | [`JoinConfig`]                               |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogObserver`] _(demo/reference only)_.
//!
//! ```no_run
//! use futures::stream::{self, StreamExt};
//! use conflux::{par_join, Chunk, ChunkStream, OuterStream};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Two inner streams of chunks.
//!     let a: ChunkStream<i32> =
//!         stream::iter([Ok(Chunk::from_vec(vec![1, 2]))]).boxed();
//!     let b: ChunkStream<i32> =
//!         stream::iter([Ok(Chunk::from_vec(vec![3, 4]))]).boxed();
//!
//!     let outer: OuterStream<i32> = stream::iter([Ok(a), Ok(b)]).boxed();
//!
//!     // Merge them, at most 2 running concurrently.
//!     let mut merged = par_join(outer, 2)?;
//!     while let Some(chunk) = merged.next().await {
//!         for n in chunk? {
//!             println!("{n}");
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Semantics
//! - Chunks from one inner stream appear in the output in production
//!   order; chunks from different inner streams interleave
//!   non-deterministically.
//! - The output terminates normally iff every producer terminated
//!   normally; otherwise its final item is the composed [`JoinFailure`].
//! - Dropping the output stream cancels the join; producers are
//!   interrupted and every lease and permit is released before quiescence.
//!
//! ---

mod chunk;
mod config;
mod core;
mod error;
mod events;
mod join;
mod observer;
mod scope;

// ---- Public re-exports ----

pub use chunk::Chunk;
pub use config::JoinConfig;
pub use crate::core::Joiner;
pub use error::{JoinError, JoinFailure};
pub use events::{Event, EventKind};
pub use join::{either, par_join, par_join_unbounded, ChunkStream, Either, JoinStream, OuterStream};
pub use observer::Observe;
pub use scope::{Lease, Scope};

// Optional: expose a simple built-in logging observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observer::LogObserver;
