//! # Public join surface.
//!
//! - [`par_join`] / [`par_join_unbounded`] merge a stream of streams with a
//!   concurrency bound.
//! - [`either`] merges two differently-typed streams into a sum-typed one.
//! - [`JoinStream`] the output stream; dropping it cancels the join.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::{self, BoxStream, StreamExt};
use futures::Stream;
use tokio_util::sync::DropGuard;

use crate::chunk::Chunk;
use crate::config::JoinConfig;
use crate::core::Joiner;
use crate::error::{JoinError, JoinFailure};

/// A boxed stream of chunks; the unit the join consumes and produces.
pub type ChunkStream<T> = BoxStream<'static, Result<Chunk<T>, JoinError>>;

/// A boxed stream of inner streams; the join's input.
pub type OuterStream<T> = BoxStream<'static, Result<ChunkStream<T>, JoinError>>;

/// Output stream of a join.
///
/// Yields chunks in non-deterministic interleaving (order within each
/// inner stream preserved). Terminates with `Err(JoinFailure)` as its
/// final item when any producer failed. Dropping the stream cancels the
/// join: all producers are interrupted and wind down.
pub struct JoinStream<T> {
    inner: BoxStream<'static, Result<Chunk<T>, JoinFailure>>,
    _cancel: DropGuard,
}

impl<T> JoinStream<T> {
    pub(crate) fn new(
        inner: BoxStream<'static, Result<Chunk<T>, JoinFailure>>,
        cancel: DropGuard,
    ) -> Self {
        Self {
            inner,
            _cancel: cancel,
        }
    }
}

impl<T> std::fmt::Debug for JoinStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JoinStream").finish_non_exhaustive()
    }
}

impl<T> Stream for JoinStream<T> {
    type Item = Result<Chunk<T>, JoinFailure>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().inner.poll_next_unpin(cx)
    }
}

/// Merges the inner streams produced by `outer`, evaluating at most
/// `max_open` of them concurrently.
///
/// Returns `Err(JoinError::InvalidMaxOpen)` synchronously when
/// `max_open < 1`; no task is spawned in that case. Must be called within
/// a tokio runtime.
pub fn par_join<T: Send + 'static>(
    outer: OuterStream<T>,
    max_open: usize,
) -> Result<JoinStream<T>, JoinError> {
    Joiner::new(JoinConfig::bounded(max_open), Vec::new()).join(outer)
}

/// [`par_join`] with no practical bound on concurrent inner streams.
pub fn par_join_unbounded<T: Send + 'static>(
    outer: OuterStream<T>,
) -> Result<JoinStream<T>, JoinError> {
    Joiner::new(JoinConfig::unbounded(), Vec::new()).join(outer)
}

/// One side of a two-way merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Either<L, R> {
    /// An element produced by the left stream.
    Left(L),
    /// An element produced by the right stream.
    Right(R),
}

/// Merges two streams into one sum-typed stream.
///
/// Specified entirely in terms of the join: each side is tagged and the
/// pair is joined with `max_open = 2`.
pub fn either<L, R>(
    left: ChunkStream<L>,
    right: ChunkStream<R>,
) -> Result<JoinStream<Either<L, R>>, JoinError>
where
    L: Send + 'static,
    R: Send + 'static,
{
    let left: ChunkStream<Either<L, R>> =
        left.map(|res| res.map(|chunk| chunk.map(Either::Left))).boxed();
    let right: ChunkStream<Either<L, R>> =
        right.map(|res| res.map(|chunk| chunk.map(Either::Right))).boxed();

    let outer: OuterStream<Either<L, R>> = stream::iter([Ok(left), Ok(right)]).boxed();
    par_join(outer, 2)
}
