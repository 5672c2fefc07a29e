//! # Resource scope with leases.
//!
//! A [`Scope`] owns a set of finalizers and hands out [`Lease`]s that keep
//! those resources alive. The join engine leases its scope to every inner
//! runner it admits, so resources stay valid for as long as any producer is
//! running.
//!
//! ## Rules
//! - [`Scope::lease`] fails (returns `None`) once the scope has been closed.
//! - Finalizers run **once**, when the scope is closed **and** the last
//!   lease has been returned, in reverse registration order.
//! - Whichever call observes both conditions (the final [`Lease::cancel`]
//!   or [`Scope::close`] itself) runs the finalizers and reports their
//!   composed error; every other call reports `None`.

use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::Mutex;

use crate::error::JoinError;

type Finalizer = BoxFuture<'static, Result<(), JoinError>>;

struct ScopeState {
    closed: bool,
    leases: usize,
    finalizers: Vec<Finalizer>,
}

/// Shared resource scope that can be borrowed via [`Lease`]s.
#[derive(Clone)]
pub struct Scope {
    state: Arc<Mutex<ScopeState>>,
}

impl Scope {
    /// Creates an open scope with no finalizers.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScopeState {
                closed: false,
                leases: 0,
                finalizers: Vec::new(),
            })),
        }
    }

    /// Registers a finalizer to run when the scope winds down.
    ///
    /// If the scope is already closed (and has no outstanding leases), the
    /// finalizer runs immediately and its error is returned.
    pub async fn register<F>(&self, finalizer: F) -> Result<(), JoinError>
    where
        F: std::future::Future<Output = Result<(), JoinError>> + Send + 'static,
    {
        let pending: Option<Finalizer> = {
            let mut state = self.state.lock().await;
            if state.closed && state.leases == 0 {
                Some(Box::pin(finalizer))
            } else {
                state.finalizers.push(Box::pin(finalizer));
                None
            }
        };
        match pending {
            Some(fin) => finalize(vec![fin]).await.map_or(Ok(()), Err),
            None => Ok(()),
        }
    }

    /// Borrows the scope, keeping its resources alive.
    ///
    /// Returns `None` if the scope has already been closed.
    pub async fn lease(&self) -> Option<Lease> {
        let mut state = self.state.lock().await;
        if state.closed {
            return None;
        }
        state.leases += 1;
        Some(Lease {
            state: Arc::clone(&self.state),
        })
    }

    /// Closes the scope: no further leases are granted.
    ///
    /// If no leases are outstanding, finalizers run now and their composed
    /// error is returned; otherwise they run when the last lease is
    /// returned. Idempotent.
    pub async fn close(&self) -> Option<JoinError> {
        let ready = {
            let mut state = self.state.lock().await;
            state.closed = true;
            if state.leases == 0 {
                std::mem::take(&mut state.finalizers)
            } else {
                Vec::new()
            }
        };
        finalize(ready).await
    }

    /// True once [`close`](Scope::close) has been called.
    pub async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }
}

impl Default for Scope {
    fn default() -> Self {
        Self::new()
    }
}

/// A borrow of a [`Scope`]'s resources.
///
/// Must be returned explicitly via [`cancel`](Lease::cancel); the engine
/// holds a lease for the whole lifetime of each inner runner.
#[must_use = "a lease keeps its scope's resources alive until canceled"]
pub struct Lease {
    state: Arc<Mutex<ScopeState>>,
}

impl Lease {
    /// Releases the borrow.
    ///
    /// If this was the last outstanding lease of a closed scope, the
    /// scope's finalizers run here and their composed error is returned.
    pub async fn cancel(self) -> Option<JoinError> {
        let ready = {
            let mut state = self.state.lock().await;
            state.leases -= 1;
            if state.closed && state.leases == 0 {
                std::mem::take(&mut state.finalizers)
            } else {
                Vec::new()
            }
        };
        finalize(ready).await
    }
}

/// Runs finalizers in reverse registration order, composing their errors.
async fn finalize(mut finalizers: Vec<Finalizer>) -> Option<JoinError> {
    let mut reasons: Vec<String> = Vec::new();
    while let Some(fin) = finalizers.pop() {
        if let Err(e) = fin.await {
            reasons.push(e.to_string());
        }
    }
    if reasons.is_empty() {
        None
    } else {
        Some(JoinError::finalizer(reasons.join("; ")))
    }
}
