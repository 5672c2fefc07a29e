//! # Observer hook for join lifecycle events.
//!
//! `Observe` is the extension point for plugging custom event handlers into
//! a join (logging, metrics, test instrumentation). Observers are driven by
//! a listener task spawned per join; they never block the engine's hot path.

use async_trait::async_trait;

use crate::events::Event;

/// Contract for event observers.
///
/// Called from a dedicated listener task. Implementations should avoid
/// blocking the async runtime (prefer async I/O and cooperative waits).
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Handle a single event.
    async fn on_event(&self, event: &Event);

    /// Human-readable name (for logs/metrics).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Simple stdout logging observer.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions for debugging and demonstration purposes.
///
/// Not intended for production use - implement a custom [`Observe`] for
/// structured logging or metrics collection.
#[cfg(feature = "logging")]
pub struct LogObserver;

#[cfg(feature = "logging")]
#[async_trait]
impl Observe for LogObserver {
    async fn on_event(&self, e: &Event) {
        use crate::events::EventKind;

        match e.kind {
            EventKind::InnerAdmitted => {
                println!("[admitted] inner={:?}", e.inner);
            }
            EventKind::LeaseRejected => {
                println!("[lease-rejected] inner={:?}", e.inner);
            }
            EventKind::InnerStopped => {
                println!("[stopped] inner={:?}", e.inner);
            }
            EventKind::InnerFailed => {
                println!("[failed] inner={:?} err={:?}", e.inner, e.error);
            }
            EventKind::OuterDrained => {
                println!("[outer-drained]");
            }
            EventKind::OuterFailed => {
                println!("[outer-failed] err={:?}", e.error);
            }
            EventKind::StopRequested => {
                println!("[stop-requested] err={:?}", e.error);
            }
            EventKind::Quiesced => {
                println!("[quiesced]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log"
    }
}
