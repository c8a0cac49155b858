//! # Synchronous fan-out to observers.
//!
//! [`ObserverSet`] delivers each transition to every registered observer, in
//! registration order, on the calling (coordination) thread.
//!
//! ## Rules
//! - **Ordering**: every observer sees transitions in the order they happened.
//! - **Isolation**: a panic in one observer is caught with `catch_unwind`,
//!   published as `ObserverPanicked`, and the remaining observers still run.
//!
//! **Warning**: `AssertUnwindSafe` is used, which can leave an observer's own
//! state inconsistent if it panics while holding a lock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crate::controller::Snapshot;
use crate::events::{Bus, Event};
use crate::observers::Observe;

/// Ordered set of observers sharing one controller.
pub struct ObserverSet<V, E> {
    observers: Vec<Arc<dyn Observe<V, E>>>,
}

impl<V, E> ObserverSet<V, E>
where
    V: 'static,
    E: 'static,
{
    /// Creates a set from already-registered observers.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe<V, E>>>) -> Self {
        Self { observers }
    }

    /// Returns `true` if there is nobody to notify.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Number of registered observers.
    #[inline]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Delivers `event` with `snapshot` to every observer.
    ///
    /// Panics are reported on `bus` and never propagate to the caller.
    pub fn notify(&self, event: &Event, snapshot: &Snapshot<V, E>, bus: &Bus) {
        for obs in &self.observers {
            let res = panic::catch_unwind(AssertUnwindSafe(|| obs.on_event(event, snapshot)));
            if let Err(panic_err) = res {
                let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                tracing::warn!(
                    controller = %event.controller,
                    observer = obs.name(),
                    %info,
                    "observer panicked"
                );
                bus.publish(Event::observer_panicked(
                    event.controller.clone(),
                    obs.name(),
                    info,
                ));
            }
        }
    }
}

impl<V, E> Default for ObserverSet<V, E>
where
    V: 'static,
    E: 'static,
{
    fn default() -> Self {
        Self::new(Vec::new())
    }
}
