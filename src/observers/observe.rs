//! # Core observer trait
//!
//! `Observe` is the extension point for binding a controller to a UI layer (or
//! anything else that mirrors `state`/`value`/`error`). Observers run
//! **synchronously** on the coordination context, right after each transition,
//! with the controller's internal lock already released.
//!
//! ## Contract
//! - Keep `on_event` short: it runs inline with `start`/`cancel`/`clean` and completions.
//! - Observers must not mutate the controller from inside `on_event`.
//! - A panicking observer is isolated; the panic is reported as
//!   [`EventKind::ObserverPanicked`](crate::EventKind::ObserverPanicked) on the bus.
//!
//! ## Example
//! ```rust
//! use std::sync::Mutex;
//! use taskslot::{Event, Observe, Snapshot, State};
//!
//! #[derive(Default)]
//! struct Spinner {
//!     visible: Mutex<bool>,
//! }
//!
//! impl Observe<String, String> for Spinner {
//!     fn on_event(&self, _ev: &Event, snap: &Snapshot<String, String>) {
//!         *self.visible.lock().unwrap() = snap.state == State::Active;
//!     }
//!     fn name(&self) -> &'static str { "spinner" }
//! }
//! ```

use crate::controller::Snapshot;
use crate::events::Event;

/// Contract for synchronous controller observers.
pub trait Observe<V, E>: Send + Sync + 'static {
    /// Handles one transition.
    ///
    /// # Parameters
    /// - `event`: what happened
    /// - `snapshot`: the controller fields right after the transition
    fn on_event(&self, event: &Event, snapshot: &Snapshot<V, E>);

    /// Human-readable name (for logs and panic reports).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
