//! Controller events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publisher**: the controller (after each transition, stale discard, observer panic).
//! - **Consumers**: [`ObserverSet`](crate::ObserverSet) (synchronous, on the coordination
//!   context) and any receiver obtained from `Controller::subscribe`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
