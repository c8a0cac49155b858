//! # taskslot
//!
//! **taskslot** is a single-slot cancellable task controller for Rust.
//!
//! A [`Controller`] runs at most one asynchronous unit of work at a time,
//! exposes its lifecycle ([`State::Idle`] / [`State::Active`]) and captures the
//! unit's result (`value`) or mapped failure (`error`). Starting a new unit
//! implicitly supersedes the running one. It is meant to sit behind a UI
//! presenter or similar owner that reads the fields after every transition.
//!
//! ## Architecture
//! ```text
//!        caller (coordination thread, inside a LocalSet)
//!          │ start / start_with / run / cancel / clean
//!          ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  Controller<V, E>                                         │
//! │  - State machine (state, value, error)                    │
//! │  - Slot (at most one UnitHandle + generation counter)     │
//! │  - ErrorMapper (optional Failure<E> -> Option<E>)         │
//! └──────┬───────────────────────────────┬────────────────────┘
//!        │ tokio::spawn(unit)            │ after each transition
//!        ▼                               ▼
//!   unit of work (pool)          ObserverSet (sync)  +  Bus (broadcast)
//!        │
//!        └─► spawn_local: completion hops back, generation check,
//!            stale completions are discarded
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types                               |
//! |-------------------|--------------------------------------------------------------|-----------------------------------------|
//! | **Controller**    | Start/cancel/clean a single unit of work.                    | [`Controller`], [`State`], [`Snapshot`] |
//! | **Operations**    | Named, reusable units of work.                               | [`Operation`], [`OperationFn`]          |
//! | **Errors**        | Tagged failure type and mapping into the domain error.      | [`Failure`], [`ErrorMapper`]            |
//! | **Observation**   | Synchronous observers and a broadcast event stream.          | [`Observe`], [`Event`], [`EventKind`]   |
//! | **Configuration** | Controller name and bus capacity.                            | [`ControllerConfig`]                    |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use taskslot::{Controller, Failure, State};
//!
//! #[derive(Debug, Clone, PartialEq)]
//! enum LookupError { NotFound }
//!
//! impl std::fmt::Display for LookupError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         f.write_str("not found")
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let local = tokio::task::LocalSet::new();
//!     local.run_until(async {
//!         let ctl: Controller<String, LookupError> = Controller::new();
//!
//!         ctl.start(|_ctx| async { Err::<String, _>(Failure::domain(LookupError::NotFound)) });
//!         ctl.wait_idle().await;
//!
//!         assert_eq!(ctl.state(), State::Idle);
//!         assert_eq!(ctl.error(), Some(LookupError::NotFound));
//!         assert_eq!(ctl.value(), None);
//!     }).await;
//! }
//! ```
mod config;
mod controller;
mod error;
mod events;
mod observers;
mod operation;

// ---- Public re-exports ----

pub use config::ControllerConfig;
pub use controller::{Controller, ControllerBuilder, ErrorMapper, Generation, Snapshot, State};
pub use error::Failure;
pub use events::{Bus, Event, EventKind};
pub use observers::{Observe, ObserverSet};
pub use operation::{Operation, OperationFn, OperationRef};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
