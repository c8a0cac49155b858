//! # Single-slot controller.
//!
//! ## Lifecycle
//! ```text
//! start(op) ──► slot occupied? ──yes──► cancel token, clear slot, Cancelled{superseded}
//!                    │
//!                    ▼
//!               value = None, error = None
//!               generation g = last + 1, state = Active, Started
//!               tokio::spawn(unit)  ──►  spawn_local(await join)
//!                                               │
//!                                               ▼
//!                             slot still holds g? ──no──► StaleDiscarded (no field changes)
//!                                   │yes
//!                                   ├─ Ok(v)                 ─► value = v, Succeeded
//!                                   ├─ Err(Cancelled)        ─► Cancelled{unit_cancelled}
//!                                   └─ Err(f) ─► mapper / domain variant
//!                                                  ├─ Some(e) ─► error = e, Failed
//!                                                  └─ None    ─► Swallowed
//!                                   state = Idle, slot cleared
//! ```
//!
//! ## Invariants
//! - `Active` iff the slot holds a non-superseded unit.
//! - Completions of non-current units never touch `state`, `value` or `error`.
//! - `cancel` on an idle controller changes nothing and emits nothing.

mod builder;
mod context;
mod core;
mod mapper;
mod slot;
mod state;

#[cfg(test)]
mod tests;

pub use builder::ControllerBuilder;
pub use self::core::Controller;
pub use mapper::ErrorMapper;
pub use slot::Generation;
pub use state::{Snapshot, State};
