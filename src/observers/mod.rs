//! # Observers of controller transitions.
//!
//! ## Architecture
//! ```text
//! Controller transition (start / cancel / clean / completion)
//!     │
//!     ├──► ObserverSet::notify(&Event, &Snapshot)   synchronous, coordination thread
//!     │         ├──► observer 1 (UI binding)
//!     │         ├──► observer 2 (LogWriter)
//!     │         └──► panic → ObserverPanicked on the bus
//!     │
//!     └──► Bus::publish(Event)                       broadcast receivers (async)
//! ```

mod observe;
mod set;

#[cfg(feature = "logging")]
mod log;

pub use observe::Observe;
pub use set::ObserverSet;

#[cfg(feature = "logging")]
pub use log::LogWriter;
