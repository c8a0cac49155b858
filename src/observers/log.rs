//! # Simple logging observer for debugging and demos.
//!
//! [`LogWriter`] writes every controller event through `tracing` at `info` level.
//!
//! ## Output format
//! ```text
//! INFO controller=search seq=4 generation=Some(2) [started] operation=Some("lookup")
//! INFO controller=search seq=5 generation=Some(2) [failed] reason=Some("not found")
//! ```

use std::fmt::Debug;

use crate::controller::Snapshot;
use crate::events::Event;
use crate::observers::Observe;

/// Tracing-backed logging observer.
///
/// Enabled via the `logging` feature. Not intended for production use;
/// implement a custom [`Observe`] for structured metrics or UI binding.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogWriter;

impl<V, E> Observe<V, E> for LogWriter
where
    V: Debug + Send + Sync + 'static,
    E: Debug + Send + Sync + 'static,
{
    fn on_event(&self, e: &Event, snap: &Snapshot<V, E>) {
        tracing::info!(
            controller = %e.controller,
            seq = e.seq,
            generation = ?e.generation,
            operation = ?e.operation,
            reason = ?e.reason,
            state = %snap.state,
            value = ?snap.value,
            error = ?snap.error,
            "[{}]",
            e.kind.as_label()
        );
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
