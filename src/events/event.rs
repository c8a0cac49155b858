//! # Events emitted by a controller.
//!
//! The [`EventKind`] enum classifies every transition of the controller:
//! - **Run events**: a unit was started, succeeded, failed or had its failure swallowed
//! - **Control events**: cancellation and `clean`
//! - **Diagnostics**: stale completions and observer panics
//!
//! The [`Event`] struct carries metadata such as the generation of the unit,
//! the operation name and a human-readable reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//!
//! ## Example
//! ```rust
//! use taskslot::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::Failed, "search")
//!     .with_generation(3)
//!     .with_reason("timeout");
//!
//! assert_eq!(ev.kind, EventKind::Failed);
//! assert_eq!(ev.generation, Some(3));
//! assert_eq!(ev.reason.as_deref(), Some("timeout"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of controller events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Run events ===
    /// A unit of work was spawned; `value`/`error` were cleared and state is `Active`.
    ///
    /// Sets: `generation`, `operation` (if named)
    Started,

    /// The current unit succeeded; `value` is set and state is `Idle`.
    ///
    /// Sets: `generation`
    Succeeded,

    /// The current unit failed and the failure was mapped into `error`.
    ///
    /// Sets: `generation`, `reason` (failure message)
    Failed,

    /// The current unit failed but the failure is not representable as the
    /// domain error; `error` stays empty and state is `Idle`.
    ///
    /// Sets: `generation`, `reason` (failure label)
    Swallowed,

    // === Control events ===
    /// The current unit was cancelled (explicitly or by a newer `start`).
    ///
    /// Sets: `generation`, `reason` (`"cancelled"` or `"superseded"`)
    Cancelled,

    /// `value` and `error` were reset by `clean`.
    Cleaned,

    // === Diagnostics ===
    /// A completion arrived for a unit that is no longer current and was discarded.
    ///
    /// Published on the bus only; observers are not invoked since no field changed.
    ///
    /// Sets: `generation` (of the stale unit)
    StaleDiscarded,

    /// An observer panicked while handling an event.
    ///
    /// Sets: `reason` (observer name and panic message)
    ObserverPanicked,
}

impl EventKind {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            EventKind::Started => "started",
            EventKind::Succeeded => "succeeded",
            EventKind::Failed => "failed",
            EventKind::Swallowed => "swallowed",
            EventKind::Cancelled => "cancelled",
            EventKind::Cleaned => "cleaned",
            EventKind::StaleDiscarded => "stale_discarded",
            EventKind::ObserverPanicked => "observer_panicked",
        }
    }
}

/// Controller event with optional metadata.
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Name of the emitting controller.
    pub controller: Arc<str>,
    /// Generation of the unit this event refers to, if any.
    pub generation: Option<u64>,
    /// Name of the operation, if the unit was started from a named operation.
    pub operation: Option<Arc<str>>,
    /// Human-readable reason (failure message, cancel cause, panic info).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event with the current timestamp and next sequence number.
    pub fn new(kind: EventKind, controller: impl Into<Arc<str>>) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            controller: controller.into(),
            generation: None,
            operation: None,
            reason: None,
        }
    }

    /// Attaches a unit generation.
    #[inline]
    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }

    /// Attaches an operation name.
    #[inline]
    pub fn with_operation(mut self, operation: Option<Arc<str>>) -> Self {
        self.operation = operation;
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(controller: Arc<str>, observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked, controller)
            .with_reason(format!("observer={observer} panic={info}"))
    }

    /// Returns `true` if this event reflects a change of `state`, `value` or `error`.
    #[inline]
    pub fn is_transition(&self) -> bool {
        !matches!(
            self.kind,
            EventKind::StaleDiscarded | EventKind::ObserverPanicked
        )
    }
}
