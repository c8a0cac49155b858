use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

/// Strictly increasing identifier assigned to each unit of work at spawn time.
///
/// A completion is applied only if its generation still matches the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Raw counter value.
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Handle to the in-flight unit (identity + cancellation only).
pub(super) struct UnitHandle {
    /// Generation assigned at spawn time.
    pub generation: Generation,
    /// Cooperative cancellation signal handed to the unit.
    pub token: CancellationToken,
    /// Name of the operation, if started from one.
    pub operation: Option<Arc<str>>,
    /// When the unit was spawned.
    pub started_at: Instant,
}

impl UnitHandle {
    /// Milliseconds since the unit was spawned.
    pub fn elapsed_ms(&self) -> u64 {
        saturating_millis(self.started_at.elapsed())
    }
}

/// Whole milliseconds in `d`, clamped to `u64::MAX`.
fn saturating_millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Single task slot.
///
/// Owns at most one [`UnitHandle`] and the generation counter. The counter
/// never goes backwards, so a cleared or reassigned slot can never match an
/// older generation again.
pub(super) struct Slot {
    current: Option<UnitHandle>,
    last: u64,
}

impl Slot {
    /// Creates an empty slot; the first unit gets generation 1.
    pub fn new() -> Self {
        Self {
            current: None,
            last: 0,
        }
    }

    /// Generation of the in-flight unit, if any.
    #[inline]
    pub fn generation(&self) -> Option<Generation> {
        self.current.as_ref().map(|u| u.generation)
    }

    /// Returns `true` if `generation` identifies the in-flight unit.
    #[inline]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == Some(generation)
    }

    /// Allocates the next generation and stores a handle for the unit owning `token`.
    ///
    /// The slot must be empty; callers cancel the previous unit first.
    pub fn occupy(&mut self, token: CancellationToken, operation: Option<Arc<str>>) -> Generation {
        debug_assert!(self.current.is_none(), "slot occupied on occupy");
        self.last += 1;
        let generation = Generation(self.last);
        self.current = Some(UnitHandle {
            generation,
            token,
            operation,
            started_at: Instant::now(),
        });
        generation
    }

    /// Signals cancellation to the in-flight unit and clears the slot.
    pub fn cancel(&mut self) -> Option<UnitHandle> {
        let unit = self.current.take()?;
        unit.token.cancel();
        Some(unit)
    }

    /// Releases the slot if `generation` is still current.
    pub fn release(&mut self, generation: Generation) -> Option<UnitHandle> {
        if self.is_current(generation) {
            self.current.take()
        } else {
            None
        }
    }
}
