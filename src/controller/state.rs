use std::fmt;

use super::slot::Generation;

/// Lifecycle state of a controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum State {
    /// No unit of work is current. Initial state.
    #[default]
    Idle,

    /// Exactly one unit of work is current.
    Active,
}

impl State {
    /// Returns a short stable label for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            State::Idle => "idle",
            State::Active => "active",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_label())
    }
}

/// Point-in-time copy of the observable controller fields.
///
/// Handed to observers after every transition and returned by
/// [`Controller::snapshot`](crate::Controller::snapshot).
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<V, E> {
    /// Lifecycle state.
    pub state: State,
    /// Last successful result.
    pub value: Option<V>,
    /// Last mapped failure.
    pub error: Option<E>,
    /// Generation of the in-flight unit, if any.
    pub generation: Option<Generation>,
}

impl<V, E> Default for Snapshot<V, E> {
    fn default() -> Self {
        Self {
            state: State::Idle,
            value: None,
            error: None,
            generation: None,
        }
    }
}

impl<V, E> Snapshot<V, E> {
    /// Returns `true` if a unit of work is current.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.state == State::Active
    }
}
