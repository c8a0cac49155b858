//! # Controller configuration.
//!
//! Provides [`ControllerConfig`], the small set of settings a controller is built with.
//!
//! ## Sentinel values
//! - `bus_capacity = 0` is clamped to `1` (a broadcast channel needs at least one slot).

use std::borrow::Cow;

/// Configuration for a [`Controller`](crate::Controller).
///
/// ## Field semantics
/// - `name`: label attached to every event and log line of this controller
/// - `bus_capacity`: ring buffer size of the event bus (min 1; clamped)
#[derive(Clone, Debug)]
pub struct ControllerConfig {
    /// Human-readable controller name (for logs and events).
    pub name: Cow<'static, str>,

    /// Capacity of the event bus broadcast channel.
    ///
    /// Receivers that lag behind more than `bus_capacity` events observe
    /// `Lagged` and skip the oldest items.
    pub bus_capacity: usize,
}

impl ControllerConfig {
    /// Returns a config with the given name and default capacity.
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for ControllerConfig {
    /// Default configuration:
    ///
    /// - `name = "controller"`
    /// - `bus_capacity = 256`
    fn default() -> Self {
        Self {
            name: Cow::Borrowed("controller"),
            bus_capacity: 256,
        }
    }
}
