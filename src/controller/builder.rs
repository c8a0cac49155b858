use std::sync::Arc;

use crate::{config::ControllerConfig, error::Failure, observers::Observe};

use super::{core::Controller, mapper::ErrorMapper};

/// Builder for constructing a [`Controller`] with optional features.
///
/// `build()` binds the controller to the calling thread (the coordination context).
pub struct ControllerBuilder<V, E> {
    config: ControllerConfig,
    mapper: Option<ErrorMapper<E>>,
    observers: Vec<Arc<dyn Observe<V, E>>>,
}

impl<V, E> ControllerBuilder<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    /// Creates a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: ControllerConfig::default(),
            mapper: None,
            observers: Vec::new(),
        }
    }

    /// Replaces the configuration.
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the error mapper from a closure.
    ///
    /// The mapper is consulted first for every failure of a current unit; when
    /// it returns `None` the domain variant is used as-is, anything else is swallowed.
    pub fn with_error_mapper<F>(mut self, f: F) -> Self
    where
        F: Fn(&Failure<E>) -> Option<E> + Send + Sync + 'static,
    {
        self.mapper = Some(ErrorMapper::new(f));
        self
    }

    /// Sets an already-built (possibly shared) error mapper.
    pub fn with_mapper(mut self, mapper: ErrorMapper<E>) -> Self {
        self.mapper = Some(mapper);
        self
    }

    /// Registers one observer. Observers are notified in registration order.
    pub fn with_observer(mut self, observer: Arc<dyn Observe<V, E>>) -> Self {
        self.observers.push(observer);
        self
    }

    /// Registers several observers at once.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe<V, E>>>) -> Self {
        self.observers.extend(observers);
        self
    }

    /// Builds an idle controller.
    pub fn build(self) -> Controller<V, E> {
        Controller::from_parts(self.config, self.mapper, self.observers)
    }
}

impl<V, E> Default for ControllerBuilder<V, E>
where
    V: Clone + Send + 'static,
    E: Clone + Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
