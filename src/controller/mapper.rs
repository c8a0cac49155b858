//! # Error mapper dispatch.
//!
//! Decides which failures become a visible `error`:
//! 1. the user-supplied mapper, if it returns `Some`;
//! 2. otherwise the [`Failure::Domain`] variant, taken as-is;
//! 3. otherwise nothing (the failure is swallowed).
//!
//! Dispatch is pure and synchronous. Swallowing is expected behavior, not a bug:
//! a failure that is neither mapped nor already a domain error has no place in `E`.

use std::fmt;
use std::sync::Arc;

use crate::error::Failure;

/// Shared mapper function.
type MapFn<E> = dyn Fn(&Failure<E>) -> Option<E> + Send + Sync + 'static;

/// Optional conversion from an arbitrary [`Failure`] into the domain error `E`.
///
/// # Example
/// ```
/// use taskslot::{ErrorMapper, Failure};
///
/// let mapper = ErrorMapper::new(|f: &Failure<String>| {
///     f.foreign_ref().map(|e| format!("remote: {e}"))
/// });
///
/// let mapped = mapper.dispatch(Failure::foreign(std::io::Error::other("reset")));
/// assert_eq!(mapped.as_deref(), Some("remote: reset"));
/// ```
pub struct ErrorMapper<E> {
    f: Arc<MapFn<E>>,
}

impl<E> ErrorMapper<E> {
    /// Wraps a mapping function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&Failure<E>) -> Option<E> + Send + Sync + 'static,
    {
        Self { f: Arc::new(f) }
    }

    /// Applies the mapper only (no fallback).
    #[inline]
    pub fn apply(&self, failure: &Failure<E>) -> Option<E> {
        (self.f)(failure)
    }

    /// Full dispatch: mapper first, then the domain variant, else `None`.
    pub fn dispatch(&self, failure: Failure<E>) -> Option<E> {
        dispatch(Some(self), failure)
    }
}

impl<E> Clone for ErrorMapper<E> {
    fn clone(&self) -> Self {
        Self {
            f: Arc::clone(&self.f),
        }
    }
}

impl<E> fmt::Debug for ErrorMapper<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorMapper").finish_non_exhaustive()
    }
}

/// Converts a failure into the domain error, if representable.
pub(crate) fn dispatch<E>(mapper: Option<&ErrorMapper<E>>, failure: Failure<E>) -> Option<E> {
    if let Some(mapped) = mapper.and_then(|m| m.apply(&failure)) {
        return Some(mapped);
    }
    failure.into_domain()
}
