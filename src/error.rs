//! Failure type produced by units of work.
//!
//! [`Failure`] is the tagged boundary type every operation returns on error.
//! The controller never raises errors itself; failures are captured, passed
//! through the error mapper and surfaced (or swallowed) via `Controller::error`.
//!
//! Variants:
//! - [`Failure::Domain`]: already the controller's domain error type `E`.
//! - [`Failure::Foreign`]: anything else, carried as [`anyhow::Error`].
//! - [`Failure::Panicked`] / [`Failure::Aborted`]: the unit never produced a result.
//! - [`Failure::Cancelled`]: the unit observed its cancellation token and bailed out.
//!
//! Like the rest of the crate, each variant has a stable label ([`Failure::as_label`])
//! for logs.

use thiserror::Error;

/// # Failure raised by a unit of work.
///
/// The domain variant is matched at compile time when the controller decides
/// whether a failure is representable as `E`, so no runtime type casting is involved.
///
/// # Example
/// ```
/// use taskslot::Failure;
///
/// #[derive(Debug, Clone, PartialEq)]
/// struct NotFound;
/// impl std::fmt::Display for NotFound {
///     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
///         f.write_str("not found")
///     }
/// }
///
/// let err: Failure<NotFound> = Failure::domain(NotFound);
/// assert_eq!(err.as_label(), "failure_domain");
///
/// let err: Failure<NotFound> = Failure::foreign(std::io::Error::other("disk"));
/// assert_eq!(err.as_label(), "failure_foreign");
/// assert!(err.as_domain().is_none());
/// ```
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum Failure<E> {
    /// Failure already expressed in the controller's domain error type.
    #[error("{0}")]
    Domain(E),

    /// Failure of some other type.
    #[error("{0:#}")]
    Foreign(anyhow::Error),

    /// The unit of work panicked before producing a result.
    #[error("unit of work panicked: {message}")]
    Panicked {
        /// Panic payload rendered as text.
        message: String,
    },

    /// The runtime dropped the unit of work before it finished.
    #[error("unit of work aborted by runtime")]
    Aborted,

    /// The unit observed its cancellation token and stopped early.
    #[error("unit of work cancelled")]
    Cancelled,
}

impl<E> Failure<E> {
    /// Wraps a domain error.
    #[inline]
    pub fn domain(err: E) -> Self {
        Failure::Domain(err)
    }

    /// Wraps any error convertible into [`anyhow::Error`].
    #[inline]
    pub fn foreign(err: impl Into<anyhow::Error>) -> Self {
        Failure::Foreign(err.into())
    }

    /// Returns the domain error, if this failure carries one.
    pub fn as_domain(&self) -> Option<&E> {
        match self {
            Failure::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Consumes the failure and returns the domain error, if any.
    pub fn into_domain(self) -> Option<E> {
        match self {
            Failure::Domain(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the foreign error, if any.
    pub fn foreign_ref(&self) -> Option<&anyhow::Error> {
        match self {
            Failure::Foreign(e) => Some(e),
            _ => None,
        }
    }

    /// Returns `true` if the unit stopped because it observed cancellation.
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Failure::Cancelled)
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            Failure::Domain(_) => "failure_domain",
            Failure::Foreign(_) => "failure_foreign",
            Failure::Panicked { .. } => "failure_panicked",
            Failure::Aborted => "failure_aborted",
            Failure::Cancelled => "failure_cancelled",
        }
    }

    /// Event/log reason that does not require `E: Display`.
    pub(crate) fn reason(&self) -> String {
        match self {
            Failure::Foreign(e) => format!("{e:#}"),
            Failure::Panicked { message } => format!("panicked: {message}"),
            other => other.as_label().to_string(),
        }
    }

    /// Builds a failure from a join error of the spawned unit.
    pub(crate) fn from_join(err: tokio::task::JoinError) -> Self {
        if !err.is_panic() {
            return Failure::Aborted;
        }
        let payload = err.into_panic();
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        Failure::Panicked { message }
    }
}
