//! # Named, reusable operations.
//!
//! [`Operation`] is the trait form of a unit of work: it has a stable name
//! (carried in events and logs) and an async [`run`](Operation::run) that receives
//! a [`CancellationToken`]. [`OperationFn`] wraps a closure producing a fresh
//! future per run, so the same operation can be started any number of times.
//!
//! For one-off work, `Controller::start` with a closure is simpler.
//!
//! ## Example
//! ```rust
//! use tokio_util::sync::CancellationToken;
//! use taskslot::{Failure, OperationFn, OperationRef};
//!
//! let op: OperationRef<u32, String> = OperationFn::arc("answer", |_ctx: CancellationToken| async {
//!     Ok::<u32, Failure<String>>(42)
//! });
//! assert_eq!(op.name(), "answer");
//! ```

use std::borrow::Cow;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Failure;

/// Shared reference to an operation.
pub type OperationRef<V, E> = Arc<dyn Operation<V, E>>;

/// # Asynchronous, cancelable operation producing `V` or a [`Failure<E>`].
///
/// Implementors should check `ctx.is_cancelled()` (or select on
/// `ctx.cancelled()`) and return [`Failure::Cancelled`] promptly; the controller
/// discards the result of a cancelled unit anyway.
///
/// # Example
/// ```
/// use async_trait::async_trait;
/// use tokio_util::sync::CancellationToken;
/// use taskslot::{Failure, Operation};
///
/// struct Ping;
///
/// #[async_trait]
/// impl Operation<&'static str, String> for Ping {
///     fn name(&self) -> &str { "ping" }
///
///     async fn run(&self, ctx: CancellationToken) -> Result<&'static str, Failure<String>> {
///         if ctx.is_cancelled() {
///             return Err(Failure::Cancelled);
///         }
///         Ok("pong")
///     }
/// }
/// ```
#[async_trait]
pub trait Operation<V, E>: Send + Sync + 'static {
    /// Returns a stable, human-readable operation name.
    fn name(&self) -> &str;

    /// Executes the operation until completion or cancellation.
    async fn run(&self, ctx: CancellationToken) -> Result<V, Failure<E>>;
}

/// Closure-backed operation.
///
/// Wraps `F: Fn(CancellationToken) -> Fut`; each run creates a new future that
/// owns its state. Share state explicitly with `Arc<...>` inside the closure.
#[derive(Debug)]
pub struct OperationFn<F> {
    name: Cow<'static, str>,
    f: F,
}

impl<F> OperationFn<F> {
    /// Creates a new closure-backed operation.
    pub fn new(name: impl Into<Cow<'static, str>>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }

    /// Creates the operation and returns it as a shared handle.
    pub fn arc(name: impl Into<Cow<'static, str>>, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<F, Fut, V, E> Operation<V, E> for OperationFn<F>
where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, Failure<E>>> + Send + 'static,
    V: Send + 'static,
    E: Send + 'static,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, ctx: CancellationToken) -> Result<V, Failure<E>> {
        (self.f)(ctx).await
    }
}
