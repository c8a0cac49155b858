//! # Coordination context.
//!
//! All public controller methods and every completion handler must run on one
//! logical thread: the thread driving the [`tokio::task::LocalSet`] the controller
//! is used in. [`CoordinationContext`] records that thread at construction and
//! checks it in debug builds. Release builds skip the check.

use std::thread::{self, ThreadId};

/// Owning-thread marker for a controller.
#[derive(Debug, Clone, Copy)]
pub(crate) struct CoordinationContext {
    owner: ThreadId,
}

impl CoordinationContext {
    /// Binds the context to the calling thread.
    pub fn capture() -> Self {
        Self {
            owner: thread::current().id(),
        }
    }

    /// Returns `true` if the calling thread is the owner.
    #[inline]
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.owner
    }

    /// Asserts (debug builds only) that `op` runs on the owning thread.
    #[inline]
    #[track_caller]
    pub fn check(&self, op: &'static str) {
        debug_assert!(
            self.is_current(),
            "controller::{op} called off the coordination thread (owner={:?}, current={:?})",
            self.owner,
            thread::current().id(),
        );
    }
}
