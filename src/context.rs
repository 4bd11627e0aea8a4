//! Cancellable deadline contexts passed to guarded operations.
//!
//! A [`Context`] tells a guarded call when its caller has given up on it,
//! either because it was cancelled explicitly through a [`CancelHandle`] or
//! because its deadline passed. Contexts form a tree: a derived context is
//! done as soon as its parent is done.

use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::future::pending;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Notify;
use tokio::time::Instant;

/// Reason a context is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContextError {
    /// The context was cancelled through its handle.
    Cancelled,

    /// The context's deadline passed.
    DeadlineExceeded,
}

impl Display for ContextError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ContextError::Cancelled => write!(f, "context canceled"),
            ContextError::DeadlineExceeded => write!(f, "context deadline exceeded"),
        }
    }
}

impl Error for ContextError {}

struct ContextInner {
    cancelled: AtomicBool,
    notify: Notify,
    deadline: Option<Instant>,
    parent: Option<Context>,
}

/// A cancellation and deadline scope for one or more calls.
///
/// Cloning is cheap, clones share the same cancellation state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// A root context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::from_parts(None, None)
    }

    fn from_parts(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        let inherited = parent.as_ref().and_then(Context::deadline);
        let deadline = match (deadline, inherited) {
            (Some(own), Some(theirs)) => Some(own.min(theirs)),
            (own, theirs) => own.or(theirs),
        };

        Self {
            inner: Arc::new(ContextInner {
                cancelled: AtomicBool::new(false),
                notify: Notify::new(),
                deadline,
                parent,
            }),
        }
    }

    /// Derives a child context that can be cancelled independently.
    pub fn with_cancel(&self) -> (Context, CancelHandle) {
        let child = Self::from_parts(Some(self.clone()), None);
        let handle = CancelHandle {
            inner: Arc::clone(&child.inner),
        };
        (child, handle)
    }

    /// Derives a child context that is done at `deadline` at the latest.
    pub fn with_deadline(&self, deadline: Instant) -> (Context, CancelHandle) {
        let child = Self::from_parts(Some(self.clone()), Some(deadline));
        let handle = CancelHandle {
            inner: Arc::clone(&child.inner),
        };
        (child, handle)
    }

    /// Derives a child context that is done once `timeout` has elapsed.
    ///
    /// A timeout too long to represent as an instant sets no deadline of its
    /// own; the child still inherits its parent's.
    pub fn with_timeout(&self, timeout: Duration) -> (Context, CancelHandle) {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.with_cancel(),
        }
    }

    /// The effective deadline, taking ancestors into account.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Returns why this context is done, or `None` while it is still live.
    pub fn err(&self) -> Option<ContextError> {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return Some(ContextError::Cancelled);
        }

        if let Some(err) = self.inner.parent.as_ref().and_then(Context::err) {
            return Some(err);
        }

        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Returns true once the context is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// Resolves once the context is done, yielding the reason.
    pub fn done(&self) -> BoxFuture<'_, ContextError> {
        Box::pin(async move {
            loop {
                // Registered before the check so a concurrent cancel is not missed.
                let notified = self.inner.notify.notified();
                if let Some(err) = self.err() {
                    return err;
                }

                let parent_done = async {
                    match &self.inner.parent {
                        Some(parent) => parent.done().await,
                        None => pending().await,
                    }
                };
                let deadline_passed = async {
                    match self.inner.deadline {
                        Some(deadline) => {
                            tokio::time::sleep_until(deadline).await;
                            ContextError::DeadlineExceeded
                        }
                        None => pending().await,
                    }
                };

                tokio::select! {
                    _ = notified => continue,
                    err = parent_done => return err,
                    err = deadline_passed => return err,
                }
            }
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.inner.deadline)
            .field("err", &self.err())
            .finish()
    }
}

/// Cancels the context it was created with, and every context derived from it.
///
/// Dropping the handle does not cancel the context.
#[derive(Clone)]
pub struct CancelHandle {
    inner: Arc<ContextInner>,
}

impl CancelHandle {
    /// Cancels the context. Calling this more than once has no further effect.
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.inner.notify.notify_waiters();
        }
    }

    /// Returns true if [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}
