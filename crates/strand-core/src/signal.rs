//! One-shot broadcast cancellation signal.
//!
//! A [`SignalQueue`] starts *pending* and can be *raised* exactly once; raising
//! again is a no-op. Any number of tasks may [`observe`](SignalQueue::observe)
//! it, and observation resolves immediately once raised. There is no way to
//! un-raise a signal.
//!
//! Signals form a tree: a [`child`](SignalQueue::child) is raised whenever its
//! parent is, but raising a child leaves the parent untouched. Deadlines and
//! pool-internal aborts are expressed as children of the caller's signal.
use std::future::Future;

use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::trace;

/// Cloneable handle to a shared cancellation signal.
///
/// Clones observe and raise the *same* signal.
#[derive(Debug, Clone, Default)]
pub struct SignalQueue {
    token: CancellationToken,
}

impl SignalQueue {
    /// Create a new pending signal.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Wrap an existing token, sharing its state.
    pub fn from_token(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Transition to *raised*. Idempotent.
    pub fn raise(&self) {
        if !self.token.is_cancelled() {
            trace!("signal raised");
        }
        self.token.cancel();
    }

    /// Non-blocking check, for pull boundaries and loop heads.
    #[inline]
    pub fn is_raised(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal is raised (immediately if it already is).
    pub fn observe(&self) -> impl Future<Output = ()> + Send + '_ {
        self.token.cancelled()
    }

    /// Owned variant of [`observe`](Self::observe) for moving into spawned tasks.
    pub fn observe_owned(&self) -> impl Future<Output = ()> + Send + 'static {
        self.token.clone().cancelled_owned()
    }

    /// Derive a signal raised together with `self`, but raisable on its own.
    pub fn child(&self) -> SignalQueue {
        Self {
            token: self.token.child_token(),
        }
    }

    /// Guard that raises the signal when dropped, on every exit path.
    pub fn raise_on_drop(&self) -> RaiseGuard {
        RaiseGuard {
            guard: self.token.clone().drop_guard(),
        }
    }

    /// Underlying token, for interop with APIs that take one directly.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

impl From<CancellationToken> for SignalQueue {
    fn from(token: CancellationToken) -> Self {
        Self::from_token(token)
    }
}

/// Raises its signal on drop. See [`SignalQueue::raise_on_drop`].
#[must_use = "dropping the guard raises the signal immediately"]
#[derive(Debug)]
pub struct RaiseGuard {
    guard: DropGuard,
}

impl RaiseGuard {
    /// Keep the signal pending and hand it back.
    pub fn disarm(self) -> SignalQueue {
        SignalQueue::from_token(self.guard.disarm())
    }
}
