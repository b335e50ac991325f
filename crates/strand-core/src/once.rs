//! Exactly-once lazy initialization.
//!
//! [`SingleInit`] replaces ambient globals: construct it explicitly, hand it to
//! whoever needs the value, and let the first caller of
//! [`ensure`](SingleInit::ensure) pay for the setup while every concurrent
//! caller waits for that same execution.
//!
//! ## Failure policy
//!
//! A failed (or panicking) initializer is stored and returned to every later
//! caller; it is **not** retried. Call [`reset`](SingleInit::reset) to clear the
//! stored outcome explicitly. If the caller that is running the initializer is
//! itself cancelled mid-flight (its future dropped), nothing is stored and the
//! next waiter runs its own initializer.
use std::{future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;
use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::panic::panic_message;

/// Stored outcome of a failed initialization.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InitError<E> {
    #[error("initialization failed: {0}")]
    Failed(E),
    #[error("initializer panicked: {0}")]
    Panicked(String),
}

/// Thread-safe, exactly-once initializer.
#[derive(Debug)]
pub struct SingleInit<T, E> {
    cell: OnceCell<Result<T, InitError<E>>>,
}

impl<T, E> SingleInit<T, E> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Run `init` once and return its outcome to every caller.
    ///
    /// Callers arriving while `init` runs wait for it; callers arriving later get
    /// the stored outcome without waiting.
    pub async fn ensure<F, Fut>(&self, init: F) -> Result<&T, &InitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = self
            .cell
            .get_or_init(|| async move {
                debug!("running one-time initializer");
                match AssertUnwindSafe(async move { init().await })
                    .catch_unwind()
                    .await
                {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => {
                        warn!("one-time initializer failed; outcome is permanent until reset");
                        Err(InitError::Failed(err))
                    }
                    Err(payload) => {
                        let reason = panic_message(&*payload);
                        warn!(%reason, "one-time initializer panicked");
                        Err(InitError::Panicked(reason))
                    }
                }
            })
            .await;
        outcome.as_ref()
    }

    /// Value if initialization already completed successfully.
    pub fn get(&self) -> Option<&T> {
        self.cell.get().and_then(|outcome| outcome.as_ref().ok())
    }

    /// Returns `true` once an outcome (success or failure) is stored.
    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Clear the stored outcome so the next [`ensure`](Self::ensure) runs again.
    ///
    /// Requires exclusive access, so no caller can be mid-`ensure`.
    pub fn reset(&mut self) -> Option<Result<T, InitError<E>>> {
        self.cell.take()
    }
}

impl<T, E> Default for SingleInit<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
