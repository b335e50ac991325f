//! Shared string-keyed integer map with two interchangeable backends.
//!
//! - [`GuardedState`]: a read/write lock around the map. Many concurrent
//!   readers, exclusive writers. Pick it for read-heavy plain in-memory state.
//! - [`ActorState`]: one owner task applies queued commands one at a time.
//!   Strictly serialized and more expensive per read, but every mutation goes
//!   through one place and arbitrary commands can be added without touching
//!   callers.
//!
//! Both implement [`SharedState`]; [`from_backend`] makes the choice a
//! configuration value.
mod actor;
pub use actor::ActorState;

mod guarded;
pub use guarded::GuardedState;

use std::sync::Arc;

use async_trait::async_trait;
use strand_model::StateBackend;

use crate::{error::StrandError, signal::SignalQueue};

/// Concurrent key/value access shared by every backend.
#[async_trait]
pub trait SharedState: Send + Sync + 'static {
    /// Insert or overwrite `key`.
    async fn update(&self, key: &str, value: i64) -> Result<(), StrandError>;

    /// Current value of `key`, `None` if it was never written.
    async fn read(&self, key: &str) -> Result<Option<i64>, StrandError>;

    /// Number of stored keys.
    async fn len(&self) -> Result<usize, StrandError>;

    fn backend(&self) -> StateBackend;
}

/// Build the configured backend.
///
/// `signal` stops the actor's owner task; the guarded backend ignores it.
pub fn from_backend(backend: StateBackend, signal: &SignalQueue) -> Arc<dyn SharedState> {
    match backend {
        StateBackend::Guarded => Arc::new(GuardedState::new()),
        StateBackend::Actor => Arc::new(ActorState::spawn(signal)),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    async fn read_your_writes(state: Arc<dyn SharedState>) {
        assert_eq!(state.read("missing").await.unwrap(), None);

        state.update("alice", 3).await.unwrap();
        state.update("bob", 7).await.unwrap();
        state.update("alice", 4).await.unwrap();

        assert_eq!(state.read("alice").await.unwrap(), Some(4));
        assert_eq!(state.read("bob").await.unwrap(), Some(7));
        assert_eq!(state.len().await.unwrap(), 2);
    }

    async fn concurrent_writes_are_never_torn(state: Arc<dyn SharedState>) {
        const WRITES: i64 = 1_000;
        const WRITERS: i64 = 8;

        let mut handles = Vec::new();
        for writer in 0..WRITERS {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                let mut i = writer;
                while i < WRITES {
                    state.update("x", i).await.unwrap();
                    // A key written by this caller must be visible to it afterwards.
                    assert!(state.read("x").await.unwrap().is_some());
                    i += WRITERS;
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let written: HashSet<i64> = (0..WRITES).collect();
        let last = state.read("x").await.unwrap().expect("x was written");
        assert!(written.contains(&last));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn guarded_backend_properties() {
        let signal = SignalQueue::new();
        let state = from_backend(StateBackend::Guarded, &signal);
        assert_eq!(state.backend(), StateBackend::Guarded);

        read_your_writes(Arc::clone(&state)).await;
        concurrent_writes_are_never_torn(from_backend(StateBackend::Guarded, &signal)).await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn actor_backend_properties() {
        let signal = SignalQueue::new();
        let state = from_backend(StateBackend::Actor, &signal);
        assert_eq!(state.backend(), StateBackend::Actor);

        read_your_writes(Arc::clone(&state)).await;
        concurrent_writes_are_never_torn(from_backend(StateBackend::Actor, &signal)).await;
        signal.raise();
    }
}
