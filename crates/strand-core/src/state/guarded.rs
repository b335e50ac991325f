use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};

use async_trait::async_trait;
use strand_model::StateBackend;

use super::SharedState;
use crate::error::StrandError;

/// Lock-guarded shared map.
#[derive(Clone, Default)]
pub struct GuardedState {
    inner: Arc<RwLock<HashMap<String, i64>>>,
}

impl GuardedState {
    /// Create an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite under the exclusive lock.
    pub fn insert(&self, key: impl Into<String>, value: i64) {
        // Plain integers: a panicking writer cannot leave the map half-updated.
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.insert(key.into(), value);
    }

    /// Read under the shared lock; concurrent readers do not block each other.
    pub fn get(&self, key: &str) -> Option<i64> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the whole map, taken under one read lock.
    pub fn snapshot(&self) -> HashMap<String, i64> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl SharedState for GuardedState {
    async fn update(&self, key: &str, value: i64) -> Result<(), StrandError> {
        self.insert(key, value);
        Ok(())
    }

    async fn read(&self, key: &str) -> Result<Option<i64>, StrandError> {
        Ok(self.get(key))
    }

    async fn len(&self) -> Result<usize, StrandError> {
        Ok(GuardedState::len(self))
    }

    fn backend(&self) -> StateBackend {
        StateBackend::Guarded
    }
}
