use serde::{Deserialize, Serialize};

use crate::ModelError;

const DEFAULT_LIMIT: usize = 16;

/// Admission gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Maximum number of concurrently admitted invocations. Must be `>= 1`.
    pub limit: usize,
}

impl GateConfig {
    /// Largest accepted `limit`; equal to tokio's `Semaphore::MAX_PERMITS`.
    pub const MAX_LIMIT: usize = usize::MAX >> 3;

    pub fn new(limit: usize) -> Self {
        Self { limit }
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.limit == 0 {
            return Err(ModelError::ZeroLimit);
        }
        if self.limit > Self::MAX_LIMIT {
            return Err(ModelError::LimitTooLarge {
                limit: self.limit,
                max: Self::MAX_LIMIT,
            });
        }
        Ok(())
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
        }
    }
}
