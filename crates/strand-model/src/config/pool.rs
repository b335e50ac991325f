use serde::{Deserialize, Serialize};

use crate::{FailurePolicy, ModelError};

const DEFAULT_WORKERS: usize = 4;
const DEFAULT_BUFFER: usize = 64;

/// Worker pool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of workers pulling from the shared input. Must be `>= 1`.
    pub workers: usize,
    /// Capacity of the output queue. Workers wait when it is full.
    pub buffer: usize,
    /// Reaction to a failed item.
    pub policy: FailurePolicy,
}

impl PoolConfig {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            ..Default::default()
        }
    }

    pub fn with_buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.workers == 0 {
            return Err(ModelError::ZeroWorkers);
        }
        if self.buffer == 0 {
            return Err(ModelError::ZeroBuffer);
        }
        Ok(())
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            buffer: DEFAULT_BUFFER,
            policy: FailurePolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let cfg = PoolConfig::new(8)
            .with_buffer(2)
            .with_policy(FailurePolicy::AbortAll);
        assert_eq!(cfg.workers, 8);
        assert_eq!(cfg.buffer, 2);
        assert_eq!(cfg.policy, FailurePolicy::AbortAll);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zeroes() {
        assert_eq!(PoolConfig::new(0).validate(), Err(ModelError::ZeroWorkers));
        assert_eq!(
            PoolConfig::new(1).with_buffer(0).validate(),
            Err(ModelError::ZeroBuffer)
        );
    }

    #[test]
    fn deserialize_partial() {
        let cfg: PoolConfig =
            serde_json::from_str(r#"{"workers": 2, "policy": "abortAll"}"#).unwrap();
        assert_eq!(cfg.workers, 2);
        assert_eq!(cfg.buffer, DEFAULT_BUFFER);
        assert_eq!(cfg.policy, FailurePolicy::AbortAll);
    }
}
