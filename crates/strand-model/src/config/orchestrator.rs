use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ModelError;

const DEFAULT_DEADLINE_MS: u64 = 50;

/// Deadline orchestrator settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// End-to-end budget covering A, B and C together, in milliseconds.
    pub deadline_ms: u64,
}

impl OrchestratorConfig {
    /// Budget in whole milliseconds, rounded up and saturating at `u64::MAX`.
    ///
    /// A non-zero `deadline` never becomes zero.
    pub fn new(deadline: Duration) -> Self {
        let mut millis = deadline.as_millis();
        if deadline.subsec_nanos() % 1_000_000 != 0 {
            millis += 1;
        }
        Self {
            deadline_ms: u64::try_from(millis).unwrap_or(u64::MAX),
        }
    }

    #[inline]
    pub fn deadline(&self) -> Duration {
        Duration::from_millis(self.deadline_ms)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        if self.deadline_ms == 0 {
            return Err(ModelError::ZeroDeadline);
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            deadline_ms: DEFAULT_DEADLINE_MS,
        }
    }
}
