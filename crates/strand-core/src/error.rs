use std::time::Duration;

use strand_model::{ModelError, OrchestratorPhase, Stage};
use thiserror::Error;

/// Type-erased error returned by collaborator-supplied work.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a single unit of work did not produce a value.
#[derive(Debug, Error)]
pub enum TaskFailure {
    #[error("{0}")]
    Error(#[source] BoxError),
    #[error("panicked: {0}")]
    Panicked(String),
}

impl TaskFailure {
    pub fn from_error(err: impl Into<BoxError>) -> Self {
        TaskFailure::Error(err.into())
    }

    #[inline]
    pub fn is_panic(&self) -> bool {
        matches!(self, TaskFailure::Panicked(_))
    }
}

#[derive(Debug, Error)]
pub enum StrandError {
    #[error("no more capacity (limit {limit})")]
    CapacityExceeded { limit: usize },

    #[error(
        "deadline of {deadline:?} elapsed{}",
        .phase.map(|p| format!(" during {p}")).unwrap_or_default()
    )]
    Timeout {
        deadline: Duration,
        phase: Option<OrchestratorPhase>,
    },

    #[error("{stage} failed: {source}")]
    StageFailure {
        stage: Stage,
        #[source]
        source: TaskFailure,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ModelError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl StrandError {
    pub fn stage(stage: Stage, source: TaskFailure) -> Self {
        StrandError::StageFailure { stage, source }
    }

    /// Short machine-readable kind, used for metrics labels and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            StrandError::CapacityExceeded { .. } => "capacity_exceeded",
            StrandError::Timeout { .. } => "timeout",
            StrandError::StageFailure { .. } => "stage_failure",
            StrandError::Cancelled => "cancelled",
            StrandError::InvalidConfig(_) => "invalid_config",
            StrandError::Internal(_) => "internal",
        }
    }

    /// Returns `true` when retrying later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StrandError::CapacityExceeded { .. } | StrandError::Timeout { .. }
        )
    }

    /// Stage that failed, if this is a stage failure.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            StrandError::StageFailure { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("upstream unavailable")]
    struct Upstream;

    #[test]
    fn timeout_message_mentions_phase() {
        let err = StrandError::Timeout {
            deadline: Duration::from_millis(50),
            phase: Some(OrchestratorPhase::PendingAb),
        };
        assert_eq!(err.to_string(), "deadline of 50ms elapsed during pending_ab");

        let err = StrandError::Timeout {
            deadline: Duration::from_millis(5),
            phase: None,
        };
        assert_eq!(err.to_string(), "deadline of 5ms elapsed");
    }

    #[test]
    fn stage_failure_keeps_source() {
        let err = StrandError::stage(Stage::B, TaskFailure::from_error(Upstream));
        assert_eq!(err.to_string(), "stage b failed: upstream unavailable");
        assert_eq!(err.failed_stage(), Some(Stage::B));
        assert_eq!(err.kind(), "stage_failure");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn retryable_kinds() {
        assert!(StrandError::CapacityExceeded { limit: 1 }.is_retryable());
        assert!(!StrandError::Cancelled.is_retryable());
        assert!(!StrandError::from(ModelError::ZeroLimit).is_retryable());
    }
}
