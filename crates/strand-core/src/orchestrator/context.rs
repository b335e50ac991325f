use std::time::Duration;

use strand_model::Stage;
use tokio::time::Instant;

use crate::signal::SignalQueue;

/// What a stage sees of the run it belongs to.
///
/// The signal is raised when the run finishes on any path (success, failure,
/// timeout, caller cancellation). Stages must poll or await it at their own
/// safe points; the orchestrator never kills them.
#[derive(Debug, Clone)]
pub struct StageContext {
    stage: Stage,
    signal: SignalQueue,
    deadline: Instant,
}

impl StageContext {
    pub(crate) fn new(stage: Stage, signal: SignalQueue, deadline: Instant) -> Self {
        Self {
            stage,
            signal,
            deadline,
        }
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        self.stage
    }

    #[inline]
    pub fn signal(&self) -> &SignalQueue {
        &self.signal
    }

    /// Absolute end of the run's budget.
    #[inline]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Budget left, zero once the deadline has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.signal.is_raised()
    }

    /// Resolves when the run no longer needs this stage's result.
    pub async fn cancelled(&self) {
        self.signal.observe().await
    }
}
