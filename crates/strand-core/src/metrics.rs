use std::{sync::Arc, time::Duration};

/// Outcome of one worker pool item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemOutcome {
    /// Transformed and handed to the consumer.
    Succeeded,
    Failed,
    Panicked,
    /// Transformed, but the pool stopped before the value could be published.
    Discarded,
}

impl ItemOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemOutcome::Succeeded => "succeeded",
            ItemOutcome::Failed => "failed",
            ItemOutcome::Panicked => "panicked",
            ItemOutcome::Discarded => "discarded",
        }
    }
}

/// Outcome of one orchestrated run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Succeeded,
    Failed,
    Timeout,
    Cancelled,
}

impl RunOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunOutcome::Succeeded => "succeeded",
            RunOutcome::Failed => "failed",
            RunOutcome::Timeout => "timeout",
            RunOutcome::Cancelled => "cancelled",
        }
    }
}

/// Sink for toolkit measurements.
///
/// Every hook has an empty default so backends only implement what they export.
/// Hooks are called inline on hot paths and must not block.
pub trait MetricsBackend: Send + Sync + 'static {
    /// A gate token was taken; `in_flight` includes the new holder.
    fn gate_admitted(&self, _in_flight: usize) {}
    /// A gate token was returned; `in_flight` excludes the released holder.
    fn gate_released(&self, _in_flight: usize) {}
    fn gate_rejected(&self) {}
    fn pool_item(&self, _outcome: ItemOutcome) {}
    fn orchestrator_finished(&self, _outcome: RunOutcome, _elapsed: Duration) {}
}

pub type MetricsHandle = Arc<dyn MetricsBackend>;

/// Backend that drops every measurement.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpMetrics;

impl MetricsBackend for NoOpMetrics {}

pub fn noop_metrics() -> MetricsHandle {
    Arc::new(NoOpMetrics)
}
