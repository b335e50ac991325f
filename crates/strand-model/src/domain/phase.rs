use std::fmt;

use serde::{Deserialize, Serialize};

/// Progress of a single deadline-orchestrated run.
///
/// `PendingAb -> ReadyForC -> Done`, with `Failed` reachable from any non-terminal phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrchestratorPhase {
    /// Stages A and B are in flight, waiting for both outputs.
    PendingAb,
    /// A and B succeeded; stage C is launched and awaited.
    ReadyForC,
    /// Stage C produced the final output.
    Done,
    /// A stage failed, the deadline fired, or the caller cancelled.
    Failed,
}

impl OrchestratorPhase {
    /// Returns `true` if the run won't transition further.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrchestratorPhase::Done | OrchestratorPhase::Failed)
    }

    /// Returns `true` if moving from `self` to `next` is a legal transition.
    pub fn can_transition(&self, next: OrchestratorPhase) -> bool {
        use OrchestratorPhase::*;
        matches!(
            (self, next),
            (PendingAb, ReadyForC) | (ReadyForC, Done) | (PendingAb, Failed) | (ReadyForC, Failed)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestratorPhase::PendingAb => "pending_ab",
            OrchestratorPhase::ReadyForC => "ready_for_c",
            OrchestratorPhase::Done => "done",
            OrchestratorPhase::Failed => "failed",
        }
    }
}

impl fmt::Display for OrchestratorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
