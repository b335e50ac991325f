use serde::{Deserialize, Serialize};

/// What a worker pool does when `transform` fails for an item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Report the failure on the side queue and keep pulling input.
    #[default]
    SkipAndContinue,
    /// Raise the pool's internal signal; every worker stops at its next pull.
    AbortAll,
}

/// Backing implementation for a shared string-keyed map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StateBackend {
    /// Read/write lock around the map. Concurrent readers allowed.
    #[default]
    Guarded,
    /// Single owner task applying commands one at a time.
    Actor,
}
