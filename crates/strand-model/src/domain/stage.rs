use std::fmt;

use serde::{Deserialize, Serialize};

/// Which unit of work produced a failure.
///
/// `A`, `B` and `C` are the orchestrator stages; `Item` is a worker pool input
/// (tagged with its position in the input sequence); `Search` is one competitor
/// in a first-success race.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Stage {
    A,
    B,
    C,
    Item(usize),
    Search(usize),
}

impl Stage {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Stage::A => "a",
            Stage::B => "b",
            Stage::C => "c",
            Stage::Item(_) => "item",
            Stage::Search(_) => "search",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Item(idx) => write!(f, "item #{idx}"),
            Stage::Search(idx) => write!(f, "search #{idx}"),
            other => write!(f, "stage {}", other.label()),
        }
    }
}
