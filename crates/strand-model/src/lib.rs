//! Shared vocabulary of the strand toolkit.
//!
//! Plain data only: stage names, orchestrator phases and the serde-friendly
//! configuration structs consumed by `strand-core`.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::{OrchestratorPhase, Stage};

mod config;
pub use config::{FailurePolicy, GateConfig, OrchestratorConfig, PoolConfig, StateBackend};
