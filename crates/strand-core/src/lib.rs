//! Concurrency coordination primitives on top of the tokio runtime.
//!
//! - [`SignalQueue`]: one-shot broadcast cancellation signal.
//! - [`SingleInit`]: exactly-once lazy initialization.
//! - [`AdmissionGate`]: non-blocking bounded-concurrency admission.
//! - [`WorkerPool`]: fan-out/fan-in over a shared input queue.
//! - [`GuardedState`] / [`ActorState`]: two interchangeable [`SharedState`] backends.
//! - [`DeadlineOrchestrator`]: `A ∥ B → C` under one end-to-end deadline.
//!
//! Smaller helpers built from the same pieces live in [`flow`].

mod error;
pub use error::{BoxError, StrandError, TaskFailure};

mod metrics;
pub use metrics::{
    ItemOutcome, MetricsBackend, MetricsHandle, NoOpMetrics, RunOutcome, noop_metrics,
};

mod panic;

pub mod signal;
pub use signal::{RaiseGuard, SignalQueue};

pub mod once;
pub use once::{InitError, SingleInit};

pub mod gate;
pub use gate::AdmissionGate;

pub mod pool;
pub use pool::{ItemFailure, PoolOutput, PoolReport, PoolRun, WorkerPool};

pub mod state;
pub use state::{ActorState, GuardedState, SharedState};

pub mod orchestrator;
pub use orchestrator::{DeadlineOrchestrator, OrchestratorInput, StageContext};

pub mod flow;

pub use strand_model::{
    FailurePolicy, GateConfig, ModelError, OrchestratorConfig, OrchestratorPhase, PoolConfig,
    Stage, StateBackend,
};
