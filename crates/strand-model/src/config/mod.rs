mod gate;
pub use gate::GateConfig;

mod orchestrator;
pub use orchestrator::OrchestratorConfig;

mod policy;
pub use policy::{FailurePolicy, StateBackend};

mod pool;
pub use pool::PoolConfig;
