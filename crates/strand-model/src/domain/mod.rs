mod phase;
pub use phase::OrchestratorPhase;

mod stage;
pub use stage::Stage;
