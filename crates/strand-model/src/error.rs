use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("admission limit must be at least 1")]
    ZeroLimit,
    #[error("admission limit {limit} exceeds the maximum of {max}")]
    LimitTooLarge { limit: usize, max: usize },
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("output buffer must be at least 1")]
    ZeroBuffer,
    #[error("deadline must be greater than zero")]
    ZeroDeadline,
    #[error("at least one searcher is required")]
    NoSearchers,
}
