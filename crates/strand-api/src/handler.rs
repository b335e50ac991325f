use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessRequest {
    /// Payload handed to the processing pipeline.
    pub input: Value,
    /// Per-request budget; the handler's default applies when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessResponse {
    pub output: Value,
}

/// Processing API handler.
///
/// This trait abstracts the backend implementation, allowing users to:
/// - Use the provided `OrchestratorHandler`
/// - Implement custom handlers with additional logic (auth, caching, etc.)
#[async_trait]
pub trait ApiHandler: Send + Sync + 'static {
    /// Process one request end to end.
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, ApiError>;
}
