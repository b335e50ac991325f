use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use strand_core::{BoxError, DeadlineOrchestrator, OrchestratorInput, SignalQueue, StageContext};
use tracing::debug;

use crate::{
    error::ApiError,
    handler::{ApiHandler, ProcessRequest, ProcessResponse},
};

/// The three collaborators behind [`OrchestratorHandler`].
///
/// A and B both receive the request input and run concurrently; C combines their outputs.
#[async_trait]
pub trait ProcessStages: Send + Sync + 'static {
    async fn stage_a(&self, ctx: StageContext, input: Value) -> Result<Value, BoxError>;

    async fn stage_b(&self, ctx: StageContext, input: Value) -> Result<Value, BoxError>;

    async fn stage_c(&self, ctx: StageContext, a: Value, b: Value) -> Result<Value, BoxError>;
}

/// Adapter that runs every request through a [`DeadlineOrchestrator`].
///
/// Raising `shutdown` cancels every run in flight.
pub struct OrchestratorHandler<S> {
    orchestrator: DeadlineOrchestrator,
    stages: Arc<S>,
    shutdown: SignalQueue,
}

impl<S> OrchestratorHandler<S>
where
    S: ProcessStages,
{
    pub fn new(orchestrator: DeadlineOrchestrator, stages: Arc<S>, shutdown: SignalQueue) -> Self {
        Self {
            orchestrator,
            stages,
            shutdown,
        }
    }
}

#[async_trait]
impl<S> ApiHandler for OrchestratorHandler<S>
where
    S: ProcessStages,
{
    async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, ApiError> {
        let ProcessRequest { input, deadline_ms } = request;
        let deadline = match deadline_ms {
            Some(0) => return Err(ApiError::InvalidRequest("deadline_ms must be > 0".into())),
            Some(ms) => Duration::from_millis(ms),
            None => self.orchestrator.deadline(),
        };
        debug!(?deadline, "processing request");

        let (a, b, c) = (
            Arc::clone(&self.stages),
            Arc::clone(&self.stages),
            Arc::clone(&self.stages),
        );
        let output = self
            .orchestrator
            .run_with_deadline(
                &self.shutdown,
                deadline,
                OrchestratorInput::new(input.clone(), input),
                move |ctx, input| async move { a.stage_a(ctx, input).await },
                move |ctx, input| async move { b.stage_b(ctx, input).await },
                move |ctx, (left, right)| async move { c.stage_c(ctx, left, right).await },
            )
            .await?;

        Ok(ProcessResponse { output })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strand_core::{OrchestratorConfig, Stage, StrandError};
    use tokio::time::sleep;

    use super::*;

    /// A doubles `x`, B increments `y`, C adds both. `slow_a` delays A.
    struct Arithmetic {
        slow_a: Duration,
    }

    fn field(input: &Value, name: &str) -> Result<i64, BoxError> {
        input
            .get(name)
            .and_then(Value::as_i64)
            .ok_or_else(|| format!("missing integer field `{name}`").into())
    }

    #[async_trait]
    impl ProcessStages for Arithmetic {
        async fn stage_a(&self, _ctx: StageContext, input: Value) -> Result<Value, BoxError> {
            sleep(self.slow_a).await;
            Ok(json!(field(&input, "x")? * 2))
        }

        async fn stage_b(&self, _ctx: StageContext, input: Value) -> Result<Value, BoxError> {
            Ok(json!(field(&input, "y")? + 1))
        }

        async fn stage_c(&self, _ctx: StageContext, a: Value, b: Value) -> Result<Value, BoxError> {
            let sum = a.as_i64().unwrap_or_default() + b.as_i64().unwrap_or_default();
            Ok(json!({ "sum": sum }))
        }
    }

    fn handler(slow_a: Duration) -> OrchestratorHandler<Arithmetic> {
        let orchestrator = DeadlineOrchestrator::new(OrchestratorConfig::default()).unwrap();
        OrchestratorHandler::new(
            orchestrator,
            Arc::new(Arithmetic { slow_a }),
            SignalQueue::new(),
        )
    }

    fn request(input: Value, deadline_ms: Option<u64>) -> ProcessRequest {
        ProcessRequest { input, deadline_ms }
    }

    #[tokio::test(start_paused = true)]
    async fn combines_both_stages() {
        let out = handler(Duration::from_millis(5))
            .process(request(json!({ "x": 4, "y": 1 }), None))
            .await
            .unwrap();
        assert_eq!(out.output, json!({ "sum": 10 }));
    }

    #[tokio::test(start_paused = true)]
    async fn stage_error_names_the_stage() {
        let err = handler(Duration::ZERO)
            .process(request(json!({ "x": 4 }), None))
            .await
            .unwrap_err();
        match err {
            ApiError::Core(core) => assert_eq!(core.failed_stage(), Some(Stage::B)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn per_request_deadline_overrides_default() {
        let err = handler(Duration::from_millis(30))
            .process(request(json!({ "x": 1, "y": 1 }), Some(10)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Core(StrandError::Timeout { .. })));

        // Same stages fit in the default 50 ms budget.
        handler(Duration::from_millis(30))
            .process(request(json!({ "x": 1, "y": 1 }), None))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn zero_deadline_is_a_bad_request() {
        let err = handler(Duration::ZERO)
            .process(request(json!({}), Some(0)))
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }
}
