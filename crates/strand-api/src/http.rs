use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use strand_core::AdmissionGate;
use tracing::debug;

use crate::{
    error::ApiError,
    handler::{ApiHandler, ProcessRequest},
};

/// HTTP API service builder.
pub struct HttpApi<H> {
    handler: Arc<H>,
    gate: AdmissionGate,
}

impl<H> HttpApi<H>
where
    H: ApiHandler,
{
    /// Create new HTTP API; every processing request must pass `gate` first.
    pub fn new(handler: Arc<H>, gate: AdmissionGate) -> Self {
        Self { handler, gate }
    }

    /// Build axum router with mounted endpoints.
    ///
    /// Routes:
    /// - POST /api/v1/process - Process a request (429 when the gate is full)
    /// - GET /api/v1/capacity - Gate limit and current usage
    pub fn router(self) -> Router {
        Router::new()
            .route("/api/v1/process", post(process::<H>))
            .route("/api/v1/capacity", get(capacity::<H>))
            .with_state(ApiState {
                handler: self.handler,
                gate: self.gate,
            })
    }
}

struct ApiState<H> {
    handler: Arc<H>,
    gate: AdmissionGate,
}

impl<H> Clone for ApiState<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            gate: self.gate.clone(),
        }
    }
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
struct CapacityResponse {
    limit: usize,
    available: usize,
    in_flight: usize,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/process
async fn process<H>(
    State(state): State<ApiState<H>>,
    payload: Result<Json<ProcessRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let Json(req) = payload?;
    debug!(deadline_ms = ?req.deadline_ms, "processing request");
    let response = state
        .gate
        .try_run_async(state.handler.process(req))
        .await??;

    Ok(Json(response))
}

/// GET /api/v1/capacity
async fn capacity<H>(State(state): State<ApiState<H>>) -> Result<impl IntoResponse, ApiError>
where
    H: ApiHandler,
{
    let response = CapacityResponse {
        limit: state.gate.limit(),
        available: state.gate.available(),
        in_flight: state.gate.in_flight(),
    };

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        extract::{FromRequest, Request},
        http::{StatusCode, header::CONTENT_TYPE},
        response::Response,
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::handler::ProcessResponse;

    /// Echoes the input after `delay`.
    struct Echo {
        delay: Duration,
    }

    #[async_trait]
    impl ApiHandler for Echo {
        async fn process(&self, request: ProcessRequest) -> Result<ProcessResponse, ApiError> {
            tokio::time::sleep(self.delay).await;
            Ok(ProcessResponse {
                output: request.input,
            })
        }
    }

    fn state(delay: Duration, limit: usize) -> ApiState<Echo> {
        ApiState {
            handler: Arc::new(Echo { delay }),
            gate: AdmissionGate::new(limit).unwrap(),
        }
    }

    fn req(input: Value) -> Result<Json<ProcessRequest>, JsonRejection> {
        Ok(Json(ProcessRequest {
            input,
            deadline_ms: None,
        }))
    }

    async fn rejected(content_type: &'static str, body: &'static str) -> JsonRejection {
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/process")
            .header(CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap();
        Json::<ProcessRequest>::from_request(request, &())
            .await
            .unwrap_err()
    }

    async fn call_process(state: ApiState<Echo>, input: Value) -> Response {
        process(State(state), req(input)).await.into_response()
    }

    async fn json_body(response: Response<Body>) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn process_returns_handler_output() {
        let response = call_process(state(Duration::ZERO, 2), json!({ "k": 1 })).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "output": { "k": 1 } }));
    }

    #[tokio::test(start_paused = true)]
    async fn full_gate_answers_too_many_requests() {
        let shared = state(Duration::from_millis(50), 1);

        let busy = tokio::spawn(call_process(shared.clone(), json!("first")));
        tokio::task::yield_now().await;
        assert_eq!(shared.gate.in_flight(), 1);

        let rejected = call_process(shared.clone(), json!("second")).await;
        assert_eq!(rejected.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(json_body(rejected).await["error"], "capacity_exceeded");

        assert_eq!(busy.await.unwrap().status(), StatusCode::OK);
        assert_eq!(shared.gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn bad_body_answers_with_json_error() {
        let cases = [
            ("application/json", "{not json"),
            ("application/json", r#"{"input": 1, "deadline_ms": "soon"}"#),
            ("text/plain", r#"{"input": 1}"#),
        ];
        for (content_type, body) in cases {
            let shared = state(Duration::ZERO, 1);
            let response = process(State(shared.clone()), Err(rejected(content_type, body).await))
                .await
                .into_response();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
            let body = json_body(response).await;
            assert_eq!(body["error"], "invalid_request");
            assert!(body["message"].as_str().is_some_and(|m| !m.is_empty()));
            assert_eq!(shared.gate.in_flight(), 0);
        }
    }

    #[tokio::test]
    async fn capacity_reports_gate_usage() {
        let response = capacity(State(state(Duration::ZERO, 3)))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let body: CapacityResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(
            body,
            CapacityResponse {
                limit: 3,
                available: 3,
                in_flight: 0,
            }
        );
    }

    #[test]
    fn router_mounts_routes() {
        let gate = AdmissionGate::new(1).unwrap();
        let _router: Router = HttpApi::new(Arc::new(Echo { delay: Duration::ZERO }), gate).router();
    }
}
