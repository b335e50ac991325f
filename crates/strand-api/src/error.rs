use strand_core::StrandError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("core error: {0}")]
    Core(#[from] StrandError),
}

impl ApiError {
    /// Short machine-readable kind for response bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidRequest(_) => "invalid_request",
            ApiError::Internal(_) => "internal",
            ApiError::Core(err) => err.kind(),
        }
    }
}

#[cfg(feature = "http")]
mod response {
    use axum::{
        Json,
        extract::rejection::JsonRejection,
        http::{HeaderValue, StatusCode, header::RETRY_AFTER},
        response::{IntoResponse, Response},
    };
    use serde::Serialize;
    use strand_core::StrandError;
    use tracing::warn;

    use super::ApiError;

    #[derive(Debug, Serialize)]
    struct ErrorBody {
        error: &'static str,
        message: String,
    }

    impl ApiError {
        pub fn status(&self) -> StatusCode {
            match self {
                ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ApiError::Core(err) => match err {
                    StrandError::CapacityExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
                    StrandError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
                    StrandError::StageFailure { .. } => StatusCode::BAD_GATEWAY,
                    StrandError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
                    StrandError::InvalidConfig(_) => StatusCode::BAD_REQUEST,
                    StrandError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
                },
            }
        }
    }

    /// Malformed or mistyped request bodies answer with the same JSON error shape.
    impl From<JsonRejection> for ApiError {
        fn from(rejection: JsonRejection) -> Self {
            ApiError::InvalidRequest(rejection.body_text())
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            let status = self.status();
            if status.is_server_error() {
                warn!(%status, error = %self, "request failed");
            }

            let body = ErrorBody {
                error: self.kind(),
                message: self.to_string(),
            };
            let mut response = (status, Json(body)).into_response();
            if status == StatusCode::TOO_MANY_REQUESTS {
                response
                    .headers_mut()
                    .insert(RETRY_AFTER, HeaderValue::from_static("1"));
            }
            response
        }
    }
}

#[cfg(all(test, feature = "http"))]
mod tests {
    use std::time::Duration;

    use axum::{http::StatusCode, response::IntoResponse};
    use strand_core::{ModelError, OrchestratorPhase, Stage, TaskFailure};

    use super::*;

    #[test]
    fn core_errors_map_to_http_statuses() {
        let cases = [
            (
                StrandError::CapacityExceeded { limit: 4 },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                StrandError::Timeout {
                    deadline: Duration::from_millis(50),
                    phase: Some(OrchestratorPhase::PendingAb),
                },
                StatusCode::GATEWAY_TIMEOUT,
            ),
            (
                StrandError::stage(Stage::B, TaskFailure::Panicked("boom".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (StrandError::Cancelled, StatusCode::SERVICE_UNAVAILABLE),
            (
                StrandError::InvalidConfig(ModelError::ZeroDeadline),
                StatusCode::BAD_REQUEST,
            ),
            (
                StrandError::Internal("lost".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
    }

    #[test]
    fn rejection_carries_retry_after() {
        let response = ApiError::from(StrandError::CapacityExceeded { limit: 1 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()["retry-after"], "1");
    }

    #[test]
    fn kind_comes_from_core_error() {
        assert_eq!(ApiError::from(StrandError::Cancelled).kind(), "cancelled");
        assert_eq!(ApiError::InvalidRequest("x".into()).kind(), "invalid_request");
    }
}
