mod error;
pub use error::ApiError;

mod handler;
pub use handler::{ApiHandler, ProcessRequest, ProcessResponse};

mod adapter;
pub use adapter::{OrchestratorHandler, ProcessStages};

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::HttpApi;

#[cfg(feature = "http")]
pub use axum;
