//! Prometheus metrics backend for the strand coordination toolkit.
//!
//! This crate provides a [`PrometheusMetrics`] implementation of [`strand_core::MetricsBackend`] that exposes metrics in Prometheus format.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use strand_core::{AdmissionGate, DeadlineOrchestrator, OrchestratorConfig};
//! use strand_prometheus::PrometheusMetrics;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Create prometheus metrics backend
//! let metrics = PrometheusMetrics::new()?;
//! let handle = Arc::new(metrics.clone());
//!
//! // Inject into the primitives that report
//! let gate = AdmissionGate::new(8)?.with_metrics(handle.clone());
//! let orchestrator = DeadlineOrchestrator::new(OrchestratorConfig::default())?.with_metrics(handle);
//!
//! // Render the exposition text for a /metrics endpoint
//! let body = metrics.encode_text()?;
//! assert!(body.contains("strand_gate_limit"));
//! # let _ = (gate, orchestrator);
//! # Ok(())
//! # }
//! ```
//!
//! ## Metrics
//! - `strand_gate_admitted_total` - Counter
//! - `strand_gate_rejected_total` - Counter
//! - `strand_gate_in_flight` - Gauge
//! - `strand_gate_limit` - Gauge (set by [`PrometheusMetrics::observe_gate_limit`])
//! - `strand_pool_items_total{outcome}` - Counter
//! - `strand_orchestrator_runs_total{outcome}` - Counter
//! - `strand_orchestrator_duration_seconds` - Histogram
//!
//! ## HTTP Server
//! This crate does NOT provide HTTP server for `/metrics` endpoint.
//! Use your application's existing HTTP framework (axum, warp, etc) and
//! serve [`PrometheusMetrics::encode_text`] with [`TEXT_FORMAT`]
//! as content type.

mod backend;
pub use backend::PrometheusMetrics;

mod error;
pub use error::MetricsError;

pub use prometheus::{Encoder, Registry, TEXT_FORMAT, TextEncoder};
