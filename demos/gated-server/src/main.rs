//! Demo HTTP service: every `POST /api/v1/process` passes an admission gate,
//! then fans out to two simulated lookups and combines them under a deadline.
//!
//! Environment:
//! - `STRAND_ADDR` listen address (default `127.0.0.1:8080`)
//! - `STRAND_LOG` filter directives (default `info`)
//! - `STRAND_GATE_LIMIT` concurrent requests admitted (default 16)
//! - `STRAND_DEADLINE_MS` default per-request budget (default 50)

use std::{convert::Infallible, env, net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use axum::{
    Router,
    extract::State,
    http::{StatusCode, header::CONTENT_TYPE},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};
use strand_api::{HttpApi, OrchestratorHandler, ProcessStages};
use strand_core::{
    AdmissionGate, BoxError, DeadlineOrchestrator, GateConfig, MetricsHandle, OrchestratorConfig,
    SignalQueue, SingleInit, StageContext,
};
use strand_observe::{LoggerConfig, LoggerLevel, logger_init};
use strand_prometheus::{PrometheusMetrics, TEXT_FORMAT};
use tokio::time::sleep;
use tracing::{info, warn};

/// Simulated remote lookups. Each honours its stage's cancellation.
struct DemoStages {
    weights: SingleInit<Vec<i64>, Infallible>,
}

impl DemoStages {
    fn new() -> Self {
        Self {
            weights: SingleInit::new(),
        }
    }

    async fn weight(&self, slot: usize) -> i64 {
        let weights = self
            .weights
            .ensure(|| async {
                info!("loading weights table");
                sleep(Duration::from_millis(5)).await;
                Ok((1..=8).collect())
            })
            .await;
        match weights {
            Ok(table) => table[slot % table.len()],
            Err(err) => {
                warn!(error = %err, "weights unavailable; using neutral weight");
                1
            }
        }
    }
}

/// Wait `latency` unless the run gives up on this stage first.
async fn lookup(ctx: &StageContext, latency: Duration) -> Result<(), BoxError> {
    tokio::select! {
        _ = ctx.cancelled() => Err(format!("{} abandoned", ctx.stage()).into()),
        _ = sleep(latency) => Ok(()),
    }
}

fn text_len(input: &Value) -> usize {
    input.as_str().map_or_else(|| input.to_string().len(), str::len)
}

#[async_trait]
impl ProcessStages for DemoStages {
    async fn stage_a(&self, ctx: StageContext, input: Value) -> Result<Value, BoxError> {
        lookup(&ctx, Duration::from_millis(10)).await?;
        Ok(json!(text_len(&input)))
    }

    async fn stage_b(&self, ctx: StageContext, input: Value) -> Result<Value, BoxError> {
        let len = text_len(&input);
        // Long inputs stand in for a slow upstream.
        lookup(&ctx, Duration::from_millis(5 + len as u64)).await?;
        Ok(json!(self.weight(len).await))
    }

    async fn stage_c(&self, ctx: StageContext, a: Value, b: Value) -> Result<Value, BoxError> {
        lookup(&ctx, Duration::from_millis(5)).await?;
        let score = a.as_i64().unwrap_or_default() * b.as_i64().unwrap_or_default();
        Ok(json!({ "length": a, "weight": b, "score": score }))
    }
}

async fn render_metrics(State(metrics): State<PrometheusMetrics>) -> impl IntoResponse {
    match metrics.encode_text() {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, TEXT_FORMAT)], body).into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

async fn wait_for_shutdown(shutdown: SignalQueue) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "ctrl-c handler unavailable; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
    shutdown.raise();
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw.parse().with_context(|| format!("invalid {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = env::var("STRAND_LOG").unwrap_or_else(|_| "info".to_string());
    logger_init(&LoggerConfig {
        level: LoggerLevel::new(level)?,
        ..LoggerConfig::default()
    })?;

    let metrics = PrometheusMetrics::new()?;
    let handle: MetricsHandle = Arc::new(metrics.clone());

    let gate_config = GateConfig::new(env_or("STRAND_GATE_LIMIT", GateConfig::default().limit)?);
    let gate = AdmissionGate::from_config(&gate_config)?.with_metrics(Arc::clone(&handle));
    metrics.observe_gate_limit(gate.limit());

    let deadline = Duration::from_millis(env_or("STRAND_DEADLINE_MS", 50_u64)?);
    let orchestrator =
        DeadlineOrchestrator::new(OrchestratorConfig::new(deadline))?.with_metrics(handle);

    let shutdown = SignalQueue::new();
    let handler =
        OrchestratorHandler::new(orchestrator, Arc::new(DemoStages::new()), shutdown.clone());

    let app = HttpApi::new(Arc::new(handler), gate).router().merge(
        Router::new()
            .route("/metrics", get(render_metrics))
            .with_state(metrics),
    );

    let addr: SocketAddr = env_or("STRAND_ADDR", SocketAddr::from(([127, 0, 0, 1], 8080)))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, limit = gate_config.limit, ?deadline, "gated server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_shutdown(shutdown))
        .await
        .context("server error")?;

    info!("gated server stopped");
    Ok(())
}
