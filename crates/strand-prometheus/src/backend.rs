use std::time::Duration;

use prometheus::{
    Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
    proto::MetricFamily,
};
use strand_core::{ItemOutcome, MetricsBackend, RunOutcome};

use crate::error::MetricsError;

const NAMESPACE: &str = "strand";

/// Orchestrated runs are expected to finish within tens of milliseconds.
const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Cheap to clone: every handle shares the same collectors and registry.
#[derive(Clone)]
pub struct PrometheusMetrics {
    registry: Registry,
    gate_admitted: IntCounter,
    gate_rejected: IntCounter,
    gate_in_flight: IntGauge,
    gate_limit: IntGauge,
    pool_items: IntCounterVec,
    runs: IntCounterVec,
    run_duration: Histogram,
}

impl PrometheusMetrics {
    /// Register every collector in a fresh registry.
    pub fn new() -> Result<Self, MetricsError> {
        Self::with_registry(Registry::new())
    }

    /// Register every collector in `registry`, e.g. one shared with other exporters.
    pub fn with_registry(registry: Registry) -> Result<Self, MetricsError> {
        let gate_admitted = IntCounter::with_opts(
            Opts::new("gate_admitted_total", "Calls admitted by the gate").namespace(NAMESPACE),
        )?;
        let gate_rejected = IntCounter::with_opts(
            Opts::new("gate_rejected_total", "Calls rejected for lack of capacity")
                .namespace(NAMESPACE),
        )?;
        let gate_in_flight = IntGauge::with_opts(
            Opts::new("gate_in_flight", "Calls currently holding a gate token")
                .namespace(NAMESPACE),
        )?;
        let gate_limit = IntGauge::with_opts(
            Opts::new("gate_limit", "Configured gate capacity").namespace(NAMESPACE),
        )?;
        let pool_items = IntCounterVec::new(
            Opts::new("pool_items_total", "Worker pool items by outcome").namespace(NAMESPACE),
            &["outcome"],
        )?;
        let runs = IntCounterVec::new(
            Opts::new("orchestrator_runs_total", "Orchestrated runs by outcome")
                .namespace(NAMESPACE),
            &["outcome"],
        )?;
        let run_duration = Histogram::with_opts(
            HistogramOpts::new(
                "orchestrator_duration_seconds",
                "Wall time of orchestrated runs",
            )
            .namespace(NAMESPACE)
            .buckets(DURATION_BUCKETS.to_vec()),
        )?;

        registry.register(Box::new(gate_admitted.clone()))?;
        registry.register(Box::new(gate_rejected.clone()))?;
        registry.register(Box::new(gate_in_flight.clone()))?;
        registry.register(Box::new(gate_limit.clone()))?;
        registry.register(Box::new(pool_items.clone()))?;
        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry,
            gate_admitted,
            gate_rejected,
            gate_in_flight,
            gate_limit,
            pool_items,
            runs,
            run_duration,
        })
    }

    /// Record the configured capacity of the gate reporting here.
    pub fn observe_gate_limit(&self, limit: usize) {
        self.gate_limit.set(as_gauge(limit));
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    /// Text exposition format of everything registered.
    pub fn encode_text(&self) -> Result<String, MetricsError> {
        TextEncoder::new()
            .encode_to_string(&self.gather())
            .map_err(|e| MetricsError::Encode(e.to_string()))
    }
}

impl std::fmt::Debug for PrometheusMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrometheusMetrics").finish_non_exhaustive()
    }
}

impl MetricsBackend for PrometheusMetrics {
    fn gate_admitted(&self, in_flight: usize) {
        self.gate_admitted.inc();
        self.gate_in_flight.set(as_gauge(in_flight));
    }

    fn gate_released(&self, in_flight: usize) {
        self.gate_in_flight.set(as_gauge(in_flight));
    }

    fn gate_rejected(&self) {
        self.gate_rejected.inc();
    }

    fn pool_item(&self, outcome: ItemOutcome) {
        self.pool_items.with_label_values(&[outcome.as_str()]).inc();
    }

    fn orchestrator_finished(&self, outcome: RunOutcome, elapsed: Duration) {
        self.runs.with_label_values(&[outcome.as_str()]).inc();
        self.run_duration.observe(elapsed.as_secs_f64());
    }
}

fn as_gauge(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
