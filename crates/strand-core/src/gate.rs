//! Non-blocking bounded-concurrency admission.
//!
//! [`AdmissionGate`] holds `limit` fungible tokens. [`try_run`](AdmissionGate::try_run)
//! takes one if available, runs the body, and returns the token when the body
//! returns or unwinds. Without a free token it fails immediately with
//! [`StrandError::CapacityExceeded`]; nothing is queued.
//!
//! Mapping the rejection to a "too many requests" answer is the caller's job
//! (see `strand-api`).
use std::{future::Future, sync::Arc};

use strand_model::GateConfig;
use tokio::sync::{Semaphore, SemaphorePermit, TryAcquireError};
use tracing::{debug, trace};

use crate::{
    error::StrandError,
    metrics::{MetricsHandle, noop_metrics},
};

/// Cloneable admission gate. Clones share the same tokens.
#[derive(Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    limit: usize,
    metrics: MetricsHandle,
}

impl AdmissionGate {
    /// Create a gate admitting at most `limit` concurrent bodies.
    ///
    /// `limit` must be in `1..=GateConfig::MAX_LIMIT`.
    pub fn new(limit: usize) -> Result<Self, StrandError> {
        Self::from_config(&GateConfig::new(limit))
    }

    pub fn from_config(config: &GateConfig) -> Result<Self, StrandError> {
        config.validate()?;
        Ok(Self {
            permits: Arc::new(Semaphore::new(config.limit)),
            limit: config.limit,
            metrics: noop_metrics(),
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    /// Run `f` on the calling thread if a token is free.
    ///
    /// The token is released on every exit path of `f`, including a panic,
    /// which is then propagated to the caller unchanged.
    pub fn try_run<F, R>(&self, f: F) -> Result<R, StrandError>
    where
        F: FnOnce() -> R,
    {
        let _admission = self.admit()?;
        Ok(f())
    }

    /// Async variant of [`try_run`](Self::try_run).
    ///
    /// The admission check itself never waits; the token is held until `fut`
    /// completes or is dropped.
    pub async fn try_run_async<Fut>(&self, fut: Fut) -> Result<Fut::Output, StrandError>
    where
        Fut: Future,
    {
        let _admission = self.admit()?;
        Ok(fut.await)
    }

    #[inline]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Tokens currently free.
    #[inline]
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    /// Tokens currently checked out.
    #[inline]
    pub fn in_flight(&self) -> usize {
        self.limit.saturating_sub(self.available())
    }

    fn admit(&self) -> Result<Admission<'_>, StrandError> {
        match self.permits.try_acquire() {
            Ok(permit) => {
                let in_flight = self.in_flight();
                trace!(in_flight, limit = self.limit, "admitted");
                self.metrics.gate_admitted(in_flight);
                Ok(Admission {
                    gate: self,
                    _permit: permit,
                })
            }
            Err(TryAcquireError::NoPermits) => {
                debug!(limit = self.limit, "rejected: no capacity");
                self.metrics.gate_rejected();
                Err(StrandError::CapacityExceeded { limit: self.limit })
            }
            Err(TryAcquireError::Closed) => Err(StrandError::Cancelled),
        }
    }
}

impl std::fmt::Debug for AdmissionGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdmissionGate")
            .field("limit", &self.limit)
            .field("available", &self.available())
            .finish()
    }
}

/// One checked-out token. Returned to the gate on drop.
struct Admission<'a> {
    gate: &'a AdmissionGate,
    _permit: SemaphorePermit<'a>,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        // The permit field is released right after this body runs.
        let in_flight = self.gate.in_flight().saturating_sub(1);
        self.gate.metrics.gate_released(in_flight);
    }
}
