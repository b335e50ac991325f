//! `A ∥ B → C` under a single end-to-end deadline.
//!
//! Stages A and B start together. C starts only once both have produced a
//! value and receives the pair. The run ends on the first of:
//! - a failure from any stage (errors win over a simultaneous success),
//! - the deadline,
//! - the caller's signal,
//! - C's value.
//!
//! Stages that are still running when the run ends are not killed. Their
//! [`StageContext`] signal is raised and their late results are discarded.

mod context;
pub use context::StageContext;

mod record;
use record::StageRecord;

use std::{future::Future, panic::AssertUnwindSafe, time::Duration};

use futures::FutureExt;
use strand_model::{ModelError, OrchestratorConfig, OrchestratorPhase, Stage};
use tokio::{
    sync::{mpsc, oneshot},
    time::{Instant, sleep_until},
};
use tracing::{debug, instrument, trace, warn};

use crate::{
    error::{BoxError, StrandError, TaskFailure},
    metrics::{MetricsHandle, RunOutcome, noop_metrics},
    panic::panic_message,
    signal::SignalQueue,
};

/// One failure per stage at most.
const ERROR_QUEUE: usize = 3;

/// Cap for budgets too large to add to `Instant::now()`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// Inputs for stages A and B.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrchestratorInput<IA, IB> {
    pub a: IA,
    pub b: IB,
}

impl<IA, IB> OrchestratorInput<IA, IB> {
    pub fn new(a: IA, b: IB) -> Self {
        Self { a, b }
    }
}

#[derive(Clone)]
pub struct DeadlineOrchestrator {
    config: OrchestratorConfig,
    metrics: MetricsHandle,
}

impl std::fmt::Debug for DeadlineOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadlineOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DeadlineOrchestrator {
    /// Fails with `InvalidConfig` for a zero deadline.
    pub fn new(config: OrchestratorConfig) -> Result<Self, StrandError> {
        config.validate()?;
        Ok(Self {
            config,
            metrics: noop_metrics(),
        })
    }

    pub fn with_metrics(mut self, metrics: MetricsHandle) -> Self {
        self.metrics = metrics;
        self
    }

    #[inline]
    pub fn deadline(&self) -> Duration {
        self.config.deadline()
    }

    /// Run `stage_a(input.a)` and `stage_b(input.b)` concurrently, then
    /// `stage_c((a, b))`, all within the configured deadline.
    ///
    /// Raising `signal` ends the run with `Cancelled`.
    pub async fn run<IA, IB, OA, OB, OC, EA, EB, EC, FA, FB, FC, FutA, FutB, FutC>(
        &self,
        signal: &SignalQueue,
        input: OrchestratorInput<IA, IB>,
        stage_a: FA,
        stage_b: FB,
        stage_c: FC,
    ) -> Result<OC, StrandError>
    where
        IA: Send + 'static,
        IB: Send + 'static,
        OA: Send + 'static,
        OB: Send + 'static,
        OC: Send + 'static,
        EA: Into<BoxError> + Send + 'static,
        EB: Into<BoxError> + Send + 'static,
        EC: Into<BoxError> + Send + 'static,
        FA: FnOnce(StageContext, IA) -> FutA + Send + 'static,
        FB: FnOnce(StageContext, IB) -> FutB + Send + 'static,
        FC: FnOnce(StageContext, (OA, OB)) -> FutC + Send + 'static,
        FutA: Future<Output = Result<OA, EA>> + Send + 'static,
        FutB: Future<Output = Result<OB, EB>> + Send + 'static,
        FutC: Future<Output = Result<OC, EC>> + Send + 'static,
    {
        self.run_with_deadline(signal, self.config.deadline(), input, stage_a, stage_b, stage_c)
            .await
    }

    /// [`run`](Self::run) with a per-call budget instead of the configured one.
    #[instrument(
        level = "debug",
        skip_all,
        fields(deadline_ms = budget.as_millis() as u64)
    )]
    pub async fn run_with_deadline<IA, IB, OA, OB, OC, EA, EB, EC, FA, FB, FC, FutA, FutB, FutC>(
        &self,
        signal: &SignalQueue,
        budget: Duration,
        input: OrchestratorInput<IA, IB>,
        stage_a: FA,
        stage_b: FB,
        stage_c: FC,
    ) -> Result<OC, StrandError>
    where
        IA: Send + 'static,
        IB: Send + 'static,
        OA: Send + 'static,
        OB: Send + 'static,
        OC: Send + 'static,
        EA: Into<BoxError> + Send + 'static,
        EB: Into<BoxError> + Send + 'static,
        EC: Into<BoxError> + Send + 'static,
        FA: FnOnce(StageContext, IA) -> FutA + Send + 'static,
        FB: FnOnce(StageContext, IB) -> FutB + Send + 'static,
        FC: FnOnce(StageContext, (OA, OB)) -> FutC + Send + 'static,
        FutA: Future<Output = Result<OA, EA>> + Send + 'static,
        FutB: Future<Output = Result<OB, EB>> + Send + 'static,
        FutC: Future<Output = Result<OC, EC>> + Send + 'static,
    {
        if budget.is_zero() {
            return Err(ModelError::ZeroDeadline.into());
        }
        let started = Instant::now();
        let deadline = started
            .checked_add(budget)
            .unwrap_or_else(|| started + FAR_FUTURE);

        // Stages see a child signal: raising it never touches the caller's.
        let scope = signal.child();
        let _release = scope.raise_on_drop();

        let mut progress = Progress::new(budget);
        let (err_tx, mut err_rx) = mpsc::channel(ERROR_QUEUE);
        let (a_tx, mut a_rx) = oneshot::channel();
        let (b_tx, mut b_rx) = oneshot::channel();

        let OrchestratorInput { a, b } = input;
        let ctx = StageContext::new(Stage::A, scope.clone(), deadline);
        launch(Stage::A, async move { stage_a(ctx, a).await }, a_tx, err_tx.clone());
        let ctx = StageContext::new(Stage::B, scope.clone(), deadline);
        launch(Stage::B, async move { stage_b(ctx, b).await }, b_tx, err_tx.clone());

        let timer = sleep_until(deadline);
        tokio::pin!(timer);

        let mut record = StageRecord::new(deadline);
        let result = async {
            while !record.is_complete() {
                tokio::select! {
                    biased;
                    Some(err) = err_rx.recv() => return Err(progress.fail(err)),
                    _ = signal.observe() => return Err(progress.cancel()),
                    out = &mut a_rx, if !record.has_a() => match out {
                        Ok(value) => record.set_a(value),
                        Err(_) => return Err(progress.fail(lost(Stage::A, &mut err_rx))),
                    },
                    out = &mut b_rx, if !record.has_b() => match out {
                        Ok(value) => record.set_b(value),
                        Err(_) => return Err(progress.fail(lost(Stage::B, &mut err_rx))),
                    },
                    _ = &mut timer => {
                        let missing = record.missing();
                        warn!(?missing, "deadline fired before A and B completed");
                        return Err(progress.timeout());
                    }
                }
            }
            // A failure that landed alongside the last success still wins.
            if let Ok(err) = err_rx.try_recv() {
                return Err(progress.fail(err));
            }

            let remaining = record.deadline().saturating_duration_since(Instant::now());
            let Some(pair) = record.into_pair() else {
                return Err(progress.fail(StrandError::Internal(
                    "stage record incomplete after A and B".into(),
                )));
            };
            progress.advance(OrchestratorPhase::ReadyForC);
            trace!(?remaining, "launching C");

            let (c_tx, mut c_rx) = oneshot::channel();
            let ctx = StageContext::new(Stage::C, scope.clone(), deadline);
            launch(Stage::C, async move { stage_c(ctx, pair).await }, c_tx, err_tx);

            let value = tokio::select! {
                biased;
                Some(err) = err_rx.recv() => return Err(progress.fail(err)),
                _ = signal.observe() => return Err(progress.cancel()),
                out = &mut c_rx => match out {
                    Ok(value) => value,
                    Err(_) => return Err(progress.fail(lost(Stage::C, &mut err_rx))),
                },
                _ = &mut timer => return Err(progress.timeout()),
            };
            progress.advance(OrchestratorPhase::Done);
            Ok(value)
        }
        .await;

        let elapsed = started.elapsed();
        let outcome = match &result {
            Ok(_) => RunOutcome::Succeeded,
            Err(StrandError::Timeout { .. }) => RunOutcome::Timeout,
            Err(StrandError::Cancelled) => RunOutcome::Cancelled,
            Err(_) => RunOutcome::Failed,
        };
        self.metrics.orchestrator_finished(outcome, elapsed);
        match &result {
            Ok(_) => debug!(?elapsed, "run completed"),
            Err(err) => debug!(?elapsed, error = %err, "run failed"),
        }
        result
    }
}

/// Spawn a stage. Its value goes to `out`; any failure, panics included, to `errs`.
fn launch<O, E, Fut>(
    stage: Stage,
    work: Fut,
    out: oneshot::Sender<O>,
    errs: mpsc::Sender<StrandError>,
) where
    O: Send + 'static,
    E: Into<BoxError> + Send + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
{
    tokio::spawn(async move {
        let failure = match AssertUnwindSafe(work).catch_unwind().await {
            Ok(Ok(value)) => {
                if out.send(value).is_err() {
                    trace!(%stage, "late result discarded");
                }
                return;
            }
            Ok(Err(err)) => TaskFailure::Error(err.into()),
            Err(payload) => TaskFailure::Panicked(panic_message(&*payload)),
        };
        debug!(%stage, error = %failure, "stage failed");
        // Never blocks: the queue holds one failure per stage.
        let _ = errs.try_send(StrandError::stage(stage, failure));
    });
}

/// Error for a stage whose result sender vanished without a value.
fn lost(stage: Stage, errs: &mut mpsc::Receiver<StrandError>) -> StrandError {
    errs.try_recv()
        .unwrap_or_else(|_| StrandError::Internal(format!("{stage} ended without a result")))
}

/// Tracks the phase of one run and logs every transition.
struct Progress {
    phase: OrchestratorPhase,
    budget: Duration,
}

impl Progress {
    fn new(budget: Duration) -> Self {
        Self {
            phase: OrchestratorPhase::PendingAb,
            budget,
        }
    }

    fn advance(&mut self, next: OrchestratorPhase) {
        debug_assert!(self.phase.can_transition(next), "{} -> {next}", self.phase);
        debug!(from = %self.phase, to = %next, "phase transition");
        self.phase = next;
    }

    fn fail(&mut self, err: StrandError) -> StrandError {
        self.advance(OrchestratorPhase::Failed);
        err
    }

    fn timeout(&mut self) -> StrandError {
        let phase = self.phase;
        self.fail(StrandError::Timeout {
            deadline: self.budget,
            phase: Some(phase),
        })
    }

    fn cancel(&mut self) -> StrandError {
        self.fail(StrandError::Cancelled)
    }
}
