use std::{future::Future, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use strand_model::FailurePolicy;
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, trace, warn};

use crate::{
    error::{BoxError, TaskFailure},
    metrics::{ItemOutcome, MetricsHandle},
    panic::panic_message,
    signal::SignalQueue,
};

use super::ItemFailure;

/// Shared input queue. Items are numbered in the order they are pulled.
pub(super) struct Intake<I> {
    rx: mpsc::Receiver<I>,
    next: usize,
}

impl<I> Intake<I> {
    pub(super) fn new(rx: mpsc::Receiver<I>) -> Self {
        Self { rx, next: 0 }
    }
}

/// Why a worker left its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum WorkerExit {
    /// Input queue closed and drained.
    Exhausted,
    /// Stop signal observed (caller cancellation or pool abort).
    Signalled,
    /// This worker's failure tripped the abort policy.
    Tripped,
    /// Output consumer went away.
    ConsumerGone,
}

#[derive(Debug, Clone, Copy)]
pub(super) struct WorkerStats {
    pub(super) exit: WorkerExit,
    pub(super) processed: usize,
    pub(super) failed: usize,
}

/// Everything a worker needs; cloned once per spawned worker.
pub(super) struct WorkerCtx<I, O, F> {
    pub(super) id: usize,
    pub(super) intake: Arc<Mutex<Intake<I>>>,
    pub(super) transform: Arc<F>,
    pub(super) outputs: mpsc::Sender<O>,
    pub(super) failures: mpsc::UnboundedSender<ItemFailure>,
    pub(super) stop: SignalQueue,
    pub(super) policy: FailurePolicy,
    pub(super) metrics: MetricsHandle,
}

impl<I, O, F> WorkerCtx<I, O, F> {
    pub(super) fn for_worker(&self, id: usize) -> Self {
        Self {
            id,
            intake: Arc::clone(&self.intake),
            transform: Arc::clone(&self.transform),
            outputs: self.outputs.clone(),
            failures: self.failures.clone(),
            stop: self.stop.clone(),
            policy: self.policy,
            metrics: Arc::clone(&self.metrics),
        }
    }
}

async fn pull<I>(intake: &Mutex<Intake<I>>) -> Option<(usize, I)> {
    let mut intake = intake.lock().await;
    let item = intake.rx.recv().await?;
    let index = intake.next;
    intake.next += 1;
    Some((index, item))
}

/// Pull, transform and publish until the input is exhausted or `stop` is raised.
pub(super) async fn run_worker<I, O, E, F, Fut>(ctx: WorkerCtx<I, O, F>) -> WorkerStats
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: Into<BoxError>,
{
    let mut processed = 0;
    let mut failed = 0;

    let exit = loop {
        if ctx.stop.is_raised() {
            break WorkerExit::Signalled;
        }
        let next = tokio::select! {
            biased;
            _ = ctx.stop.observe() => break WorkerExit::Signalled,
            next = pull(&ctx.intake) => next,
        };
        let Some((index, item)) = next else {
            break WorkerExit::Exhausted;
        };
        trace!(worker = ctx.id, index, "item pulled");

        let transform = &ctx.transform;
        let outcome = AssertUnwindSafe(async move { transform(item).await })
            .catch_unwind()
            .await;

        let failure = match outcome {
            Ok(Ok(value)) => {
                let sent = tokio::select! {
                    biased;
                    _ = ctx.stop.observe() => {
                        ctx.metrics.pool_item(ItemOutcome::Discarded);
                        trace!(worker = ctx.id, index, "output discarded on stop");
                        break WorkerExit::Signalled;
                    }
                    sent = ctx.outputs.send(value) => sent,
                };
                if sent.is_err() {
                    ctx.metrics.pool_item(ItemOutcome::Discarded);
                    debug!(worker = ctx.id, "output consumer dropped; worker exiting");
                    break WorkerExit::ConsumerGone;
                }
                processed += 1;
                ctx.metrics.pool_item(ItemOutcome::Succeeded);
                continue;
            }
            Ok(Err(err)) => {
                ctx.metrics.pool_item(ItemOutcome::Failed);
                TaskFailure::Error(err.into())
            }
            Err(payload) => {
                ctx.metrics.pool_item(ItemOutcome::Panicked);
                TaskFailure::Panicked(panic_message(&*payload))
            }
        };

        failed += 1;
        warn!(worker = ctx.id, index, error = %failure, "item failed");
        // Unbounded: reporting a failure never waits on the consumer.
        let _ = ctx.failures.send(ItemFailure { index, failure });

        if ctx.policy == FailurePolicy::AbortAll {
            ctx.stop.raise();
            break WorkerExit::Tripped;
        }
    };

    debug!(worker = ctx.id, ?exit, processed, failed, "worker finished");
    WorkerStats {
        exit,
        processed,
        failed,
    }
}
