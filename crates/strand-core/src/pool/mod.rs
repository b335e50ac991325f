//! Fan-out/fan-in worker pool.
//!
//! `workers` tasks pull from one shared input queue, apply `transform`, and
//! publish into one shared output queue. A supervisor task owns the output
//! sender: it waits for every worker to exit and only then drops it, so the
//! consumer sees the queue close exactly once and never while results are
//! still in flight.
//!
//! Ordering of outputs is not preserved. Every pulled item is processed by
//! exactly one worker.
mod worker;

use std::{future::Future, sync::Arc};

use strand_model::{PoolConfig, Stage};
use tokio::{
    sync::{Mutex, mpsc},
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, error, info, instrument};

use crate::{
    error::{BoxError, StrandError, TaskFailure},
    metrics::{MetricsHandle, noop_metrics},
    signal::SignalQueue,
};

use worker::{Intake, WorkerCtx, WorkerExit, run_worker};

/// One input the transform could not turn into an output.
#[derive(Debug)]
pub struct ItemFailure {
    /// Position of the item in pull order.
    pub index: usize,
    pub failure: TaskFailure,
}

impl From<ItemFailure> for StrandError {
    fn from(f: ItemFailure) -> Self {
        StrandError::stage(Stage::Item(f.index), f.failure)
    }
}

/// Summary produced by the supervisor once every worker has exited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    /// Outputs actually handed to the consumer.
    pub processed: usize,
    pub failed: usize,
    /// A failure tripped [`FailurePolicy::AbortAll`](strand_model::FailurePolicy::AbortAll).
    pub aborted: bool,
    /// The caller's signal stopped the pool before the input was exhausted.
    pub cancelled: bool,
}

/// Everything a finished run produced.
#[derive(Debug)]
pub struct PoolOutput<O> {
    pub values: Vec<O>,
    pub failures: Vec<ItemFailure>,
    pub report: PoolReport,
}

/// Handle to a running pool.
///
/// Read [`next`](Self::next) until it yields `None`; that is the completion
/// signal. Dropping the handle makes workers exit at their next publish.
pub struct PoolRun<O> {
    outputs: mpsc::Receiver<O>,
    failures: mpsc::UnboundedReceiver<ItemFailure>,
    supervisor: JoinHandle<PoolReport>,
}

impl<O> PoolRun<O> {
    /// Next output, or `None` once every worker has exited.
    pub async fn next(&mut self) -> Option<O> {
        self.outputs.recv().await
    }

    /// Next already-reported failure, without waiting.
    pub fn try_next_failure(&mut self) -> Option<ItemFailure> {
        self.failures.try_recv().ok()
    }

    pub fn into_parts(
        self,
    ) -> (
        mpsc::Receiver<O>,
        mpsc::UnboundedReceiver<ItemFailure>,
        JoinHandle<PoolReport>,
    ) {
        (self.outputs, self.failures, self.supervisor)
    }

    /// Drain outputs and failures and wait for the supervisor.
    ///
    /// Returns `Cancelled` if the caller's signal stopped the run, or the first
    /// reported failure if the abort policy tripped.
    pub async fn collect(mut self) -> Result<PoolOutput<O>, StrandError> {
        let mut values = Vec::new();
        while let Some(value) = self.outputs.recv().await {
            values.push(value);
        }

        let report = self
            .supervisor
            .await
            .map_err(|e| StrandError::Internal(format!("pool supervisor failed: {e}")))?;

        // Every sender is gone once the supervisor has returned.
        let mut failures = Vec::new();
        while let Ok(failure) = self.failures.try_recv() {
            failures.push(failure);
        }

        if report.aborted {
            return match failures.into_iter().next() {
                Some(first) => Err(first.into()),
                None => Err(StrandError::Internal("pool aborted without a failure".into())),
            };
        }
        if report.cancelled {
            return Err(StrandError::Cancelled);
        }

        Ok(PoolOutput {
            values,
            failures,
            report,
        })
    }
}

/// Fan-out/fan-in executor. Cheap to clone.
#[derive(Clone)]
pub struct WorkerPool {
    config: PoolConfig,
    metrics: MetricsHandle,
}

impl WorkerPool {
    pub fn new(config: PoolConfig) -> Result<Self, StrandError> {
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

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Process a finite sequence of inputs.
    ///
    /// A feeder task pushes the inputs into the shared queue; it stops early
    /// when `signal` is raised or every worker is gone.
    pub fn run<It, I, O, E, F, Fut>(
        &self,
        signal: &SignalQueue,
        inputs: It,
        transform: F,
    ) -> PoolRun<O>
    where
        It: IntoIterator<Item = I>,
        It::IntoIter: Send + 'static,
        I: Send + 'static,
        O: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.workers);
        let feeder_signal = signal.clone();
        let iter = inputs.into_iter();

        tokio::spawn(async move {
            for item in iter {
                tokio::select! {
                    biased;
                    _ = feeder_signal.observe() => break,
                    sent = tx.send(item) => {
                        if sent.is_err() {
                            break;
                        }
                    }
                }
            }
            // Dropping `tx` closes the input queue.
        });

        self.run_stream(signal, rx, transform)
    }

    /// Process inputs produced concurrently by the caller.
    ///
    /// The pool runs until `inputs` is closed and drained, the caller's
    /// `signal` is raised, or (with `AbortAll`) an item fails.
    #[instrument(
        level = "debug",
        skip_all,
        fields(workers = self.config.workers, policy = ?self.config.policy)
    )]
    pub fn run_stream<I, O, E, F, Fut>(
        &self,
        signal: &SignalQueue,
        inputs: mpsc::Receiver<I>,
        transform: F,
    ) -> PoolRun<O>
    where
        I: Send + 'static,
        O: Send + 'static,
        E: Into<BoxError> + Send + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<O, E>> + Send + 'static,
    {
        let (out_tx, out_rx) = mpsc::channel(self.config.buffer);
        let (fail_tx, fail_rx) = mpsc::unbounded_channel();

        // Child: an abort stops this pool only, a caller raise stops it too.
        let stop = signal.child();
        let template = WorkerCtx {
            id: 0,
            intake: Arc::new(Mutex::new(Intake::new(inputs))),
            transform: Arc::new(transform),
            outputs: out_tx,
            failures: fail_tx,
            stop,
            policy: self.config.policy,
            metrics: Arc::clone(&self.metrics),
        };
        let workers = self.config.workers;

        let supervisor = tokio::spawn(async move {
            let mut set = JoinSet::new();
            for id in 0..workers {
                set.spawn(run_worker(template.for_worker(id)));
            }

            let mut report = PoolReport::default();
            let mut signalled = false;
            while let Some(joined) = set.join_next().await {
                match joined {
                    Ok(stats) => {
                        report.processed += stats.processed;
                        report.failed += stats.failed;
                        match stats.exit {
                            WorkerExit::Tripped => report.aborted = true,
                            WorkerExit::Signalled => signalled = true,
                            WorkerExit::Exhausted | WorkerExit::ConsumerGone => {}
                        }
                    }
                    Err(e) => error!(error = %e, "pool worker terminated abnormally"),
                }
            }
            report.cancelled = signalled && !report.aborted;

            // Last senders go away here: the consumer observes the close exactly once.
            drop(template);
            debug!("all workers exited; output closed");
            info!(
                processed = report.processed,
                failed = report.failed,
                aborted = report.aborted,
                cancelled = report.cancelled,
                "pool finished"
            );
            report
        });

        PoolRun {
            outputs: out_rx,
            failures: fail_rx,
            supervisor,
        }
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashSet,
        sync::atomic::{AtomicUsize, Ordering},
        time::Duration,
    };

    use strand_model::FailurePolicy;

    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("odd input {0}")]
    struct Odd(u64);

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_item_processed_exactly_once() {
        const N: u64 = 200;
        for workers in [1, 2, 7, N as usize] {
            let pool = WorkerPool::new(PoolConfig::new(workers).with_buffer(4)).unwrap();
            let signal = SignalQueue::new();

            let out = pool
                .run(&signal, 0..N, |v: u64| async move {
                    Ok::<_, Odd>(v * 10)
                })
                .collect()
                .await
                .unwrap();

            assert_eq!(out.values.len(), N as usize, "workers={workers}");
            let unique: HashSet<u64> = out.values.iter().copied().collect();
            let expected: HashSet<u64> = (0..N).map(|v| v * 10).collect();
            assert_eq!(unique, expected, "workers={workers}");
            assert_eq!(out.report.processed, N as usize);
            assert!(out.failures.is_empty());
        }
    }

    #[tokio::test]
    async fn skip_policy_reports_failures_and_continues() {
        let pool = WorkerPool::new(PoolConfig::new(3)).unwrap();
        let signal = SignalQueue::new();

        let out = pool
            .run(&signal, 0..20_u64, |v| async move {
                if v % 2 == 1 { Err(Odd(v)) } else { Ok(v) }
            })
            .collect()
            .await
            .unwrap();

        assert_eq!(out.values.len(), 10);
        assert!(out.values.iter().all(|v| v % 2 == 0));
        assert_eq!(out.failures.len(), 10);
        assert_eq!(out.report.failed, 10);
        assert!(!out.report.aborted);
    }

    #[tokio::test]
    async fn panicking_transform_does_not_kill_the_pool() {
        let pool = WorkerPool::new(PoolConfig::new(2)).unwrap();
        let signal = SignalQueue::new();

        let out = pool
            .run(&signal, 0..6_u64, |v| async move {
                if v == 3 {
                    panic!("bad record");
                }
                Ok::<_, Odd>(v)
            })
            .collect()
            .await
            .unwrap();

        assert_eq!(out.values.len(), 5);
        assert_eq!(out.failures.len(), 1);
        assert!(out.failures[0].failure.is_panic());
    }

    #[tokio::test(start_paused = true)]
    async fn abort_policy_stops_siblings_promptly() {
        let pool =
            WorkerPool::new(PoolConfig::new(4).with_policy(FailurePolicy::AbortAll)).unwrap();
        let signal = SignalQueue::new();
        let started = Arc::new(AtomicUsize::new(0));

        let seen = Arc::clone(&started);
        let err = pool
            .run(&signal, 0..1_000_u64, move |v| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    if v == 2 { Err(Odd(v)) } else { Ok(v) }
                }
            })
            .collect()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StrandError::StageFailure { stage: Stage::Item(_), .. }
        ));
        assert!(started.load(Ordering::SeqCst) < 1_000);
    }

    #[tokio::test(start_paused = true)]
    async fn caller_signal_cancels_the_run() {
        let pool = WorkerPool::new(PoolConfig::new(2)).unwrap();
        let signal = SignalQueue::new();

        let run = pool.run(&signal, 0..u64::MAX, |v| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, Odd>(v)
        });

        let canceller = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            canceller.raise();
        });

        let err = run.collect().await.unwrap_err();
        assert!(matches!(err, StrandError::Cancelled));
    }

    #[tokio::test]
    async fn streamed_input_and_incremental_consumption() {
        let pool = WorkerPool::new(PoolConfig::new(3).with_buffer(1)).unwrap();
        let signal = SignalQueue::new();
        let (tx, rx) = mpsc::channel(2);

        let mut run = pool.run_stream(&signal, rx, |s: String| async move {
            Ok::<_, Odd>(s.len())
        });

        tokio::spawn(async move {
            for word in ["a", "bb", "ccc", "dddd"] {
                tx.send(word.to_string()).await.unwrap();
            }
        });

        let mut total = 0;
        while let Some(len) = run.next().await {
            total += len;
        }
        assert_eq!(total, 10);
        assert!(run.try_next_failure().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn report_counts_only_delivered_outputs() {
        let pool = WorkerPool::new(PoolConfig::new(4).with_buffer(1)).unwrap();
        let signal = SignalQueue::new();

        let run = pool.run(&signal, 0..u64::MAX, |v| async move {
            tokio::time::sleep(Duration::from_millis(1)).await;
            Ok::<_, Odd>(v)
        });
        let (mut outputs, _failures, supervisor) = run.into_parts();

        // Take one value, then leave the other workers blocked on a full buffer.
        let mut delivered = usize::from(outputs.recv().await.is_some());
        tokio::time::sleep(Duration::from_millis(20)).await;
        signal.raise();

        let report = supervisor.await.unwrap();
        while outputs.recv().await.is_some() {
            delivered += 1;
        }

        assert!(report.cancelled);
        assert_eq!(report.processed, delivered);
    }

    #[tokio::test]
    async fn dropped_consumer_releases_workers() {
        let pool = WorkerPool::new(PoolConfig::new(2).with_buffer(1)).unwrap();
        let signal = SignalQueue::new();

        let run = pool.run(&signal, 0..u64::MAX, |v| async move { Ok::<_, Odd>(v) });
        let (outputs, _failures, supervisor) = run.into_parts();
        drop(outputs);

        let report = supervisor.await.unwrap();
        assert!(!report.cancelled);
        assert!(!report.aborted);
    }
}
