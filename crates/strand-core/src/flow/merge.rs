use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::signal::SignalQueue;

struct Source<T> {
    rx: mpsc::Receiver<T>,
    active: bool,
}

impl<T> Source<T> {
    fn new(rx: mpsc::Receiver<T>) -> Self {
        Self { rx, active: true }
    }
}

/// Forward items from both receivers into one, fairly, until both are
/// exhausted, `signal` is raised or the returned receiver is dropped.
///
/// An exhausted source is switched off and never polled again.
pub fn merge<T>(
    signal: &SignalQueue,
    left: mpsc::Receiver<T>,
    right: mpsc::Receiver<T>,
    capacity: usize,
) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let signal = signal.clone();

    tokio::spawn(async move {
        let mut left = Source::new(left);
        let mut right = Source::new(right);
        let mut forwarded = 0_usize;

        while left.active || right.active {
            let item = tokio::select! {
                _ = signal.observe() => break,
                item = left.rx.recv(), if left.active => match item {
                    Some(item) => item,
                    None => {
                        trace!("left source exhausted");
                        left.active = false;
                        continue;
                    }
                },
                item = right.rx.recv(), if right.active => match item {
                    Some(item) => item,
                    None => {
                        trace!("right source exhausted");
                        right.active = false;
                        continue;
                    }
                },
            };

            tokio::select! {
                biased;
                _ = signal.observe() => break,
                sent = tx.send(item) => if sent.is_err() { break },
            }
            forwarded += 1;
        }

        debug!(forwarded, "merge finished");
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    async fn feed(items: Vec<u32>) -> mpsc::Receiver<u32> {
        let (tx, rx) = mpsc::channel(items.len().max(1));
        for item in items {
            tx.send(item).await.unwrap();
        }
        rx
    }

    async fn drain(mut rx: mpsc::Receiver<u32>) -> Vec<u32> {
        let mut out = Vec::new();
        while let Some(item) = rx.recv().await {
            out.push(item);
        }
        out
    }

    #[tokio::test]
    async fn forwards_everything_from_both_sources() {
        let left = feed(vec![1, 3, 5, 7]).await;
        let right = feed(vec![2, 4]).await;

        let mut out = drain(merge(&SignalQueue::new(), left, right, 1)).await;
        out.sort_unstable();
        assert_eq!(out, vec![1, 2, 3, 4, 5, 7]);
    }

    #[tokio::test]
    async fn keeps_reading_after_one_source_closes() {
        let left = feed(Vec::new()).await;
        let (tx, right) = mpsc::channel(4);
        let merged = merge(&SignalQueue::new(), left, right, 4);

        tokio::spawn(async move {
            for n in 10..13 {
                tokio::time::sleep(Duration::from_millis(1)).await;
                tx.send(n).await.unwrap();
            }
        });

        assert_eq!(drain(merged).await, vec![10, 11, 12]);
    }

    #[tokio::test]
    async fn signal_closes_output() {
        let signal = SignalQueue::new();
        let (_left_tx, left) = mpsc::channel::<u32>(1);
        let (_right_tx, right) = mpsc::channel::<u32>(1);
        let merged = merge(&signal, left, right, 1);

        signal.raise();
        let out = tokio::time::timeout(Duration::from_secs(1), drain(merged))
            .await
            .unwrap();
        assert!(out.is_empty());
    }
}
