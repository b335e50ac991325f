use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::trace;

use crate::signal::SignalQueue;

/// Producer task feeding a capacity-1 channel.
///
/// The producer stops when the source runs out, when [`cancel`](Self::cancel)
/// is called, when the parent signal is raised, or when the generator is
/// dropped. It never waits on a reader that has gone away.
pub struct Generator<T> {
    rx: mpsc::Receiver<T>,
    signal: SignalQueue,
    producer: JoinHandle<()>,
}

impl<T: Send + 'static> Generator<T> {
    pub fn spawn<It>(signal: &SignalQueue, items: It) -> Self
    where
        It: IntoIterator<Item = T> + Send + 'static,
        It::IntoIter: Send,
    {
        let signal = signal.child();
        let stop = signal.clone();
        let (tx, rx) = mpsc::channel(1);

        let producer = tokio::spawn(async move {
            let mut sent = 0_usize;
            for item in items {
                tokio::select! {
                    biased;
                    _ = stop.observe() => break,
                    res = tx.send(item) => if res.is_err() { break },
                }
                sent += 1;
            }
            trace!(sent, "generator stopped");
        });

        Self {
            rx,
            signal,
            producer,
        }
    }

    /// Next item, `None` once the producer has stopped and the buffer is empty.
    ///
    /// One item produced before a cancellation may still be delivered.
    pub async fn next(&mut self) -> Option<T> {
        self.rx.recv().await
    }
}

impl Generator<u64> {
    /// Yields `0..max`.
    pub fn count_to(signal: &SignalQueue, max: u64) -> Self {
        Self::spawn(signal, 0..max)
    }
}

impl<T> Generator<T> {
    pub fn cancel(&self) {
        self.signal.raise();
    }

    /// Returns `true` once the producer task has exited.
    pub fn is_finished(&self) -> bool {
        self.producer.is_finished()
    }
}

impl<T> Drop for Generator<T> {
    fn drop(&mut self) {
        self.signal.raise();
    }
}

impl<T> Stream for Generator<T> {
    type Item = T;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        self.get_mut().rx.poll_recv(cx)
    }
}
