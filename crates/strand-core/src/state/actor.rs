use std::{
    collections::HashMap,
    panic::{AssertUnwindSafe, catch_unwind},
};

use async_trait::async_trait;
use strand_model::StateBackend;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, trace};

use super::SharedState;
use crate::{error::StrandError, panic::panic_message, signal::SignalQueue};

const DEFAULT_MAILBOX: usize = 256;

type Map = HashMap<String, i64>;
type Command = Box<dyn FnOnce(&mut Map) + Send>;

/// Message-passing shared map.
///
/// The map lives inside a single owner task. Every operation is a boxed
/// command sent over the mailbox and applied in arrival order, one at a time.
/// Reads carry a private oneshot for the reply.
#[derive(Clone)]
pub struct ActorState {
    mailbox: mpsc::Sender<Command>,
    signal: SignalQueue,
}

impl ActorState {
    /// Spawn the owner task. It stops when `signal` is raised or every handle is dropped.
    pub fn spawn(signal: &SignalQueue) -> Self {
        Self::spawn_with_mailbox(signal, DEFAULT_MAILBOX)
    }

    pub fn spawn_with_mailbox(signal: &SignalQueue, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        tokio::spawn(own(rx, signal.clone()));
        Self {
            mailbox: tx,
            signal: signal.clone(),
        }
    }

    /// Run `command` against the map on the owner task and return its result.
    ///
    /// Fails with `Cancelled` once the owner has stopped.
    pub async fn apply<R, C>(&self, command: C) -> Result<R, StrandError>
    where
        R: Send + 'static,
        C: FnOnce(&mut Map) -> R + Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Box::new(move |map| {
            let _ = reply_tx.send(command(map));
        }))
        .await?;

        match reply_rx.await {
            Ok(value) => Ok(value),
            Err(_) if self.signal.is_raised() => Err(StrandError::Cancelled),
            Err(_) => Err(StrandError::Internal(
                "state command dropped without a reply".into(),
            )),
        }
    }

    /// Returns `true` while the owner task accepts commands.
    pub fn is_running(&self) -> bool {
        !self.mailbox.is_closed() && !self.signal.is_raised()
    }

    async fn send(&self, command: Command) -> Result<(), StrandError> {
        tokio::select! {
            biased;
            _ = self.signal.observe() => Err(StrandError::Cancelled),
            sent = self.mailbox.send(command) => sent.map_err(|_| StrandError::Cancelled),
        }
    }
}

async fn own(mut mailbox: mpsc::Receiver<Command>, signal: SignalQueue) {
    let mut map = Map::new();
    debug!("state owner started");

    loop {
        let command = tokio::select! {
            biased;
            _ = signal.observe() => break,
            command = mailbox.recv() => match command {
                Some(command) => command,
                None => break,
            },
        };
        // A panicking command loses its own reply, not the owner.
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| command(&mut map))) {
            error!(reason = %panic_message(&*payload), "state command panicked");
        }
    }

    debug!(keys = map.len(), "state owner stopped");
}

#[async_trait]
impl SharedState for ActorState {
    async fn update(&self, key: &str, value: i64) -> Result<(), StrandError> {
        let key = key.to_string();
        // Enqueued in order: any later read from any caller sees this write.
        self.send(Box::new(move |map| {
            trace!(%key, value, "state mutated");
            map.insert(key, value);
        }))
        .await
    }

    async fn read(&self, key: &str) -> Result<Option<i64>, StrandError> {
        let key = key.to_string();
        self.apply(move |map| map.get(&key).copied()).await
    }

    async fn len(&self) -> Result<usize, StrandError> {
        self.apply(|map| map.len()).await
    }

    fn backend(&self) -> StateBackend {
        StateBackend::Actor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn apply_runs_custom_commands() {
        let signal = SignalQueue::new();
        let state = ActorState::spawn(&signal);

        state.update("hits", 1).await.unwrap();
        let bumped = state
            .apply(|map| {
                let hits = map.entry("hits".into()).or_insert(0);
                *hits += 41;
                *hits
            })
            .await
            .unwrap();

        assert_eq!(bumped, 42);
        assert_eq!(state.read("hits").await.unwrap(), Some(42));
    }

    #[tokio::test]
    async fn stops_when_signal_is_raised() {
        let signal = SignalQueue::new();
        let state = ActorState::spawn(&signal);
        assert!(state.is_running());

        signal.raise();
        assert!(!state.is_running());
        assert!(matches!(
            state.update("late", 1).await,
            Err(StrandError::Cancelled)
        ));
        assert!(matches!(state.read("late").await, Err(StrandError::Cancelled)));
    }

    #[tokio::test]
    async fn panicking_command_keeps_owner_alive() {
        let signal = SignalQueue::new();
        let state = ActorState::spawn(&signal);

        let failed = state
            .apply(|_map| -> i64 { panic!("bad command") })
            .await;
        assert!(matches!(failed, Err(StrandError::Internal(_))));

        state.update("ok", 1).await.unwrap();
        assert_eq!(state.read("ok").await.unwrap(), Some(1));
    }
}
