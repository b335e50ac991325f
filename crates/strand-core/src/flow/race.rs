use std::{future::Future, panic::AssertUnwindSafe};

use futures::{FutureExt, future::BoxFuture};
use strand_model::{ModelError, Stage};
use tokio::task::JoinSet;
use tracing::{debug, instrument, trace};

use crate::{
    error::{BoxError, StrandError, TaskFailure},
    panic::panic_message,
    signal::SignalQueue,
};

/// One replica to query. Receives the race's done signal and its own copy of the input.
pub type Searcher<I, O> =
    Box<dyn FnOnce(SignalQueue, I) -> BoxFuture<'static, Result<O, BoxError>> + Send>;

/// Box a closure as a [`Searcher`].
pub fn searcher<I, O, E, F, Fut>(f: F) -> Searcher<I, O>
where
    F: FnOnce(SignalQueue, I) -> Fut + Send + 'static,
    Fut: Future<Output = Result<O, E>> + Send + 'static,
    E: Into<BoxError>,
{
    Box::new(move |done, input| {
        f(done, input)
            .map(|res| res.map_err(Into::<BoxError>::into))
            .boxed()
    })
}

/// Run every searcher concurrently and return the first success.
///
/// The done signal handed to searchers is raised as soon as the race is
/// decided; losers are detached and expected to stop on it. When every
/// searcher fails, the last failure is returned.
#[instrument(level = "debug", skip_all, fields(searchers = searchers.len()))]
pub async fn first_success<I, O>(
    signal: &SignalQueue,
    input: I,
    searchers: Vec<Searcher<I, O>>,
) -> Result<O, StrandError>
where
    I: Clone + Send + 'static,
    O: Send + 'static,
{
    if searchers.is_empty() {
        return Err(ModelError::NoSearchers.into());
    }

    let done = signal.child();
    let _release = done.raise_on_drop();

    let mut set = JoinSet::new();
    for (idx, search) in searchers.into_iter().enumerate() {
        let work = search(done.clone(), input.clone());
        set.spawn(async move { (idx, AssertUnwindSafe(work).catch_unwind().await) });
    }

    let mut last = None;
    let result = loop {
        let joined = tokio::select! {
            biased;
            _ = signal.observe() => break Err(StrandError::Cancelled),
            joined = set.join_next() => joined,
        };
        let Some(joined) = joined else {
            break Err(last.unwrap_or_else(|| StrandError::Internal("no searcher reported".into())));
        };

        let err = match joined {
            Ok((idx, Ok(Ok(value)))) => {
                debug!(searcher = idx, "search won");
                break Ok(value);
            }
            Ok((idx, Ok(Err(err)))) => {
                StrandError::stage(Stage::Search(idx), TaskFailure::Error(err))
            }
            Ok((idx, Err(payload))) => StrandError::stage(
                Stage::Search(idx),
                TaskFailure::Panicked(panic_message(&*payload)),
            ),
            Err(join_err) => StrandError::Internal(join_err.to_string()),
        };
        trace!(error = %err, "searcher failed");
        last = Some(err);
    };

    done.raise();
    set.detach_all();
    result
}
