use std::{future::Future, time::Duration};

use tracing::debug;

use crate::error::StrandError;

/// Await `fut` for at most `limit`.
///
/// On timeout the future is dropped and `Timeout` (with no phase) is returned.
pub async fn time_limit<F>(limit: Duration, fut: F) -> Result<F::Output, StrandError>
where
    F: Future,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        debug!(?limit, "time limit elapsed");
        StrandError::Timeout {
            deadline: limit,
            phase: None,
        }
    })
}

#[cfg(test)]
mod tests {
    use tokio::time::{Instant, sleep};

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fast_future_completes() {
        let out = time_limit(Duration::from_millis(50), async {
            sleep(Duration::from_millis(10)).await;
            Ok::<_, std::io::Error>(7)
        })
        .await
        .unwrap();

        assert_eq!(out.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_future_times_out_at_limit() {
        let started = Instant::now();
        let err = time_limit(Duration::from_millis(50), sleep(Duration::from_secs(5)))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StrandError::Timeout {
                phase: None,
                ..
            }
        ));
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(50));
        assert!(elapsed < Duration::from_millis(60));
    }
}
