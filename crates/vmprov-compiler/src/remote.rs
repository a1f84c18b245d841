use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;
use vmprov_core::error::StageError;

/// Uniform budget for every remote-bound call. No retries: repeating a
/// not-found or timed-out lookup is the caller's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemotePolicy {
    timeout: Duration,
}

impl RemotePolicy {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run one remote call bounded by the budget and the caller's token.
    ///
    /// Transport errors are flattened into `StageError::Remote`; the raw
    /// error never crosses the stage boundary.
    pub async fn call<T, E, F>(
        &self,
        token: &CancellationToken,
        operation: &'static str,
        fut: F,
    ) -> Result<T, StageError>
    where
        E: Display,
        F: Future<Output = Result<T, E>>,
    {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                warn!(operation, "remote call cancelled");
                Err(StageError::Cancelled)
            }
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(e)) => {
                    warn!(operation, error = %e, "remote call failed");
                    Err(StageError::Remote(e.to_string()))
                }
                Err(_) => {
                    warn!(operation, timeout = ?self.timeout, "remote call timed out");
                    Err(StageError::Timeout(self.timeout))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_passes_value_through() {
        let policy = RemotePolicy::new(Duration::from_secs(1));
        let token = CancellationToken::new();
        let v = policy
            .call(&token, "noop", async { Ok::<_, String>(7) })
            .await
            .unwrap();
        assert_eq!(v, 7);
    }

    #[tokio::test]
    async fn test_call_flattens_transport_error() {
        let policy = RemotePolicy::new(Duration::from_secs(1));
        let token = CancellationToken::new();
        let err = policy
            .call(&token, "noop", async { Err::<(), _>("connection reset") })
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Remote("connection reset".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_times_out() {
        let policy = RemotePolicy::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        let err = policy
            .call(&token, "slow", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Timeout(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_call_observes_prior_cancellation() {
        let policy = RemotePolicy::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        token.cancel();
        let err = policy
            .call(&token, "noop", async { Ok::<_, String>(1) })
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_observes_cancellation_in_flight() {
        let policy = RemotePolicy::new(Duration::from_secs(60));
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            canceller.cancel();
        });
        let err = policy
            .call(&token, "slow", async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok::<_, String>(())
            })
            .await
            .unwrap_err();
        assert_eq!(err, StageError::Cancelled);
    }
}
