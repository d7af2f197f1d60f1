use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// How an external call ended without producing a value of its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupted {
    TimedOut(u64),
    Cancelled,
}

/// Per-call timeout plus a shared cancellation token, applied to every
/// request made to the model or search backends.
#[derive(Debug, Clone)]
pub struct CallPolicy {
    timeout: Duration,
    cancel: CancellationToken,
}

impl CallPolicy {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub async fn run<F, T>(&self, call: F) -> Result<T, Interrupted>
    where
        F: Future<Output = T>,
    {
        if self.cancel.is_cancelled() {
            return Err(Interrupted::Cancelled);
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Interrupted::Cancelled),
            out = tokio::time::timeout(self.timeout, call) => {
                out.map_err(|_| Interrupted::TimedOut(self.timeout.as_secs()))
            }
        }
    }
}

impl Default for CallPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(120), CancellationToken::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_completes_within_timeout() {
        let policy = CallPolicy::default();
        assert_eq!(policy.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out() {
        let policy = CallPolicy::new(Duration::from_secs(2), CancellationToken::new());
        let out = policy
            .run(tokio::time::sleep(Duration::from_secs(60)))
            .await;
        assert_eq!(out, Err(Interrupted::TimedOut(2)));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        let policy = CallPolicy::new(Duration::from_secs(5), token.clone());
        token.cancel();
        let out = policy.run(async { 1 }).await;
        assert_eq!(out, Err(Interrupted::Cancelled));
    }
}
