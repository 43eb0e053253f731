use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

use crate::error::Result;

/// Bounded retry with linear backoff for calls to external backends.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    /// Runs `f` until it succeeds or `max_retries` extra attempts have failed.
    /// The closure receives the zero-based attempt number.
    pub async fn retry<F, Fut, T>(&self, context: &str, mut f: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            match f(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.max_retries => {
                    tracing::warn!(%context, attempt, error = %err, "retrying after failure");
                    attempt += 1;
                    sleep(self.backoff * attempt).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::error::AgentError;

    #[tokio::test]
    async fn retries_until_success() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let res = policy
            .retry("test", |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 1 {
                        Err(AgentError::LanguageModel("fail".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(res.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let policy = RetryPolicy {
            max_retries: 2,
            backoff: Duration::from_millis(1),
        };
        let calls = AtomicU32::new(0);

        let res: Result<()> = policy
            .retry("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AgentError::LanguageModel("down".into())) }
            })
            .await;

        assert!(matches!(res, Err(AgentError::LanguageModel(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn none_makes_a_single_attempt() {
        let calls = AtomicU32::new(0);

        let res: Result<()> = RetryPolicy::none()
            .retry("test", |attempt| {
                assert_eq!(attempt, 0);
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(AgentError::LanguageModel("down".into())) }
            })
            .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
