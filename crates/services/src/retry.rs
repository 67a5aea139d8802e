use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Fixed-delay bounded retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_millis(1_000),
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt, no waiting.
    #[must_use]
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Run `op` until it succeeds, fails with an error `retryable` rejects, or
    /// the attempt budget is spent. Returns the last error on exhaustion.
    ///
    /// # Errors
    ///
    /// Returns the error of the final attempt.
    pub async fn run<T, E, F, Fut>(
        &self,
        what: &str,
        mut op: F,
        retryable: impl Fn(&E) -> bool,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts && retryable(&err) => {
                    warn!(what, attempt, attempts, error = %err, "read failed, retrying");
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
