//! Rate-limited remote calls
//!
//! Every remote call goes through a [`RateLimitedCaller`], which:
//! - Spaces consecutive calls by a minimum interval, measured from the end of
//!   the previous call (retries included)
//! - Retries throttled (429) responses, honoring `Retry-After` when present
//! - Retries server errors (5xx) with exponential backoff
//! - Propagates every other error immediately
//!
//! All sleeps are cancellable through a shared [`CancellationToken`].

use crate::api::{ApiError, ApiResult};
use crate::config::CrawlerConfig;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Upper bound for a computed backoff delay
pub const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Wraps remote calls with spacing and bounded retries
#[derive(Debug)]
pub struct RateLimitedCaller {
    min_interval: Duration,
    max_retries: u32,
    backoff_base: Duration,
    last_call_end: Option<Instant>,
    cancel: CancellationToken,
}

impl RateLimitedCaller {
    pub fn new(
        min_interval: Duration,
        max_retries: u32,
        backoff_base: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            min_interval,
            max_retries,
            backoff_base,
            last_call_end: None,
            cancel,
        }
    }

    pub fn from_config(config: &CrawlerConfig, cancel: CancellationToken) -> Self {
        Self::new(
            Duration::from_millis(config.request_delay_ms),
            config.max_retries,
            Duration::from_millis(config.retry_backoff_ms),
            cancel,
        )
    }

    /// Backoff for the given zero-based attempt: `base * 2^attempt`, capped
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        if self.backoff_base.is_zero() {
            return Duration::ZERO;
        }
        2u32.checked_pow(attempt)
            .and_then(|factor| self.backoff_base.checked_mul(factor))
            .map(|delay| delay.min(MAX_BACKOFF))
            .unwrap_or(MAX_BACKOFF)
    }

    /// Runs `op`, retrying throttling and server errors
    ///
    /// `op` is invoked once per attempt. Throttled responses wait for their
    /// `Retry-After` when given; other retryable failures back off
    /// exponentially. Errors that are not retryable return at once.
    ///
    /// # Arguments
    ///
    /// * `op` - Produces the future for one attempt of the remote call
    ///
    /// # Returns
    ///
    /// * `Ok(T)` - The first successful response
    /// * `Err(ApiError::Cancelled)` - Shutdown was requested while waiting
    /// * `Err(ApiError)` - A non-retryable error, or the last error once
    ///   more than `max_retries` retryable failures have occurred
    ///
    /// # Example
    ///
    /// ```no_run
    /// use catalog_crawler::api::{ApiError, ApiResult};
    /// use catalog_crawler::crawler::RateLimitedCaller;
    /// use std::time::Duration;
    /// use tokio_util::sync::CancellationToken;
    ///
    /// # async fn example() -> ApiResult<()> {
    /// let mut caller = RateLimitedCaller::new(
    ///     Duration::from_millis(200),
    ///     5,
    ///     Duration::from_secs(1),
    ///     CancellationToken::new(),
    /// );
    /// let answer = caller.call(|| async { Ok::<_, ApiError>(42) }).await?;
    /// assert_eq!(answer, 42);
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call<T, F, Fut>(&mut self, mut op: F) -> ApiResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ApiResult<T>>,
    {
        let mut attempts: u32 = 0;

        loop {
            self.wait_for_interval().await?;

            let outcome = op().await;
            self.last_call_end = Some(Instant::now());

            let err = match outcome {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            let delay = match &err {
                ApiError::Throttled {
                    retry_after: Some(retry_after),
                } => *retry_after,
                _ => self.backoff_delay(attempts),
            };

            attempts += 1;
            if attempts > self.max_retries {
                tracing::error!(
                    "Remote request failed after {} retries ({}); giving up",
                    self.max_retries,
                    err
                );
                return Err(err);
            }

            tracing::warn!(
                "Remote request failed ({}); retry {}/{} in {:.1}s",
                err,
                attempts,
                self.max_retries,
                delay.as_secs_f64()
            );
            self.sleep(delay).await?;
        }
    }

    async fn wait_for_interval(&self) -> ApiResult<()> {
        if self.cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }
        let Some(last) = self.last_call_end else {
            return Ok(());
        };
        let elapsed = last.elapsed();
        if elapsed < self.min_interval {
            self.sleep(self.min_interval - elapsed).await?;
        }
        Ok(())
    }

    async fn sleep(&self, delay: Duration) -> ApiResult<()> {
        if delay.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(ApiError::Cancelled),
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }
}
