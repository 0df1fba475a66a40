use std::sync::Arc;
use std::time::Duration;

use pipeline_logging::pipeline_warn;
use summarizer_core::RetryPolicy;

use crate::fetch::Fetcher;
use crate::types::{FetchError, FetchErrorKind, PageContent};

/// Terminal fetch failure after retries, with the attempt count that was
/// spent on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchFailure {
    pub error: FetchError,
    pub attempts: u32,
}

/// Wraps a fetch capability with bounded retries and capped exponential
/// backoff. Only classified-transient failures are retried; malformed URLs
/// and 4xx-equivalent responses fail fast.
#[derive(Clone)]
pub struct RetryingFetcher {
    inner: Arc<dyn Fetcher>,
    policy: RetryPolicy,
}

impl RetryingFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Fetches `url`, enforcing `timeout` per attempt.
    pub async fn fetch(&self, url: &str, timeout: Duration) -> Result<PageContent, FetchFailure> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match tokio::time::timeout(timeout, self.inner.fetch(url, timeout)).await
            {
                Ok(result) => result,
                Err(_) => Err(FetchError::new(
                    FetchErrorKind::Timeout,
                    format!("fetch timed out after {}s", timeout.as_secs()),
                )),
            };

            match result {
                Ok(page) => return Ok(page),
                Err(error) => {
                    if !error.kind.is_transient() || attempt >= self.policy.max_attempts {
                        return Err(FetchFailure { error, attempts: attempt });
                    }
                    let delay = self.policy.delay_for_attempt(attempt - 1);
                    pipeline_warn!(
                        "fetch attempt {attempt}/{} failed for {url}: {error}; retrying in {:?}",
                        self.policy.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
