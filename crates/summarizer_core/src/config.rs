use std::env;
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Configuration knobs consumed by the pipeline.
///
/// Numeric tuning values (safety margin, backoff constants) are operational
/// settings, not hard-coded invariants.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Maximum URLs accepted per batch call; extra URLs are dropped.
    pub max_urls_per_batch: usize,
    pub max_tokens_per_minute: u64,
    pub max_requests_per_minute: u64,
    /// Fraction of the configured ceilings actually admitted (e.g. 0.9).
    pub safety_margin: f64,
    /// Trailing window length for rate accounting.
    pub rate_window: Duration,
    /// Upper bound on one admission re-check sleep.
    pub rate_poll_interval: Duration,
    /// How long a job may wait for rate budget before giving up.
    pub reserve_deadline: Duration,
    /// Simultaneous fetch+summarize pipelines.
    pub max_concurrent_jobs: usize,
    pub default_timeout_per_url: Duration,
    pub min_timeout_per_url: Duration,
    pub max_timeout_per_url: Duration,
    /// Fetch retries after the first attempt.
    pub crawl_max_retries: u32,
    /// Total summarize attempts, including the first one.
    pub summarize_max_attempts: u32,
    pub fetch_base_delay: Duration,
    pub summarize_base_delay: Duration,
    pub max_backoff: Duration,
    /// Content sent to the summarizer is capped to this many characters.
    pub max_content_chars: usize,
    /// Token margin added to the estimate for the model response.
    pub response_token_margin: u64,
    /// Length of the degraded summary built from raw content.
    pub fallback_max_chars: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_urls_per_batch: 10,
            max_tokens_per_minute: 4_000_000,
            max_requests_per_minute: 4_000,
            safety_margin: 0.9,
            rate_window: Duration::from_secs(60),
            rate_poll_interval: Duration::from_secs(1),
            reserve_deadline: Duration::from_secs(120),
            max_concurrent_jobs: 5,
            default_timeout_per_url: Duration::from_secs(30),
            min_timeout_per_url: Duration::from_secs(10),
            max_timeout_per_url: Duration::from_secs(120),
            crawl_max_retries: 2,
            summarize_max_attempts: 10,
            fetch_base_delay: Duration::from_secs(1),
            summarize_base_delay: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
            max_content_chars: 50_000,
            response_token_margin: 500,
            fallback_max_chars: 1_000,
        }
    }
}

impl Settings {
    /// Loads settings from environment variables, falling back to defaults
    /// for unset or unparsable values.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_urls_per_batch: env_usize("MAX_URLS_PER_REQUEST", defaults.max_urls_per_batch),
            max_tokens_per_minute: env_u64(
                "MAX_TOKENS_PER_MINUTE",
                defaults.max_tokens_per_minute,
            ),
            max_requests_per_minute: env_u64(
                "MAX_REQUESTS_PER_MINUTE",
                defaults.max_requests_per_minute,
            ),
            max_concurrent_jobs: env_usize("MAX_CONCURRENT_REQUESTS", defaults.max_concurrent_jobs),
            default_timeout_per_url: Duration::from_secs(env_u64(
                "CRAWL_TIMEOUT_SECONDS",
                defaults.default_timeout_per_url.as_secs(),
            )),
            crawl_max_retries: env_u32("CRAWL_MAX_RETRIES", defaults.crawl_max_retries),
            summarize_max_attempts: env_u32(
                "SUMMARIZE_MAX_ATTEMPTS",
                defaults.summarize_max_attempts,
            ),
            ..defaults
        }
    }

    /// Retry policy for fetch attempts: configured retries plus the first try.
    pub fn fetch_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.crawl_max_retries + 1,
            self.fetch_base_delay,
            self.max_backoff,
        )
    }

    /// Retry policy for summarize attempts.
    pub fn summarize_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.summarize_max_attempts,
            self.summarize_base_delay,
            self.max_backoff,
        )
    }

    /// Clamps a requested per-URL timeout to the configured bounds.
    pub fn clamp_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .unwrap_or(self.default_timeout_per_url)
            .clamp(self.min_timeout_per_url, self.max_timeout_per_url)
    }
}

fn env_u64(name: &str, default: u64) -> u64 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(name: &str, default: u32) -> u32 {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_clamped_to_bounds() {
        let settings = Settings::default();
        assert_eq!(
            settings.clamp_timeout(None),
            settings.default_timeout_per_url
        );
        assert_eq!(
            settings.clamp_timeout(Some(Duration::from_secs(1))),
            settings.min_timeout_per_url
        );
        assert_eq!(
            settings.clamp_timeout(Some(Duration::from_secs(600))),
            settings.max_timeout_per_url
        );
    }

    #[test]
    fn fetch_policy_counts_first_attempt() {
        let settings = Settings::default();
        assert_eq!(settings.fetch_policy().max_attempts, 3);
        assert_eq!(settings.summarize_policy().max_attempts, 10);
    }
}
