use std::sync::Arc;
use std::time::Duration;

use pipeline_logging::{pipeline_info, pipeline_warn};
use serde::{Deserialize, Serialize};
use summarizer_core::{RetryPolicy, Settings};

use crate::governor::{RateGovernor, ResourceKind};
use crate::token::TokenEstimator;
use crate::types::{SummarizeError, SummarizeErrorKind, SummaryOutput};

/// Text-summarization capability (an LLM call in production).
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(
        &self,
        content: &str,
        title: Option<&str>,
    ) -> Result<SummaryOutput, SummarizeError>;
}

#[derive(Debug, Clone)]
pub struct HttpSummarizerSettings {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub request_timeout: Duration,
}

impl HttpSummarizerSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct SummarizeRequestBody<'a> {
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct SummarizeResponseBody {
    summary: String,
    #[serde(default)]
    tokens_used: u64,
}

/// Production summarizer client POSTing content to an HTTP summarization
/// endpoint and classifying upstream failures.
#[derive(Debug, Clone)]
pub struct HttpSummarizer {
    client: reqwest::Client,
    settings: HttpSummarizerSettings,
}

impl HttpSummarizer {
    pub fn new(settings: HttpSummarizerSettings) -> Result<Self, SummarizeError> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| SummarizeError::new(SummarizeErrorKind::Unknown, err.to_string()))?;
        Ok(Self { client, settings })
    }
}

#[async_trait::async_trait]
impl Summarizer for HttpSummarizer {
    async fn summarize(
        &self,
        content: &str,
        title: Option<&str>,
    ) -> Result<SummaryOutput, SummarizeError> {
        let mut request = self
            .client
            .post(&self.settings.endpoint)
            .json(&SummarizeRequestBody { content, title });
        if let Some(key) = &self.settings.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|err| {
            let kind = if err.is_timeout() || err.is_connect() {
                SummarizeErrorKind::Network
            } else {
                SummarizeErrorKind::Unknown
            };
            SummarizeError::new(kind, err.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|value| value.to_str().ok())
                .and_then(parse_retry_after);
            let body = response.text().await.unwrap_or_default();
            let kind = match status.as_u16() {
                429 => SummarizeErrorKind::RateLimited,
                403 => SummarizeErrorKind::QuotaExhausted,
                code if code >= 500 => SummarizeErrorKind::Network,
                _ => SummarizeErrorKind::InvalidInput,
            };
            return Err(
                SummarizeError::new(kind, format!("{status}: {body}"))
                    .with_retry_after(retry_after),
            );
        }

        let body: SummarizeResponseBody = response
            .json()
            .await
            .map_err(|err| SummarizeError::new(SummarizeErrorKind::Unknown, err.to_string()))?;
        if body.summary.trim().is_empty() {
            return Err(SummarizeError::new(
                SummarizeErrorKind::Unknown,
                "empty summary in response",
            ));
        }
        Ok(SummaryOutput {
            summary: body.summary,
            tokens_used: body.tokens_used,
        })
    }
}

/// Parses a Retry-After header value: either delay seconds or an HTTP date.
fn parse_retry_after(header: &str) -> Option<Duration> {
    if let Ok(seconds) = header.trim().parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    let date = chrono::DateTime::parse_from_rfc2822(header).ok()?;
    let diff = date.signed_duration_since(chrono::Utc::now());
    diff.to_std().ok()
}

/// Result of the retrying summarizer: either a generated summary or the
/// guaranteed degraded fallback after all attempts were spent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryResolution {
    Generated(SummaryOutput),
    Fallback {
        summary: String,
        error: SummarizeError,
        attempts: u32,
    },
}

/// Wraps a summarize capability with rate-budget admission, bounded retries
/// and a guaranteed-output fallback. Never fails the job outright:
/// exhausted retries degrade to truncated raw content and the job is marked
/// partial by the orchestrator.
#[derive(Clone)]
pub struct RetryingSummarizer {
    inner: Arc<dyn Summarizer>,
    governor: Arc<RateGovernor>,
    estimator: Arc<dyn TokenEstimator>,
    policy: RetryPolicy,
    reserve_deadline: Duration,
    max_content_chars: usize,
    response_token_margin: u64,
    fallback_max_chars: usize,
}

impl RetryingSummarizer {
    pub fn new(
        inner: Arc<dyn Summarizer>,
        governor: Arc<RateGovernor>,
        estimator: Arc<dyn TokenEstimator>,
        settings: &Settings,
    ) -> Self {
        Self {
            inner,
            governor,
            estimator,
            policy: settings.summarize_policy(),
            reserve_deadline: settings.reserve_deadline,
            max_content_chars: settings.max_content_chars,
            response_token_margin: settings.response_token_margin,
            fallback_max_chars: settings.fallback_max_chars,
        }
    }

    pub async fn summarize(
        &self,
        content: &str,
        title: Option<&str>,
        timeout: Duration,
    ) -> SummaryResolution {
        let capped = truncate_chars(content, self.max_content_chars);
        let estimate = self.estimator.estimate(capped) + self.response_token_margin;

        let mut attempt = 0;
        let last_error = loop {
            attempt += 1;

            // Admission control before touching the capability; both waits
            // share one deadline so a drained budget cannot stall the batch.
            let deadline = tokio::time::Instant::now() + self.reserve_deadline;
            let token_reservation = match tokio::time::timeout_at(
                deadline,
                self.governor.reserve(ResourceKind::Tokens, estimate),
            )
            .await
            {
                Ok(reservation) => reservation,
                Err(_) => break self.budget_exhausted(),
            };
            match tokio::time::timeout_at(
                deadline,
                self.governor.reserve(ResourceKind::Requests, 1),
            )
            .await
            {
                Ok(_request_reservation) => {}
                Err(_) => {
                    // The token grant must not linger in the window when no
                    // call was made.
                    self.governor.record(&token_reservation, 0).await;
                    break self.budget_exhausted();
                }
            }

            let result = match tokio::time::timeout(timeout, self.inner.summarize(capped, title))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(SummarizeError::new(
                    SummarizeErrorKind::Timeout,
                    format!("summarize timed out after {}s", timeout.as_secs()),
                )),
            };

            match result {
                Ok(output) => {
                    // Correct the a-priori estimate with the real count.
                    self.governor
                        .record(&token_reservation, output.tokens_used)
                        .await;
                    pipeline_info!(
                        "summarized {} chars in {attempt} attempt(s), {} tokens",
                        capped.len(),
                        output.tokens_used
                    );
                    return SummaryResolution::Generated(output);
                }
                Err(error) => {
                    self.governor.record(&token_reservation, 0).await;
                    if !error.kind.is_retryable() || attempt >= self.policy.max_attempts {
                        break error;
                    }
                    let mut delay = self.policy.delay_for_attempt(attempt - 1);
                    if let Some(hint) = error.retry_after {
                        delay = delay.max(hint);
                    }
                    pipeline_warn!(
                        "summarize attempt {attempt}/{} failed: {error}; retrying in {:?}",
                        self.policy.max_attempts,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        };

        pipeline_warn!(
            "summarization exhausted after {attempt} attempt(s): {last_error}; returning fallback content"
        );
        SummaryResolution::Fallback {
            summary: fallback_summary(content, self.fallback_max_chars),
            error: last_error,
            attempts: attempt,
        }
    }

    fn budget_exhausted(&self) -> SummarizeError {
        SummarizeError::new(
            SummarizeErrorKind::BudgetExhausted,
            format!(
                "rate budget not admitted within {}s",
                self.reserve_deadline.as_secs()
            ),
        )
    }
}

/// Degraded summary built from raw fetched content, bounded in length.
pub fn fallback_summary(content: &str, max_chars: usize) -> String {
    let truncated = truncate_chars(content, max_chars);
    if truncated.len() < content.len() {
        format!("{truncated}...")
    } else {
        truncated.to_string()
    }
}

/// Char-boundary-safe prefix of at most `max_chars` characters.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
