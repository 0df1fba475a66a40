use std::fmt;

use serde::Serialize;

/// Terminal status of one URL job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    /// Fetch succeeded but summarization degraded to fallback content.
    Partial,
    Failed,
}

/// Machine-readable error code surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidUrl,
    CrawlTimeout,
    CrawlError,
    RateLimitExceeded,
    TokenLimitExceeded,
    NetworkError,
    UnknownError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCode::InvalidUrl => "INVALID_URL",
            ErrorCode::CrawlTimeout => "CRAWL_TIMEOUT",
            ErrorCode::CrawlError => "CRAWL_ERROR",
            ErrorCode::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            ErrorCode::TokenLimitExceeded => "TOKEN_LIMIT_EXCEEDED",
            ErrorCode::NetworkError => "NETWORK_ERROR",
            ErrorCode::UnknownError => "UNKNOWN_ERROR",
        };
        write!(f, "{name}")
    }
}

/// Immutable terminal result of one URL job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outcome {
    pub url: String,
    pub title: Option<String>,
    pub status: OutcomeStatus,
    pub summary: Option<String>,
    pub tokens_used: u64,
    pub processing_time_ms: u64,
    pub error_code: Option<ErrorCode>,
    pub error_message: Option<String>,
}

impl Outcome {
    /// Builds a successful outcome with a generated summary.
    pub fn success(
        url: String,
        title: Option<String>,
        summary: String,
        tokens_used: u64,
        processing_time_ms: u64,
    ) -> Self {
        Self {
            url,
            title,
            status: OutcomeStatus::Success,
            summary: Some(summary),
            tokens_used,
            processing_time_ms,
            error_code: None,
            error_message: None,
        }
    }

    /// Builds a partial outcome carrying fallback content and the error
    /// that exhausted summarization.
    pub fn partial(
        url: String,
        title: Option<String>,
        fallback: String,
        processing_time_ms: u64,
        error_code: ErrorCode,
        error_message: String,
    ) -> Self {
        Self {
            url,
            title,
            status: OutcomeStatus::Partial,
            summary: Some(fallback),
            tokens_used: 0,
            processing_time_ms,
            error_code: Some(error_code),
            error_message: Some(error_message),
        }
    }

    /// Builds a failed outcome with no summary.
    pub fn failed(
        url: String,
        title: Option<String>,
        processing_time_ms: u64,
        error_code: ErrorCode,
        error_message: String,
    ) -> Self {
        Self {
            url,
            title,
            status: OutcomeStatus::Failed,
            summary: None,
            tokens_used: 0,
            processing_time_ms,
            error_code: Some(error_code),
            error_message: Some(error_message),
        }
    }
}

/// Aggregate counters for one batch call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchMetadata {
    pub total_requested: usize,
    pub total_processed: usize,
    pub total_succeeded: usize,
    pub total_failed: usize,
    pub total_partial: usize,
    pub total_tokens_used: u64,
    pub total_processing_time_ms: u64,
}

/// Error listing entry for non-success outcomes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorEntry {
    pub url: String,
    pub error: String,
    pub error_code: ErrorCode,
}

/// Snapshot of rate-governor usage at batch completion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RateStats {
    pub tokens_used: u64,
    pub tokens_limit: u64,
    pub tokens_percent: f64,
    pub requests_used: u64,
    pub requests_limit: u64,
    pub requests_percent: f64,
}

/// Structured document returned by the batch entry point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    pub summaries: Vec<Outcome>,
    pub metadata: BatchMetadata,
    pub errors: Vec<ErrorEntry>,
    pub rate_limit_stats: RateStats,
}

impl BatchReport {
    /// Assembles the report from ordered outcomes and a governor snapshot.
    pub fn from_outcomes(
        total_requested: usize,
        outcomes: Vec<Outcome>,
        total_processing_time_ms: u64,
        rate_limit_stats: RateStats,
    ) -> Self {
        let total_processed = outcomes.len();
        let total_succeeded = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Success)
            .count();
        let total_failed = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
            .count();
        let total_partial = outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Partial)
            .count();
        let total_tokens_used = outcomes.iter().map(|o| o.tokens_used).sum();

        let errors = outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Success)
            .map(|o| ErrorEntry {
                url: o.url.clone(),
                error: o
                    .error_message
                    .clone()
                    .unwrap_or_else(|| "unknown error".to_string()),
                error_code: o.error_code.unwrap_or(ErrorCode::UnknownError),
            })
            .collect();

        Self {
            summaries: outcomes,
            metadata: BatchMetadata {
                total_requested,
                total_processed,
                total_succeeded,
                total_failed,
                total_partial,
                total_tokens_used,
                total_processing_time_ms,
            },
            errors,
            rate_limit_stats,
        }
    }

    /// Serializes the report as pretty-printed JSON.
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| "{}".to_string())
    }
}
