use std::fmt;
use std::time::Duration;

use summarizer_core::ErrorCode;

/// Raw page content handed from the fetch stage to the summarize stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageContent {
    pub content: String,
    pub title: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchError {
    pub kind: FetchErrorKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchErrorKind {
    InvalidUrl,
    Timeout,
    Connection,
    /// Crash of the underlying rendering backend (headless browser class).
    BrowserCrash,
    HttpStatus(u16),
    TooManyRedirects,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Unknown,
}

impl FetchErrorKind {
    /// Whether another fetch attempt may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchErrorKind::Timeout
            | FetchErrorKind::Connection
            | FetchErrorKind::BrowserCrash
            | FetchErrorKind::Unknown => true,
            FetchErrorKind::HttpStatus(code) => *code == 429 || *code >= 500,
            FetchErrorKind::InvalidUrl
            | FetchErrorKind::TooManyRedirects
            | FetchErrorKind::TooLarge { .. }
            | FetchErrorKind::UnsupportedContentType { .. } => false,
        }
    }

    /// Maps the fetch failure to the caller-facing error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            FetchErrorKind::InvalidUrl => ErrorCode::InvalidUrl,
            FetchErrorKind::Timeout => ErrorCode::CrawlTimeout,
            FetchErrorKind::Connection => ErrorCode::NetworkError,
            FetchErrorKind::BrowserCrash
            | FetchErrorKind::HttpStatus(_)
            | FetchErrorKind::TooManyRedirects
            | FetchErrorKind::TooLarge { .. }
            | FetchErrorKind::UnsupportedContentType { .. } => ErrorCode::CrawlError,
            FetchErrorKind::Unknown => ErrorCode::UnknownError,
        }
    }
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchErrorKind::InvalidUrl => write!(f, "invalid url"),
            FetchErrorKind::Timeout => write!(f, "timeout"),
            FetchErrorKind::Connection => write!(f, "connection error"),
            FetchErrorKind::BrowserCrash => write!(f, "browser crash"),
            FetchErrorKind::HttpStatus(code) => write!(f, "http status {code}"),
            FetchErrorKind::TooManyRedirects => write!(f, "redirect limit exceeded"),
            FetchErrorKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FetchErrorKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FetchErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}

/// Successful summarization result from the capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryOutput {
    pub summary: String,
    pub tokens_used: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeError {
    pub kind: SummarizeErrorKind,
    pub message: String,
    /// Upstream back-off hint, when the capability reported one.
    pub retry_after: Option<Duration>,
}

impl SummarizeError {
    pub fn new(kind: SummarizeErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

impl fmt::Display for SummarizeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummarizeErrorKind {
    RateLimited,
    QuotaExhausted,
    /// Content unusable for summarization (too short, too large, rejected).
    InvalidInput,
    Network,
    /// One capability call exceeded the per-attempt timeout.
    Timeout,
    /// Rate budget could not be admitted before the reserve deadline.
    BudgetExhausted,
    Unknown,
}

impl SummarizeErrorKind {
    /// Whether another summarize attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SummarizeErrorKind::RateLimited
            | SummarizeErrorKind::QuotaExhausted
            | SummarizeErrorKind::Network
            | SummarizeErrorKind::Timeout
            | SummarizeErrorKind::Unknown => true,
            SummarizeErrorKind::InvalidInput | SummarizeErrorKind::BudgetExhausted => false,
        }
    }

    /// Maps the summarize failure to the caller-facing error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            SummarizeErrorKind::RateLimited
            | SummarizeErrorKind::QuotaExhausted
            | SummarizeErrorKind::BudgetExhausted => ErrorCode::RateLimitExceeded,
            SummarizeErrorKind::InvalidInput => ErrorCode::TokenLimitExceeded,
            SummarizeErrorKind::Network | SummarizeErrorKind::Timeout => ErrorCode::NetworkError,
            SummarizeErrorKind::Unknown => ErrorCode::UnknownError,
        }
    }
}

impl fmt::Display for SummarizeErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SummarizeErrorKind::RateLimited => write!(f, "rate limited"),
            SummarizeErrorKind::QuotaExhausted => write!(f, "quota exhausted"),
            SummarizeErrorKind::InvalidInput => write!(f, "invalid input"),
            SummarizeErrorKind::Network => write!(f, "network error"),
            SummarizeErrorKind::Timeout => write!(f, "timeout"),
            SummarizeErrorKind::BudgetExhausted => write!(f, "rate budget exhausted"),
            SummarizeErrorKind::Unknown => write!(f, "unknown error"),
        }
    }
}
