//! Summarizer engine: rate governance, bounded retries and batch orchestration.
mod batch;
mod fetch;
mod governor;
mod retry;
mod slots;
mod summary;
mod token;
mod types;

pub use batch::{BatchError, BatchRequest, Pipeline};
pub use fetch::{FetchSettings, Fetcher, HttpFetcher};
pub use governor::{RateGovernor, Reservation, ResourceKind};
pub use retry::{FetchFailure, RetryingFetcher};
pub use slots::{ConcurrencyLimiter, JobSlot};
pub use summary::{
    fallback_summary, HttpSummarizer, HttpSummarizerSettings, RetryingSummarizer,
    SummaryResolution, Summarizer,
};
pub use token::{CharsPerTokenEstimator, TokenEstimator};
pub use types::{
    FetchError, FetchErrorKind, PageContent, SummarizeError, SummarizeErrorKind, SummaryOutput,
};
