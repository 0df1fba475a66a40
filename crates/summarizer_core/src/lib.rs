//! Summarizer core: pure data model, retry policy and configuration.
mod config;
mod job;
mod outcome;
mod retry;

pub use config::Settings;
pub use job::Job;
pub use outcome::{
    BatchMetadata, BatchReport, ErrorCode, ErrorEntry, Outcome, OutcomeStatus, RateStats,
};
pub use retry::{delay_for_attempt, RetryPolicy};
