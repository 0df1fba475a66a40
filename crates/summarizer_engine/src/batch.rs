use std::sync::Arc;
use std::time::Duration;

use pipeline_logging::{pipeline_error, pipeline_info, pipeline_warn};
use summarizer_core::{BatchReport, ErrorCode, Job, Outcome, Settings};
use tokio::time::Instant;

use crate::fetch::Fetcher;
use crate::governor::RateGovernor;
use crate::retry::RetryingFetcher;
use crate::slots::ConcurrencyLimiter;
use crate::summary::{RetryingSummarizer, SummaryResolution, Summarizer};
use crate::token::CharsPerTokenEstimator;

/// One batch submission: an ordered URL list with optional parallel titles.
#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub urls: Vec<String>,
    pub titles: Option<Vec<String>>,
    pub timeout_per_url: Option<Duration>,
    pub max_urls: Option<usize>,
}

impl BatchRequest {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            ..Self::default()
        }
    }
}

/// Rejection of a whole batch before any job runs. Per-job failures never
/// surface here; they become failed outcomes inside the report.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("at least one URL is required")]
    EmptyBatch,
    #[error("titles list length ({titles}) must match urls list length ({urls})")]
    TitleMismatch { titles: usize, urls: usize },
}

/// Orchestrates a batch of URL jobs: one concurrent task per job, bounded by
/// the slot limiter, with per-job isolation and input-order results.
#[derive(Clone)]
pub struct Pipeline {
    fetcher: RetryingFetcher,
    summarizer: RetryingSummarizer,
    governor: Arc<RateGovernor>,
    slots: ConcurrencyLimiter,
    settings: Settings,
}

impl Pipeline {
    pub fn new(
        settings: Settings,
        fetcher: Arc<dyn Fetcher>,
        summarizer: Arc<dyn Summarizer>,
        governor: Arc<RateGovernor>,
    ) -> Self {
        Self {
            fetcher: RetryingFetcher::new(fetcher, settings.fetch_policy()),
            summarizer: RetryingSummarizer::new(
                summarizer,
                governor.clone(),
                Arc::new(CharsPerTokenEstimator::default()),
                &settings,
            ),
            governor,
            slots: ConcurrencyLimiter::new(settings.max_concurrent_jobs),
            settings,
        }
    }

    pub fn governor(&self) -> &Arc<RateGovernor> {
        &self.governor
    }

    /// Runs every job to a terminal state and assembles the report.
    ///
    /// The returned outcome order equals the input URL order regardless of
    /// completion order, and one job's failure never aborts its siblings.
    pub async fn run(&self, request: BatchRequest) -> Result<BatchReport, BatchError> {
        if request.urls.is_empty() {
            return Err(BatchError::EmptyBatch);
        }
        if let Some(titles) = &request.titles {
            if titles.len() != request.urls.len() {
                return Err(BatchError::TitleMismatch {
                    titles: titles.len(),
                    urls: request.urls.len(),
                });
            }
        }

        let cap = request
            .max_urls
            .map_or(self.settings.max_urls_per_batch, |m| {
                m.min(self.settings.max_urls_per_batch)
            })
            .max(1);
        if request.urls.len() > cap {
            pipeline_warn!(
                "limiting batch from {} to {cap} URLs",
                request.urls.len()
            );
        }
        let timeout = self.settings.clamp_timeout(request.timeout_per_url);

        let jobs: Vec<Job> = request
            .urls
            .iter()
            .take(cap)
            .enumerate()
            .map(|(index, url)| {
                let title = request
                    .titles
                    .as_ref()
                    .and_then(|titles| titles.get(index).cloned());
                Job::new(url.clone(), title, timeout)
            })
            .collect();
        let total_requested = jobs.len();
        pipeline_info!("processing {total_requested} URLs with timeout {}s", timeout.as_secs());

        let started = Instant::now();
        let mut handles = Vec::with_capacity(jobs.len());
        for job in jobs {
            let worker = self.clone();
            let identity = (job.url.clone(), job.title.clone());
            handles.push((identity, tokio::spawn(async move { worker.process_job(job).await })));
        }

        // Awaiting handles in submission order keeps the report ordered by
        // input regardless of which job finishes first.
        let mut outcomes = Vec::with_capacity(handles.len());
        for ((url, title), handle) in handles {
            match handle.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(err) => {
                    pipeline_error!("job task for {url} died: {err}");
                    outcomes.push(Outcome::failed(
                        url,
                        title,
                        0,
                        ErrorCode::UnknownError,
                        format!("job task failed: {err}"),
                    ));
                }
            }
        }

        let report = BatchReport::from_outcomes(
            total_requested,
            outcomes,
            started.elapsed().as_millis() as u64,
            self.governor.stats().await,
        );
        pipeline_info!(
            "batch finished: {} succeeded, {} partial, {} failed",
            report.metadata.total_succeeded,
            report.metadata.total_partial,
            report.metadata.total_failed
        );
        Ok(report)
    }

    /// Drives one job through fetch and summarize to a terminal outcome.
    async fn process_job(&self, job: Job) -> Outcome {
        let started = Instant::now();
        let _slot = self.slots.acquire().await;

        let page = match self.fetcher.fetch(&job.url, job.timeout).await {
            Ok(page) => page,
            Err(failure) => {
                pipeline_warn!(
                    "fetch failed for {} after {} attempt(s): {}",
                    job.url,
                    failure.attempts,
                    failure.error
                );
                return Outcome::failed(
                    job.url,
                    job.title,
                    started.elapsed().as_millis() as u64,
                    failure.error.kind.error_code(),
                    failure.error.to_string(),
                );
            }
        };

        let title = job.title.or(page.title);
        match self
            .summarizer
            .summarize(&page.content, title.as_deref(), job.timeout)
            .await
        {
            SummaryResolution::Generated(output) => Outcome::success(
                job.url,
                title,
                output.summary,
                output.tokens_used,
                started.elapsed().as_millis() as u64,
            ),
            SummaryResolution::Fallback {
                summary,
                error,
                attempts,
            } => {
                pipeline_warn!(
                    "summarization for {} degraded to fallback after {attempts} attempt(s)",
                    job.url
                );
                Outcome::partial(
                    job.url,
                    title,
                    summary,
                    started.elapsed().as_millis() as u64,
                    error.kind.error_code(),
                    error.to_string(),
                )
            }
        }
    }
}
