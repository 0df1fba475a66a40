use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use summarizer_core::Settings;
use summarizer_engine::{
    fallback_summary, CharsPerTokenEstimator, RateGovernor, ResourceKind, RetryingSummarizer,
    SummarizeError, SummarizeErrorKind, Summarizer, SummaryOutput, SummaryResolution,
};

/// Fails the first `fail_first` calls with the given kind, then succeeds.
struct FlakySummarizer {
    calls: AtomicU32,
    fail_first: u32,
    kind: SummarizeErrorKind,
}

impl FlakySummarizer {
    fn new(fail_first: u32, kind: SummarizeErrorKind) -> Self {
        Self {
            calls: AtomicU32::new(0),
            fail_first,
            kind,
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Summarizer for FlakySummarizer {
    async fn summarize(
        &self,
        _content: &str,
        _title: Option<&str>,
    ) -> Result<SummaryOutput, SummarizeError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.fail_first {
            Err(SummarizeError::new(self.kind, "stub failure"))
        } else {
            Ok(SummaryOutput {
                summary: "a concise summary".to_string(),
                tokens_used: 123,
            })
        }
    }
}

fn wrap(
    stub: Arc<dyn Summarizer>,
    settings: &Settings,
) -> (RetryingSummarizer, Arc<RateGovernor>) {
    let governor = Arc::new(RateGovernor::new(settings));
    let summarizer = RetryingSummarizer::new(
        stub,
        governor.clone(),
        Arc::new(CharsPerTokenEstimator::default()),
        settings,
    );
    (summarizer, governor)
}

#[tokio::test(start_paused = true)]
async fn succeeds_on_the_tenth_attempt_within_budget() {
    let settings = Settings::default();
    let stub = Arc::new(FlakySummarizer::new(9, SummarizeErrorKind::RateLimited));
    let (summarizer, governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;

    assert_eq!(stub.calls(), 10);
    match resolution {
        SummaryResolution::Generated(output) => {
            assert_eq!(output.summary, "a concise summary");
            assert_eq!(output.tokens_used, 123);
        }
        other => panic!("expected generated summary, got {other:?}"),
    }

    // Failed attempts were corrected to zero tokens; the successful one
    // was corrected to the actual count.
    let stats = governor.stats().await;
    assert_eq!(stats.tokens_used, 123);
}

#[tokio::test(start_paused = true)]
async fn first_attempt_success_records_actual_usage() {
    let settings = Settings::default();
    let stub = Arc::new(FlakySummarizer::new(0, SummarizeErrorKind::Unknown));
    let (summarizer, governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;
    assert!(matches!(resolution, SummaryResolution::Generated(_)));

    let stats = governor.stats().await;
    assert_eq!(stats.tokens_used, 123);
    assert_eq!(stats.requests_used, 1);
}

#[tokio::test(start_paused = true)]
async fn quota_exhaustion_degrades_to_truncated_fallback() {
    let settings = Settings {
        fallback_max_chars: 10,
        ..Settings::default()
    };
    let content = "0123456789 the rest of the article";
    let stub = Arc::new(FlakySummarizer::new(
        u32::MAX,
        SummarizeErrorKind::QuotaExhausted,
    ));
    let (summarizer, _governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize(content, Some("Title"), Duration::from_secs(30))
        .await;

    assert_eq!(stub.calls(), 10);
    match resolution {
        SummaryResolution::Fallback {
            summary,
            error,
            attempts,
        } => {
            assert_eq!(summary, fallback_summary(content, 10));
            assert_eq!(error.kind, SummarizeErrorKind::QuotaExhausted);
            assert_eq!(attempts, 10);
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn invalid_input_is_not_retried() {
    let settings = Settings::default();
    let stub = Arc::new(FlakySummarizer::new(
        u32::MAX,
        SummarizeErrorKind::InvalidInput,
    ));
    let (summarizer, _governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize("tiny", None, Duration::from_secs(30))
        .await;

    assert_eq!(stub.calls(), 1);
    match resolution {
        SummaryResolution::Fallback { error, attempts, .. } => {
            assert_eq!(error.kind, SummarizeErrorKind::InvalidInput);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_overrides_a_shorter_backoff() {
    let settings = Settings {
        summarize_max_attempts: 2,
        ..Settings::default()
    };
    let stub = Arc::new(HintingSummarizer {
        calls: AtomicU32::new(0),
    });
    let (summarizer, _governor) = wrap(stub.clone(), &settings);

    let before = tokio::time::Instant::now();
    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;

    // Default base backoff is 5s; the stub asked for 30s.
    assert!(before.elapsed() >= Duration::from_secs(30));
    assert!(matches!(resolution, SummaryResolution::Generated(_)));
}

struct HintingSummarizer {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl Summarizer for HintingSummarizer {
    async fn summarize(
        &self,
        _content: &str,
        _title: Option<&str>,
    ) -> Result<SummaryOutput, SummarizeError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(
                SummarizeError::new(SummarizeErrorKind::RateLimited, "slow down")
                    .with_retry_after(Some(Duration::from_secs(30))),
            )
        } else {
            Ok(SummaryOutput {
                summary: "done".to_string(),
                tokens_used: 5,
            })
        }
    }
}

#[tokio::test(start_paused = true)]
async fn drained_budget_past_deadline_stops_attempts() {
    let settings = Settings {
        max_tokens_per_minute: 10,
        reserve_deadline: Duration::from_secs(5),
        ..Settings::default()
    };
    let stub = Arc::new(FlakySummarizer::new(0, SummarizeErrorKind::Unknown));
    let (summarizer, governor) = wrap(stub.clone(), &settings);

    // Occupy the token window so the estimate cannot be admitted before
    // the reserve deadline elapses.
    governor.reserve(ResourceKind::Tokens, 9).await;

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;

    assert_eq!(stub.calls(), 0);
    match resolution {
        SummaryResolution::Fallback { error, attempts, .. } => {
            assert_eq!(error.kind, SummarizeErrorKind::BudgetExhausted);
            assert_eq!(attempts, 1);
        }
        other => panic!("expected fallback, got {other:?}"),
    }
}

/// Never returns within any reasonable per-attempt timeout.
struct StalledSummarizer {
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl Summarizer for StalledSummarizer {
    async fn summarize(
        &self,
        _content: &str,
        _title: Option<&str>,
    ) -> Result<SummaryOutput, SummarizeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn stalled_summarizer_is_cut_off_per_attempt() {
    let settings = Settings {
        summarize_max_attempts: 2,
        ..Settings::default()
    };
    let stub = Arc::new(StalledSummarizer {
        calls: AtomicU32::new(0),
    });
    let (summarizer, governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;

    // Both attempts ran and were abandoned at the 30s mark.
    assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    match resolution {
        SummaryResolution::Fallback { error, attempts, .. } => {
            assert_eq!(error.kind, SummarizeErrorKind::Timeout);
            assert_eq!(attempts, 2);
        }
        other => panic!("expected fallback, got {other:?}"),
    }

    // Abandoned calls were corrected to zero tokens.
    assert_eq!(governor.stats().await.tokens_used, 0);
}

#[tokio::test(start_paused = true)]
async fn cancelled_reserve_returns_token_budget() {
    // Request budget of one: the second job's request reserve can never be
    // admitted before its deadline, after the first job spent the window.
    let settings = Settings {
        max_requests_per_minute: 2,
        reserve_deadline: Duration::from_secs(5),
        ..Settings::default()
    };
    let stub = Arc::new(FlakySummarizer::new(0, SummarizeErrorKind::Unknown));
    let (summarizer, governor) = wrap(stub.clone(), &settings);

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;
    assert!(matches!(resolution, SummaryResolution::Generated(_)));

    let resolution = summarizer
        .summarize("some article text", None, Duration::from_secs(30))
        .await;
    match resolution {
        SummaryResolution::Fallback { error, .. } => {
            assert_eq!(error.kind, SummarizeErrorKind::BudgetExhausted);
        }
        other => panic!("expected fallback, got {other:?}"),
    }
    assert_eq!(stub.calls(), 1);

    // The second job's token grant was given back when its request reserve
    // hit the deadline; only the first call's actual usage remains.
    assert_eq!(governor.stats().await.tokens_used, 123);
}
