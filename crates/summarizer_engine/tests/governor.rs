use std::time::Duration;

use summarizer_core::Settings;
use summarizer_engine::{RateGovernor, ResourceKind};
use tokio::time::Instant;

fn settings(tokens: u64, requests: u64) -> Settings {
    Settings {
        max_tokens_per_minute: tokens,
        max_requests_per_minute: requests,
        ..Settings::default()
    }
}

#[tokio::test(start_paused = true)]
async fn admits_within_budget_without_waiting() {
    let governor = RateGovernor::new(&settings(1_000, 100));

    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 500).await;
    governor.reserve(ResourceKind::Tokens, 400).await;
    assert_eq!(before.elapsed(), Duration::ZERO);

    let stats = governor.stats().await;
    assert_eq!(stats.tokens_used, 900);
    assert_eq!(stats.tokens_limit, 900);
    assert_eq!(stats.tokens_percent, 100.0);
}

#[tokio::test(start_paused = true)]
async fn blocks_until_window_drains() {
    let governor = RateGovernor::new(&settings(1_000, 100));
    governor.reserve(ResourceKind::Tokens, 900).await;

    // Budget is full; the next reservation must wait for the 60s window.
    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 100).await;
    assert!(before.elapsed() >= Duration::from_secs(59));

    let stats = governor.stats().await;
    assert_eq!(stats.tokens_used, 100);
}

#[tokio::test(start_paused = true)]
async fn oversized_reservation_admits_on_empty_window() {
    let governor = RateGovernor::new(&settings(1_000, 100));

    // Larger than the whole budget, but the window is empty: admit as a
    // single-item reservation instead of blocking forever.
    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 5_000).await;
    assert_eq!(before.elapsed(), Duration::ZERO);

    // A competing reservation now has to wait for the full drain.
    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 10).await;
    assert!(before.elapsed() >= Duration::from_secs(59));
}

#[tokio::test(start_paused = true)]
async fn record_corrects_the_estimate() {
    let governor = RateGovernor::new(&settings(1_000, 100));

    let reservation = governor.reserve(ResourceKind::Tokens, 800).await;
    assert_eq!(governor.stats().await.tokens_used, 800);

    governor.record(&reservation, 100).await;
    assert_eq!(governor.stats().await.tokens_used, 100);

    // Freed budget admits new work immediately.
    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 700).await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn kinds_are_tracked_independently() {
    let governor = RateGovernor::new(&settings(1_000, 10));

    for _ in 0..9 {
        governor.reserve(ResourceKind::Requests, 1).await;
    }
    // Token budget is untouched by request reservations.
    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 900).await;
    assert_eq!(before.elapsed(), Duration::ZERO);

    let stats = governor.stats().await;
    assert_eq!(stats.requests_used, 9);
    assert_eq!(stats.requests_limit, 9);
    assert_eq!(stats.tokens_used, 900);
}

#[tokio::test(start_paused = true)]
async fn reset_clears_both_windows() {
    let governor = RateGovernor::new(&settings(1_000, 100));
    governor.reserve(ResourceKind::Tokens, 900).await;
    governor.reserve(ResourceKind::Requests, 5).await;

    governor.reset().await;

    let stats = governor.stats().await;
    assert_eq!(stats.tokens_used, 0);
    assert_eq!(stats.requests_used, 0);

    let before = Instant::now();
    governor.reserve(ResourceKind::Tokens, 900).await;
    assert_eq!(before.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn window_sum_never_exceeds_budget_under_contention() {
    let governor = std::sync::Arc::new(RateGovernor::new(&settings(1_000, 1_000)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let governor = governor.clone();
        handles.push(tokio::spawn(async move {
            for _ in 0..3 {
                governor.reserve(ResourceKind::Tokens, 200).await;
            }
        }));
    }
    for handle in handles {
        handle.await.expect("reserver task");
    }

    // Every admission decision was checked against the budget, so the final
    // window can exceed it by at most one in-flight amount.
    let stats = governor.stats().await;
    assert!(stats.tokens_used <= 900 + 200);
}
