use std::collections::VecDeque;
use std::time::Duration;

use pipeline_logging::pipeline_warn;
use summarizer_core::{RateStats, Settings};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Resource kind tracked by the governor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Tokens,
    Requests,
}

/// Handle for a granted reservation, used to correct the estimated amount
/// once actual consumption is known.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    kind: ResourceKind,
    id: u64,
    pub granted_at: Instant,
}

#[derive(Debug)]
struct WindowEvent {
    at: Instant,
    amount: u64,
    id: u64,
}

#[derive(Debug)]
struct RateWindow {
    events: VecDeque<WindowEvent>,
    /// Admission budget: configured ceiling scaled by the safety margin.
    budget: u64,
}

impl RateWindow {
    fn new(ceiling: u64, safety_margin: f64) -> Self {
        Self {
            events: VecDeque::new(),
            budget: (ceiling as f64 * safety_margin) as u64,
        }
    }

    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(front) = self.events.front() {
            if now.duration_since(front.at) >= window {
                self.events.pop_front();
            } else {
                break;
            }
        }
    }

    fn sum(&self) -> u64 {
        self.events.iter().map(|e| e.amount).sum()
    }

    /// Time until the oldest event leaves the window, if any.
    fn next_expiry(&self, now: Instant, window: Duration) -> Option<Duration> {
        self.events
            .front()
            .map(|front| window.saturating_sub(now.duration_since(front.at)))
    }
}

#[derive(Debug)]
struct GovernorState {
    tokens: RateWindow,
    requests: RateWindow,
    next_id: u64,
}

impl GovernorState {
    fn window_mut(&mut self, kind: ResourceKind) -> &mut RateWindow {
        match kind {
            ResourceKind::Tokens => &mut self.tokens,
            ResourceKind::Requests => &mut self.requests,
        }
    }
}

/// Admission-control primitive enforcing trailing-window token and request
/// budgets. One instance is created at service start and injected into the
/// pipeline; state is shared by every concurrent job.
#[derive(Debug)]
pub struct RateGovernor {
    state: Mutex<GovernorState>,
    window: Duration,
    poll_interval: Duration,
}

impl RateGovernor {
    pub fn new(settings: &Settings) -> Self {
        Self {
            state: Mutex::new(GovernorState {
                tokens: RateWindow::new(settings.max_tokens_per_minute, settings.safety_margin),
                requests: RateWindow::new(
                    settings.max_requests_per_minute,
                    settings.safety_margin,
                ),
                next_id: 0,
            }),
            window: settings.rate_window,
            poll_interval: settings.rate_poll_interval,
        }
    }

    /// Blocks the calling task until admitting `amount` keeps the trailing
    /// window sum within budget, then records the reservation.
    ///
    /// An amount larger than the budget itself is admitted once the window
    /// fully drains, so oversized single reservations are never blocked
    /// forever.
    pub async fn reserve(&self, kind: ResourceKind, amount: u64) -> Reservation {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let window_len = self.window;
                let window = state.window_mut(kind);
                window.prune(now, window_len);
                let sum = window.sum();
                if sum + amount <= window.budget || window.events.is_empty() {
                    let id = state.next_id;
                    state.next_id += 1;
                    state.window_mut(kind).events.push_back(WindowEvent {
                        at: now,
                        amount,
                        id,
                    });
                    return Reservation {
                        kind,
                        id,
                        granted_at: now,
                    };
                }
                let wait = window
                    .next_expiry(now, window_len)
                    .unwrap_or(self.poll_interval);
                pipeline_warn!(
                    "rate budget full ({kind:?}: {sum} + {amount} > {}); waiting {:?}",
                    window.budget,
                    wait
                );
                wait
            };
            // Re-check on a short poll so adjusted reservations free budget
            // earlier than the next expiry would.
            tokio::time::sleep(wait.min(self.poll_interval).max(Duration::from_millis(10))).await;
        }
    }

    /// Adjusts a previously granted reservation to the actually consumed
    /// amount. A reservation that already left the window is ignored.
    pub async fn record(&self, reservation: &Reservation, actual: u64) {
        let mut state = self.state.lock().await;
        let window = state.window_mut(reservation.kind);
        if let Some(event) = window.events.iter_mut().find(|e| e.id == reservation.id) {
            event.amount = actual;
        }
    }

    /// Snapshot of current window sums and percentages used.
    pub async fn stats(&self) -> RateStats {
        let mut state = self.state.lock().await;
        let now = Instant::now();
        state.tokens.prune(now, self.window);
        state.requests.prune(now, self.window);

        let tokens_used = state.tokens.sum();
        let tokens_limit = state.tokens.budget;
        let requests_used = state.requests.sum();
        let requests_limit = state.requests.budget;

        RateStats {
            tokens_used,
            tokens_limit,
            tokens_percent: percent(tokens_used, tokens_limit),
            requests_used,
            requests_limit,
            requests_percent: percent(requests_used, requests_limit),
        }
    }

    /// Clears both windows. Intended for tests and service teardown.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.tokens.events.clear();
        state.requests.events.clear();
    }
}

fn percent(used: u64, limit: u64) -> f64 {
    if limit == 0 {
        0.0
    } else {
        used as f64 / limit as f64 * 100.0
    }
}
