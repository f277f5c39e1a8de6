//! Sliding-window rate limiter for outbound API calls.
//!
//! Tracks the instants of granted calls within `window`. The only state
//! shared between concurrent fetches, so the check-and-record step runs under
//! a mutex, and the mutex is released before any sleep.

use std::collections::VecDeque;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Slack added to computed waits so the oldest call has surely left the window.
const WAIT_BUFFER: Duration = Duration::from_millis(100);

/// Outcome of a single check-and-record step.
enum Slot {
    Granted,
    /// Over budget; the oldest call leaves the window after this long.
    Wait(Duration),
}

pub struct RateLimiter {
    max_calls: usize,
    window: Duration,
    calls: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Allow at most `max_calls` calls per `window`.
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            window,
            calls: Mutex::new(VecDeque::with_capacity(max_calls)),
        }
    }

    /// `max_calls` per minute.
    pub fn per_minute(max_calls: usize) -> Self {
        Self::new(max_calls, Duration::from_secs(60))
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Wait for a call slot.
    ///
    /// With `timeout = None` waits as long as needed. Otherwise returns
    /// `false` (denied) without sleeping once the required wait would exceed
    /// the remaining timeout. A denial is transient: the caller may retry.
    pub async fn acquire(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            let wait = match self.check_and_record().await {
                Slot::Granted => return true,
                Slot::Wait(wait) => wait,
            };

            if let Some(deadline) = deadline {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if wait > remaining {
                    warn!(
                        wait_ms = wait.as_millis() as u64,
                        remaining_ms = remaining.as_millis() as u64,
                        "Rate limit wait exceeds timeout, denying call"
                    );
                    return false;
                }
            }

            debug!(wait_ms = wait.as_millis() as u64, "Rate limit reached, waiting");
            tokio::time::sleep(wait).await;
        }
    }

    /// Take a slot only if one is free right now.
    pub async fn try_acquire(&self) -> bool {
        match self.check_and_record().await {
            Slot::Granted => true,
            Slot::Wait(_) => {
                warn!(
                    max_calls = self.max_calls,
                    window_secs = self.window.as_secs_f64(),
                    "Rate limit exceeded"
                );
                false
            }
        }
    }

    /// Calls recorded within the current window.
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;
        self.prune(&mut calls, now);
        calls.len()
    }

    async fn check_and_record(&self) -> Slot {
        let now = Instant::now();
        let mut calls = self.calls.lock().await;
        self.prune(&mut calls, now);

        if calls.len() < self.max_calls {
            calls.push_back(now);
            return Slot::Granted;
        }

        let oldest = calls.front().copied().unwrap_or(now);
        let elapsed = now.saturating_duration_since(oldest);
        Slot::Wait(self.window.saturating_sub(elapsed) + WAIT_BUFFER)
    }

    fn prune(&self, calls: &mut VecDeque<Instant>, now: Instant) {
        while calls
            .front()
            .is_some_and(|oldest| now.saturating_duration_since(*oldest) > self.window)
        {
            calls.pop_front();
        }
    }
}
