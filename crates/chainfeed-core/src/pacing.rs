//! Per-provider request pacing: minimum spacing between calls plus a
//! windowed request quota.

use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use governor::clock::{Clock, DefaultClock};
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};
use tracing::debug;

use crate::provider::ProviderError;

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Pacing parameters for one provider instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Minimum spacing between consecutive completed calls.
    pub min_interval: Duration,
    /// Window for the request quota.
    pub quota_window: Duration,
    /// Requests allowed per window.
    pub quota_limit: u32,
    /// Hard cap on how long `acquire` may suspend before surfacing a
    /// rate-limit error instead.
    pub max_wait: Duration,
}

impl PacingPolicy {
    /// Policy for an upstream limit expressed as requests per minute,
    /// with spacing derived from the limit.
    pub fn per_minute(limit: u32) -> Self {
        let safe_limit = limit.max(1);
        Self {
            min_interval: Duration::from_secs_f64(60.0 / f64::from(safe_limit)),
            quota_window: Duration::from_secs(60),
            quota_limit: safe_limit,
            max_wait: Duration::from_secs(120),
        }
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }
}

/// Gate every provider network call passes through.
///
/// `acquire` suspends the caller until both the spacing and quota
/// budgets allow a call (a delayed caller is never dropped); waits
/// beyond the policy's hard cap surface as a rate-limit error. The
/// spacing reference point is the last *completed* call, recorded via
/// `record_call`, so a failed attempt never delays its own retry.
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Arc<DirectRateLimiter>,
    clock: DefaultClock,
    last_call: Arc<Mutex<Option<Instant>>>,
    policy: PacingPolicy,
}

impl RequestPacer {
    pub fn new(policy: PacingPolicy) -> Self {
        let quota = quota_from_window(policy.quota_window, policy.quota_limit);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota)),
            clock: DefaultClock::default(),
            last_call: Arc::new(Mutex::new(None)),
            policy,
        }
    }

    pub fn policy(&self) -> PacingPolicy {
        self.policy
    }

    /// Delay still owed to the minimum-spacing rule.
    pub fn spacing_delay(&self) -> Duration {
        let last = self
            .last_call
            .lock()
            .expect("pacer last-call lock should not be poisoned");
        last.map(|at| self.policy.min_interval.saturating_sub(at.elapsed()))
            .unwrap_or(Duration::ZERO)
    }

    /// Waits until a call may be issued, or fails with a rate-limit
    /// error when the required wait exceeds the hard cap.
    pub async fn acquire(&self) -> Result<(), ProviderError> {
        let spacing = self.spacing_delay();
        if spacing > self.policy.max_wait {
            return Err(ProviderError::rate_limited(format!(
                "required pacing delay {}ms exceeds cap {}ms",
                spacing.as_millis(),
                self.policy.max_wait.as_millis()
            )));
        }
        if !spacing.is_zero() {
            debug!(delay_ms = spacing.as_millis() as u64, "pacing: spacing delay");
            tokio::time::sleep(spacing).await;
        }

        let mut waited = spacing;
        loop {
            match self.limiter.check() {
                Ok(()) => return Ok(()),
                Err(not_until) => {
                    let delay = not_until
                        .wait_time_from(self.clock.now())
                        .max(Duration::from_millis(1));
                    if waited + delay > self.policy.max_wait {
                        return Err(ProviderError::rate_limited(format!(
                            "request quota exhausted; wait {}ms exceeds cap {}ms",
                            (waited + delay).as_millis(),
                            self.policy.max_wait.as_millis()
                        )));
                    }
                    debug!(delay_ms = delay.as_millis() as u64, "pacing: quota delay");
                    tokio::time::sleep(delay).await;
                    waited += delay;
                }
            }
        }
    }

    /// Records a completed call as the new spacing reference point.
    /// Callers invoke this only after the network call succeeds.
    pub fn record_call(&self) {
        let mut last = self
            .last_call
            .lock()
            .expect("pacer last-call lock should not be poisoned");
        *last = Some(Instant::now());
    }
}

fn quota_from_window(quota_window: Duration, quota_limit: u32) -> Quota {
    let safe_limit = quota_limit.max(1);
    let burst = NonZeroU32::new(safe_limit).expect("safe limit must be non-zero");

    let seconds_per_cell = (quota_window.as_secs_f64() / f64::from(safe_limit)).max(0.001);
    let period = Duration::from_secs_f64(seconds_per_cell);

    Quota::with_period(period)
        .expect("period is always greater than zero")
        .allow_burst(burst)
}
