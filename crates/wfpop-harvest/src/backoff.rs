//! Cooldown policy between harvest units.
//!
//! Upstream quotas are respected by sleeping between units. How long depends
//! on what the previous unit did: a steady pacing delay after success, an
//! escalating cooldown after consecutive failures, and a fixed long cooldown
//! after a rate-limit rejection.

use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use wfpop_core::Platform;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after a successful unit.
    pub pacing: Duration,
    /// Upper bound of the uniform random delay added to `pacing`.
    pub jitter: Duration,
    /// Delay after the first failed unit in a row.
    pub failure_cooldown: Duration,
    /// Factor applied per additional consecutive failure.
    pub escalation_multiplier: f64,
    /// Ceiling for the escalated failure cooldown.
    pub max_cooldown: Duration,
    /// Delay after the upstream rejected a unit for rate or quota.
    pub rate_limit_cooldown: Duration,
    /// How many times a throttled unit is re-fetched before moving on.
    pub max_retries: u32,
}

impl BackoffPolicy {
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        match platform {
            Platform::Youtube => Self {
                pacing: Duration::from_millis(500),
                jitter: Duration::ZERO,
                failure_cooldown: Duration::from_secs(2),
                escalation_multiplier: 2.0,
                max_cooldown: Duration::from_secs(60),
                rate_limit_cooldown: Duration::from_secs(60),
                max_retries: 1,
            },
            Platform::Forum => Self {
                pacing: Duration::from_secs(1),
                jitter: Duration::ZERO,
                failure_cooldown: Duration::from_secs(5),
                escalation_multiplier: 2.0,
                max_cooldown: Duration::from_secs(120),
                rate_limit_cooldown: Duration::from_secs(60),
                max_retries: 1,
            },
            // Trends has no published quota and blocks aggressive clients.
            Platform::Google => Self {
                pacing: Duration::from_secs(15),
                jitter: Duration::from_secs(10),
                failure_cooldown: Duration::from_secs(60),
                escalation_multiplier: 2.0,
                max_cooldown: Duration::from_secs(600),
                rate_limit_cooldown: Duration::from_secs(120),
                max_retries: 1,
            },
        }
    }

    /// Steady-state delay: `pacing` plus a uniform draw from `[0, jitter]`.
    #[must_use]
    pub fn pacing_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.pacing;
        }
        let extra_ms = rand::rng().random_range(0..=duration_ms(self.jitter));
        self.pacing + Duration::from_millis(extra_ms)
    }

    /// Cooldown after `consecutive_failures` failed units in a row (>= 1).
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn failure_delay(&self, consecutive_failures: u32) -> Duration {
        let cap = self.max_cooldown.max(self.failure_cooldown);
        let exponent = i32::try_from(consecutive_failures.saturating_sub(1)).unwrap_or(i32::MAX);
        let factor = self.escalation_multiplier.max(1.0).powi(exponent);
        let scaled_ms = duration_ms(self.failure_cooldown) as f64 * factor;
        if !scaled_ms.is_finite() || scaled_ms >= duration_ms(cap) as f64 {
            return cap;
        }
        Duration::from_millis(scaled_ms.round() as u64)
    }

    #[must_use]
    pub fn rate_limit_delay(&self) -> Duration {
        self.rate_limit_cooldown
    }
}

fn duration_ms(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Suspension point used for every cooldown, so tests can observe delays
/// without real time passing.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
