//! Request pacing
//!
//! Two primitives: a global rate limiter enforcing a minimum spacing between
//! outbound requests, and an adaptive controller that widens the spacing
//! after failures.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

/// Configuration for the global rate limiter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Minimum spacing between request releases, across all callers
    pub min_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(250),
        }
    }
}

impl RateLimiterConfig {
    /// Create a config with the given minimum interval
    pub fn new(min_interval: Duration) -> Self {
        Self { min_interval }
    }
}

/// Global minimum-interval rate limiter shared by all workers.
///
/// `wait()` blocks until at least `min_interval` has elapsed since the
/// previous release, measured across every caller. The first call never
/// blocks. A zero interval disables pacing entirely.
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Option<Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>>,
}

impl RateLimiter {
    /// Create a rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let limiter = Quota::with_period(config.min_interval).map(|quota| {
            // Burst of one: consecutive releases can never be closer than
            // the configured interval.
            let one = NonZeroU32::new(1).expect("1 is non-zero");
            Arc::new(Governor::direct(quota.allow_burst(one)))
        });
        Self { limiter }
    }

    /// Wait until the next request may be released
    pub async fn wait(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Check whether a request could be released immediately
    pub fn check(&self) -> bool {
        match &self.limiter {
            Some(limiter) => limiter.check().is_ok(),
            None => true,
        }
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

// ============================================================================
// Adaptive backoff controller
// ============================================================================

/// Configuration for the adaptive pacing controller
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffControllerConfig {
    /// Delay after a clean run
    pub base_delay: Duration,
    /// Multiplier applied per reported error
    pub factor: f64,
    /// Upper bound for the delay
    pub max_delay: Duration,
}

impl Default for BackoffControllerConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(60),
        }
    }
}

/// Error-driven inter-page delay controller.
///
/// Each reported error multiplies the current delay by the configured
/// factor, capped at the maximum; a reported success resets it to the base.
/// Owned by a single strategy walk, so no internal synchronization.
#[derive(Debug, Clone)]
pub struct BackoffController {
    config: BackoffControllerConfig,
    current: Duration,
}

impl BackoffController {
    /// Create a controller starting at the base delay
    pub fn new(config: BackoffControllerConfig) -> Self {
        let current = config.base_delay;
        Self { config, current }
    }

    /// The delay currently in effect
    pub fn current_delay(&self) -> Duration {
        self.current
    }

    /// Record a failure; widens the delay and returns the new value
    pub fn report_error(&mut self) -> Duration {
        self.current = self
            .current
            .mul_f64(self.config.factor)
            .min(self.config.max_delay);
        self.current
    }

    /// Record a success; resets the delay to the base
    pub fn report_success(&mut self) {
        self.current = self.config.base_delay;
    }
}

impl Default for BackoffController {
    fn default() -> Self {
        Self::new(BackoffControllerConfig::default())
    }
}
