//! Reconnect policy for the realtime link.

use crate::protocol::{DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_INTERVAL_MS};
use rand::Rng;
use std::time::Duration;

/// Delay growth between reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// Same delay before every attempt.
    Fixed,
    /// Delay doubles per attempt up to `max`, scaled by a random factor in
    /// `[1 - jitter, 1]`.
    Exponential { max: Duration, jitter: f64 },
}

/// Configuration for reconnect behavior.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectConfig {
    /// Consecutive failures tolerated before giving up.
    pub max_attempts: u32,
    /// Base delay before a reconnect attempt.
    pub interval: Duration,
    pub backoff: Backoff,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            interval: Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            backoff: Backoff::Fixed,
        }
    }
}

impl ReconnectConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn with_exponential_backoff(mut self, max: Duration, jitter: f64) -> Self {
        self.backoff = Backoff::Exponential {
            max,
            jitter: jitter.clamp(0.0, 1.0),
        };
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    Retry(Duration),
    GiveUp,
}

/// Consecutive-failure counter. Reset on every successful open.
#[derive(Debug, Clone)]
pub struct ReconnectState {
    pub failures: u32,
    config: ReconnectConfig,
}

impl ReconnectState {
    pub fn new(config: ReconnectConfig) -> Self {
        Self {
            failures: 0,
            config,
        }
    }

    pub fn config(&self) -> &ReconnectConfig {
        &self.config
    }

    /// Record one failed or dropped connection and decide what follows.
    pub fn on_failure(&mut self) -> RetryDecision {
        self.failures = self.failures.saturating_add(1);
        if self.failures >= self.config.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::Retry(self.delay_for(self.failures))
    }

    fn delay_for(&self, failures: u32) -> Duration {
        match &self.config.backoff {
            Backoff::Fixed => self.config.interval,
            Backoff::Exponential { max, jitter } => {
                let exp = failures.saturating_sub(1).min(16);
                let base = self.config.interval.saturating_mul(1u32 << exp);
                let capped = std::cmp::min(base, *max);
                if *jitter > 0.0 {
                    let factor = rand::thread_rng().gen_range((1.0 - jitter)..=1.0);
                    capped.mul_f64(factor)
                } else {
                    capped
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.interval, Duration::from_millis(3000));
        assert_eq!(config.backoff, Backoff::Fixed);
    }

    #[test]
    fn test_fixed_interval_until_bound() {
        let mut state = ReconnectState::new(ReconnectConfig::default().with_max_attempts(3));
        assert_eq!(
            state.on_failure(),
            RetryDecision::Retry(Duration::from_millis(3000))
        );
        assert_eq!(
            state.on_failure(),
            RetryDecision::Retry(Duration::from_millis(3000))
        );
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
        assert_eq!(state.failures, 3);
    }

    #[test]
    fn test_reset_restores_budget() {
        let mut state = ReconnectState::new(ReconnectConfig::default().with_max_attempts(1));
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
        state.reset();
        assert_eq!(state.failures, 0);
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn test_no_retry_gives_up_immediately() {
        let mut state = ReconnectState::new(ReconnectConfig::no_retry());
        assert_eq!(state.on_failure(), RetryDecision::GiveUp);
    }

    #[test]
    fn test_exponential_is_capped() {
        let config = ReconnectConfig::default()
            .with_max_attempts(10)
            .with_interval(Duration::from_millis(100))
            .with_exponential_backoff(Duration::from_millis(500), 0.0);
        let mut state = ReconnectState::new(config);
        let delays: Vec<_> = (0..5)
            .map(|_| match state.on_failure() {
                RetryDecision::Retry(d) => d.as_millis(),
                RetryDecision::GiveUp => 0,
            })
            .collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500]);
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = ReconnectConfig::default()
            .with_max_attempts(10)
            .with_interval(Duration::from_millis(1000))
            .with_exponential_backoff(Duration::from_secs(10), 0.5);
        let mut state = ReconnectState::new(config);
        match state.on_failure() {
            RetryDecision::Retry(d) => {
                assert!(d >= Duration::from_millis(500));
                assert!(d <= Duration::from_millis(1000));
            }
            RetryDecision::GiveUp => panic!("should retry"),
        }
    }
}
