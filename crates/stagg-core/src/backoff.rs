//! Backoff policy for connection attempts.
//!
//! The kettle is battery powered and its radio often needs a few seconds
//! to come back after a failed connect. [`BackoffPolicy`] describes how
//! many transport connects a single session connect may make and how long
//! to wait between them.
//!
//! ```
//! use std::time::Duration;
//! use stagg_core::BackoffPolicy;
//!
//! let policy = BackoffPolicy::default();
//! assert_eq!(policy.max_attempts, 3);
//! assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
//! assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::{Error, Result};

/// Attempt limit and delay schedule for connecting.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Total transport connect calls per session connect (at least 1).
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Factor applied to the delay for each further attempt.
    pub multiplier: f64,
    /// Upper bound on any single delay.
    pub max_delay: Duration,
    /// Add up to 25% random jitter to each delay.
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: false,
        }
    }
}

impl BackoffPolicy {
    /// Create a policy with a custom attempt limit and default delays.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// A single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Longer schedule for kettles at the edge of radio range.
    pub fn patient() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }

    /// Set the attempt limit.
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the first delay.
    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the growth factor.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Set the delay cap.
    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Enable or disable jitter.
    #[must_use]
    pub fn jitter(mut self, enabled: bool) -> Self {
        self.jitter = enabled;
        self
    }

    /// Delay to wait after failed attempt number `attempt` (1-based).
    ///
    /// Attempt 1 failing waits `initial_delay`, attempt 2 failing waits
    /// `initial_delay * multiplier`, and so on, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = base.min(self.max_delay.as_secs_f64());

        let delay = if self.jitter {
            capped * (1.0 + rand::rng().random::<f64>() * 0.25)
        } else {
            capped
        };

        Duration::from_secs_f64(delay)
    }

    /// Check the policy for values that would never connect or never stop.
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(Error::invalid_config("max_attempts must be at least 1"));
        }
        if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            return Err(Error::invalid_config(format!(
                "multiplier must be a finite value >= 1.0, got {}",
                self.multiplier
            )));
        }
        if self.initial_delay > self.max_delay {
            return Err(Error::invalid_config(format!(
                "initial_delay ({:?}) must not exceed max_delay ({:?})",
                self.initial_delay, self.max_delay
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schedule() {
        let policy = BackoffPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_secs(8));
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = BackoffPolicy::default().max_delay(Duration::from_secs(5));
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(5));
    }

    #[test]
    fn test_jitter_stays_within_quarter() {
        let policy = BackoffPolicy::default().jitter(true);
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(1);
            assert!(delay >= Duration::from_secs(2));
            assert!(delay <= Duration::from_millis(2500));
        }
    }

    #[test]
    fn test_presets() {
        assert_eq!(BackoffPolicy::none().max_attempts, 1);
        assert_eq!(BackoffPolicy::new(7).max_attempts, 7);
        assert!(BackoffPolicy::patient().jitter);
        assert!(BackoffPolicy::patient().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        assert!(BackoffPolicy::new(0).validate().is_err());
        assert!(BackoffPolicy::default().multiplier(0.5).validate().is_err());
        assert!(
            BackoffPolicy::default()
                .multiplier(f64::NAN)
                .validate()
                .is_err()
        );
        assert!(
            BackoffPolicy::default()
                .initial_delay(Duration::from_secs(60))
                .validate()
                .is_err()
        );
    }
}
