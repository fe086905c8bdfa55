//! Exponential backoff with additive jitter.
//!
//! Each call to [`Backoff::next`] returns the current base delay plus a jitter
//! sampled uniformly from `[jitter_min, jitter_max]`, then multiplies the base
//! by `factor` for the following call, capped at `max`. The jitter is added
//! after capping and is not capped itself.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::ConfigError;

#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Base delay for the first retry and after every reset
    pub start: Duration,
    /// Ceiling for the base delay
    pub max: Duration,
    /// Lower bound of the jitter added to every delay
    pub jitter_min: Duration,
    /// Upper bound of the jitter added to every delay
    pub jitter_max: Duration,
    /// Multiplier applied to the base delay after every call to `next`
    pub factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            start: Duration::from_secs(1),
            max: Duration::from_secs(30),
            jitter_min: Duration::from_millis(200),
            jitter_max: Duration::from_secs(1),
            factor: 2.0,
        }
    }
}

impl BackoffConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.start > self.max {
            return Err(ConfigError::StartExceedsMax {
                start_ms: self.start.as_millis(),
                max_ms: self.max.as_millis(),
            });
        }
        if self.jitter_min > self.jitter_max {
            return Err(ConfigError::JitterRange {
                min_ms: self.jitter_min.as_millis(),
                max_ms: self.jitter_max.as_millis(),
            });
        }
        if !self.factor.is_finite() || self.factor < 1.0 {
            return Err(ConfigError::Factor(self.factor));
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Backoff {
    config: BackoffConfig,
    current: Duration,
    rng: StdRng,
}

impl Backoff {
    pub fn new(config: BackoffConfig) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::from_rng(&mut rand::rng()))
    }

    /// Deterministic jitter, for reproducible tests.
    pub fn with_seed(config: BackoffConfig, seed: u64) -> Result<Self, ConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: BackoffConfig, rng: StdRng) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            current: config.start,
            config,
            rng,
        })
    }

    /// Delay to wait before the next retry.
    pub fn next(&mut self) -> Duration {
        let jitter = self
            .rng
            .random_range(self.config.jitter_min..=self.config.jitter_max);
        let delay = self.current + jitter;

        let grown = Duration::try_from_secs_f64(self.current.as_secs_f64() * self.config.factor)
            .unwrap_or(self.config.max);
        self.current = grown.min(self.config.max);

        delay
    }

    pub fn reset(&mut self) {
        self.current = self.config.start;
    }

    /// Base delay (without jitter) the next call to [`Backoff::next`] will use.
    pub fn current(&self) -> Duration {
        self.current
    }

    pub fn config(&self) -> &BackoffConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BackoffConfig {
        BackoffConfig {
            start: Duration::from_millis(100),
            max: Duration::from_millis(1000),
            jitter_min: Duration::from_millis(10),
            jitter_max: Duration::from_millis(50),
            factor: 2.0,
        }
    }

    #[test]
    fn test_delays_stay_in_range() {
        let mut backoff = Backoff::with_seed(config(), 7).unwrap();
        for _ in 0..50 {
            let delay = backoff.next();
            assert!(delay >= Duration::from_millis(110), "{delay:?}");
            assert!(delay <= Duration::from_millis(1050), "{delay:?}");
        }
    }

    #[test]
    fn test_base_grows_then_caps() {
        let mut backoff = Backoff::with_seed(config(), 1).unwrap();
        let mut bases = Vec::new();
        for _ in 0..6 {
            bases.push(backoff.current());
            backoff.next();
        }

        let expected: Vec<Duration> = [100, 200, 400, 800, 1000, 1000]
            .into_iter()
            .map(Duration::from_millis)
            .collect();
        assert_eq!(bases, expected);
    }

    #[test]
    fn test_first_delay_uses_start_base() {
        let mut backoff = Backoff::with_seed(config(), 3).unwrap();
        let delay = backoff.next();
        assert!(delay >= Duration::from_millis(110));
        assert!(delay <= Duration::from_millis(150));
    }

    #[test]
    fn test_reset_restores_start() {
        let mut backoff = Backoff::with_seed(config(), 9).unwrap();
        for _ in 0..4 {
            backoff.next();
        }
        assert_eq!(backoff.current(), Duration::from_millis(1000));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_millis(100));
        let delay = backoff.next();
        assert!(delay <= Duration::from_millis(150));
    }

    #[test]
    fn test_fixed_jitter() {
        let mut backoff = Backoff::with_seed(
            BackoffConfig {
                jitter_min: Duration::from_millis(20),
                jitter_max: Duration::from_millis(20),
                ..config()
            },
            0,
        )
        .unwrap();
        assert_eq!(backoff.next(), Duration::from_millis(120));
        assert_eq!(backoff.next(), Duration::from_millis(220));
    }

    #[test]
    fn test_factor_one_keeps_constant_base() {
        let mut backoff = Backoff::with_seed(
            BackoffConfig {
                factor: 1.0,
                ..config()
            },
            0,
        )
        .unwrap();
        backoff.next();
        backoff.next();
        assert_eq!(backoff.current(), Duration::from_millis(100));
    }

    #[test]
    fn test_invalid_configs_are_rejected() {
        let err = Backoff::new(BackoffConfig {
            start: Duration::from_secs(5),
            max: Duration::from_secs(1),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::StartExceedsMax { .. }));

        let err = Backoff::new(BackoffConfig {
            jitter_min: Duration::from_millis(60),
            ..config()
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::JitterRange { .. }));

        let err = Backoff::new(BackoffConfig {
            factor: 0.5,
            ..config()
        })
        .unwrap_err();
        assert_eq!(err, ConfigError::Factor(0.5));

        assert!(Backoff::new(BackoffConfig {
            factor: f64::NAN,
            ..config()
        })
        .is_err());
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(BackoffConfig::default().validate().is_ok());
    }
}
