use crate::core::{Result, SyncError};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Token bucket configuration for one route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketConfig {
    /// Maximum number of tokens the bucket can hold.
    capacity: u32,
    /// Tokens available to a key seen for the first time.
    initial_tokens: u32,
    /// Tokens added per second of elapsed time.
    refill_rate: f64,
}

impl BucketConfig {
    pub fn new(capacity: u32, initial_tokens: u32, refill_rate: f64) -> Result<Self> {
        if capacity == 0 {
            return Err(SyncError::Configuration(
                "bucket capacity must be greater than zero".to_string(),
            ));
        }
        if initial_tokens > capacity {
            return Err(SyncError::Configuration(format!(
                "initial tokens ({initial_tokens}) must not exceed capacity ({capacity})"
            )));
        }
        if !refill_rate.is_finite() || refill_rate < 0.0 {
            return Err(SyncError::Configuration(format!(
                "refill rate must be a finite non-negative number, got {refill_rate}"
            )));
        }
        Ok(Self {
            capacity,
            initial_tokens,
            refill_rate,
        })
    }

    /// A full bucket of `capacity` tokens refilled at `refill_rate`.
    pub fn full(capacity: u32, refill_rate: f64) -> Result<Self> {
        Self::new(capacity, capacity, refill_rate)
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn initial_tokens(&self) -> u32 {
        self.initial_tokens
    }

    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }
}

/// Persisted state of one bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketState {
    pub tokens: f64,
    pub last_refill: DateTime<Utc>,
}

impl BucketState {
    pub fn new(config: &BucketConfig, now: DateTime<Utc>) -> Self {
        Self {
            tokens: f64::from(config.initial_tokens),
            last_refill: now,
        }
    }

    /// Adds the tokens earned since `last_refill`, capped at capacity.
    ///
    /// Only whole milliseconds are credited; `last_refill` advances by
    /// exactly that amount so the sub-millisecond remainder carries over.
    /// A clock that moves backwards earns nothing and does not rewind
    /// `last_refill`.
    pub fn refill(&mut self, config: &BucketConfig, now: DateTime<Utc>) {
        let elapsed_ms = (now - self.last_refill).num_milliseconds();
        if elapsed_ms <= 0 {
            return;
        }
        let earned = elapsed_ms as f64 / 1000.0 * config.refill_rate;
        self.tokens = (self.tokens + earned).min(f64::from(config.capacity));
        self.last_refill += Duration::milliseconds(elapsed_ms);
    }

    /// Refills, then consumes one token if available.
    pub fn try_take(&mut self, config: &BucketConfig, now: DateTime<Utc>) -> bool {
        self.refill(config, now);
        // Capacity can shrink when a route is reconfigured.
        self.tokens = self.tokens.clamp(0.0, f64::from(config.capacity));
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_configs() {
        assert!(BucketConfig::new(0, 0, 1.0).is_err());
        assert!(BucketConfig::new(5, 6, 1.0).is_err());
        assert!(BucketConfig::new(5, 5, -0.1).is_err());
        assert!(BucketConfig::new(5, 5, f64::NAN).is_err());
        assert!(BucketConfig::new(5, 0, 0.0).is_ok());
    }

    #[test]
    fn refill_is_capped_at_capacity() {
        let config = BucketConfig::new(3, 0, 10.0).unwrap();
        let start = Utc::now();
        let mut state = BucketState::new(&config, start);
        state.refill(&config, start + Duration::seconds(60));
        assert_eq!(state.tokens, 3.0);
    }

    #[test]
    fn sub_millisecond_remainder_is_not_lost() {
        let config = BucketConfig::new(1_000, 0, 1_000.0).unwrap();
        let start = Utc::now();
        let mut state = BucketState::new(&config, start);

        // 400 refills 1.5ms apart earn 600 tokens in total.
        let mut now = start;
        for _ in 0..400 {
            now += Duration::microseconds(1_500);
            state.refill(&config, now);
        }

        assert_eq!(state.tokens, 600.0);
        assert_eq!(state.last_refill, now);
    }

    #[test]
    fn backwards_clock_earns_nothing() {
        let config = BucketConfig::new(3, 1, 1.0).unwrap();
        let start = Utc::now();
        let mut state = BucketState::new(&config, start);
        state.refill(&config, start - Duration::seconds(5));
        assert_eq!(state.tokens, 1.0);
        assert_eq!(state.last_refill, start);
    }

    #[test]
    fn fractional_tokens_accumulate() {
        let config = BucketConfig::new(2, 0, 0.5).unwrap();
        let start = Utc::now();
        let mut state = BucketState::new(&config, start);
        assert!(!state.try_take(&config, start + Duration::seconds(1)));
        assert!(state.try_take(&config, start + Duration::seconds(2)));
        assert_eq!(state.tokens, 0.0);
    }
}
