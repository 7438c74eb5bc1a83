//! Per-account rate limiting for provider calls.
//!
//! External APIs budget requests per client; the broker consults this
//! limiter before every authenticated call so one chatty account cannot
//! burn the budget of its provider.

use amber_relay_core::AccountId;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Rate limit configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum requests per window.
    pub max_requests: u32,
    /// Window duration in seconds.
    pub window_seconds: u32,
}

impl RateLimitConfig {
    /// Creates a new rate limit configuration.
    #[must_use]
    pub fn new(max_requests: u32, window_seconds: u32) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    /// Common limit: requests per minute.
    #[must_use]
    pub fn per_minute(max_requests: u32) -> Self {
        Self::new(max_requests, 60)
    }

    /// Common limit: requests per hour.
    #[must_use]
    pub fn per_hour(max_requests: u32) -> Self {
        Self::new(max_requests, 3600)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::per_minute(60)
    }
}

/// Result of a rate limit check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RateLimitResult {
    /// Request is allowed.
    Allowed { remaining: u32 },
    /// Rate limit exceeded.
    Exceeded { retry_after_secs: u64 },
}

impl RateLimitResult {
    /// Returns true if the request is allowed.
    #[must_use]
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

/// State for a single account's window.
#[derive(Debug, Clone)]
struct WindowState {
    count: u32,
    window_start: DateTime<Utc>,
}

/// A per-account rate limiter for provider requests.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    state: Arc<RwLock<HashMap<AccountId, WindowState>>>,
}

impl RateLimiter {
    /// Creates a new rate limiter with the given configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            state: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Checks if a request is allowed for the account.
    ///
    /// If allowed, increments the request count.
    pub fn check_and_increment(&self, account_id: AccountId) -> RateLimitResult {
        let mut state = self.state.write().unwrap();
        let now = Utc::now();
        let window = Duration::seconds(i64::from(self.config.window_seconds));

        let window_state = state.entry(account_id).or_insert_with(|| WindowState {
            count: 0,
            window_start: now,
        });

        if now - window_state.window_start >= window {
            window_state.window_start = now;
            window_state.count = 0;
        }

        if window_state.count >= self.config.max_requests {
            let resets_at = window_state.window_start + window;
            let retry_after_secs = (resets_at - now).num_seconds().max(0) as u64;
            return RateLimitResult::Exceeded { retry_after_secs };
        }

        window_state.count += 1;
        RateLimitResult::Allowed {
            remaining: self.config.max_requests - window_state.count,
        }
    }

    /// Resets the window for an account.
    pub fn reset(&self, account_id: AccountId) {
        let mut state = self.state.write().unwrap();
        state.remove(&account_id);
    }

    /// Returns the current configuration.
    #[must_use]
    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }
}

impl Clone for RateLimiter {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_under_limit() {
        let limiter = RateLimiter::new(RateLimitConfig::new(10, 60));
        let account = AccountId::new();

        for i in 0..10 {
            let result = limiter.check_and_increment(account);
            assert!(result.is_allowed());
            assert_eq!(
                result,
                RateLimitResult::Allowed {
                    remaining: 10 - i - 1
                }
            );
        }
    }

    #[test]
    fn blocks_over_limit() {
        let limiter = RateLimiter::new(RateLimitConfig::new(5, 60));
        let account = AccountId::new();

        for _ in 0..5 {
            assert!(limiter.check_and_increment(account).is_allowed());
        }

        let result = limiter.check_and_increment(account);
        assert!(!result.is_allowed());
    }

    #[test]
    fn accounts_are_isolated() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, 60));
        let busy = AccountId::new();
        let idle = AccountId::new();

        limiter.check_and_increment(busy);
        limiter.check_and_increment(busy);

        assert!(!limiter.check_and_increment(busy).is_allowed());
        assert!(limiter.check_and_increment(idle).is_allowed());
    }

    #[test]
    fn reset_clears_window() {
        let limiter = RateLimiter::new(RateLimitConfig::new(2, 60));
        let account = AccountId::new();

        limiter.check_and_increment(account);
        limiter.check_and_increment(account);
        assert!(!limiter.check_and_increment(account).is_allowed());

        limiter.reset(account);
        assert!(limiter.check_and_increment(account).is_allowed());
    }

    #[test]
    fn config_presets() {
        let per_minute = RateLimitConfig::per_minute(100);
        assert_eq!(per_minute.max_requests, 100);
        assert_eq!(per_minute.window_seconds, 60);

        let per_hour = RateLimitConfig::per_hour(1000);
        assert_eq!(per_hour.max_requests, 1000);
        assert_eq!(per_hour.window_seconds, 3600);
    }
}
