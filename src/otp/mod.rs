//! Ephemeral email verification state.
//!
//! Two in-memory caches back the OTP flow: [`OtpStore`] holds the pending
//! challenge per email and [`VerifiedEmails`] holds the short-lived proof that a
//! challenge was answered. Both key on the normalized email and expire entries
//! with versioned one-shot timers, so a timer armed for an old record can never
//! remove the record that replaced it. [`EmailLocks`] serializes the operations
//! that touch one email across both caches and the durable store.
//!
//! Nothing here survives a restart.

mod locks;
mod store;
mod verified;

pub use locks::EmailLocks;
pub use store::{CheckOutcome, OtpRecord, OtpStore, RateLimited};
pub use verified::VerifiedEmails;

use once_cell::sync::Lazy;
use rand::{Rng, rngs::OsRng};
use regex::Regex;
use std::time::Duration;

const DEFAULT_OTP_TTL_SECONDS: u64 = 5 * 60;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 3;
const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 15 * 60;
const DEFAULT_VERIFIED_TTL_SECONDS: u64 = 10 * 60;
const DEFAULT_DELIVERY_TIMEOUT_SECONDS: u64 = 15;

#[derive(Clone, Copy, Debug)]
pub struct OtpConfig {
    ttl: Duration,
    max_attempts: u32,
    rate_limit_max_requests: u32,
    rate_limit_window: Duration,
    verified_ttl: Duration,
    delivery_timeout: Duration,
}

impl OtpConfig {
    /// Defaults: 5 minute codes, 3 attempts, 3 issuances per 15 minutes,
    /// 10 minute verification tokens and a 15 second delivery timeout.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_OTP_TTL_SECONDS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECONDS),
            verified_ttl: Duration::from_secs(DEFAULT_VERIFIED_TTL_SECONDS),
            delivery_timeout: Duration::from_secs(DEFAULT_DELIVERY_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: u64) -> Self {
        self.ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_rate_limit_max_requests(mut self, max_requests: u32) -> Self {
        self.rate_limit_max_requests = max_requests;
        self
    }

    #[must_use]
    pub fn with_rate_limit_window_seconds(mut self, seconds: u64) -> Self {
        self.rate_limit_window = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_verified_ttl_seconds(mut self, seconds: u64) -> Self {
        self.verified_ttl = Duration::from_secs(seconds);
        self
    }

    #[must_use]
    pub fn with_delivery_timeout_seconds(mut self, seconds: u64) -> Self {
        self.delivery_timeout = Duration::from_secs(seconds);
        self
    }

    /// Clamp zero values to the smallest usable setting.
    #[must_use]
    pub fn normalize(self) -> Self {
        let one_second = Duration::from_secs(1);
        Self {
            ttl: self.ttl.max(one_second),
            max_attempts: self.max_attempts.max(1),
            rate_limit_max_requests: self.rate_limit_max_requests.max(1),
            rate_limit_window: self.rate_limit_window.max(one_second),
            verified_ttl: self.verified_ttl.max(one_second),
            delivery_timeout: self.delivery_timeout.max(one_second),
        }
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn rate_limit_max_requests(&self) -> u32 {
        self.rate_limit_max_requests
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    #[must_use]
    pub fn verified_ttl(&self) -> Duration {
        self.verified_ttl
    }

    #[must_use]
    pub fn delivery_timeout(&self) -> Duration {
        self.delivery_timeout
    }
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize an email for lookup/uniqueness checks.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

static EMAIL_RE: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").ok());

/// Basic email format check on already-normalized input.
#[must_use]
pub fn valid_email(email_normalized: &str) -> bool {
    (*EMAIL_RE)
        .as_ref()
        .is_some_and(|regex| regex.is_match(email_normalized))
}

/// `john.doe@example.com` becomes `jo***@example.com`.
#[must_use]
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.split_once('@') else {
        return "***".to_string();
    };
    let visible: String = local.chars().take(2).collect();
    format!("{visible}***@{domain}")
}

/// Four decimal digits drawn uniformly from the OS RNG.
#[must_use]
pub fn generate_code() -> String {
    format!("{:04}", OsRng.gen_range(0..10_000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_accepts_simple_addresses() {
        assert!(valid_email("a@b.co"));
        assert!(!valid_email("not-an-email"));
        assert!(!valid_email("a b@c.de"));
        assert!(!valid_email("a@nodot"));
    }

    #[test]
    fn mask_keeps_two_leading_chars() {
        assert_eq!(mask_email("john.doe@example.com"), "jo***@example.com");
        assert_eq!(mask_email("j@example.com"), "j***@example.com");
    }

    #[test]
    fn codes_are_four_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 4);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn normalize_clamps_zero_values() {
        let config = OtpConfig::new()
            .with_ttl_seconds(0)
            .with_max_attempts(0)
            .with_rate_limit_max_requests(0)
            .normalize();
        assert_eq!(config.ttl(), Duration::from_secs(1));
        assert_eq!(config.max_attempts(), 1);
        assert_eq!(config.rate_limit_max_requests(), 1);
    }

    #[test]
    fn defaults_match_documented_policy() {
        let config = OtpConfig::default();
        assert_eq!(config.ttl(), Duration::from_secs(300));
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.rate_limit_max_requests(), 3);
        assert_eq!(config.rate_limit_window(), Duration::from_secs(900));
        assert_eq!(config.verified_ttl(), Duration::from_secs(600));
    }
}
