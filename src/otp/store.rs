//! Pending OTP challenges keyed by normalized email.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

use super::OtpConfig;

#[derive(Clone, Debug)]
pub struct OtpRecord {
    pub code: String,
    pub issued_at: Instant,
    pub attempts: u32,
    pub request_count: u32,
    pub window_start: Instant,
    version: u64,
}

/// Issuance budget for one email. Outlives the record it was counted for.
#[derive(Clone, Copy, Debug)]
struct RateWindow {
    started_at: Instant,
    count: u32,
}

#[derive(Default)]
struct Entries {
    records: HashMap<String, OtpRecord>,
    windows: HashMap<String, RateWindow>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CheckOutcome {
    Missing,
    Expired,
    AttemptsExceeded,
    Mismatch { remaining: u32 },
    Matched,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Duration,
}

pub struct OtpStore {
    entries: Arc<Mutex<Entries>>,
    versions: AtomicU64,
    ttl: Duration,
    window: Duration,
    max_requests: u32,
}

impl OtpStore {
    #[must_use]
    pub fn new(config: &OtpConfig) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Entries::default())),
            versions: AtomicU64::new(0),
            ttl: config.ttl(),
            window: config.rate_limit_window(),
            max_requests: config.rate_limit_max_requests(),
        }
    }

    /// Count an issuance against the email's window and replace any live record
    /// with a fresh one holding `code`.
    ///
    /// # Errors
    /// Returns [`RateLimited`] when the window already holds `max_requests`
    /// issuances. Nothing is mutated in that case.
    pub async fn issue(&self, email: &str, code: String) -> Result<OtpRecord, RateLimited> {
        let now = Instant::now();
        let version = self.versions.fetch_add(1, Ordering::Relaxed) + 1;
        let record = {
            let mut guard = self.entries.lock().await;
            let entries = &mut *guard;
            let window = self.window;
            entries
                .windows
                .retain(|_, slot| now.duration_since(slot.started_at) < window);

            let slot = entries
                .windows
                .entry(email.to_string())
                .or_insert(RateWindow {
                    started_at: now,
                    count: 0,
                });
            if slot.count >= self.max_requests {
                let elapsed = now.duration_since(slot.started_at);
                return Err(RateLimited {
                    retry_after: window.saturating_sub(elapsed),
                });
            }
            slot.count += 1;

            let record = OtpRecord {
                code,
                issued_at: now,
                attempts: 0,
                request_count: slot.count,
                window_start: slot.started_at,
                version,
            };
            entries.records.insert(email.to_string(), record.clone());
            record
        };

        self.schedule_expiry(email.to_string(), version);
        Ok(record)
    }

    /// Compare `code` with the live record. Every branch except `Matched` and a
    /// non-final `Mismatch` removes the record; a match leaves it for the caller
    /// to [`remove`](Self::remove) once follow-up checks are done.
    pub async fn check(&self, email: &str, code: &str, max_attempts: u32) -> CheckOutcome {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let Some(record) = entries.records.get_mut(email) else {
            return CheckOutcome::Missing;
        };

        if now.duration_since(record.issued_at) > self.ttl {
            entries.records.remove(email);
            return CheckOutcome::Expired;
        }

        if record.attempts >= max_attempts {
            entries.records.remove(email);
            return CheckOutcome::AttemptsExceeded;
        }

        if record.code != code {
            record.attempts += 1;
            let remaining = max_attempts.saturating_sub(record.attempts);
            if remaining == 0 {
                entries.records.remove(email);
            }
            return CheckOutcome::Mismatch { remaining };
        }

        CheckOutcome::Matched
    }

    pub async fn remove(&self, email: &str) {
        self.entries.lock().await.records.remove(email);
    }

    /// Snapshot of the live record, evicting it when already past its TTL.
    pub async fn get(&self, email: &str) -> Option<OtpRecord> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let expired = entries
            .records
            .get(email)
            .is_some_and(|record| now.duration_since(record.issued_at) > self.ttl);
        if expired {
            entries.records.remove(email);
            return None;
        }
        entries.records.get(email).cloned()
    }

    fn schedule_expiry(&self, email: String, version: u64) {
        let entries = Arc::clone(&self.entries);
        let ttl = self.ttl;
        tokio::spawn(async move {
            sleep(ttl).await;
            let mut entries = entries.lock().await;
            if entries
                .records
                .get(&email)
                .is_some_and(|record| record.version == version)
            {
                entries.records.remove(&email);
                debug!(version, "otp record expired");
            }
        });
    }
}
