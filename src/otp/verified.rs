//! Registry of emails that recently answered their OTP challenge.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use tracing::debug;

#[derive(Clone, Copy, Debug)]
struct Token {
    expires_at: Instant,
    version: u64,
}

pub struct VerifiedEmails {
    tokens: Arc<Mutex<HashMap<String, Token>>>,
    versions: AtomicU64,
    ttl: Duration,
}

impl VerifiedEmails {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            tokens: Arc::new(Mutex::new(HashMap::new())),
            versions: AtomicU64::new(0),
            ttl,
        }
    }

    /// Create or replace the token for `email`. Returns its expiry instant.
    pub async fn insert(&self, email: &str) -> Instant {
        let expires_at = Instant::now() + self.ttl;
        let version = self.versions.fetch_add(1, Ordering::Relaxed) + 1;
        self.tokens.lock().await.insert(
            email.to_string(),
            Token {
                expires_at,
                version,
            },
        );

        let tokens = Arc::clone(&self.tokens);
        let ttl = self.ttl;
        let email = email.to_string();
        tokio::spawn(async move {
            sleep(ttl).await;
            let mut tokens = tokens.lock().await;
            if tokens.get(&email).is_some_and(|token| token.version == version) {
                tokens.remove(&email);
                debug!(version, "verification token expired");
            }
        });

        expires_at
    }

    pub async fn is_verified(&self, email: &str) -> bool {
        let now = Instant::now();
        let mut tokens = self.tokens.lock().await;
        match tokens.get(email) {
            Some(token) if now < token.expires_at => true,
            Some(_) => {
                tokens.remove(email);
                false
            }
            None => false,
        }
    }

    /// Drop the token. Returns whether one was present.
    pub async fn consume(&self, email: &str) -> bool {
        self.tokens.lock().await.remove(email).is_some()
    }
}
