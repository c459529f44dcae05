//! The registration desk: one service object behind every endpoint.
//!
//! Flow Overview:
//! 1) `issue_otp` rate-limits and sends a 4 digit code for an unregistered email.
//! 2) `verify_otp` answers the challenge and marks the email verified.
//! 3) `submit` admits a registration for a verified email and spends the token.
//! 4) `approve` / `reject` drive each registration to a terminal state and
//!    notify the registrant after the change is stored.
//!
//! Issue, verify and submit for one email run under a per-email lock so their
//! check-then-act sequences cannot interleave.

mod admission;
mod event;
mod notes;
mod otp;
mod review;
mod ticket;

pub use admission::Submission;
pub use notes::NoteFeed;
pub use otp::{OtpIssued, OtpVerified};
pub use review::{ApprovalOutcome, RejectionOutcome};
pub use ticket::generate_ticket_id;

use anyhow::anyhow;
use std::future::Future;
use std::sync::Arc;

use crate::email::{DeliveryReceipt, Messenger};
use crate::error::{Error, Result};
use crate::otp::{EmailLocks, OtpConfig, OtpStore, VerifiedEmails};
use crate::storage::{EventDetailsStore, RegistrationStore};

const DEFAULT_PRICE: i64 = 3000;
const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_MAX_BANNER_BYTES: usize = 5 * 1024 * 1024;
const DEFAULT_TICKET_ID_ATTEMPTS: u32 = 10;
const DEFAULT_TICKET_TYPE: &str = "General Admission";
const DEFAULT_REJECTION_REASON: &str = "Payment verification failed. Please ensure your bank slip shows the correct amount (Rs. 3,000) and transaction details are visible.";

#[derive(Clone, Debug)]
pub struct RegistrationConfig {
    price: i64,
    max_attachment_bytes: usize,
    max_banner_bytes: usize,
    ticket_id_attempts: u32,
    ticket_type: String,
    default_rejection_reason: String,
}

impl RegistrationConfig {
    /// Defaults: price 3000, 5 MiB attachments and banners, 10 ticket id draws.
    #[must_use]
    pub fn new() -> Self {
        Self {
            price: DEFAULT_PRICE,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            max_banner_bytes: DEFAULT_MAX_BANNER_BYTES,
            ticket_id_attempts: DEFAULT_TICKET_ID_ATTEMPTS,
            ticket_type: DEFAULT_TICKET_TYPE.to_string(),
            default_rejection_reason: DEFAULT_REJECTION_REASON.to_string(),
        }
    }

    #[must_use]
    pub fn with_price(mut self, price: i64) -> Self {
        self.price = price;
        self
    }

    #[must_use]
    pub fn with_max_attachment_bytes(mut self, bytes: usize) -> Self {
        self.max_attachment_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_max_banner_bytes(mut self, bytes: usize) -> Self {
        self.max_banner_bytes = bytes;
        self
    }

    #[must_use]
    pub fn with_ticket_id_attempts(mut self, attempts: u32) -> Self {
        self.ticket_id_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_default_rejection_reason(mut self, reason: String) -> Self {
        self.default_rejection_reason = reason;
        self
    }

    #[must_use]
    pub fn price(&self) -> i64 {
        self.price
    }

    #[must_use]
    pub fn max_attachment_bytes(&self) -> usize {
        self.max_attachment_bytes
    }

    #[must_use]
    pub fn max_banner_bytes(&self) -> usize {
        self.max_banner_bytes
    }

    #[must_use]
    pub fn ticket_id_attempts(&self) -> u32 {
        self.ticket_id_attempts
    }

    #[must_use]
    pub fn default_rejection_reason(&self) -> &str {
        &self.default_rejection_reason
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Desk {
    otp_config: OtpConfig,
    config: RegistrationConfig,
    otps: OtpStore,
    verified: VerifiedEmails,
    locks: EmailLocks,
    registrations: Arc<dyn RegistrationStore>,
    events: Arc<dyn EventDetailsStore>,
    messenger: Arc<dyn Messenger>,
}

impl Desk {
    #[must_use]
    pub fn new(
        otp_config: OtpConfig,
        config: RegistrationConfig,
        registrations: Arc<dyn RegistrationStore>,
        events: Arc<dyn EventDetailsStore>,
        messenger: Arc<dyn Messenger>,
    ) -> Self {
        let otp_config = otp_config.normalize();
        Self {
            otps: OtpStore::new(&otp_config),
            verified: VerifiedEmails::new(otp_config.verified_ttl()),
            locks: EmailLocks::new(),
            otp_config,
            config,
            registrations,
            events,
            messenger,
        }
    }

    #[must_use]
    pub fn otp_config(&self) -> &OtpConfig {
        &self.otp_config
    }

    #[must_use]
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Whether the durable store answers.
    ///
    /// # Errors
    /// Returns [`Error::Storage`] when the store is unreachable.
    pub async fn ping(&self) -> Result<()> {
        self.registrations.ping().await.map_err(Error::Storage)
    }

    async fn email_registered(&self, email: &str) -> Result<bool> {
        self.registrations
            .email_registered(email)
            .await
            .map_err(Error::Storage)
    }

    /// Bound a messenger call by the delivery timeout.
    async fn deliver<F>(&self, send: F) -> anyhow::Result<DeliveryReceipt>
    where
        F: Future<Output = anyhow::Result<DeliveryReceipt>>,
    {
        let timeout = self.otp_config.delivery_timeout();
        tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| anyhow!("delivery timed out after {}s", timeout.as_secs()))?
    }
}
