//! Outbound notification delivery.
//!
//! Three messages leave the service: the OTP code, the approval ticket and the
//! rejection notice. Each goes through a [`Messenger`], which decides how to
//! deliver and reports a [`DeliveryReceipt`] or an error. Callers treat the
//! messenger as unreliable: OTP delivery failures are surfaced to the
//! requester, review notifications only flip an `email_sent` flag.
//!
//! The default messenger for local dev is [`LogMessenger`], which logs and
//! returns `Ok`. [`SmtpMessenger`] talks to a STARTTLS relay. [`MemoryMessenger`]
//! keeps every message in memory so tests can read codes back.

mod smtp;
pub mod templates;

pub use smtp::{SmtpConfig, SmtpMessenger};

use anyhow::{Result, bail};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::Banner;
use crate::storage::BoxFuture;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeliveryReceipt {
    pub provider: &'static str,
    pub message_id: String,
}

/// Everything the approval email shows.
#[derive(Clone, Debug)]
pub struct TicketNotice {
    pub ticket_id: String,
    pub name: String,
    pub email: String,
    pub contact_no: String,
    pub ticket_type: String,
    pub price: i64,
    pub event_date: String,
    pub event_time: String,
    pub event_venue: String,
    pub banner: Option<Banner>,
}

pub trait Messenger: Send + Sync {
    fn send_otp<'a>(
        &'a self,
        email: &'a str,
        code: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>>;

    fn send_approval<'a>(&'a self, notice: &'a TicketNotice)
    -> BoxFuture<'a, Result<DeliveryReceipt>>;

    fn send_rejection<'a>(
        &'a self,
        email: &'a str,
        name: &'a str,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>>;
}

/// Local dev messenger that logs instead of sending real email.
#[derive(Clone, Debug, Default)]
pub struct LogMessenger;

impl LogMessenger {
    fn receipt() -> DeliveryReceipt {
        DeliveryReceipt {
            provider: "log",
            message_id: Uuid::new_v4().to_string(),
        }
    }
}

impl Messenger for LogMessenger {
    fn send_otp<'a>(
        &'a self,
        email: &'a str,
        code: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            let rendered = templates::otp(code, ttl);
            info!(to_email = %email, subject = %rendered.subject, code = %code, "email send stub");
            Ok(Self::receipt())
        })
    }

    fn send_approval<'a>(
        &'a self,
        notice: &'a TicketNotice,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            let rendered = templates::approval(notice);
            info!(
                to_email = %notice.email,
                subject = %rendered.subject,
                ticket_id = %notice.ticket_id,
                banner = notice.banner.is_some(),
                "email send stub"
            );
            Ok(Self::receipt())
        })
    }

    fn send_rejection<'a>(
        &'a self,
        email: &'a str,
        name: &'a str,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            let rendered = templates::rejection(name, reason);
            info!(to_email = %email, subject = %rendered.subject, reason = %reason, "email send stub");
            Ok(Self::receipt())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SentMessage {
    Otp { email: String, code: String },
    Approval {
        email: String,
        ticket_id: String,
        banner: bool,
    },
    Rejection { email: String, reason: String },
}

/// Keeps sent messages in memory. Can be switched to fail every send.
#[derive(Debug, Default)]
pub struct MemoryMessenger {
    sent: Mutex<Vec<SentMessage>>,
    failing: AtomicBool,
}

impl MemoryMessenger {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    #[must_use]
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Most recent OTP code sent to `email`.
    #[must_use]
    pub fn last_code(&self, email: &str) -> Option<String> {
        self.sent().into_iter().rev().find_map(|message| match message {
            SentMessage::Otp { email: to, code } if to == email => Some(code),
            _ => None,
        })
    }

    fn record(&self, message: SentMessage) -> Result<DeliveryReceipt> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("memory messenger is set to fail");
        }
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message);
        Ok(DeliveryReceipt {
            provider: "memory",
            message_id: Uuid::new_v4().to_string(),
        })
    }
}

impl Messenger for MemoryMessenger {
    fn send_otp<'a>(
        &'a self,
        email: &'a str,
        code: &'a str,
        _ttl: Duration,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            self.record(SentMessage::Otp {
                email: email.to_string(),
                code: code.to_string(),
            })
        })
    }

    fn send_approval<'a>(
        &'a self,
        notice: &'a TicketNotice,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            self.record(SentMessage::Approval {
                email: notice.email.clone(),
                ticket_id: notice.ticket_id.clone(),
                banner: notice.banner.is_some(),
            })
        })
    }

    fn send_rejection<'a>(
        &'a self,
        email: &'a str,
        _name: &'a str,
        reason: &'a str,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            self.record(SentMessage::Rejection {
                email: email.to_string(),
                reason: reason.to_string(),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_messenger_always_succeeds() -> anyhow::Result<()> {
        let receipt = LogMessenger
            .send_otp("alice@example.com", "1234", Duration::from_secs(300))
            .await?;
        assert_eq!(receipt.provider, "log");
        Ok(())
    }

    #[tokio::test]
    async fn memory_messenger_returns_last_code() -> anyhow::Result<()> {
        let messenger = MemoryMessenger::new();
        messenger
            .send_otp("alice@example.com", "1111", Duration::from_secs(300))
            .await?;
        messenger
            .send_otp("alice@example.com", "2222", Duration::from_secs(300))
            .await?;
        assert_eq!(messenger.last_code("alice@example.com").as_deref(), Some("2222"));
        assert_eq!(messenger.last_code("bob@example.com"), None);
        Ok(())
    }

    #[tokio::test]
    async fn failing_memory_messenger_records_nothing() {
        let messenger = MemoryMessenger::new();
        messenger.set_failing(true);
        let result = messenger
            .send_rejection("alice@example.com", "Alice", "Slip unreadable")
            .await;
        assert!(result.is_err());
        assert!(messenger.sent().is_empty());
    }
}
