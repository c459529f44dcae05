//! SMTP delivery through a STARTTLS relay.

use anyhow::{Context, Result};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use secrecy::{ExposeSecret, SecretString};
use std::time::Duration;
use tracing::{debug, info};
use uuid::Uuid;

use super::templates::{self, BANNER_CONTENT_ID, Rendered};
use super::{DeliveryReceipt, Messenger, TicketNotice};
use crate::models::Banner;
use crate::storage::BoxFuture;

const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_SMTP_TIMEOUT_SECONDS: u64 = 10;
const DEFAULT_FROM_NAME: &str = "Eventazia";

#[derive(Clone, Debug)]
pub struct SmtpConfig {
    host: String,
    port: u16,
    username: String,
    password: SecretString,
    from_email: String,
    from_name: String,
    timeout: Duration,
}

impl SmtpConfig {
    /// The sender address defaults to the SMTP username.
    #[must_use]
    pub fn new(host: String, username: String, password: SecretString) -> Self {
        Self {
            host,
            port: DEFAULT_SMTP_PORT,
            from_email: username.clone(),
            username,
            password,
            from_name: DEFAULT_FROM_NAME.to_string(),
            timeout: Duration::from_secs(DEFAULT_SMTP_TIMEOUT_SECONDS),
        }
    }

    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    #[must_use]
    pub fn with_from_email(mut self, from_email: String) -> Self {
        self.from_email = from_email;
        self
    }

    #[must_use]
    pub fn with_from_name(mut self, from_name: String) -> Self {
        self.from_name = from_name;
        self
    }

    #[must_use]
    pub fn with_timeout_seconds(mut self, seconds: u64) -> Self {
        self.timeout = Duration::from_secs(seconds.max(1));
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }
}

pub struct SmtpMessenger {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpMessenger {
    /// Build the transport. No connection is made until the first send.
    ///
    /// # Errors
    /// Returns an error if the relay host or the sender address is invalid.
    pub fn new(config: &SmtpConfig) -> Result<Self> {
        let credentials = Credentials::new(
            config.username.clone(),
            config.password.expose_secret().to_string(),
        );
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .with_context(|| format!("Failed to create SMTP transport for {}", config.host))?
            .port(config.port)
            .credentials(credentials)
            .timeout(Some(config.timeout))
            .build();

        let from = format!("{} <{}>", config.from_name, config.from_email)
            .parse::<Mailbox>()
            .context("Invalid from address")?;

        Ok(Self { transport, from })
    }

    fn message(&self, to: &str, subject: &str, body: MultiPart) -> Result<(Message, String)> {
        let to = to.parse::<Mailbox>().context("Invalid recipient address")?;
        let message_id = format!("<{}@eventazia>", Uuid::new_v4());
        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .message_id(Some(message_id.clone()))
            .multipart(body)
            .context("Failed to build message")?;
        Ok((message, message_id))
    }

    async fn deliver(&self, to: &str, subject: &str, body: MultiPart) -> Result<DeliveryReceipt> {
        let (message, message_id) = self.message(to, subject, body)?;
        debug!(to_email = %to, subject = %subject, "sending email");
        let response = self
            .transport
            .send(message)
            .await
            .context("SMTP send failed")?;
        info!(
            to_email = %to,
            message_id = %message_id,
            smtp_code = %response.code(),
            "email sent"
        );
        Ok(DeliveryReceipt {
            provider: "smtp",
            message_id,
        })
    }
}

fn alternative(rendered: &Rendered) -> MultiPart {
    MultiPart::alternative()
        .singlepart(SinglePart::plain(rendered.text.clone()))
        .singlepart(SinglePart::html(rendered.html.clone()))
}

fn with_inline_banner(rendered: &Rendered, banner: &Banner) -> Result<MultiPart> {
    let content_type = ContentType::parse(&banner.mime_type)
        .with_context(|| format!("Invalid banner content type {}", banner.mime_type))?;
    let image = Attachment::new_inline(BANNER_CONTENT_ID.to_string())
        .body(banner.data.clone(), content_type);
    Ok(MultiPart::alternative()
        .singlepart(SinglePart::plain(rendered.text.clone()))
        .multipart(
            MultiPart::related()
                .singlepart(SinglePart::html(rendered.html.clone()))
                .singlepart(image),
        ))
}

impl Messenger for SmtpMessenger {
    fn send_otp<'a>(
        &'a self,
        email: &'a str,
        code: &'a str,
        ttl: Duration,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            let rendered = templates::otp(code, ttl);
            self.deliver(email, &rendered.subject, alternative(&rendered))
                .await
        })
    }

    fn send_approval<'a>(
        &'a self,
        notice: &'a TicketNotice,
    ) -> BoxFuture<'a, Result<DeliveryReceipt>> {
        Box::pin(async move {
            let rendered = templates::approval(notice);
            let body = match &notice.banner {
                Some(banner) => with_inline_banner(&rendered, banner)?,
                None => alternative(&rendered),
            };
            self.deliver(&notice.email, &rendered.subject, body).await
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
            self.deliver(email, &rendered.subject, alternative(&rendered))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn config() -> SmtpConfig {
        SmtpConfig::new(
            "smtp.example.com".to_string(),
            "noreply@example.com".to_string(),
            SecretString::from("secret".to_string()),
        )
    }

    #[test]
    fn config_defaults() {
        let config = config();
        assert_eq!(config.host(), "smtp.example.com");
        assert_eq!(config.port(), 587);
        assert_eq!(config.from_email, "noreply@example.com");
    }

    #[tokio::test]
    async fn builds_messages_without_connecting() -> anyhow::Result<()> {
        let messenger = SmtpMessenger::new(&config().with_port(2525))?;
        let rendered = templates::rejection("Alice", "Unreadable slip");
        let (_message, message_id) =
            messenger.message("alice@example.com", &rendered.subject, alternative(&rendered))?;
        assert!(message_id.ends_with("@eventazia>"));
        Ok(())
    }

    #[tokio::test]
    async fn rejects_invalid_recipient() -> anyhow::Result<()> {
        let messenger = SmtpMessenger::new(&config())?;
        let rendered = templates::rejection("Alice", "Unreadable slip");
        assert!(
            messenger
                .message("not an address", &rendered.subject, alternative(&rendered))
                .is_err()
        );
        Ok(())
    }

    #[test]
    fn inline_banner_requires_valid_mime() {
        let rendered = templates::rejection("Alice", "n/a");
        let banner = Banner {
            data: vec![1, 2, 3],
            mime_type: "image/png".to_string(),
            uploaded_at: Utc::now(),
        };
        assert!(with_inline_banner(&rendered, &banner).is_ok());
        let broken = Banner {
            mime_type: "not a mime".to_string(),
            ..banner
        };
        assert!(with_inline_banner(&rendered, &broken).is_err());
    }
}
