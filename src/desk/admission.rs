//! Admission of verified registrations.

use tracing::{info, warn};

use super::Desk;
use crate::error::{Error, Result};
use crate::models::{Attachment, NewRegistration, Registration};
use crate::otp::{normalize_email, valid_email};
use crate::storage::InsertOutcome;

const ALLOWED_ATTACHMENT_TYPES: [&str; 4] =
    ["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// Raw registration form as received.
#[derive(Clone, Debug, Default)]
pub struct Submission {
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub note: Option<String>,
    pub attachment: Option<Attachment>,
}

impl Desk {
    /// Persist a pending registration for a verified email.
    ///
    /// # Errors
    /// `InvalidInput`, `VerificationRequired`, `AlreadyRegistered`,
    /// `InvalidAttachment` or `Storage`. Nothing is stored on error.
    pub async fn submit(&self, submission: Submission) -> Result<Registration> {
        let name = submission.name.trim();
        let contact_no = submission.contact_no.trim();
        let email = normalize_email(&submission.email);
        let Some(attachment) = submission.attachment else {
            return Err(Error::InvalidInput(
                "Name, contact number, email, and bank slip are required".to_string(),
            ));
        };
        if name.is_empty() || contact_no.is_empty() || email.is_empty() {
            return Err(Error::InvalidInput(
                "Name, contact number, email, and bank slip are required".to_string(),
            ));
        }
        if !valid_email(&email) {
            return Err(Error::InvalidInput("Invalid email address format".to_string()));
        }

        let _guard = self.locks.lock(&email).await;

        if !self.verified.is_verified(&email).await {
            return Err(Error::VerificationRequired);
        }
        if self.email_registered(&email).await? {
            return Err(Error::AlreadyRegistered);
        }
        validate_attachment(&attachment, self.config.max_attachment_bytes())?;

        let note = submission
            .note
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(ToString::to_string);

        let new_registration = NewRegistration {
            name: name.to_string(),
            contact_no: contact_no.to_string(),
            email: email.clone(),
            note,
            price: self.config.price(),
            attachment: Attachment {
                mime_type: attachment.mime_type.to_ascii_lowercase(),
                ..attachment
            },
        };

        let registration = match self
            .registrations
            .insert(new_registration)
            .await
            .map_err(Error::Storage)?
        {
            InsertOutcome::Created(registration) => registration,
            InsertOutcome::EmailTaken => {
                warn!("registration lost a race on the email unique index");
                return Err(Error::AlreadyRegistered);
            }
        };

        self.verified.consume(&email).await;
        info!(
            registration_id = %registration.id,
            attachment_size = registration.attachment.size,
            "registration submitted"
        );
        Ok(registration)
    }
}

fn validate_attachment(attachment: &Attachment, max_bytes: usize) -> Result<()> {
    let mime_type = attachment.mime_type.to_ascii_lowercase();
    if !ALLOWED_ATTACHMENT_TYPES.contains(&mime_type.as_str()) {
        return Err(Error::InvalidAttachment(
            "Only JPG, PNG, and PDF files are allowed".to_string(),
        ));
    }
    if attachment.data.is_empty() {
        return Err(Error::InvalidAttachment("Bank slip file is empty".to_string()));
    }
    if attachment.data.len() > max_bytes {
        return Err(Error::InvalidAttachment(format!(
            "File size must be less than {}MB",
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::desk::test_support::{Fixture, fixture, scripted_fixture};
    use crate::models::RegistrationStatus;
    use crate::storage::RegistrationStore;

    pub(crate) const EMAIL: &str = "alice@example.com";

    pub(crate) fn slip(size: usize) -> Attachment {
        Attachment {
            data: vec![0xAB; size],
            original_name: "slip.png".to_string(),
            mime_type: "image/png".to_string(),
        }
    }

    pub(crate) fn form(email: &str) -> Submission {
        Submission {
            name: " Alice Perera ".to_string(),
            contact_no: "0771234567".to_string(),
            email: email.to_string(),
            note: Some("  ".to_string()),
            attachment: Some(slip(1024)),
        }
    }

    /// Row as another writer would have stored it, bypassing admission.
    pub(crate) fn stored_row(email: &str) -> NewRegistration {
        NewRegistration {
            name: "Earlier Writer".to_string(),
            contact_no: "0710000000".to_string(),
            email: email.to_string(),
            note: None,
            price: 3000,
            attachment: slip(16),
        }
    }

    pub(crate) async fn verify(fx: &Fixture, email: &str) -> anyhow::Result<()> {
        fx.desk.issue_otp(email).await?;
        let code = fx
            .messenger
            .last_code(&normalize_email(email))
            .ok_or_else(|| anyhow::anyhow!("no code sent"))?;
        fx.desk.verify_otp(email, &code).await?;
        Ok(())
    }

    pub(crate) async fn register(fx: &Fixture, email: &str) -> anyhow::Result<Registration> {
        verify(fx, email).await?;
        Ok(fx.desk.submit(form(email)).await?)
    }

    #[tokio::test]
    async fn verified_email_is_admitted_once() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, EMAIL).await?;
        assert_eq!(registration.status, RegistrationStatus::Pending);
        assert_eq!(registration.name, "Alice Perera");
        assert_eq!(registration.price, 3000);
        assert_eq!(registration.note, None);
        assert_eq!(registration.attachment.size, 1024);

        // The verification token is spent.
        assert!(!fx.desk.is_verified(EMAIL).await);
        assert!(matches!(
            fx.desk.submit(form(EMAIL)).await,
            Err(Error::VerificationRequired)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unverified_email_is_refused() -> anyhow::Result<()> {
        let fx = fixture();
        assert!(matches!(
            fx.desk.submit(form(EMAIL)).await,
            Err(Error::VerificationRequired)
        ));
        assert_eq!(fx.store.stats().await?.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn registered_email_cannot_request_otp() -> anyhow::Result<()> {
        let fx = fixture();
        register(&fx, EMAIL).await?;
        assert!(matches!(
            fx.desk.issue_otp("ALICE@example.com").await,
            Err(Error::AlreadyRegistered)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn oversized_attachment_is_rejected() -> anyhow::Result<()> {
        let fx = fixture();
        verify(&fx, EMAIL).await?;
        let mut submission = form(EMAIL);
        submission.attachment = Some(slip(10 * 1024 * 1024));
        assert!(matches!(
            fx.desk.submit(submission).await,
            Err(Error::InvalidAttachment(_))
        ));
        assert_eq!(fx.store.stats().await?.total, 0);
        // The token survives a rejected upload.
        assert!(fx.desk.is_verified(EMAIL).await);
        Ok(())
    }

    #[tokio::test]
    async fn unsupported_type_is_rejected() -> anyhow::Result<()> {
        let fx = fixture();
        verify(&fx, EMAIL).await?;
        let mut submission = form(EMAIL);
        submission.attachment = Some(Attachment {
            mime_type: "application/zip".to_string(),
            ..slip(10)
        });
        let result = fx.desk.submit(submission).await;
        assert!(matches!(result, Err(Error::InvalidAttachment(_))));
        Ok(())
    }

    #[tokio::test]
    async fn missing_fields_are_invalid_input() {
        let fx = fixture();
        let mut submission = form(EMAIL);
        submission.name = "   ".to_string();
        assert!(matches!(
            fx.desk.submit(submission).await,
            Err(Error::InvalidInput(_))
        ));

        let mut submission = form(EMAIL);
        submission.attachment = None;
        assert!(matches!(
            fx.desk.submit(submission).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn verified_email_already_stored_is_refused() -> anyhow::Result<()> {
        let fx = fixture();
        verify(&fx, EMAIL).await?;
        fx.store.insert(stored_row(EMAIL)).await?;

        assert!(matches!(
            fx.desk.submit(form(EMAIL)).await,
            Err(Error::AlreadyRegistered)
        ));
        assert_eq!(fx.store.stats().await?.total, 1);
        Ok(())
    }

    #[tokio::test]
    async fn unique_email_violation_is_already_registered() -> anyhow::Result<()> {
        let (fx, scripted) = scripted_fixture();
        verify(&fx, EMAIL).await?;
        fx.store.insert(stored_row(EMAIL)).await?;
        // The pre-insert lookup misses the row, so only the unique index catches it.
        scripted.hide_registered();

        assert!(matches!(
            fx.desk.submit(form(EMAIL)).await,
            Err(Error::AlreadyRegistered)
        ));
        assert_eq!(fx.store.stats().await?.total, 1);
        assert!(fx.desk.is_verified(EMAIL).await);
        Ok(())
    }

    #[test]
    fn attachment_limits() {
        assert!(validate_attachment(&slip(5 * 1024 * 1024), 5 * 1024 * 1024).is_ok());
        assert!(validate_attachment(&slip(5 * 1024 * 1024 + 1), 5 * 1024 * 1024).is_err());
        assert!(validate_attachment(&slip(0), 5 * 1024 * 1024).is_err());
        let pdf = Attachment {
            mime_type: "APPLICATION/PDF".to_string(),
            ..slip(1)
        };
        assert!(validate_attachment(&pdf, 10).is_ok());
    }
}
