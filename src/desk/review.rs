//! Review workflow: approve, reject, and the read-side queries reviewers use.

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use super::{Desk, generate_ticket_id};
use crate::email::TicketNotice;
use crate::error::{Error, Result};
use crate::models::{
    Approval, Attachment, DEFAULT_ADMIN, EventDetails, Registration, RegistrationStats,
    RegistrationStatus,
};
use crate::storage::ApproveOutcome;

const TO_BE_ANNOUNCED: &str = "TBA";

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalOutcome {
    pub registration: Registration,
    pub email_sent: bool,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RejectionOutcome {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub reason: String,
    pub email_sent: bool,
}

fn reviewer_or_default(reviewer: Option<&str>) -> String {
    reviewer
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ADMIN)
        .to_string()
}

fn or_tba(value: &str) -> String {
    let value = value.trim();
    if value.is_empty() {
        TO_BE_ANNOUNCED.to_string()
    } else {
        value.to_string()
    }
}

impl Desk {
    /// Assign a ticket id and mark the registration approved, then send the
    /// ticket. A failed send does not undo the approval.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyApproved`, `IdGenerationFailed` or `Storage`.
    pub async fn approve(&self, id: Uuid, reviewer: Option<&str>) -> Result<ApprovalOutcome> {
        let existing = self
            .registrations
            .find(id)
            .await
            .map_err(Error::Storage)?
            .ok_or(Error::NotFound("Registration"))?;
        if existing.status == RegistrationStatus::Approved {
            return Err(Error::AlreadyApproved);
        }

        let reviewed_by = reviewer_or_default(reviewer);
        let attempts = self.config.ticket_id_attempts();
        let mut approved = None;
        for attempt in 1..=attempts {
            let ticket_id = generate_ticket_id();
            if self
                .registrations
                .ticket_id_taken(&ticket_id)
                .await
                .map_err(Error::Storage)?
            {
                continue;
            }

            let approval = Approval {
                ticket_id,
                reviewed_by: reviewed_by.clone(),
                reviewed_at: Utc::now(),
            };
            match self
                .registrations
                .approve(id, &approval)
                .await
                .map_err(Error::Storage)?
            {
                ApproveOutcome::Approved(registration) => {
                    approved = Some(registration);
                    break;
                }
                ApproveOutcome::TicketTaken => {
                    warn!(attempt, "ticket id collided on insert");
                }
                ApproveOutcome::NotPending => return Err(Error::AlreadyApproved),
                ApproveOutcome::NotFound => return Err(Error::NotFound("Registration")),
            }
        }
        let Some(registration) = approved else {
            return Err(Error::IdGenerationFailed { attempts });
        };

        let ticket_id = registration.ticket_id.clone().unwrap_or_default();
        info!(
            registration_id = %registration.id,
            ticket_id = %ticket_id,
            reviewed_by = %reviewed_by,
            "registration approved"
        );

        let notice = self.ticket_notice(&registration, ticket_id).await;
        let email_sent = match self.deliver(self.messenger.send_approval(&notice)).await {
            Ok(receipt) => {
                info!(message_id = %receipt.message_id, "approval email sent");
                true
            }
            Err(err) => {
                warn!(error = %err, registration_id = %registration.id, "approval email failed");
                false
            }
        };

        Ok(ApprovalOutcome {
            registration,
            email_sent,
        })
    }

    /// Event details and banner are best effort: the ticket goes out with `TBA`
    /// and no banner if they cannot be read.
    async fn ticket_notice(&self, registration: &Registration, ticket_id: String) -> TicketNotice {
        let details = match self.events.event_details().await {
            Ok(details) => Some(details),
            Err(err) => {
                warn!(error = %err, "event details unavailable for approval email");
                None
            }
        };
        let banner = match &details {
            Some(EventDetails {
                banner: Some(_), ..
            }) => self.events.banner().await.unwrap_or_else(|err| {
                warn!(error = %err, "event banner unavailable for approval email");
                None
            }),
            _ => None,
        };
        let (event_date, event_time, event_venue) = match &details {
            Some(details) => (
                or_tba(&details.date),
                or_tba(&details.time),
                or_tba(&details.venue),
            ),
            None => (
                TO_BE_ANNOUNCED.to_string(),
                TO_BE_ANNOUNCED.to_string(),
                TO_BE_ANNOUNCED.to_string(),
            ),
        };

        TicketNotice {
            ticket_id,
            name: registration.name.clone(),
            email: registration.email.clone(),
            contact_no: registration.contact_no.clone(),
            ticket_type: self.config.ticket_type.clone(),
            price: registration.price,
            event_date,
            event_time,
            event_venue,
            banner,
        }
    }

    /// Delete a pending registration and notify the registrant.
    ///
    /// # Errors
    /// `NotFound`, `AlreadyApproved` or `Storage`.
    pub async fn reject(
        &self,
        id: Uuid,
        reviewer: Option<&str>,
        reason: Option<&str>,
    ) -> Result<RejectionOutcome> {
        let registration = self
            .registrations
            .find(id)
            .await
            .map_err(Error::Storage)?
            .ok_or(Error::NotFound("Registration"))?;
        if registration.status == RegistrationStatus::Approved {
            return Err(Error::AlreadyApproved);
        }

        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or(self.config.default_rejection_reason())
            .to_string();

        if !self
            .registrations
            .delete_pending(id)
            .await
            .map_err(Error::Storage)?
        {
            // Approved or deleted between the read and the delete.
            return match self.registrations.find(id).await.map_err(Error::Storage)? {
                Some(_) => Err(Error::AlreadyApproved),
                None => Err(Error::NotFound("Registration")),
            };
        }
        info!(
            registration_id = %id,
            reviewed_by = %reviewer_or_default(reviewer),
            "registration rejected"
        );

        let email_sent = match self
            .deliver(
                self.messenger
                    .send_rejection(&registration.email, &registration.name, &reason),
            )
            .await
        {
            Ok(receipt) => {
                info!(message_id = %receipt.message_id, "rejection email sent");
                true
            }
            Err(err) => {
                warn!(error = %err, registration_id = %id, "rejection email failed");
                false
            }
        };

        Ok(RejectionOutcome {
            id,
            email: registration.email,
            name: registration.name,
            reason,
            email_sent,
        })
    }

    /// # Errors
    /// `Storage`.
    pub async fn stats(&self) -> Result<RegistrationStats> {
        self.registrations.stats().await.map_err(Error::Storage)
    }

    /// # Errors
    /// `Storage`.
    pub async fn list_registrations(
        &self,
        status: Option<RegistrationStatus>,
    ) -> Result<Vec<Registration>> {
        self.registrations.list(status).await.map_err(Error::Storage)
    }

    /// # Errors
    /// `NotFound` or `Storage`.
    pub async fn registration(&self, id: Uuid) -> Result<Registration> {
        self.registrations
            .find(id)
            .await
            .map_err(Error::Storage)?
            .ok_or(Error::NotFound("Registration"))
    }

    /// # Errors
    /// `NotFound` or `Storage`.
    pub async fn attachment(&self, id: Uuid) -> Result<Attachment> {
        self.registrations
            .attachment(id)
            .await
            .map_err(Error::Storage)?
            .ok_or(Error::NotFound("Registration"))
    }

    /// # Errors
    /// `NotFound` or `Storage`.
    pub async fn delete_registration(&self, id: Uuid) -> Result<()> {
        if self
            .registrations
            .delete(id)
            .await
            .map_err(Error::Storage)?
        {
            info!(registration_id = %id, "registration deleted");
            Ok(())
        } else {
            Err(Error::NotFound("Registration"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::desk::admission::tests::register;
    use crate::desk::test_support::{fixture, scripted_fixture};
    use crate::email::SentMessage;

    #[tokio::test]
    async fn approve_assigns_ticket_and_notifies() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;

        let outcome = fx.desk.approve(registration.id, Some("Kasun")).await?;
        assert!(outcome.email_sent);
        assert_eq!(outcome.registration.status, RegistrationStatus::Approved);
        assert_eq!(outcome.registration.reviewed_by.as_deref(), Some("Kasun"));
        let ticket_id = outcome.registration.ticket_id.clone().unwrap_or_default();
        assert!(ticket_id.starts_with("EVT-"));
        assert!(fx.messenger.sent().contains(&SentMessage::Approval {
            email: "alice@example.com".to_string(),
            ticket_id,
            banner: false,
        }));

        let stats = fx.desk.stats().await?;
        assert_eq!(stats.approved, 1);
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.total_revenue, 3000);
        Ok(())
    }

    #[tokio::test]
    async fn reapproval_is_refused() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        let first = fx.desk.approve(registration.id, None).await?;
        assert_eq!(first.registration.reviewed_by.as_deref(), Some("Admin"));

        assert!(matches!(
            fx.desk.approve(registration.id, None).await,
            Err(Error::AlreadyApproved)
        ));
        let stored = fx.desk.registration(registration.id).await?;
        assert_eq!(stored.ticket_id, first.registration.ticket_id);
        Ok(())
    }

    #[tokio::test]
    async fn approval_stands_when_email_fails() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        fx.messenger.set_failing(true);
        let outcome = fx.desk.approve(registration.id, None).await?;
        assert!(!outcome.email_sent);
        assert_eq!(
            fx.desk.registration(registration.id).await?.status,
            RegistrationStatus::Approved
        );
        Ok(())
    }

    #[tokio::test]
    async fn exhausted_ticket_attempts_leave_registration_pending() -> anyhow::Result<()> {
        let (fx, scripted) = scripted_fixture();
        let registration = register(&fx, "alice@example.com").await?;
        scripted.take_all_tickets();

        assert!(matches!(
            fx.desk.approve(registration.id, Some("Kasun")).await,
            Err(Error::IdGenerationFailed { attempts: 10 })
        ));
        let stored = fx.desk.registration(registration.id).await?;
        assert_eq!(stored.status, RegistrationStatus::Pending);
        assert_eq!(stored.ticket_id, None);
        assert!(
            !fx.messenger
                .sent()
                .iter()
                .any(|message| matches!(message, SentMessage::Approval { .. }))
        );
        Ok(())
    }

    #[tokio::test]
    async fn reject_deletes_and_frees_the_email() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        let outcome = fx.desk.reject(registration.id, None, None).await?;
        assert!(outcome.email_sent);
        assert!(outcome.reason.starts_with("Payment verification failed."));
        assert!(matches!(
            fx.desk.registration(registration.id).await,
            Err(Error::NotFound(_))
        ));
        assert_eq!(fx.desk.stats().await?.total, 0);

        // The registrant may start over.
        let again = register(&fx, "alice@example.com").await?;
        assert_eq!(again.status, RegistrationStatus::Pending);
        Ok(())
    }

    #[tokio::test]
    async fn reject_with_custom_reason_reports_failed_email() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        fx.messenger.set_failing(true);
        let outcome = fx
            .desk
            .reject(registration.id, Some("Kasun"), Some("  Amount does not match "))
            .await?;
        assert!(!outcome.email_sent);
        assert_eq!(outcome.reason, "Amount does not match");
        assert_eq!(fx.desk.stats().await?.total, 0);
        Ok(())
    }

    #[tokio::test]
    async fn approved_registration_cannot_be_rejected() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        fx.desk.approve(registration.id, None).await?;
        assert!(matches!(
            fx.desk.reject(registration.id, None, None).await,
            Err(Error::AlreadyApproved)
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let fx = fixture();
        let id = Uuid::new_v4();
        assert!(matches!(fx.desk.approve(id, None).await, Err(Error::NotFound(_))));
        assert!(matches!(
            fx.desk.reject(id, None, None).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(
            fx.desk.delete_registration(id).await,
            Err(Error::NotFound(_))
        ));
        assert!(matches!(fx.desk.attachment(id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn attachment_download_returns_bytes() -> anyhow::Result<()> {
        let fx = fixture();
        let registration = register(&fx, "alice@example.com").await?;
        let attachment = fx.desk.attachment(registration.id).await?;
        assert_eq!(attachment.data.len(), 1024);
        assert_eq!(attachment.mime_type, "image/png");

        let pending = fx
            .desk
            .list_registrations(Some(RegistrationStatus::Pending))
            .await?;
        assert_eq!(pending.len(), 1);

        fx.desk.delete_registration(registration.id).await?;
        assert!(fx.desk.list_registrations(None).await?.is_empty());
        Ok(())
    }

    #[test]
    fn blank_event_fields_become_tba() {
        assert_eq!(or_tba("  "), "TBA");
        assert_eq!(or_tba("Hall A"), "Hall A");
        assert_eq!(reviewer_or_default(Some(" ")), "Admin");
        assert_eq!(reviewer_or_default(Some("Kasun")), "Kasun");
    }
}
