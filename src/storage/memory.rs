//! Process-local store with the same uniqueness rules as the database.

use anyhow::Result;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{ApproveOutcome, BoxFuture, EventDetailsStore, InsertOutcome, RegistrationStore};
use crate::models::{
    Approval, Attachment, AttachmentMeta, Banner, BannerMeta, EventDetails, EventDetailsUpdate,
    NewRegistration, Registration, RegistrationStats, RegistrationStatus,
};

struct Row {
    registration: Registration,
    attachment: Attachment,
}

#[derive(Default)]
struct State {
    // Insertion order, so iterating in reverse yields newest first.
    rows: Vec<Row>,
    event: Option<EventDetails>,
    banner: Option<Banner>,
}

impl State {
    fn row_mut(&mut self, id: Uuid) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row.registration.id == id)
    }

    fn event_mut(&mut self) -> &mut EventDetails {
        self.event.get_or_insert_with(EventDetails::defaults)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl RegistrationStore for MemoryStore {
    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn email_registered<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state.rows.iter().any(|row| row.registration.email == email))
        })
    }

    fn ticket_id_taken<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .rows
                .iter()
                .any(|row| row.registration.ticket_id.as_deref() == Some(ticket_id)))
        })
    }

    fn insert(&self, registration: NewRegistration) -> BoxFuture<'_, Result<InsertOutcome>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            if state
                .rows
                .iter()
                .any(|row| row.registration.email == registration.email)
            {
                return Ok(InsertOutcome::EmailTaken);
            }

            let now = Utc::now();
            let stored = Registration {
                id: Uuid::new_v4(),
                name: registration.name,
                contact_no: registration.contact_no,
                email: registration.email,
                note: registration.note,
                note_acknowledged_by: Vec::new(),
                price: registration.price,
                attachment: AttachmentMeta {
                    original_name: registration.attachment.original_name.clone(),
                    mime_type: registration.attachment.mime_type.clone(),
                    size: registration.attachment.size(),
                },
                status: RegistrationStatus::Pending,
                ticket_id: None,
                reviewed_by: None,
                reviewed_at: None,
                created_at: now,
                updated_at: now,
            };
            state.rows.push(Row {
                registration: stored.clone(),
                attachment: registration.attachment,
            });
            Ok(InsertOutcome::Created(stored))
        })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Registration>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .rows
                .iter()
                .find(|row| row.registration.id == id)
                .map(|row| row.registration.clone()))
        })
    }

    fn list(
        &self,
        status: Option<RegistrationStatus>,
    ) -> BoxFuture<'_, Result<Vec<Registration>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .rows
                .iter()
                .rev()
                .filter(|row| status.is_none_or(|status| row.registration.status == status))
                .map(|row| row.registration.clone())
                .collect())
        })
    }

    fn attachment(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Attachment>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .rows
                .iter()
                .find(|row| row.registration.id == id)
                .map(|row| row.attachment.clone()))
        })
    }

    fn approve<'a>(
        &'a self,
        id: Uuid,
        approval: &'a Approval,
    ) -> BoxFuture<'a, Result<ApproveOutcome>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let ticket_taken = state
                .rows
                .iter()
                .any(|row| row.registration.ticket_id.as_deref() == Some(approval.ticket_id.as_str()));
            let Some(row) = state.row_mut(id) else {
                return Ok(ApproveOutcome::NotFound);
            };
            if row.registration.status != RegistrationStatus::Pending {
                return Ok(ApproveOutcome::NotPending);
            }
            if ticket_taken {
                return Ok(ApproveOutcome::TicketTaken);
            }

            let registration = &mut row.registration;
            registration.status = RegistrationStatus::Approved;
            registration.ticket_id = Some(approval.ticket_id.clone());
            registration.reviewed_by = Some(approval.reviewed_by.clone());
            registration.reviewed_at = Some(approval.reviewed_at);
            registration.updated_at = Utc::now();
            Ok(ApproveOutcome::Approved(registration.clone()))
        })
    }

    fn delete_pending(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let before = state.rows.len();
            state.rows.retain(|row| {
                row.registration.id != id || row.registration.status != RegistrationStatus::Pending
            });
            Ok(state.rows.len() < before)
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let before = state.rows.len();
            state.rows.retain(|row| row.registration.id != id);
            Ok(state.rows.len() < before)
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<RegistrationStats>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            let mut stats = RegistrationStats::default();
            for row in &state.rows {
                stats.total += 1;
                match row.registration.status {
                    RegistrationStatus::Pending => stats.pending += 1,
                    RegistrationStatus::Approved => {
                        stats.approved += 1;
                        stats.total_revenue += row.registration.price;
                    }
                    RegistrationStatus::Rejected => stats.rejected += 1,
                }
            }
            Ok(stats)
        })
    }

    fn with_notes(&self) -> BoxFuture<'_, Result<Vec<Registration>>> {
        Box::pin(async move {
            let state = self.state.lock().await;
            Ok(state
                .rows
                .iter()
                .rev()
                .filter(|row| row.registration.has_note())
                .map(|row| row.registration.clone())
                .collect())
        })
    }

    fn acknowledge_note<'a>(&'a self, id: Uuid, admin: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let Some(row) = state.row_mut(id) else {
                return Ok(false);
            };
            let registration = &mut row.registration;
            if !registration.acknowledged_by(admin) {
                registration.note_acknowledged_by.push(admin.to_string());
                registration.updated_at = Utc::now();
            }
            Ok(true)
        })
    }

    fn clear_note(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let Some(row) = state.row_mut(id) else {
                return Ok(false);
            };
            row.registration.note = None;
            row.registration.note_acknowledged_by.clear();
            row.registration.updated_at = Utc::now();
            Ok(true)
        })
    }
}

impl EventDetailsStore for MemoryStore {
    fn event_details(&self) -> BoxFuture<'_, Result<EventDetails>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            Ok(state.event_mut().clone())
        })
    }

    fn update_event_details<'a>(
        &'a self,
        update: &'a EventDetailsUpdate,
    ) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            let event = state.event_mut();
            event.date.clone_from(&update.date);
            event.time.clone_from(&update.time);
            event.venue.clone_from(&update.venue);
            event.updated_by.clone_from(&update.updated_by);
            event.updated_at = Utc::now();
            Ok(event.clone())
        })
    }

    fn banner(&self) -> BoxFuture<'_, Result<Option<Banner>>> {
        Box::pin(async move { Ok(self.state.lock().await.banner.clone()) })
    }

    fn set_banner<'a>(
        &'a self,
        banner: &'a Banner,
        updated_by: &'a str,
    ) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.banner = Some(banner.clone());
            let event = state.event_mut();
            event.banner = Some(BannerMeta {
                mime_type: banner.mime_type.clone(),
                size: banner.data.len() as u64,
                uploaded_at: banner.uploaded_at,
            });
            event.updated_by = updated_by.to_string();
            event.updated_at = Utc::now();
            Ok(event.clone())
        })
    }

    fn clear_banner<'a>(&'a self, updated_by: &'a str) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.banner = None;
            let event = state.event_mut();
            if event.banner.take().is_some() {
                event.updated_by = updated_by.to_string();
                event.updated_at = Utc::now();
            }
            Ok(event.clone())
        })
    }
}
