//! Durable storage seams for registrations and event details.
//!
//! The service only talks to [`RegistrationStore`] and [`EventDetailsStore`].
//! [`PgStore`] is the production implementation; [`MemoryStore`] keeps
//! everything in process memory for tests and `--in-memory` development runs.
//! Both enforce the same uniqueness rules: one registration per email and one
//! registration per ticket id.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use anyhow::Result;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

use crate::models::{
    Approval, Attachment, Banner, EventDetails, EventDetailsUpdate, NewRegistration, Registration,
    RegistrationStats, RegistrationStatus,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

#[derive(Debug)]
pub enum InsertOutcome {
    Created(Registration),
    EmailTaken,
}

#[derive(Debug)]
pub enum ApproveOutcome {
    Approved(Registration),
    TicketTaken,
    NotPending,
    NotFound,
}

pub trait RegistrationStore: Send + Sync {
    fn ping(&self) -> BoxFuture<'_, Result<()>>;

    fn email_registered<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<bool>>;

    fn ticket_id_taken<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, Result<bool>>;

    fn insert(&self, registration: NewRegistration) -> BoxFuture<'_, Result<InsertOutcome>>;

    fn find(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Registration>>>;

    /// Newest first.
    fn list(&self, status: Option<RegistrationStatus>)
    -> BoxFuture<'_, Result<Vec<Registration>>>;

    fn attachment(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Attachment>>>;

    /// Move a pending registration to approved with the given ticket id.
    fn approve<'a>(&'a self, id: Uuid, approval: &'a Approval)
    -> BoxFuture<'a, Result<ApproveOutcome>>;

    /// Delete only while pending. Returns whether a row was removed.
    fn delete_pending(&self, id: Uuid) -> BoxFuture<'_, Result<bool>>;

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<bool>>;

    fn stats(&self) -> BoxFuture<'_, Result<RegistrationStats>>;

    /// Registrations carrying a non-blank note, newest first.
    fn with_notes(&self) -> BoxFuture<'_, Result<Vec<Registration>>>;

    /// Returns `false` when the registration does not exist.
    fn acknowledge_note<'a>(&'a self, id: Uuid, admin: &'a str) -> BoxFuture<'a, Result<bool>>;

    /// Returns `false` when the registration does not exist.
    fn clear_note(&self, id: Uuid) -> BoxFuture<'_, Result<bool>>;
}

pub trait EventDetailsStore: Send + Sync {
    /// Read the singleton, creating it with defaults on first access.
    fn event_details(&self) -> BoxFuture<'_, Result<EventDetails>>;

    fn update_event_details<'a>(
        &'a self,
        update: &'a EventDetailsUpdate,
    ) -> BoxFuture<'a, Result<EventDetails>>;

    fn banner(&self) -> BoxFuture<'_, Result<Option<Banner>>>;

    fn set_banner<'a>(
        &'a self,
        banner: &'a Banner,
        updated_by: &'a str,
    ) -> BoxFuture<'a, Result<EventDetails>>;

    fn clear_banner<'a>(&'a self, updated_by: &'a str) -> BoxFuture<'a, Result<EventDetails>>;
}
