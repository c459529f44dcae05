//! Registrant notes surfaced to admins as notifications.

use serde::Serialize;
use tracing::info;
use utoipa::ToSchema;
use uuid::Uuid;

use super::Desk;
use crate::error::{Error, Result};
use crate::models::{DEFAULT_ADMIN, Registration};

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NoteFeed {
    pub all: Vec<Registration>,
    pub unread: Vec<Registration>,
    pub unread_count: usize,
}

fn admin_or_default(admin: Option<&str>) -> &str {
    admin
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ADMIN)
}

impl Desk {
    /// Every registration with a note, split by whether `admin` has read it.
    ///
    /// # Errors
    /// `Storage`.
    pub async fn list_notes(&self, admin: Option<&str>) -> Result<NoteFeed> {
        let admin = admin_or_default(admin);
        let all = self
            .registrations
            .with_notes()
            .await
            .map_err(Error::Storage)?;
        let unread: Vec<Registration> = all
            .iter()
            .filter(|registration| !registration.acknowledged_by(admin))
            .cloned()
            .collect();
        Ok(NoteFeed {
            unread_count: unread.len(),
            all,
            unread,
        })
    }

    /// # Errors
    /// `NotFound` or `Storage`.
    pub async fn acknowledge_note(&self, id: Uuid, admin: Option<&str>) -> Result<()> {
        let admin = admin_or_default(admin);
        if self
            .registrations
            .acknowledge_note(id, admin)
            .await
            .map_err(Error::Storage)?
        {
            info!(registration_id = %id, admin = %admin, "note acknowledged");
            Ok(())
        } else {
            Err(Error::NotFound("Registration"))
        }
    }

    /// # Errors
    /// `NotFound` or `Storage`.
    pub async fn clear_note(&self, id: Uuid) -> Result<()> {
        if self
            .registrations
            .clear_note(id)
            .await
            .map_err(Error::Storage)?
        {
            info!(registration_id = %id, "note cleared");
            Ok(())
        } else {
            Err(Error::NotFound("Registration"))
        }
    }
}
