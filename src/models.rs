//! Durable records: registrations and the event details singleton.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;

pub const DEFAULT_EVENT_DATE: &str = "December 15, 2025";
pub const DEFAULT_EVENT_TIME: &str = "6:00 PM - 11:00 PM";
pub const DEFAULT_EVENT_VENUE: &str = "Grand Ballroom";
pub const DEFAULT_ADMIN: &str = "Admin";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Pending,
    Approved,
    Rejected,
}

impl RegistrationStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for RegistrationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RegistrationStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "approved" => Ok(Self::Approved),
            "rejected" => Ok(Self::Rejected),
            other => Err(format!("unknown registration status: {other}")),
        }
    }
}

/// Uploaded file as received. Only the download path ever carries the bytes.
#[derive(Clone, Debug)]
pub struct Attachment {
    pub data: Vec<u8>,
    pub original_name: String,
    pub mime_type: String,
}

impl Attachment {
    #[must_use]
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
}

/// Registration as returned to reviewers, without attachment bytes.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub id: Uuid,
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub note: Option<String>,
    pub note_acknowledged_by: Vec<String>,
    pub price: i64,
    pub attachment: AttachmentMeta,
    pub status: RegistrationStatus,
    pub ticket_id: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    #[must_use]
    pub fn has_note(&self) -> bool {
        self.note.as_deref().is_some_and(|note| !note.trim().is_empty())
    }

    #[must_use]
    pub fn acknowledged_by(&self, admin: &str) -> bool {
        self.note_acknowledged_by.iter().any(|name| name == admin)
    }
}

/// Validated submission ready to persist.
#[derive(Clone, Debug)]
pub struct NewRegistration {
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub note: Option<String>,
    pub price: i64,
    pub attachment: Attachment,
}

#[derive(Clone, Debug)]
pub struct Approval {
    pub ticket_id: String,
    pub reviewed_by: String,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationStats {
    pub total: i64,
    pub pending: i64,
    pub approved: i64,
    pub rejected: i64,
    pub total_revenue: i64,
}

#[derive(Clone, Debug)]
pub struct Banner {
    pub data: Vec<u8>,
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannerMeta {
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    pub date: String,
    pub time: String,
    pub venue: String,
    pub banner: Option<BannerMeta>,
    pub updated_at: DateTime<Utc>,
    pub updated_by: String,
}

impl EventDetails {
    /// The singleton as first created.
    #[must_use]
    pub fn defaults() -> Self {
        Self {
            date: DEFAULT_EVENT_DATE.to_string(),
            time: DEFAULT_EVENT_TIME.to_string(),
            venue: DEFAULT_EVENT_VENUE.to_string(),
            banner: None,
            updated_at: Utc::now(),
            updated_by: DEFAULT_ADMIN.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EventDetailsUpdate {
    pub date: String,
    pub time: String,
    pub venue: String,
    pub updated_by: String,
}
