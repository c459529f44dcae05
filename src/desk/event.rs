//! Event details singleton and its banner image.

use chrono::Utc;
use tracing::info;

use super::Desk;
use crate::error::{Error, Result};
use crate::models::{Banner, DEFAULT_ADMIN, EventDetails, EventDetailsUpdate};

const ALLOWED_BANNER_TYPES: [&str; 4] = ["image/jpeg", "image/jpg", "image/png", "image/webp"];

fn editor_or_default(updated_by: Option<&str>) -> String {
    updated_by
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(DEFAULT_ADMIN)
        .to_string()
}

impl Desk {
    /// # Errors
    /// `Storage`.
    pub async fn event_details(&self) -> Result<EventDetails> {
        self.events.event_details().await.map_err(Error::Storage)
    }

    /// # Errors
    /// `InvalidInput` when any of date, time or venue is blank, or `Storage`.
    pub async fn update_event_details(
        &self,
        date: &str,
        time: &str,
        venue: &str,
        updated_by: Option<&str>,
    ) -> Result<EventDetails> {
        let (date, time, venue) = (date.trim(), time.trim(), venue.trim());
        if date.is_empty() || time.is_empty() || venue.is_empty() {
            return Err(Error::InvalidInput(
                "Date, time, and venue are required".to_string(),
            ));
        }
        let update = EventDetailsUpdate {
            date: date.to_string(),
            time: time.to_string(),
            venue: venue.to_string(),
            updated_by: editor_or_default(updated_by),
        };
        let details = self
            .events
            .update_event_details(&update)
            .await
            .map_err(Error::Storage)?;
        info!(updated_by = %details.updated_by, "event details updated");
        Ok(details)
    }

    /// # Errors
    /// `InvalidAttachment` for a missing, empty, oversized or non-image file, or
    /// `Storage`.
    pub async fn upload_banner(
        &self,
        data: Vec<u8>,
        mime_type: &str,
        updated_by: Option<&str>,
    ) -> Result<EventDetails> {
        let mime_type = mime_type.trim().to_ascii_lowercase();
        if !ALLOWED_BANNER_TYPES.contains(&mime_type.as_str()) {
            return Err(Error::InvalidAttachment(
                "Only JPG, PNG, and WEBP images are allowed".to_string(),
            ));
        }
        if data.is_empty() {
            return Err(Error::InvalidAttachment("Banner image is empty".to_string()));
        }
        let max = self.config.max_banner_bytes();
        if data.len() > max {
            return Err(Error::InvalidAttachment(format!(
                "Banner image must be less than {}MB",
                max / (1024 * 1024)
            )));
        }

        let banner = Banner {
            data,
            mime_type,
            uploaded_at: Utc::now(),
        };
        let updated_by = editor_or_default(updated_by);
        let details = self
            .events
            .set_banner(&banner, &updated_by)
            .await
            .map_err(Error::Storage)?;
        info!(size = banner.data.len(), updated_by = %updated_by, "event banner uploaded");
        Ok(details)
    }

    /// # Errors
    /// `NotFound` when no banner is set, or `Storage`.
    pub async fn banner(&self) -> Result<Banner> {
        self.events
            .banner()
            .await
            .map_err(Error::Storage)?
            .ok_or(Error::NotFound("Banner"))
    }

    /// Idempotent.
    ///
    /// # Errors
    /// `Storage`.
    pub async fn delete_banner(&self, updated_by: Option<&str>) -> Result<EventDetails> {
        let details = self
            .events
            .clear_banner(&editor_or_default(updated_by))
            .await
            .map_err(Error::Storage)?;
        info!("event banner removed");
        Ok(details)
    }
}
