//! PostgreSQL-backed store.

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use tracing::{Instrument, Span, info_span};
use uuid::Uuid;

use super::{ApproveOutcome, BoxFuture, EventDetailsStore, InsertOutcome, RegistrationStore};
use crate::models::{
    Approval, Attachment, AttachmentMeta, Banner, BannerMeta, EventDetails, EventDetailsUpdate,
    NewRegistration, Registration, RegistrationStats, RegistrationStatus,
};

const SCHEMA: &str = include_str!("../../db/sql/01_eventazia.sql");
const EMAIL_CONSTRAINT: &str = "registrations_email_key";
const TICKET_CONSTRAINT: &str = "registrations_ticket_id_key";

macro_rules! registration_columns {
    () => {
        "id, name, contact_no, email, note, note_acknowledged_by, price, attachment_name, \
         attachment_mime, attachment_size, status, ticket_id, reviewed_by, reviewed_at, \
         created_at, updated_at"
    };
}

macro_rules! event_columns {
    () => {
        "date, time, venue, banner_mime, octet_length(banner)::BIGINT AS banner_size, \
         banner_uploaded_at, updated_at, updated_by"
    };
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect with a bounded pool.
    ///
    /// # Errors
    /// Returns an error if the DSN is invalid or the database is unreachable.
    pub async fn connect(dsn: &str, max_connections: u32, acquire_timeout: Duration) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Apply the bundled schema. Every statement is `IF NOT EXISTS`.
    ///
    /// # Errors
    /// Returns an error if any DDL statement fails.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .instrument(query_span("DDL", "01_eventazia.sql"))
            .await
            .context("failed to apply database schema")?;
        Ok(())
    }

    async fn exists(&self, query: &'static str, value: &str) -> Result<bool> {
        let row = sqlx::query(query)
            .bind(value)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to check existence")?;
        Ok(row.get::<bool, _>(0))
    }

    async fn registration_exists(&self, id: Uuid) -> Result<bool> {
        let query = "SELECT EXISTS (SELECT 1 FROM registrations WHERE id = $1)";
        let row = sqlx::query(query)
            .bind(id)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to look up registration")?;
        Ok(row.get::<bool, _>(0))
    }

    async fn ensure_event_row(&self) -> Result<()> {
        let query = "INSERT INTO event_details (id) VALUES (TRUE) ON CONFLICT (id) DO NOTHING";
        sqlx::query(query)
            .execute(&self.pool)
            .instrument(query_span("INSERT", query))
            .await
            .context("failed to create event details")?;
        Ok(())
    }

    async fn fetch_event(&self) -> Result<EventDetails> {
        let query = concat!("SELECT ", event_columns!(), " FROM event_details WHERE id");
        let row = sqlx::query(query)
            .fetch_one(&self.pool)
            .instrument(query_span("SELECT", query))
            .await
            .context("failed to read event details")?;
        event_from_row(&row)
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> Span {
    info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

fn violated_constraint(err: &sqlx::Error) -> Option<&str> {
    match err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            db_err.constraint()
        }
        _ => None,
    }
}

fn registration_from_row(row: &PgRow) -> Result<Registration> {
    let status: String = row.try_get("status")?;
    let size: i64 = row.try_get("attachment_size")?;
    Ok(Registration {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        contact_no: row.try_get("contact_no")?,
        email: row.try_get("email")?,
        note: row.try_get("note")?,
        note_acknowledged_by: row.try_get("note_acknowledged_by")?,
        price: row.try_get("price")?,
        attachment: AttachmentMeta {
            original_name: row.try_get("attachment_name")?,
            mime_type: row.try_get("attachment_mime")?,
            size: u64::try_from(size).unwrap_or_default(),
        },
        status: status
            .parse::<RegistrationStatus>()
            .map_err(|err| anyhow!(err))?,
        ticket_id: row.try_get("ticket_id")?,
        reviewed_by: row.try_get("reviewed_by")?,
        reviewed_at: row.try_get("reviewed_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn event_from_row(row: &PgRow) -> Result<EventDetails> {
    let banner_mime: Option<String> = row.try_get("banner_mime")?;
    let banner_size: Option<i64> = row.try_get("banner_size")?;
    let banner_uploaded_at: Option<DateTime<Utc>> = row.try_get("banner_uploaded_at")?;
    let banner = match (banner_mime, banner_size, banner_uploaded_at) {
        (Some(mime_type), Some(size), Some(uploaded_at)) => Some(BannerMeta {
            mime_type,
            size: u64::try_from(size).unwrap_or_default(),
            uploaded_at,
        }),
        _ => None,
    };
    Ok(EventDetails {
        date: row.try_get("date")?,
        time: row.try_get("time")?,
        venue: row.try_get("venue")?,
        banner,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

impl RegistrationStore for PgStore {
    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let query = "SELECT 1";
            sqlx::query(query)
                .execute(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("database ping failed")?;
            Ok(())
        })
    }

    fn email_registered<'a>(&'a self, email: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.exists(
            "SELECT EXISTS (SELECT 1 FROM registrations WHERE email = $1)",
            email,
        ))
    }

    fn ticket_id_taken<'a>(&'a self, ticket_id: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.exists(
            "SELECT EXISTS (SELECT 1 FROM registrations WHERE ticket_id = $1)",
            ticket_id,
        ))
    }

    fn insert(&self, registration: NewRegistration) -> BoxFuture<'_, Result<InsertOutcome>> {
        Box::pin(async move {
            let query = concat!(
                "INSERT INTO registrations (id, name, contact_no, email, note, price, attachment, \
                 attachment_name, attachment_mime, attachment_size) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING ",
                registration_columns!()
            );
            let size = i64::try_from(registration.attachment.data.len())
                .context("attachment too large")?;
            let result = sqlx::query(query)
                .bind(Uuid::new_v4())
                .bind(&registration.name)
                .bind(&registration.contact_no)
                .bind(&registration.email)
                .bind(registration.note.as_deref())
                .bind(registration.price)
                .bind(&registration.attachment.data)
                .bind(&registration.attachment.original_name)
                .bind(&registration.attachment.mime_type)
                .bind(size)
                .fetch_one(&self.pool)
                .instrument(query_span("INSERT", query))
                .await;

            match result {
                Ok(row) => Ok(InsertOutcome::Created(registration_from_row(&row)?)),
                Err(err) if violated_constraint(&err) == Some(EMAIL_CONSTRAINT) => {
                    Ok(InsertOutcome::EmailTaken)
                }
                Err(err) => Err(err).context("failed to insert registration"),
            }
        })
    }

    fn find(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Registration>>> {
        Box::pin(async move {
            let query = concat!("SELECT ", registration_columns!(), " FROM registrations WHERE id = $1");
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to fetch registration")?;
            row.as_ref().map(registration_from_row).transpose()
        })
    }

    fn list(
        &self,
        status: Option<RegistrationStatus>,
    ) -> BoxFuture<'_, Result<Vec<Registration>>> {
        Box::pin(async move {
            let query = concat!(
                "SELECT ",
                registration_columns!(),
                " FROM registrations WHERE ($1::TEXT IS NULL OR status = $1) \
                 ORDER BY created_at DESC"
            );
            let rows = sqlx::query(query)
                .bind(status.map(RegistrationStatus::as_str))
                .fetch_all(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to list registrations")?;
            rows.iter().map(registration_from_row).collect()
        })
    }

    fn attachment(&self, id: Uuid) -> BoxFuture<'_, Result<Option<Attachment>>> {
        Box::pin(async move {
            let query =
                "SELECT attachment, attachment_name, attachment_mime FROM registrations WHERE id = $1";
            let row = sqlx::query(query)
                .bind(id)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to fetch attachment")?;
            row.map(|row| {
                Ok(Attachment {
                    data: row.try_get("attachment")?,
                    original_name: row.try_get("attachment_name")?,
                    mime_type: row.try_get("attachment_mime")?,
                })
            })
            .transpose()
        })
    }

    fn approve<'a>(
        &'a self,
        id: Uuid,
        approval: &'a Approval,
    ) -> BoxFuture<'a, Result<ApproveOutcome>> {
        Box::pin(async move {
            let query = concat!(
                "UPDATE registrations SET status = 'approved', ticket_id = $2, reviewed_by = $3, \
                 reviewed_at = $4, updated_at = NOW() WHERE id = $1 AND status = 'pending' RETURNING ",
                registration_columns!()
            );
            let result = sqlx::query(query)
                .bind(id)
                .bind(&approval.ticket_id)
                .bind(&approval.reviewed_by)
                .bind(approval.reviewed_at)
                .fetch_optional(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await;

            match result {
                Ok(Some(row)) => Ok(ApproveOutcome::Approved(registration_from_row(&row)?)),
                Ok(None) => {
                    if self.registration_exists(id).await? {
                        Ok(ApproveOutcome::NotPending)
                    } else {
                        Ok(ApproveOutcome::NotFound)
                    }
                }
                Err(err) if violated_constraint(&err) == Some(TICKET_CONSTRAINT) => {
                    Ok(ApproveOutcome::TicketTaken)
                }
                Err(err) => Err(err).context("failed to approve registration"),
            }
        })
    }

    fn delete_pending(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let query = "DELETE FROM registrations WHERE id = $1 AND status = 'pending'";
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .instrument(query_span("DELETE", query))
                .await
                .context("failed to delete pending registration")?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn delete(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let query = "DELETE FROM registrations WHERE id = $1";
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .instrument(query_span("DELETE", query))
                .await
                .context("failed to delete registration")?;
            Ok(result.rows_affected() > 0)
        })
    }

    fn stats(&self) -> BoxFuture<'_, Result<RegistrationStats>> {
        Box::pin(async move {
            let query = r"
                SELECT
                    COUNT(*) AS total,
                    COUNT(*) FILTER (WHERE status = 'pending') AS pending,
                    COUNT(*) FILTER (WHERE status = 'approved') AS approved,
                    COUNT(*) FILTER (WHERE status = 'rejected') AS rejected,
                    COALESCE(SUM(price) FILTER (WHERE status = 'approved'), 0)::BIGINT AS total_revenue
                FROM registrations
            ";
            let row = sqlx::query(query)
                .fetch_one(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to compute registration stats")?;
            Ok(RegistrationStats {
                total: row.try_get("total")?,
                pending: row.try_get("pending")?,
                approved: row.try_get("approved")?,
                rejected: row.try_get("rejected")?,
                total_revenue: row.try_get("total_revenue")?,
            })
        })
    }

    fn with_notes(&self) -> BoxFuture<'_, Result<Vec<Registration>>> {
        Box::pin(async move {
            let query = concat!(
                "SELECT ",
                registration_columns!(),
                " FROM registrations WHERE note IS NOT NULL AND btrim(note) <> '' \
                 ORDER BY created_at DESC"
            );
            let rows = sqlx::query(query)
                .fetch_all(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to list registration notes")?;
            rows.iter().map(registration_from_row).collect()
        })
    }

    fn acknowledge_note<'a>(&'a self, id: Uuid, admin: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            let query = r"
                UPDATE registrations
                SET note_acknowledged_by = array_append(note_acknowledged_by, $2),
                    updated_at = NOW()
                WHERE id = $1 AND NOT ($2 = ANY (note_acknowledged_by))
            ";
            let result = sqlx::query(query)
                .bind(id)
                .bind(admin)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await
                .context("failed to acknowledge note")?;
            if result.rows_affected() > 0 {
                return Ok(true);
            }
            // Either already acknowledged or missing.
            self.registration_exists(id).await
        })
    }

    fn clear_note(&self, id: Uuid) -> BoxFuture<'_, Result<bool>> {
        Box::pin(async move {
            let query = r"
                UPDATE registrations
                SET note = NULL, note_acknowledged_by = '{}', updated_at = NOW()
                WHERE id = $1
            ";
            let result = sqlx::query(query)
                .bind(id)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await
                .context("failed to clear note")?;
            Ok(result.rows_affected() > 0)
        })
    }
}

impl EventDetailsStore for PgStore {
    fn event_details(&self) -> BoxFuture<'_, Result<EventDetails>> {
        Box::pin(async move {
            self.ensure_event_row().await?;
            self.fetch_event().await
        })
    }

    fn update_event_details<'a>(
        &'a self,
        update: &'a EventDetailsUpdate,
    ) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            let query = concat!(
                "INSERT INTO event_details (id, date, time, venue, updated_by, updated_at) \
                 VALUES (TRUE, $1, $2, $3, $4, NOW()) \
                 ON CONFLICT (id) DO UPDATE SET date = EXCLUDED.date, time = EXCLUDED.time, \
                 venue = EXCLUDED.venue, updated_by = EXCLUDED.updated_by, updated_at = NOW() \
                 RETURNING ",
                event_columns!()
            );
            let row = sqlx::query(query)
                .bind(&update.date)
                .bind(&update.time)
                .bind(&update.venue)
                .bind(&update.updated_by)
                .fetch_one(&self.pool)
                .instrument(query_span("UPSERT", query))
                .await
                .context("failed to update event details")?;
            event_from_row(&row)
        })
    }

    fn banner(&self) -> BoxFuture<'_, Result<Option<Banner>>> {
        Box::pin(async move {
            let query = "SELECT banner, banner_mime, banner_uploaded_at FROM event_details \
                         WHERE id AND banner IS NOT NULL";
            let row = sqlx::query(query)
                .fetch_optional(&self.pool)
                .instrument(query_span("SELECT", query))
                .await
                .context("failed to fetch banner")?;
            let Some(row) = row else {
                return Ok(None);
            };
            let mime_type: Option<String> = row.try_get("banner_mime")?;
            let uploaded_at: Option<DateTime<Utc>> = row.try_get("banner_uploaded_at")?;
            Ok(Some(Banner {
                data: row.try_get("banner")?,
                mime_type: mime_type.unwrap_or_else(|| "application/octet-stream".to_string()),
                uploaded_at: uploaded_at.unwrap_or_else(Utc::now),
            }))
        })
    }

    fn set_banner<'a>(
        &'a self,
        banner: &'a Banner,
        updated_by: &'a str,
    ) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            let query = concat!(
                "INSERT INTO event_details (id, banner, banner_mime, banner_uploaded_at, updated_by, updated_at) \
                 VALUES (TRUE, $1, $2, $3, $4, NOW()) \
                 ON CONFLICT (id) DO UPDATE SET banner = EXCLUDED.banner, \
                 banner_mime = EXCLUDED.banner_mime, banner_uploaded_at = EXCLUDED.banner_uploaded_at, \
                 updated_by = EXCLUDED.updated_by, updated_at = NOW() \
                 RETURNING ",
                event_columns!()
            );
            let row = sqlx::query(query)
                .bind(&banner.data)
                .bind(&banner.mime_type)
                .bind(banner.uploaded_at)
                .bind(updated_by)
                .fetch_one(&self.pool)
                .instrument(query_span("UPSERT", query))
                .await
                .context("failed to store banner")?;
            event_from_row(&row)
        })
    }

    fn clear_banner<'a>(&'a self, updated_by: &'a str) -> BoxFuture<'a, Result<EventDetails>> {
        Box::pin(async move {
            self.ensure_event_row().await?;
            let query = r"
                UPDATE event_details
                SET banner = NULL, banner_mime = NULL, banner_uploaded_at = NULL,
                    updated_by = $1, updated_at = NOW()
                WHERE id AND banner IS NOT NULL
            ";
            sqlx::query(query)
                .bind(updated_by)
                .execute(&self.pool)
                .instrument(query_span("UPDATE", query))
                .await
                .context("failed to clear banner")?;
            self.fetch_event().await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_declares_unique_constraints() {
        assert!(SCHEMA.contains(EMAIL_CONSTRAINT));
        assert!(SCHEMA.contains(TICKET_CONSTRAINT));
        assert!(SCHEMA.contains("CREATE TABLE IF NOT EXISTS event_details"));
    }

    #[test]
    fn violated_constraint_ignores_other_errors() {
        assert_eq!(violated_constraint(&sqlx::Error::RowNotFound), None);
    }

    #[tokio::test]
    async fn lazy_pool_store_builds_without_connecting() -> anyhow::Result<()> {
        let pool = PgPoolOptions::new().connect_lazy("postgres://postgres@localhost/eventazia")?;
        let store = PgStore::new(pool);
        let _registrations: &dyn RegistrationStore = &store;
        let _events: &dyn EventDetailsStore = &store;
        Ok(())
    }
}
