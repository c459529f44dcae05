//! Ticket registration endpoints: submission, review and admin notifications.

use axum::{
    Json,
    extract::{
        Extension, Multipart, Path, Query,
        multipart::MultipartRejection,
        rejection::PathRejection,
    },
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use super::{ApiFailure, ApiResponse, failure, multipart_error, success};
use crate::api::Environment;
use crate::desk::{ApprovalOutcome, Desk, NoteFeed, RejectionOutcome, Submission};
use crate::error::Error;
use crate::models::{Attachment, Registration, RegistrationStats, RegistrationStatus};

/// Multipart form accepted by `POST /api/ticket-registrations`.
#[allow(dead_code)]
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub name: String,
    pub contact_no: String,
    pub email: String,
    pub additional_description: Option<String>,
    #[schema(value_type = String, format = Binary)]
    pub bank_slip: Vec<u8>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListQuery {
    /// `pending`, `approved` or `all`.
    pub status: Option<String>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct NotificationsQuery {
    /// Admin whose read state is reported. Defaults to `Admin`.
    pub username: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub reviewed_by: Option<String>,
    #[serde(alias = "reason")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub username: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RegistrationRef {
    pub id: Uuid,
}

fn registration_id(path: Result<Path<Uuid>, PathRejection>) -> Result<Uuid, Error> {
    path.map(|Path(id)| id)
        .map_err(|_| Error::InvalidInput("Invalid registration id".to_string()))
}

fn parse_status(status: Option<&str>) -> Result<Option<RegistrationStatus>, Error> {
    match status.map(str::trim) {
        None | Some("" | "all") => Ok(None),
        Some(value) => value.parse().map(Some).map_err(Error::InvalidInput),
    }
}

async fn read_submission(mut multipart: Multipart, max_bytes: usize) -> Result<Submission, Error> {
    let mut submission = Submission::default();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(&err, "File size", max_bytes))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "bankSlip" => {
                let original_name = field.file_name().unwrap_or("bank-slip").to_string();
                let mime_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_error(&err, "File size", max_bytes))?;
                submission.attachment = Some(Attachment {
                    data: data.to_vec(),
                    original_name,
                    mime_type,
                });
            }
            "name" | "contactNo" | "email" | "additionalDescription" => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| multipart_error(&err, "File size", max_bytes))?;
                match name.as_str() {
                    "name" => submission.name = value,
                    "contactNo" => submission.contact_no = value,
                    "email" => submission.email = value,
                    _ => submission.note = Some(value),
                }
            }
            _ => {}
        }
    }
    Ok(submission)
}

/// Keep the download filename header-safe.
fn attachment_filename(original_name: &str) -> String {
    let cleaned: String = original_name
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .filter(|c| !matches!(c, '"' | '\\' | '/'))
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        "bank-slip".to_string()
    } else {
        cleaned.to_string()
    }
}

#[utoipa::path(
    post,
    path = "/api/ticket-registrations",
    request_body(content = RegistrationForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Registration submitted", body = ApiResponse<Registration>),
        (status = 400, description = "Missing fields, unverified email or invalid bank slip", body = ApiFailure),
        (status = 409, description = "Email already registered", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn submit_registration(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            let err = Error::InvalidInput(format!("Invalid form data: {}", rejection.body_text()));
            return failure(&err, *environment);
        }
    };

    let submission = match read_submission(multipart, desk.config().max_attachment_bytes()).await {
        Ok(submission) => submission,
        Err(err) => return failure(&err, *environment),
    };

    match desk.submit(submission).await {
        Ok(registration) => success(
            StatusCode::CREATED,
            "Registration submitted successfully! You will receive a confirmation email once your payment is verified.",
            registration,
        ),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/ticket-registrations",
    params(ListQuery),
    responses(
        (status = 200, description = "Registrations, newest first", body = ApiResponse<Vec<Registration>>),
        (status = 400, description = "Unknown status filter", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn list_registrations(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    Query(query): Query<ListQuery>,
) -> Response {
    let status = match parse_status(query.status.as_deref()) {
        Ok(status) => status,
        Err(err) => return failure(&err, *environment),
    };
    match desk.list_registrations(status).await {
        Ok(registrations) => success(StatusCode::OK, "Registrations retrieved", registrations),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/ticket-registrations/stats",
    responses(
        (status = 200, description = "Counts by status and approved revenue", body = ApiResponse<RegistrationStats>)
    ),
    tag = "registrations"
)]
pub async fn registration_stats(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
) -> Response {
    match desk.stats().await {
        Ok(stats) => success(StatusCode::OK, "Statistics retrieved", stats),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/ticket-registrations/notifications",
    params(NotificationsQuery),
    responses(
        (status = 200, description = "Registrant notes with per-admin read state", body = ApiResponse<NoteFeed>)
    ),
    tag = "notifications"
)]
pub async fn list_notifications(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    Query(query): Query<NotificationsQuery>,
) -> Response {
    match desk.list_notes(query.username.as_deref()).await {
        Ok(feed) => success(StatusCode::OK, "Notifications retrieved", feed),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/ticket-registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Registration", body = ApiResponse<Registration>),
        (status = 404, description = "Not found", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn get_registration(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match registration_id(path) {
        Ok(id) => desk.registration(id).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(registration) => success(StatusCode::OK, "Registration retrieved", registration),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/ticket-registrations/{id}/download-slip",
    params(("id" = Uuid, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Bank slip file", content_type = "application/octet-stream"),
        (status = 404, description = "Not found", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn download_slip(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match registration_id(path) {
        Ok(id) => desk.attachment(id).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(attachment) => {
            let disposition = format!(
                "attachment; filename=\"{}\"",
                attachment_filename(&attachment.original_name)
            );
            (
                StatusCode::OK,
                [(CONTENT_TYPE, attachment.mime_type), (CONTENT_DISPOSITION, disposition)],
                attachment.data,
            )
                .into_response()
        }
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    put,
    path = "/api/ticket-registrations/{id}/approve",
    params(("id" = Uuid, Path, description = "Registration id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Approved, ticket issued", body = ApiResponse<ApprovalOutcome>),
        (status = 404, description = "Not found", body = ApiFailure),
        (status = 409, description = "Already approved", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn approve_registration(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Option<Json<ReviewRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let result = match registration_id(path) {
        Ok(id) => desk.approve(id, request.reviewed_by.as_deref()).await,
        Err(err) => Err(err),
    };
    match result {
        Ok(outcome) => {
            let message = if outcome.email_sent {
                "Registration approved and ticket sent"
            } else {
                "Registration approved, but the ticket email could not be sent"
            };
            success(StatusCode::OK, message, outcome)
        }
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    put,
    path = "/api/ticket-registrations/{id}/reject",
    params(("id" = Uuid, Path, description = "Registration id")),
    request_body = ReviewRequest,
    responses(
        (status = 200, description = "Rejected and deleted", body = ApiResponse<RejectionOutcome>),
        (status = 404, description = "Not found", body = ApiFailure),
        (status = 409, description = "Already approved", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn reject_registration(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Option<Json<ReviewRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let result = match registration_id(path) {
        Ok(id) => {
            desk.reject(
                id,
                request.reviewed_by.as_deref(),
                request.rejection_reason.as_deref(),
            )
            .await
        }
        Err(err) => Err(err),
    };
    match result {
        Ok(outcome) => success(
            StatusCode::OK,
            "Registration rejected and removed",
            outcome,
        ),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    put,
    path = "/api/ticket-registrations/{id}/mark-read",
    params(("id" = Uuid, Path, description = "Registration id")),
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Note acknowledged", body = ApiResponse<RegistrationRef>),
        (status = 404, description = "Not found", body = ApiFailure)
    ),
    tag = "notifications"
)]
pub async fn mark_notification_read(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
    payload: Option<Json<MarkReadRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    let result = match registration_id(path) {
        Ok(id) => desk
            .acknowledge_note(id, request.username.as_deref())
            .await
            .map(|()| id),
        Err(err) => Err(err),
    };
    match result {
        Ok(id) => success(StatusCode::OK, "Notification marked as read", RegistrationRef { id }),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    delete,
    path = "/api/ticket-registrations/{id}/notification",
    params(("id" = Uuid, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Note removed", body = ApiResponse<RegistrationRef>),
        (status = 404, description = "Not found", body = ApiFailure)
    ),
    tag = "notifications"
)]
pub async fn clear_notification(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match registration_id(path) {
        Ok(id) => desk.clear_note(id).await.map(|()| id),
        Err(err) => Err(err),
    };
    match result {
        Ok(id) => success(StatusCode::OK, "Notification removed", RegistrationRef { id }),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    delete,
    path = "/api/ticket-registrations/{id}",
    params(("id" = Uuid, Path, description = "Registration id")),
    responses(
        (status = 200, description = "Deleted", body = ApiResponse<RegistrationRef>),
        (status = 404, description = "Not found", body = ApiFailure)
    ),
    tag = "registrations"
)]
pub async fn delete_registration(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    path: Result<Path<Uuid>, PathRejection>,
) -> Response {
    let result = match registration_id(path) {
        Ok(id) => desk.delete_registration(id).await.map(|()| id),
        Err(err) => Err(err),
    };
    match result {
        Ok(id) => success(
            StatusCode::OK,
            "Registration deleted successfully",
            RegistrationRef { id },
        ),
        Err(err) => failure(&err, *environment),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parsing() {
        assert!(matches!(parse_status(None), Ok(None)));
        assert!(matches!(parse_status(Some("all")), Ok(None)));
        assert!(matches!(
            parse_status(Some("approved")),
            Ok(Some(RegistrationStatus::Approved))
        ));
        assert!(matches!(
            parse_status(Some("archived")),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn filenames_are_header_safe() {
        assert_eq!(attachment_filename("slip \"final\".pdf"), "slip final.pdf");
        assert_eq!(attachment_filename("../../etc/passwd"), "....etcpasswd");
        assert_eq!(attachment_filename("රසීදය.png"), ".png");
        assert_eq!(attachment_filename("\"\""), "bank-slip");
    }

    #[test]
    fn review_request_accepts_camel_case() -> anyhow::Result<()> {
        let request: ReviewRequest = serde_json::from_value(serde_json::json!({
            "reviewedBy": "Kasun",
            "rejectionReason": "Wrong amount"
        }))?;
        assert_eq!(request.reviewed_by.as_deref(), Some("Kasun"));
        assert_eq!(request.rejection_reason.as_deref(), Some("Wrong amount"));

        let request: ReviewRequest =
            serde_json::from_value(serde_json::json!({ "reason": "Blurry slip" }))?;
        assert_eq!(request.rejection_reason.as_deref(), Some("Blurry slip"));
        Ok(())
    }
}
