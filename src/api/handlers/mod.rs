//! HTTP handlers and the JSON envelope they all answer with.
//!
//! Every JSON response is `{ success, message, data?, error?, errorKind? }`.
//! Failures carry the stable error kind and a `retryable` hint; the internal
//! detail in `error` is only included outside production.

pub mod event_details;
pub mod health;
pub mod otp;
pub mod registrations;
pub mod root;

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};
use utoipa::ToSchema;

use crate::api::Environment;
use crate::error::Error;

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ApiFailure {
    pub success: bool,
    pub message: String,
    pub error_kind: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub already_registered: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_verification: Option<bool>,
}

pub(crate) fn success<T: Serialize>(status: StatusCode, message: &str, data: T) -> Response {
    (
        status,
        Json(ApiResponse {
            success: true,
            message: message.to_string(),
            data: Some(data),
        }),
    )
        .into_response()
}

pub(crate) fn failure(err: &Error, environment: Environment) -> Response {
    let status = err.status();
    if status.is_server_error() {
        error!(error = %err, kind = err.kind(), "request failed");
    } else {
        warn!(error = %err, kind = err.kind(), "request rejected");
    }

    let body = ApiFailure {
        success: false,
        message: err.public_message(),
        error_kind: err.kind().to_string(),
        retryable: err.is_retryable(),
        error: environment.exposes_errors().then(|| err.to_string()),
        already_registered: matches!(err, Error::AlreadyRegistered).then_some(true),
        requires_verification: matches!(err, Error::VerificationRequired).then_some(true),
    };
    (status, Json(body)).into_response()
}

/// An upload over the body limit reads as an attachment error naming `subject`.
pub(crate) fn multipart_error(err: &MultipartError, subject: &str, max_bytes: usize) -> Error {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        Error::InvalidAttachment(format!(
            "{subject} must be less than {}MB",
            max_bytes / (1024 * 1024)
        ))
    } else {
        Error::InvalidInput(format!("Invalid form data: {}", err.body_text()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    async fn body(response: Response) -> anyhow::Result<Value> {
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    #[tokio::test]
    async fn failure_hides_detail_in_production() -> anyhow::Result<()> {
        let err = Error::Storage(anyhow::anyhow!("pool timed out"));

        let response = failure(&err, Environment::Production);
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body(response).await?;
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Internal server error");
        assert_eq!(json["errorKind"], "storage");
        assert_eq!(json["retryable"], true);
        assert!(json.get("error").is_none());

        let json = body(failure(&err, Environment::Development)).await?;
        assert!(
            json["error"]
                .as_str()
                .is_some_and(|detail| detail.contains("pool timed out"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn failure_flags_registration_state() -> anyhow::Result<()> {
        let json = body(failure(&Error::AlreadyRegistered, Environment::Production)).await?;
        assert_eq!(json["alreadyRegistered"], true);
        assert_eq!(json["retryable"], false);
        assert!(json.get("requiresVerification").is_none());

        let json = body(failure(&Error::VerificationRequired, Environment::Production)).await?;
        assert_eq!(json["requiresVerification"], true);
        Ok(())
    }

    #[tokio::test]
    async fn success_wraps_data() -> anyhow::Result<()> {
        let response = success(StatusCode::CREATED, "Created", serde_json::json!({"id": 1}));
        assert_eq!(response.status(), StatusCode::CREATED);
        let json = body(response).await?;
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["id"], 1);
        Ok(())
    }
}
