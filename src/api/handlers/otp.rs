//! Email OTP endpoints.

use axum::{
    Json,
    extract::Extension,
    http::StatusCode,
    response::Response,
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ApiFailure, ApiResponse, failure, success};
use crate::api::Environment;
use crate::desk::{Desk, OtpIssued, OtpVerified};
use crate::error::Error;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub otp: String,
}

#[utoipa::path(
    post,
    path = "/api/send-email-otp",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "Code sent", body = ApiResponse<OtpIssued>),
        (status = 400, description = "Invalid email", body = ApiFailure),
        (status = 409, description = "Email already registered", body = ApiFailure),
        (status = 429, description = "Too many requests", body = ApiFailure),
        (status = 502, description = "Email delivery failed", body = ApiFailure)
    ),
    tag = "otp"
)]
pub async fn send_email_otp(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    payload: Option<Json<SendOtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return failure(
            &Error::InvalidInput("Email is required".to_string()),
            *environment,
        );
    };

    match desk.issue_otp(&request.email).await {
        Ok(issued) => success(StatusCode::OK, "OTP sent successfully to your email", issued),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    post,
    path = "/api/verify-email-otp",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<OtpVerified>),
        (status = 400, description = "Wrong, expired or missing code", body = ApiFailure),
        (status = 409, description = "Email already registered", body = ApiFailure)
    ),
    tag = "otp"
)]
pub async fn verify_email_otp(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    payload: Option<Json<VerifyOtpRequest>>,
) -> Response {
    let Some(Json(request)) = payload else {
        return failure(
            &Error::InvalidInput("Email and OTP are required".to_string()),
            *environment,
        );
    };

    match desk.verify_otp(&request.email, &request.otp).await {
        Ok(verified) => success(StatusCode::OK, "Email verified successfully", verified),
        Err(err) => failure(&err, *environment),
    }
}
