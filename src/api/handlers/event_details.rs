//! Public event details and the admin-managed banner image.

use axum::{
    Json,
    extract::{Extension, Multipart, multipart::MultipartRejection},
    http::{
        StatusCode,
        header::{CACHE_CONTROL, CONTENT_TYPE},
    },
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;
use utoipa::ToSchema;

use super::{ApiFailure, ApiResponse, failure, multipart_error, success};
use crate::api::Environment;
use crate::desk::Desk;
use crate::error::Error;
use crate::models::EventDetails;

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct EventDetailsRequest {
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub venue: String,
    pub updated_by: Option<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BannerDeleteRequest {
    pub updated_by: Option<String>,
}

/// Multipart form accepted by `POST /api/event-details/banner`.
#[allow(dead_code)]
#[derive(ToSchema)]
#[schema(rename_all = "camelCase")]
pub struct BannerForm {
    #[schema(value_type = String, format = Binary)]
    pub banner: Vec<u8>,
    pub updated_by: Option<String>,
}

struct BannerUpload {
    data: Option<Vec<u8>>,
    mime_type: String,
    updated_by: Option<String>,
}

async fn read_banner(mut multipart: Multipart, max_bytes: usize) -> Result<BannerUpload, Error> {
    let mut upload = BannerUpload {
        data: None,
        mime_type: String::new(),
        updated_by: None,
    };
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| multipart_error(&err, "Banner image", max_bytes))?
    {
        match field.name() {
            Some("banner") => {
                upload.mime_type = field.content_type().unwrap_or_default().to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|err| multipart_error(&err, "Banner image", max_bytes))?;
                upload.data = Some(data.to_vec());
            }
            Some("updatedBy") => {
                let value = field
                    .text()
                    .await
                    .map_err(|err| multipart_error(&err, "Banner image", max_bytes))?;
                upload.updated_by = Some(value);
            }
            _ => {}
        }
    }
    Ok(upload)
}

#[utoipa::path(
    get,
    path = "/api/event-details",
    responses(
        (status = 200, description = "Current event details", body = ApiResponse<EventDetails>)
    ),
    tag = "event"
)]
pub async fn get_event_details(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
) -> Response {
    match desk.event_details().await {
        Ok(details) => success(StatusCode::OK, "Event details retrieved", details),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    put,
    path = "/api/event-details",
    request_body = EventDetailsRequest,
    responses(
        (status = 200, description = "Event details updated", body = ApiResponse<EventDetails>),
        (status = 400, description = "Date, time or venue missing", body = ApiFailure)
    ),
    tag = "event"
)]
pub async fn update_event_details(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    payload: Option<Json<EventDetailsRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    match desk
        .update_event_details(
            &request.date,
            &request.time,
            &request.venue,
            request.updated_by.as_deref(),
        )
        .await
    {
        Ok(details) => success(StatusCode::OK, "Event details updated successfully", details),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    get,
    path = "/api/event-details/banner",
    responses(
        (status = 200, description = "Banner image", content_type = "image/*"),
        (status = 404, description = "No banner set", body = ApiFailure)
    ),
    tag = "event"
)]
pub async fn get_banner(desk: Extension<Arc<Desk>>, environment: Extension<Environment>) -> Response {
    match desk.banner().await {
        Ok(banner) => (
            StatusCode::OK,
            [
                (CONTENT_TYPE, banner.mime_type),
                (CACHE_CONTROL, "no-cache".to_string()),
            ],
            banner.data,
        )
            .into_response(),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    post,
    path = "/api/event-details/banner",
    request_body(content = BannerForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Banner stored", body = ApiResponse<EventDetails>),
        (status = 400, description = "Missing, empty, oversized or non-image file", body = ApiFailure)
    ),
    tag = "event"
)]
pub async fn upload_banner(
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

    let upload = match read_banner(multipart, desk.config().max_banner_bytes()).await {
        Ok(upload) => upload,
        Err(err) => return failure(&err, *environment),
    };
    let Some(data) = upload.data else {
        let err = Error::InvalidAttachment("Banner image is required".to_string());
        return failure(&err, *environment);
    };

    match desk
        .upload_banner(data, &upload.mime_type, upload.updated_by.as_deref())
        .await
    {
        Ok(details) => success(StatusCode::OK, "Banner uploaded successfully", details),
        Err(err) => failure(&err, *environment),
    }
}

#[utoipa::path(
    delete,
    path = "/api/event-details/banner",
    request_body = BannerDeleteRequest,
    responses(
        (status = 200, description = "Banner removed", body = ApiResponse<EventDetails>)
    ),
    tag = "event"
)]
pub async fn delete_banner(
    desk: Extension<Arc<Desk>>,
    environment: Extension<Environment>,
    payload: Option<Json<BannerDeleteRequest>>,
) -> Response {
    let request = payload.map(|Json(request)| request).unwrap_or_default();
    match desk.delete_banner(request.updated_by.as_deref()).await {
        Ok(details) => success(StatusCode::OK, "Banner removed successfully", details),
        Err(err) => failure(&err, *environment),
    }
}
