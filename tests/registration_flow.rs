//! Drives the HTTP API end to end on the in-memory store.

use anyhow::{Context, Result};
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header::CONTENT_TYPE},
};
use eventazia::{
    api::{ApiSettings, Environment, app},
    desk::{Desk, RegistrationConfig},
    email::{MemoryMessenger, SentMessage},
    otp::OtpConfig,
    storage::MemoryStore,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const BOUNDARY: &str = "eventazia-test-boundary";
const EMAIL: &str = "nimali@example.com";

struct Harness {
    app: Router,
    messenger: Arc<MemoryMessenger>,
}

fn harness() -> Result<Harness> {
    let store = Arc::new(MemoryStore::new());
    let messenger = Arc::new(MemoryMessenger::new());
    let desk = Arc::new(Desk::new(
        OtpConfig::new(),
        RegistrationConfig::new(),
        store.clone(),
        store,
        messenger.clone(),
    ));
    let settings = ApiSettings::new("http://localhost:5173".to_string())
        .with_environment(Environment::Production)
        .with_body_limit(6 * 1024 * 1024);
    Ok(Harness {
        app: app(desk, &settings)?,
        messenger,
    })
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }

    async fn json(&self, method: Method, uri: &str, body: Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))?;
        self.send(request).await
    }

    async fn get(&self, uri: &str) -> Result<(StatusCode, Value)> {
        self.send(Request::builder().uri(uri).body(Body::empty())?)
            .await
    }

    async fn verify_email(&self, email: &str) -> Result<()> {
        let (status, _) = self
            .json(Method::POST, "/api/send-email-otp", json!({ "email": email }))
            .await?;
        assert_eq!(status, StatusCode::OK);
        let code = self
            .messenger
            .last_code(email)
            .context("no code was sent")?;
        let (status, body) = self
            .json(
                Method::POST,
                "/api/verify-email-otp",
                json!({ "email": email, "otp": code }),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "{body}");
        Ok(())
    }

    async fn submit(&self, email: &str, slip: &[u8]) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/ticket-registrations")
            .header(
                CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(registration_form(email, slip)))?;
        self.send(request).await
    }
}

fn text_part(body: &mut Vec<u8>, name: &str, value: &str) {
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
        .as_bytes(),
    );
}

fn registration_form(email: &str, slip: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    text_part(&mut body, "name", "Nimali Perera");
    text_part(&mut body, "contactNo", "0771234567");
    text_part(&mut body, "email", email);
    text_part(&mut body, "additionalDescription", "Vegetarian meal please");
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"bankSlip\"; filename=\"slip.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(slip);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

#[tokio::test]
async fn registration_happy_path() -> Result<()> {
    let h = harness()?;
    h.verify_email(EMAIL).await?;

    let (status, body) = h.submit(EMAIL, &[0x89, 0x50, 0x4e, 0x47, 1, 2, 3]).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["id"]
        .as_str()
        .context("registration id")?
        .to_string();

    let (status, body) = h.get("/api/ticket-registrations?status=pending").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(1));

    let (status, body) = h
        .get("/api/ticket-registrations/notifications?username=Kasun")
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["unreadCount"], 1);

    let response = h
        .app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/ticket-registrations/{id}/download-slip"))
                .body(Body::empty())?,
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("image/png")
    );

    let (status, body) = h
        .json(
            Method::PUT,
            &format!("/api/ticket-registrations/{id}/approve"),
            json!({ "reviewedBy": "Kasun" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["emailSent"], true);
    let ticket_id = body["data"]["registration"]["ticketId"]
        .as_str()
        .context("ticket id")?;
    assert!(ticket_id.starts_with("EVT-"));
    assert!(h.messenger.sent().iter().any(|message| matches!(
        message,
        SentMessage::Approval { email, .. } if email == EMAIL
    )));

    let (status, body) = h.get("/api/ticket-registrations/stats").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["approved"], 1);
    assert_eq!(body["data"]["pending"], 0);
    assert_eq!(body["data"]["totalRevenue"], 3000);

    // The verified token was spent and the email is now taken.
    let (status, body) = h
        .json(Method::POST, "/api/send-email-otp", json!({ "email": EMAIL }))
        .await?;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["alreadyRegistered"], true);
    Ok(())
}

#[tokio::test]
async fn oversized_slip_is_rejected_without_a_row() -> Result<()> {
    let h = harness()?;
    h.verify_email(EMAIL).await?;

    let (status, body) = h.submit(EMAIL, &vec![7_u8; 10 * 1024 * 1024]).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["errorKind"], "invalid_attachment");
    assert_eq!(body["message"], "File size must be less than 5MB");

    let (_, body) = h.get("/api/ticket-registrations/stats").await?;
    assert_eq!(body["data"]["total"], 0);

    // The verified token survives a rejected submission.
    let (status, body) = h.submit(EMAIL, &[1, 2, 3]).await?;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    Ok(())
}

#[tokio::test]
async fn submission_requires_verification() -> Result<()> {
    let h = harness()?;
    let (status, body) = h.submit(EMAIL, &[1, 2, 3]).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["requiresVerification"], true);
    Ok(())
}

#[tokio::test]
async fn otp_requests_are_rate_limited() -> Result<()> {
    let h = harness()?;
    for _ in 0..3 {
        let (status, _) = h
            .json(Method::POST, "/api/send-email-otp", json!({ "email": EMAIL }))
            .await?;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = h
        .json(Method::POST, "/api/send-email-otp", json!({ "email": EMAIL }))
        .await?;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["errorKind"], "rate_limited");
    Ok(())
}

#[tokio::test]
async fn wrong_codes_exhaust_the_otp() -> Result<()> {
    let h = harness()?;
    let (status, body) = h
        .json(Method::POST, "/api/send-email-otp", json!({ "email": EMAIL }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["expiresInSeconds"], 300);
    let code = h.messenger.last_code(EMAIL).context("no code was sent")?;
    let wrong = if code == "0000" { "1111" } else { "0000" };

    for remaining in [2, 1, 0] {
        let (status, body) = h
            .json(
                Method::POST,
                "/api/verify-email-otp",
                json!({ "email": EMAIL, "otp": wrong }),
            )
            .await?;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errorKind"], "mismatch");
        assert!(
            body["message"]
                .as_str()
                .is_some_and(|message| message.contains(&format!("{remaining} attempt")))
        );
    }

    let (status, body) = h
        .json(
            Method::POST,
            "/api/verify-email-otp",
            json!({ "email": EMAIL, "otp": code }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "not_found_or_expired");
    Ok(())
}

#[tokio::test]
async fn rejection_removes_the_registration() -> Result<()> {
    let h = harness()?;
    h.verify_email(EMAIL).await?;
    let (_, body) = h.submit(EMAIL, &[1, 2, 3]).await?;
    let id = body["data"]["id"]
        .as_str()
        .context("registration id")?
        .to_string();

    let (status, body) = h
        .json(
            Method::PUT,
            &format!("/api/ticket-registrations/{id}/reject"),
            json!({ "reviewedBy": "Kasun", "rejectionReason": "Amount does not match" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["reason"], "Amount does not match");

    let (status, body) = h.get(&format!("/api/ticket-registrations/{id}")).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorKind"], "not_found");

    // The email is free again.
    let (status, _) = h
        .json(Method::POST, "/api/send-email-otp", json!({ "email": EMAIL }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn rejection_reason_is_read_from_either_field() -> Result<()> {
    let h = harness()?;
    h.verify_email(EMAIL).await?;
    let (_, body) = h.submit(EMAIL, &[1, 2, 3]).await?;
    let id = body["data"]["id"]
        .as_str()
        .context("registration id")?
        .to_string();

    let (status, body) = h
        .json(
            Method::PUT,
            &format!("/api/ticket-registrations/{id}/reject"),
            json!({ "reviewedBy": "Kasun", "reason": "Amount does not match" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["reason"], "Amount does not match");
    assert!(h.messenger.sent().contains(&SentMessage::Rejection {
        email: EMAIL.to_string(),
        reason: "Amount does not match".to_string(),
    }));
    Ok(())
}

#[tokio::test]
async fn oversized_banner_names_the_banner() -> Result<()> {
    let h = harness()?;
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"banner\"; filename=\"banner.png\"\r\nContent-Type: image/png\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&vec![9_u8; 7 * 1024 * 1024]);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/event-details/banner")
        .header(
            CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))?;

    let (status, body) = h.send(request).await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "invalid_attachment");
    assert_eq!(body["message"], "Banner image must be less than 5MB");
    Ok(())
}

#[tokio::test]
async fn event_details_round_trip() -> Result<()> {
    let h = harness()?;
    let (status, body) = h.get("/api/event-details").await?;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["venue"].is_string());

    let (status, body) = h
        .json(
            Method::PUT,
            "/api/event-details",
            json!({ "date": "January 10, 2026", "time": "7:00 PM", "venue": "Hall B", "updatedBy": "Kasun" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["updatedBy"], "Kasun");

    let (status, body) = h
        .json(Method::PUT, "/api/event-details", json!({ "date": "x" }))
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "invalid_input");

    let (status, _) = h.get("/api/event-details/banner").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn invalid_ids_are_bad_requests() -> Result<()> {
    let h = harness()?;
    let (status, body) = h.get("/api/ticket-registrations/not-a-uuid").await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "invalid_input");
    Ok(())
}
