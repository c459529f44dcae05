//! Error taxonomy shared by the OTP engine, admission, and review workflows.
//!
//! Every variant maps to a stable `kind()` string that ends up in the response
//! envelope and to the HTTP status the handlers return. Collaborator failures
//! (database, mail transport) carry their `anyhow` chain so it can be logged and,
//! outside production, echoed back to the caller.

use axum::http::StatusCode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0}")]
    InvalidInput(String),
    #[error("This email has already been registered. Each email can only register once.")]
    AlreadyRegistered,
    #[error("Too many OTP requests. Please try again in {window_minutes} minutes.")]
    RateLimited { window_minutes: u64 },
    #[error("OTP not found or has expired. Please request a new one.")]
    NotFoundOrExpired,
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Maximum verification attempts exceeded. Please request a new OTP.")]
    AttemptsExceeded,
    #[error("Invalid OTP. {remaining} attempt{} remaining.", plural(.remaining))]
    Mismatch { remaining: u32 },
    #[error("Email not verified or verification expired. Please verify your email first.")]
    VerificationRequired,
    #[error("{0}")]
    InvalidAttachment(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("Registration has already been approved")]
    AlreadyApproved,
    #[error("Failed to generate a unique ticket ID after {attempts} attempts")]
    IdGenerationFailed { attempts: u32 },
    #[error("Failed to deliver email: {0:#}")]
    DeliveryFailed(#[source] anyhow::Error),
    #[error("Storage failure: {0:#}")]
    Storage(#[source] anyhow::Error),
}

fn plural(count: &u32) -> &'static str {
    if *count == 1 { "" } else { "s" }
}

impl Error {
    /// Stable machine-readable classification.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::AlreadyRegistered => "already_registered",
            Self::RateLimited { .. } => "rate_limited",
            Self::NotFoundOrExpired => "not_found_or_expired",
            Self::Expired => "expired",
            Self::AttemptsExceeded => "attempts_exceeded",
            Self::Mismatch { .. } => "mismatch",
            Self::VerificationRequired => "verification_required",
            Self::InvalidAttachment(_) => "invalid_attachment",
            Self::NotFound(_) => "not_found",
            Self::AlreadyApproved => "already_approved",
            Self::IdGenerationFailed { .. } => "id_generation_failed",
            Self::DeliveryFailed(_) => "delivery_failed",
            Self::Storage(_) => "storage",
        }
    }

    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidInput(_)
            | Self::NotFoundOrExpired
            | Self::Expired
            | Self::AttemptsExceeded
            | Self::Mismatch { .. }
            | Self::VerificationRequired
            | Self::InvalidAttachment(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyRegistered | Self::AlreadyApproved => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::DeliveryFailed(_) => StatusCode::BAD_GATEWAY,
            Self::IdGenerationFailed { .. } | Self::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to show to any caller. Collaborator failures are replaced by
    /// a generic line; their detail only travels in the `error` field.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::DeliveryFailed(_) => "Failed to send email. Please try again.".to_string(),
            Self::Storage(_) => "Internal server error".to_string(),
            Self::IdGenerationFailed { .. } => "Failed to approve registration".to_string(),
            other => other.to_string(),
        }
    }

    /// Whether the caller can retry the same request later without changes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited { .. }
                | Self::DeliveryFailed(_)
                | Self::Storage(_)
                | Self::IdGenerationFailed { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatch_message_pluralizes() {
        assert_eq!(
            Error::Mismatch { remaining: 2 }.to_string(),
            "Invalid OTP. 2 attempts remaining."
        );
        assert_eq!(
            Error::Mismatch { remaining: 1 }.to_string(),
            "Invalid OTP. 1 attempt remaining."
        );
    }

    #[test]
    fn collaborator_failures_hide_detail() {
        let err = Error::Storage(anyhow::anyhow!("connection refused on 10.0.0.4"));
        assert_eq!(err.public_message(), "Internal server error");
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_retryable());
    }

    #[test]
    fn conflicts_map_to_409() {
        assert_eq!(Error::AlreadyRegistered.status(), StatusCode::CONFLICT);
        assert_eq!(Error::AlreadyRegistered.kind(), "already_registered");
        assert!(!Error::AlreadyRegistered.is_retryable());
    }

    #[test]
    fn not_found_names_the_entity() {
        assert_eq!(
            Error::NotFound("Registration").to_string(),
            "Registration not found"
        );
    }
}
