//! OTP issuance and verification.

use serde::Serialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use super::Desk;
use crate::error::{Error, Result};
use crate::otp::{CheckOutcome, generate_code, mask_email, normalize_email, valid_email};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OtpIssued {
    pub expires_in_seconds: u64,
    pub masked_email: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct OtpVerified {
    pub email: String,
}

impl Desk {
    /// Send a fresh code to `email`, replacing any outstanding one.
    ///
    /// # Errors
    /// `InvalidInput`, `AlreadyRegistered`, `RateLimited`, `DeliveryFailed` or
    /// `Storage`. A failed delivery still counts against the rate limit.
    pub async fn issue_otp(&self, email: &str) -> Result<OtpIssued> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(Error::InvalidInput("Email is required".to_string()));
        }
        if !valid_email(&email) {
            return Err(Error::InvalidInput("Invalid email address format".to_string()));
        }

        let _guard = self.locks.lock(&email).await;

        if self.email_registered(&email).await? {
            return Err(Error::AlreadyRegistered);
        }

        let code = generate_code();
        let record = self.otps.issue(&email, code.clone()).await.map_err(|limited| {
            info!(retry_after_seconds = limited.retry_after.as_secs(), "otp issuance rate limited");
            Error::RateLimited {
                window_minutes: self.otp_config.rate_limit_window().as_secs().div_ceil(60),
            }
        })?;

        let ttl = self.otp_config.ttl();
        match self.deliver(self.messenger.send_otp(&email, &code, ttl)).await {
            Ok(receipt) => {
                info!(
                    provider = receipt.provider,
                    message_id = %receipt.message_id,
                    request_count = record.request_count,
                    "otp issued"
                );
            }
            Err(err) => {
                warn!(error = %err, request_count = record.request_count, "otp delivery failed");
                return Err(Error::DeliveryFailed(err));
            }
        }

        Ok(OtpIssued {
            expires_in_seconds: ttl.as_secs(),
            masked_email: mask_email(&email),
        })
    }

    /// Answer the challenge for `email`. On success the email is verified for
    /// the configured window.
    ///
    /// # Errors
    /// `InvalidInput`, `NotFoundOrExpired`, `Expired`, `AttemptsExceeded`,
    /// `Mismatch`, `AlreadyRegistered` or `Storage`.
    pub async fn verify_otp(&self, email: &str, code: &str) -> Result<OtpVerified> {
        let email = normalize_email(email);
        let code = code.trim();
        if email.is_empty() || code.is_empty() {
            return Err(Error::InvalidInput("Email and OTP are required".to_string()));
        }

        let _guard = self.locks.lock(&email).await;

        match self
            .otps
            .check(&email, code, self.otp_config.max_attempts())
            .await
        {
            CheckOutcome::Matched => {}
            CheckOutcome::Missing => return Err(Error::NotFoundOrExpired),
            CheckOutcome::Expired => return Err(Error::Expired),
            CheckOutcome::AttemptsExceeded => return Err(Error::AttemptsExceeded),
            CheckOutcome::Mismatch { remaining } => {
                info!(remaining, "otp mismatch");
                return Err(Error::Mismatch { remaining });
            }
        }

        // The record stays put until this check succeeds so a storage error
        // does not burn the code.
        let registered = self.email_registered(&email).await?;
        self.otps.remove(&email).await;
        if registered {
            return Err(Error::AlreadyRegistered);
        }

        self.verified.insert(&email).await;
        info!("email verified");
        Ok(OtpVerified { email })
    }

    pub async fn is_verified(&self, email: &str) -> bool {
        self.verified.is_verified(&normalize_email(email)).await
    }
}
