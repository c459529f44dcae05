//! # Eventazia (Event Registration Backend)
//!
//! `eventazia` runs ticket registration for a single event. A prospective
//! attendee proves control of an email address with a short-lived numeric code,
//! then submits a registration with a bank-slip image as proof of payment. Admins
//! review each submission and either approve it, which issues a ticket id and
//! emails the ticket, or reject it, which removes the record and emails the reason.
//!
//! ## Email Ownership
//!
//! Codes live in an in-process store with a time-to-live, a per-code attempt
//! budget and a per-email request rate limit. A correct code turns into a
//! short-lived verified token that is spent by exactly one registration.
//!
//! - **Ephemeral:** code and token state is process-local and lost on restart.
//! - **One per email:** an email that already has a registration can neither
//!   request a code nor register again.
//!
//! ## Review
//!
//! Registrations start `pending`. Approval and rejection are committed before any
//! email goes out; a failed notification never undoes the review.
//!
//! ## Storage
//!
//! Registrations and the event details record are kept in `PostgreSQL` (schema in
//! `db/sql/01_eventazia.sql`). An in-memory store backs tests and `--in-memory`
//! development runs.

pub mod api;
pub mod cli;
pub mod desk;
pub mod email;
pub mod error;
pub mod models;
pub mod otp;
pub mod storage;

pub use error::{Error, Result};

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
