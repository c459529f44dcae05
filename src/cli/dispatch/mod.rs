//! Command-line argument dispatch.
//!
//! Maps validated CLI arguments to the action to run, which today is always the
//! API server with its full configuration.

use crate::api::Environment;
use crate::cli::actions::{
    Action,
    server::{Args, Storage},
};
use crate::cli::commands::{
    ARG_DB_MAX_CONNECTIONS, ARG_DSN, ARG_ENVIRONMENT, ARG_FRONTEND_BASE_URL, ARG_IN_MEMORY,
    ARG_PORT, email, otp, registration,
};
use anyhow::{Result, anyhow, bail};

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>(ARG_PORT).copied().unwrap_or(5000);

    let dsn = matches
        .get_one::<String>(ARG_DSN)
        .cloned()
        .filter(|dsn| !dsn.trim().is_empty());
    let storage = match dsn {
        Some(dsn) => Storage::Postgres {
            dsn,
            max_connections: matches
                .get_one::<u32>(ARG_DB_MAX_CONNECTIONS)
                .copied()
                .unwrap_or(5),
        },
        None if matches.get_flag(ARG_IN_MEMORY) => Storage::Memory,
        None => bail!("missing required argument: --{ARG_DSN} (or --{ARG_IN_MEMORY})"),
    };

    let environment = matches
        .get_one::<String>(ARG_ENVIRONMENT)
        .map_or(Ok(Environment::default()), |value| value.parse())
        .map_err(|err| anyhow!(err))?;

    let frontend_base_url = matches
        .get_one::<String>(ARG_FRONTEND_BASE_URL)
        .cloned()
        .unwrap_or_else(|| "http://localhost:5173".to_string());

    Ok(Action::Server(Args {
        port,
        storage,
        frontend_base_url,
        environment,
        otp: otp::Options::parse(matches),
        registration: registration::Options::parse(matches)?,
        email: email::Options::parse(matches)?,
    }))
}
