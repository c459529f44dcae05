use crate::{
    api::{self, ApiSettings, Environment},
    cli::{commands, telemetry},
    desk::Desk,
    email::{LogMessenger, Messenger, SmtpMessenger},
    storage::{EventDetailsStore, MemoryStore, PgStore, RegistrationStore},
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

const DB_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
// Room for the multipart framing and text fields around the largest file.
const BODY_OVERHEAD_BYTES: usize = 1024 * 1024;

#[derive(Debug)]
pub enum Storage {
    Postgres { dsn: String, max_connections: u32 },
    Memory,
}

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub storage: Storage,
    pub frontend_base_url: String,
    pub environment: Environment,
    pub otp: commands::otp::Options,
    pub registration: commands::registration::Options,
    pub email: commands::email::Options,
}

type Stores = (Arc<dyn RegistrationStore>, Arc<dyn EventDetailsStore>);

async fn stores(storage: Storage) -> Result<Stores> {
    match storage {
        Storage::Postgres {
            dsn,
            max_connections,
        } => {
            let store = Arc::new(
                PgStore::connect(&dsn, max_connections, DB_ACQUIRE_TIMEOUT)
                    .await
                    .context("Failed to connect to database")?,
            );
            store
                .ensure_schema()
                .await
                .context("Failed to apply database schema")?;
            let registrations: Arc<dyn RegistrationStore> = store.clone();
            let events: Arc<dyn EventDetailsStore> = store;
            Ok((registrations, events))
        }
        Storage::Memory => {
            warn!("Using in-memory storage; registrations are lost on restart");
            let store = Arc::new(MemoryStore::new());
            let registrations: Arc<dyn RegistrationStore> = store.clone();
            let events: Arc<dyn EventDetailsStore> = store;
            Ok((registrations, events))
        }
    }
}

/// Execute the server action.
/// # Errors
/// Returns an error if storage or the mail transport cannot be set up, or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    let (registrations, events) = stores(args.storage).await?;

    let messenger: Arc<dyn Messenger> = match &args.email.smtp {
        Some(config) => {
            info!(host = config.host(), port = config.port(), "Using SMTP relay");
            Arc::new(SmtpMessenger::new(config).context("Failed to build SMTP transport")?)
        }
        None => {
            warn!("SMTP is not configured; emails are only logged");
            Arc::new(LogMessenger)
        }
    };

    let registration_config = args.registration.config();
    let body_limit = registration_config
        .max_attachment_bytes()
        .max(registration_config.max_banner_bytes())
        .saturating_add(BODY_OVERHEAD_BYTES);

    let desk = Arc::new(Desk::new(
        args.otp.config(),
        registration_config,
        registrations,
        events,
        messenger,
    ));

    let settings = ApiSettings::new(args.frontend_base_url)
        .with_environment(args.environment)
        .with_body_limit(body_limit);

    let result = api::new(args.port, desk, settings).await;

    telemetry::shutdown_tracer();

    result
}
