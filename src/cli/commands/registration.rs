use clap::{Arg, ArgMatches, Command};

use crate::desk::RegistrationConfig;

pub const ARG_TICKET_PRICE: &str = "ticket-price";
pub const ARG_MAX_ATTACHMENT_BYTES: &str = "max-attachment-bytes";
pub const ARG_MAX_BANNER_BYTES: &str = "max-banner-bytes";
pub const ARG_TICKET_ID_ATTEMPTS: &str = "ticket-id-attempts";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub price: i64,
    pub max_attachment_bytes: usize,
    pub max_banner_bytes: usize,
    pub ticket_id_attempts: u32,
}

impl Options {
    /// Parse registration arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the ticket price is negative.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let defaults = RegistrationConfig::new();
        let price = matches
            .get_one::<i64>(ARG_TICKET_PRICE)
            .copied()
            .unwrap_or(defaults.price());
        if price < 0 {
            anyhow::bail!("--{ARG_TICKET_PRICE} must not be negative");
        }

        Ok(Self {
            price,
            max_attachment_bytes: matches
                .get_one::<usize>(ARG_MAX_ATTACHMENT_BYTES)
                .copied()
                .unwrap_or(defaults.max_attachment_bytes()),
            max_banner_bytes: matches
                .get_one::<usize>(ARG_MAX_BANNER_BYTES)
                .copied()
                .unwrap_or(defaults.max_banner_bytes()),
            ticket_id_attempts: matches
                .get_one::<u32>(ARG_TICKET_ID_ATTEMPTS)
                .copied()
                .unwrap_or(defaults.ticket_id_attempts()),
        })
    }

    #[must_use]
    pub fn config(&self) -> RegistrationConfig {
        RegistrationConfig::new()
            .with_price(self.price)
            .with_max_attachment_bytes(self.max_attachment_bytes)
            .with_max_banner_bytes(self.max_banner_bytes)
            .with_ticket_id_attempts(self.ticket_id_attempts)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TICKET_PRICE)
                .long(ARG_TICKET_PRICE)
                .help("Ticket price in rupees, counted as revenue on approval")
                .env("EVENTAZIA_TICKET_PRICE")
                .default_value("3000")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_MAX_ATTACHMENT_BYTES)
                .long(ARG_MAX_ATTACHMENT_BYTES)
                .help("Maximum bank slip size in bytes")
                .env("EVENTAZIA_MAX_ATTACHMENT_BYTES")
                .default_value("5242880")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_MAX_BANNER_BYTES)
                .long(ARG_MAX_BANNER_BYTES)
                .help("Maximum event banner size in bytes")
                .env("EVENTAZIA_MAX_BANNER_BYTES")
                .default_value("5242880")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new(ARG_TICKET_ID_ATTEMPTS)
                .long(ARG_TICKET_ID_ATTEMPTS)
                .help("Ticket id draws before approval gives up")
                .env("EVENTAZIA_TICKET_ID_ATTEMPTS")
                .default_value("10")
                .value_parser(clap::value_parser!(u32)),
        )
}
