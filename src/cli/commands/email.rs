use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::email::SmtpConfig;

pub const ARG_SMTP_HOST: &str = "smtp-host";
pub const ARG_SMTP_PORT: &str = "smtp-port";
pub const ARG_SMTP_USERNAME: &str = "smtp-username";
pub const ARG_SMTP_PASSWORD: &str = "smtp-password";
pub const ARG_SMTP_TIMEOUT_SECONDS: &str = "smtp-timeout-seconds";
pub const ARG_EMAIL_FROM: &str = "email-from";
pub const ARG_EMAIL_FROM_NAME: &str = "email-from-name";

#[derive(Debug, Clone)]
pub struct Options {
    /// `None` when no SMTP host is configured; mail is then only logged.
    pub smtp: Option<SmtpConfig>,
}

impl Options {
    /// Parse SMTP arguments from matches.
    ///
    /// # Errors
    /// Returns an error if a host is given without username and password.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let get_non_empty = |id: &str| {
            matches
                .get_one::<String>(id)
                .cloned()
                .filter(|v| !v.trim().is_empty())
        };

        let Some(host) = get_non_empty(ARG_SMTP_HOST) else {
            return Ok(Self { smtp: None });
        };
        let Some(username) = get_non_empty(ARG_SMTP_USERNAME) else {
            anyhow::bail!("missing required argument: --{ARG_SMTP_USERNAME}");
        };
        let Some(password) = get_non_empty(ARG_SMTP_PASSWORD) else {
            anyhow::bail!("missing required argument: --{ARG_SMTP_PASSWORD}");
        };

        let mut config = SmtpConfig::new(host, username, SecretString::from(password));
        if let Some(port) = matches.get_one::<u16>(ARG_SMTP_PORT) {
            config = config.with_port(*port);
        }
        if let Some(seconds) = matches.get_one::<u64>(ARG_SMTP_TIMEOUT_SECONDS) {
            config = config.with_timeout_seconds(*seconds);
        }
        if let Some(from) = get_non_empty(ARG_EMAIL_FROM) {
            config = config.with_from_email(from);
        }
        if let Some(name) = get_non_empty(ARG_EMAIL_FROM_NAME) {
            config = config.with_from_name(name);
        }

        Ok(Self { smtp: Some(config) })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SMTP_HOST)
                .long(ARG_SMTP_HOST)
                .help("SMTP relay host; mail is only logged when unset")
                .env("EVENTAZIA_SMTP_HOST"),
        )
        .arg(
            Arg::new(ARG_SMTP_PORT)
                .long(ARG_SMTP_PORT)
                .help("SMTP relay port (STARTTLS)")
                .env("EVENTAZIA_SMTP_PORT")
                .default_value("587")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_SMTP_USERNAME)
                .long(ARG_SMTP_USERNAME)
                .help("SMTP username")
                .env("EVENTAZIA_SMTP_USERNAME"),
        )
        .arg(
            Arg::new(ARG_SMTP_PASSWORD)
                .long(ARG_SMTP_PASSWORD)
                .help("SMTP password")
                .env("EVENTAZIA_SMTP_PASSWORD")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_SMTP_TIMEOUT_SECONDS)
                .long(ARG_SMTP_TIMEOUT_SECONDS)
                .help("SMTP connection timeout in seconds")
                .env("EVENTAZIA_SMTP_TIMEOUT_SECONDS")
                .default_value("10")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_FROM)
                .long(ARG_EMAIL_FROM)
                .help("Sender address (defaults to the SMTP username)")
                .env("EVENTAZIA_EMAIL_FROM"),
        )
        .arg(
            Arg::new(ARG_EMAIL_FROM_NAME)
                .long(ARG_EMAIL_FROM_NAME)
                .help("Sender display name")
                .env("EVENTAZIA_EMAIL_FROM_NAME")
                .default_value("Eventazia"),
        )
}
