use clap::{Arg, ArgMatches, Command};

use crate::otp::OtpConfig;

pub const ARG_OTP_TTL_SECONDS: &str = "otp-ttl-seconds";
pub const ARG_OTP_MAX_ATTEMPTS: &str = "otp-max-attempts";
pub const ARG_OTP_RATE_LIMIT_MAX: &str = "otp-rate-limit-max";
pub const ARG_OTP_RATE_LIMIT_WINDOW_SECONDS: &str = "otp-rate-limit-window-seconds";
pub const ARG_VERIFIED_TTL_SECONDS: &str = "verified-ttl-seconds";
pub const ARG_EMAIL_TIMEOUT_SECONDS: &str = "email-timeout-seconds";

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub ttl_seconds: u64,
    pub max_attempts: u32,
    pub rate_limit_max: u32,
    pub rate_limit_window_seconds: u64,
    pub verified_ttl_seconds: u64,
    pub delivery_timeout_seconds: u64,
}

impl Options {
    #[must_use]
    pub fn parse(matches: &ArgMatches) -> Self {
        let defaults = OtpConfig::new();
        let seconds = |id: &str, default: u64| matches.get_one::<u64>(id).copied().unwrap_or(default);
        let count = |id: &str, default: u32| matches.get_one::<u32>(id).copied().unwrap_or(default);

        Self {
            ttl_seconds: seconds(ARG_OTP_TTL_SECONDS, defaults.ttl().as_secs()),
            max_attempts: count(ARG_OTP_MAX_ATTEMPTS, defaults.max_attempts()),
            rate_limit_max: count(ARG_OTP_RATE_LIMIT_MAX, defaults.rate_limit_max_requests()),
            rate_limit_window_seconds: seconds(
                ARG_OTP_RATE_LIMIT_WINDOW_SECONDS,
                defaults.rate_limit_window().as_secs(),
            ),
            verified_ttl_seconds: seconds(
                ARG_VERIFIED_TTL_SECONDS,
                defaults.verified_ttl().as_secs(),
            ),
            delivery_timeout_seconds: seconds(
                ARG_EMAIL_TIMEOUT_SECONDS,
                defaults.delivery_timeout().as_secs(),
            ),
        }
    }

    #[must_use]
    pub fn config(&self) -> OtpConfig {
        OtpConfig::new()
            .with_ttl_seconds(self.ttl_seconds)
            .with_max_attempts(self.max_attempts)
            .with_rate_limit_max_requests(self.rate_limit_max)
            .with_rate_limit_window_seconds(self.rate_limit_window_seconds)
            .with_verified_ttl_seconds(self.verified_ttl_seconds)
            .with_delivery_timeout_seconds(self.delivery_timeout_seconds)
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_OTP_TTL_SECONDS)
                .long(ARG_OTP_TTL_SECONDS)
                .help("Lifetime of an issued OTP code in seconds")
                .env("EVENTAZIA_OTP_TTL_SECONDS")
                .default_value("300")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_OTP_MAX_ATTEMPTS)
                .long(ARG_OTP_MAX_ATTEMPTS)
                .help("Verification attempts allowed per code")
                .env("EVENTAZIA_OTP_MAX_ATTEMPTS")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_RATE_LIMIT_MAX)
                .long(ARG_OTP_RATE_LIMIT_MAX)
                .help("OTP requests allowed per email within the rate limit window")
                .env("EVENTAZIA_OTP_RATE_LIMIT_MAX")
                .default_value("3")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_OTP_RATE_LIMIT_WINDOW_SECONDS)
                .long(ARG_OTP_RATE_LIMIT_WINDOW_SECONDS)
                .help("Length of the OTP rate limit window in seconds")
                .env("EVENTAZIA_OTP_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("900")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_VERIFIED_TTL_SECONDS)
                .long(ARG_VERIFIED_TTL_SECONDS)
                .help("How long a verified email may be used to register, in seconds")
                .env("EVENTAZIA_VERIFIED_TTL_SECONDS")
                .default_value("600")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_EMAIL_TIMEOUT_SECONDS)
                .long(ARG_EMAIL_TIMEOUT_SECONDS)
                .help("Timeout for a single email delivery in seconds")
                .env("EVENTAZIA_EMAIL_TIMEOUT_SECONDS")
                .default_value("15")
                .value_parser(clap::value_parser!(u64)),
        )
}
