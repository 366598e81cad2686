use crate::api::session::{DEFAULT_SESSION_TTL_SECONDS, MAX_SESSION_TTL_SECONDS};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

pub const ARG_SECRET_KEY: &str = "secret-key";
pub const ARG_SESSION_TTL_SECONDS: &str = "session-ttl-seconds";

pub struct Options {
    pub secret_key: SecretString,
    pub ttl_seconds: u64,
}

impl Options {
    /// Parse session arguments from matches.
    ///
    /// # Errors
    /// Returns an error if the secret key is missing. There is no fallback key.
    pub fn parse(matches: &ArgMatches) -> anyhow::Result<Self> {
        let secret_key = matches
            .get_one::<String>(ARG_SECRET_KEY)
            .cloned()
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --{ARG_SECRET_KEY}"))?;

        Ok(Self {
            secret_key: SecretString::from(secret_key),
            ttl_seconds: matches
                .get_one::<u64>(ARG_SESSION_TTL_SECONDS)
                .copied()
                .unwrap_or(DEFAULT_SESSION_TTL_SECONDS),
        })
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_SECRET_KEY)
                .long(ARG_SECRET_KEY)
                .help("Secret used to key server-side sessions (at least 32 characters)")
                .env("PORTAL_SECRET_KEY")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL_SECONDS)
                .long(ARG_SESSION_TTL_SECONDS)
                .help("Lifetime of a server-side session in seconds (at most one year)")
                .env("PORTAL_SESSION_TTL_SECONDS")
                .default_value("43200")
                .value_parser(
                    clap::value_parser!(u64).range(1..=MAX_SESSION_TTL_SECONDS),
                ),
        )
}
