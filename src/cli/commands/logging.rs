use crate::cli::telemetry::{self, LogFormat};
use clap::{builder::ValueParser, Arg, ArgMatches, Command};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";
pub const ARG_LOG_FORMAT: &str = "log-format";
pub const ARG_OTLP_ENDPOINT: &str = "otlp-endpoint";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

/// Map verbosity count to tracing level
#[must_use]
pub const fn verbosity_level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

/// Telemetry settings from matches. Never fails; every argument has a default.
#[must_use]
pub fn parse(matches: &ArgMatches) -> telemetry::Config {
    telemetry::Config {
        level: verbosity_level(matches.get_one::<u8>(ARG_VERBOSITY).copied().unwrap_or(0)),
        format: matches
            .get_one::<LogFormat>(ARG_LOG_FORMAT)
            .copied()
            .unwrap_or_default(),
        otlp_endpoint: matches
            .get_one::<String>(ARG_OTLP_ENDPOINT)
            .map(|endpoint| endpoint.trim().to_string())
            .filter(|endpoint| !endpoint.is_empty()),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_VERBOSITY)
                .short('v')
                .long("verbose")
                .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
                .env("PORTAL_LOG_LEVEL")
                .global(true)
                .action(clap::ArgAction::Count)
                .value_parser(validator_log_level()),
        )
        .arg(
            Arg::new(ARG_LOG_FORMAT)
                .long(ARG_LOG_FORMAT)
                .help("Log output format")
                .env("PORTAL_LOG_FORMAT")
                .default_value("pretty")
                .value_parser(ValueParser::new(|s: &str| s.parse::<LogFormat>())),
        )
        .arg(
            Arg::new(ARG_OTLP_ENDPOINT)
                .long(ARG_OTLP_ENDPOINT)
                .help("OTLP/gRPC collector for trace export, example: localhost:4317")
                .env("OTEL_EXPORTER_OTLP_ENDPOINT"),
        )
}
