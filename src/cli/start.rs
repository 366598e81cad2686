use crate::cli::{actions::Action, commands, dispatch, telemetry};
use anyhow::{Context, Result};

/// A missing `.env` is fine; one that cannot be read or parsed is not.
fn tolerate_missing_dotenv<T>(result: dotenvy::Result<T>) -> Result<()> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.not_found() => Ok(()),
        Err(err) => Err(err).context("Failed to load .env"),
    }
}

/// Main entry point for the CLI - builds and returns the Action
///
/// # Errors
///
/// Returns an error if argument parsing, telemetry initialization, or action dispatch fails
pub fn start() -> Result<Action> {
    tolerate_missing_dotenv(dotenvy::dotenv())?;

    let matches = commands::new().get_matches();

    telemetry::init(&commands::logging::parse(&matches))?;

    dispatch::handler(&matches)
}
