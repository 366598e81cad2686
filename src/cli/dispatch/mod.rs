//! Map parsed CLI arguments to an action.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{identity, session};
use anyhow::Result;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or blank.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(8080);

    let identity_opts = identity::Options::parse(matches)?;
    let session_opts = session::Options::parse(matches)?;

    Ok(Action::Serve(Args {
        port,
        secret_key: session_opts.secret_key,
        identity_url: identity_opts.url,
        identity_api_key: identity_opts.api_key,
        session_ttl_seconds: session_opts.ttl_seconds,
    }))
}
