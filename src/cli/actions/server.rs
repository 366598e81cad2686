use crate::{
    api::{
        self,
        session::{MemorySessionStore, SessionConfig},
        AppState,
    },
    identity::SupabaseClient,
};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::{fmt, sync::Arc, time::Duration};
use tracing::debug;

pub struct Args {
    pub port: u16,
    pub secret_key: SecretString,
    pub identity_url: String,
    pub identity_api_key: SecretString,
    pub session_ttl_seconds: u64,
}

impl fmt::Debug for Args {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Args")
            .field("port", &self.port)
            .field("secret_key", &"***")
            .field("identity_url", &self.identity_url)
            .field("identity_api_key", &"***")
            .field("session_ttl_seconds", &self.session_ttl_seconds)
            .finish()
    }
}

/// Wire the identity client and session store, then serve.
/// # Errors
/// Returns an error if the configuration is invalid or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    debug!("Server args: {:?}", args);

    let session_config = SessionConfig::new(args.secret_key)
        .context("Invalid --secret-key")?
        .with_ttl(Duration::from_secs(args.session_ttl_seconds));

    let identity = SupabaseClient::new(&args.identity_url, args.identity_api_key)
        .context("Could not configure the identity provider client")?;

    let state = AppState::new(
        Arc::new(identity),
        Arc::new(MemorySessionStore::new()),
        session_config,
    );

    api::new(args.port, state).await
}
