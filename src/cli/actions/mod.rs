//! What the binary does once arguments are parsed.

pub mod server;

#[derive(Debug)]
pub enum Action {
    /// Serve the web front door until ctrl-c or SIGTERM.
    Serve(server::Args),
}

impl Action {
    /// Run the action to completion.
    /// # Errors
    /// Returns an error if the action fails.
    pub async fn execute(self) -> anyhow::Result<()> {
        match self {
            Self::Serve(args) => server::execute(args).await,
        }
    }
}
