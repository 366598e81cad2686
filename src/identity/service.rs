use super::{AuthSession, Credentials, IdentityClient, IdentityError, User};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Stateless pass-through to the identity provider.
///
/// No validation happens here: whatever the forms submitted is forwarded and
/// whatever the provider answers is returned.
#[derive(Clone)]
pub struct UserService {
    client: Arc<dyn IdentityClient>,
}

impl UserService {
    #[must_use]
    pub fn new(client: Arc<dyn IdentityClient>) -> Self {
        Self { client }
    }

    /// # Errors
    /// Returns the provider's failure unchanged.
    #[instrument(skip_all)]
    pub async fn sign_up(&self, credentials: &Credentials) -> Result<User, IdentityError> {
        let user = self.client.sign_up(credentials).await?;
        debug!("signed up user {}", user.id);
        Ok(user)
    }

    /// # Errors
    /// Returns the provider's failure unchanged.
    #[instrument(skip_all)]
    pub async fn sign_in(&self, credentials: &Credentials) -> Result<AuthSession, IdentityError> {
        self.client.sign_in_with_password(credentials).await
    }

    /// # Errors
    /// Returns the provider's failure unchanged.
    #[instrument(skip_all)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        self.client.sign_out(access_token).await
    }
}
