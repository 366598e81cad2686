//! Identity provider contract and the pass-through service built on it.
//!
//! Everything that touches credentials or tokens lives on the provider side;
//! this module only describes the calls and the shapes that come back.

mod error;
mod service;
mod supabase;

pub use error::IdentityError;
pub use service::UserService;
pub use supabase::SupabaseClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;

/// Email and password as submitted by the sign-up and sign-in forms.
///
/// Missing fields deserialize as empty strings; the provider decides what is
/// acceptable.
#[derive(Clone, Default, Deserialize, Serialize, ToSchema)]
pub struct Credentials {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"***")
            .finish()
    }
}

/// User record as reported by the provider. Unknown fields are ignored.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by a successful password sign-in.
#[derive(Clone, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthSession {
    /// Session carrying only an access token.
    #[must_use]
    pub fn with_access_token(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: Some("bearer".to_string()),
            expires_in: None,
            refresh_token: None,
            user: None,
        }
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"***")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "***"))
            .field("user", &self.user)
            .finish()
    }
}

/// Remote identity provider.
///
/// Implementations must not retry; every call is a single round trip and its
/// failure is reported as-is.
#[async_trait]
pub trait IdentityClient: Send + Sync {
    /// Register a new account. Returns the user the provider created.
    async fn sign_up(&self, credentials: &Credentials) -> Result<User, IdentityError>;

    /// Exchange email and password for an access token.
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, IdentityError>;

    /// Revoke the session behind `access_token` on the provider side.
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError>;

    /// Resolve `access_token` to its user, failing if the provider no longer
    /// accepts it.
    async fn get_user(&self, access_token: &str) -> Result<User, IdentityError>;
}
