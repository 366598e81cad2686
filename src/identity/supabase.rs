//! GoTrue (Supabase Auth) REST client.

use super::{AuthSession, Credentials, IdentityClient, IdentityError, User};
use crate::APP_USER_AGENT;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{header::AUTHORIZATION, Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::{debug, instrument};
use url::Url;

const SIGNUP_PATH: &str = "auth/v1/signup";
const TOKEN_PATH: &str = "auth/v1/token?grant_type=password";
const LOGOUT_PATH: &str = "auth/v1/logout";
const USER_PATH: &str = "auth/v1/user";

// Keys GoTrue uses for human readable errors, most specific first.
const ERROR_MESSAGE_KEYS: [&str; 4] = ["error_description", "msg", "message", "error"];

pub struct SupabaseClient {
    client: Client,
    base_url: Url,
    api_key: SecretString,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &"***")
            .finish_non_exhaustive()
    }
}

// Signup answers with a session when email confirmation is disabled and with
// the bare user otherwise.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    WithSession { user: User },
    Bare(User),
}

impl SupabaseClient {
    /// Build a client for the project at `base_url`.
    ///
    /// # Errors
    /// Returns an error if the URL is not http(s) or the HTTP client cannot be built.
    pub fn new(base_url: &str, api_key: SecretString) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid identity provider URL: {base_url}"))?;

        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(anyhow!(
                "Identity provider URL must be http or https, got: {}",
                base_url.scheme()
            ));
        }

        // Relative joins replace the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .user_agent(APP_USER_AGENT)
            .build()
            .context("Error creating reqwest client")?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, IdentityError> {
        self.base_url
            .join(path)
            .map_err(|e| IdentityError::InvalidResponse(format!("bad endpoint {path}: {e}")))
    }

    fn post(&self, path: &str) -> Result<RequestBuilder, IdentityError> {
        Ok(self
            .client
            .post(self.endpoint(path)?)
            .header("apikey", self.api_key.expose_secret()))
    }

    fn get(&self, path: &str) -> Result<RequestBuilder, IdentityError> {
        Ok(self
            .client
            .get(self.endpoint(path)?)
            .header("apikey", self.api_key.expose_secret()))
    }

    /// Turn a non-2xx response into `Rejected`, keeping the provider's message.
    async fn rejection(response: Response) -> IdentityError {
        let status = response.status();
        let body: Option<Value> = response.json().await.ok();

        let message = body
            .as_ref()
            .and_then(|body| {
                ERROR_MESSAGE_KEYS
                    .iter()
                    .find_map(|key| body.get(*key).and_then(Value::as_str))
            })
            .map_or_else(
                || {
                    status
                        .canonical_reason()
                        .unwrap_or("identity provider error")
                        .to_string()
                },
                ToString::to_string,
            );

        debug!("identity provider rejected request: {} {}", status, message);

        IdentityError::Rejected {
            status: status.as_u16(),
            message,
        }
    }
}

#[async_trait]
impl IdentityClient for SupabaseClient {
    #[instrument(skip_all)]
    async fn sign_up(&self, credentials: &Credentials) -> Result<User, IdentityError> {
        let response = self
            .post(SIGNUP_PATH)?
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        match response.json::<SignUpResponse>().await? {
            SignUpResponse::WithSession { user } | SignUpResponse::Bare(user) => Ok(user),
        }
    }

    #[instrument(skip_all)]
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, IdentityError> {
        let response = self
            .post(TOKEN_PATH)?
            .json(&json!({
                "email": credentials.email,
                "password": credentials.password,
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.json::<AuthSession>().await?)
    }

    #[instrument(skip_all)]
    async fn sign_out(&self, access_token: &str) -> Result<(), IdentityError> {
        let response = self
            .post(LOGOUT_PATH)?
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(())
    }

    #[instrument(skip_all)]
    async fn get_user(&self, access_token: &str) -> Result<User, IdentityError> {
        let response = self
            .get(USER_PATH)?
            .header(AUTHORIZATION, format!("Bearer {access_token}"))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::rejection(response).await);
        }

        Ok(response.json::<User>().await?)
    }
}
