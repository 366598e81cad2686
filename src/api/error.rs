use crate::identity::IdentityError;
use axum::response::{IntoResponse, Response};
use std::any::Any;
use thiserror::Error;
use tracing::{error, warn};

/// Anything a handler or guard can fail with.
///
/// Every variant renders the same way: a plain-text body holding the display
/// string. Failure kinds are not mapped to status codes.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("{0}")]
    Form(String),

    #[error("template error: {0}")]
    Template(#[from] askama::Error),

    #[error("session error: {0:#}")]
    Session(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match &self {
            Self::Identity(err) if err.is_transport() => {
                error!("identity provider unreachable: {err}");
            }
            Self::Identity(err) => match err.provider_status() {
                Some(status) => warn!("identity provider rejected request ({status}): {err}"),
                None => error!("identity provider answered unexpectedly: {err}"),
            },
            Self::Form(message) => warn!("invalid form submission: {message}"),
            other => error!("request failed: {other}"),
        }

        self.to_string().into_response()
    }
}

/// Render a caught panic the same way as any other failure.
pub(crate) fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unexpected error".to_string()
    };

    error!("handler panicked: {message}");

    message.into_response()
}
