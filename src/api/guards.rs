//! Session guards, applied as middleware around groups of routes.
//!
//! ```rust,ignore
//! Router::new()
//!     .route("/game/homepage", get(homepage))
//!     .route_layer(from_fn_with_state(state.clone(), login_required))
//! ```

use super::{error::AppError, session::Session, AppState, HOMEPAGE_PATH, SIGN_IN_PATH};
use crate::identity::User;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
    Extension,
};
use tracing::debug;

/// User resolved by [`login_required`], available to the wrapped handler.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub User);

/// Let the request through only if the session holds a token the provider
/// still accepts.
///
/// No token redirects to sign-in. A rejected token, or a provider that cannot
/// be reached, answers with the error string. Nothing is cached between
/// requests.
pub async fn login_required(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    mut request: Request,
    next: Next,
) -> Response {
    let Some(access_token) = session.access_token().await else {
        debug!("no access token, redirecting to sign in");
        return Redirect::to(SIGN_IN_PATH).into_response();
    };

    match state.identity().get_user(&access_token).await {
        Ok(user) => {
            request.extensions_mut().insert(CurrentUser(user));
            next.run(request).await
        }
        Err(err) => AppError::from(err).into_response(),
    }
}

/// Let the request through only if nobody is signed in on this session.
pub async fn logout_required(
    Extension(session): Extension<Session>,
    request: Request,
    next: Next,
) -> Response {
    if session.access_token().await.is_some() {
        debug!("already signed in, redirecting to homepage");
        return Redirect::to(HOMEPAGE_PATH).into_response();
    }

    next.run(request).await
}
