use crate::identity::{IdentityClient, UserService};
use anyhow::Result;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderName, HeaderValue, Request},
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Router,
};
use std::sync::Arc;
use tokio::{net::TcpListener, signal};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, request_id::PropagateRequestIdLayer,
    set_header::SetRequestHeaderLayer, trace::TraceLayer,
};
use tracing::{info, info_span, Span};
use ulid::Ulid;

pub mod error;
pub mod guards;
pub(crate) mod handlers;
mod openapi;
pub mod session;

pub use openapi::openapi;

pub const SIGN_UP_PATH: &str = "/auth/sign_up";
pub const SIGN_IN_PATH: &str = "/auth/sign_in";
pub const SIGN_OUT_PATH: &str = "/auth/sign_out";
pub const HOMEPAGE_PATH: &str = "/game/homepage";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Shared state handed to every handler and guard.
#[derive(Clone)]
pub struct AppState {
    identity: Arc<dyn IdentityClient>,
    users: UserService,
    sessions: Arc<dyn session::SessionStore>,
    session_config: Arc<session::SessionConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityClient>,
        sessions: Arc<dyn session::SessionStore>,
        session_config: session::SessionConfig,
    ) -> Self {
        Self {
            users: UserService::new(identity.clone()),
            identity,
            sessions,
            session_config: Arc::new(session_config),
        }
    }

    #[must_use]
    pub fn identity(&self) -> &dyn IdentityClient {
        self.identity.as_ref()
    }

    #[must_use]
    pub const fn users(&self) -> &UserService {
        &self.users
    }

    #[must_use]
    pub fn session_store(&self) -> &Arc<dyn session::SessionStore> {
        &self.sessions
    }

    #[must_use]
    pub fn session_config(&self) -> &session::SessionConfig {
        &self.session_config
    }
}

/// Build the application router with guards, sessions and HTTP layers.
pub fn app(state: AppState) -> Router {
    let logged_out = Router::new()
        .route(
            SIGN_UP_PATH,
            get(handlers::auth::sign_up_form).post(handlers::auth::sign_up),
        )
        .route(
            SIGN_IN_PATH,
            get(handlers::auth::sign_in_form).post(handlers::auth::sign_in),
        )
        .route_layer(from_fn(guards::logout_required));

    let logged_in = Router::new()
        .route(SIGN_OUT_PATH, get(handlers::auth::sign_out))
        .route(HOMEPAGE_PATH, get(handlers::game::homepage))
        .route_layer(from_fn_with_state(state.clone(), guards::login_required));

    Router::new()
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::health::health))
        .merge(logged_out)
        .merge(logged_in)
        .layer(from_fn_with_state(state.clone(), session::session_layer))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static(REQUEST_ID_HEADER),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    REQUEST_ID_HEADER,
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(CatchPanicLayer::custom(error::panic_response)),
        )
        .with_state(state)
}

/// Start the server
/// # Errors
/// Return error if failed to bind or serve
pub async fn new(port: u16, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app(state).into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Gracefully shutdown");
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
