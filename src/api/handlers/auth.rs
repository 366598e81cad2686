//! Sign-up, sign-in and sign-out.
//!
//! These handlers only forward: credentials go to the provider untouched and
//! the provider's answer decides the outcome.

use super::render;
use crate::{
    api::{error::AppError, session::Session, AppState, HOMEPAGE_PATH, SIGN_IN_PATH, SIGN_UP_PATH},
    identity::Credentials,
};
use askama::Template;
use axum::{
    extract::{rejection::FormRejection, State},
    response::{Html, Redirect},
    Extension, Form,
};
use tracing::info;

#[derive(Template)]
#[template(path = "sign_up.html")]
pub struct SignUpTemplate {
    pub action: &'static str,
    pub sign_in_path: &'static str,
}

#[derive(Template)]
#[template(path = "sign_in.html")]
pub struct SignInTemplate {
    pub action: &'static str,
    pub sign_up_path: &'static str,
}

#[derive(Template)]
#[template(path = "sign_out.html")]
pub struct SignOutTemplate {
    pub sign_in_path: &'static str,
}

fn credentials(payload: Result<Form<Credentials>, FormRejection>) -> Result<Credentials, AppError> {
    payload
        .map(|Form(credentials)| credentials)
        .map_err(|rejection| AppError::Form(rejection.body_text()))
}

#[utoipa::path(
    get,
    path = "/auth/sign_up",
    responses(
        (status = 200, description = "Sign-up form", content_type = "text/html"),
        (status = 303, description = "Already signed in, redirect to /game/homepage")
    ),
    tag = "auth"
)]
pub async fn sign_up_form() -> Result<Html<String>, AppError> {
    render(&SignUpTemplate {
        action: SIGN_UP_PATH,
        sign_in_path: SIGN_IN_PATH,
    })
}

#[utoipa::path(
    post,
    path = "/auth/sign_up",
    request_body(content = Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Account created, redirect to /auth/sign_in"),
        (status = 200, description = "Provider error as plain text", content_type = "text/plain")
    ),
    tag = "auth"
)]
pub async fn sign_up(
    State(state): State<AppState>,
    payload: Result<Form<Credentials>, FormRejection>,
) -> Result<Redirect, AppError> {
    let credentials = credentials(payload)?;

    let user = state.users().sign_up(&credentials).await?;
    info!("account created for user {}", user.id);

    Ok(Redirect::to(SIGN_IN_PATH))
}

#[utoipa::path(
    get,
    path = "/auth/sign_in",
    responses(
        (status = 200, description = "Sign-in form", content_type = "text/html"),
        (status = 303, description = "Already signed in, redirect to /game/homepage")
    ),
    tag = "auth"
)]
pub async fn sign_in_form() -> Result<Html<String>, AppError> {
    render(&SignInTemplate {
        action: SIGN_IN_PATH,
        sign_up_path: SIGN_UP_PATH,
    })
}

#[utoipa::path(
    post,
    path = "/auth/sign_in",
    request_body(content = Credentials, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 303, description = "Signed in, session cookie set, redirect to /game/homepage"),
        (status = 200, description = "Provider error as plain text", content_type = "text/plain")
    ),
    tag = "auth"
)]
pub async fn sign_in(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    payload: Result<Form<Credentials>, FormRejection>,
) -> Result<Redirect, AppError> {
    let credentials = credentials(payload)?;

    let auth = state.users().sign_in(&credentials).await?;
    session.set_access_token(auth.access_token).await;

    Ok(Redirect::to(HOMEPAGE_PATH))
}

#[utoipa::path(
    get,
    path = "/auth/sign_out",
    responses(
        (status = 200, description = "Signed out, session cleared", content_type = "text/html"),
        (status = 303, description = "No session, redirect to /auth/sign_in")
    ),
    tag = "auth"
)]
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> Result<Html<String>, AppError> {
    // The whole session goes first, even if the provider call fails below.
    if let Some(access_token) = session.clear().await {
        state.users().sign_out(&access_token).await?;
    }

    render(&SignOutTemplate {
        sign_in_path: SIGN_IN_PATH,
    })
}
