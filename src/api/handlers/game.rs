use super::render;
use crate::api::{error::AppError, guards::CurrentUser, SIGN_OUT_PATH};
use askama::Template;
use axum::{response::Html, Extension};

#[derive(Template)]
#[template(path = "homepage.html")]
pub struct HomepageTemplate {
    pub email: String,
    pub sign_out_path: &'static str,
}

#[utoipa::path(
    get,
    path = "/game/homepage",
    responses(
        (status = 200, description = "Protected page", content_type = "text/html"),
        (status = 303, description = "No session, redirect to /auth/sign_in")
    ),
    tag = "game"
)]
pub async fn homepage(
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<Html<String>, AppError> {
    render(&HomepageTemplate {
        email: user.email.unwrap_or(user.id),
        sign_out_path: SIGN_OUT_PATH,
    })
}
