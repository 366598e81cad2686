//! Route handlers and the templates they render.

pub mod auth;
pub mod game;
pub mod health;
pub mod root;

use super::error::AppError;
use askama::Template;
use axum::response::Html;

/// Render an askama template into an HTML response.
pub(crate) fn render<T: Template>(template: &T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}
