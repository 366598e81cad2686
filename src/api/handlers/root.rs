use crate::api::HOMEPAGE_PATH;
use axum::response::Redirect;

// Signed-out visitors bounce on to sign in from there.
pub async fn root() -> Redirect {
    Redirect::to(HOMEPAGE_PATH)
}
