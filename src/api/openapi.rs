use super::handlers::{auth, game, health};
use crate::identity::Credentials;
use utoipa::OpenApi;

// Info (title, version, description, license) comes from Cargo.toml.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        auth::sign_up_form,
        auth::sign_up,
        auth::sign_in_form,
        auth::sign_in,
        auth::sign_out,
        game::homepage,
    ),
    components(schemas(Credentials, health::Health)),
    tags(
        (name = "auth", description = "Sign up, sign in and sign out through the identity provider"),
        (name = "game", description = "Pages that require a signed-in session"),
        (name = "health", description = "Liveness")
    )
)]
struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}
