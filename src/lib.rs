//! # Portal
//!
//! `portal` is a small web front door for a hosted identity provider
//! (Supabase/GoTrue compatible). It owns no credentials and no user records:
//! sign-up and sign-in are forwarded to the provider, the returned access
//! token is kept in a server-side session, and the game pages are gated on
//! the presence of that token.
//!
//! ## Sessions
//!
//! The browser only ever sees an opaque, random session id in the
//! `portal_session` cookie (`HttpOnly; Secure; SameSite=Lax`). The access
//! token stays on the server, in a store keyed by a hash of the session id
//! peppered with the configured secret key.
//!
//! ## Guards
//!
//! - **login required:** no token redirects to `/auth/sign_in`; a token the
//!   provider no longer accepts is answered with the provider's error.
//! - **logout required:** an existing token redirects to `/game/homepage`.
//!
//! Failures are never mapped to status codes; the response body is the
//! error's display string.

pub mod api;
pub mod cli;
pub mod identity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
