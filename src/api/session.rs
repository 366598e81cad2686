//! Server-side sessions referenced by an opaque cookie.
//!
//! Flow: [`session_layer`] resolves the `portal_session` cookie into a
//! [`Session`] handle and attaches it to the request. Handlers and guards read
//! or mutate the handle; once the response is built the layer persists the
//! changes and emits (or clears) the cookie. Sessions nobody wrote to never
//! reach the store and never produce a cookie.

use super::{error::AppError, AppState};
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{rngs::OsRng, RngCore};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::{
    collections::HashMap,
    fmt,
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error};

pub const SESSION_COOKIE_NAME: &str = "portal_session";
pub const DEFAULT_SESSION_TTL_SECONDS: u64 = 12 * 60 * 60;
pub const MAX_SESSION_TTL_SECONDS: u64 = 365 * 24 * 60 * 60;
pub const MIN_SECRET_KEY_LEN: usize = 32;

/// Values kept for one client.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SessionData {
    pub access_token: Option<String>,
}

impl SessionData {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.access_token.is_none()
    }
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("access_token", &self.access_token.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Store lookup key: never the raw cookie value.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SessionKey(Vec<u8>);

/// Persistence for session data.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionData>>;
    async fn save(&self, key: SessionKey, data: SessionData, ttl: Duration) -> Result<()>;
    async fn remove(&self, key: &SessionKey) -> Result<()>;
}

struct Entry {
    data: SessionData,
    expires_at: Instant,
}

/// Process-local store. Entries expire `ttl` after they were last saved.
#[derive(Default)]
pub struct MemorySessionStore {
    entries: RwLock<HashMap<SessionKey, Entry>>,
}

impl MemorySessionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemorySessionStore {
    /// Number of live (unexpired) sessions.
    async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, key: &SessionKey) -> Result<Option<SessionData>> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.expires_at > now => return Ok(Some(entry.data.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }

        // Expired: drop it so the next lookup takes the fast path.
        self.entries.write().await.remove(key);
        Ok(None)
    }

    async fn save(&self, key: SessionKey, data: SessionData, ttl: Duration) -> Result<()> {
        let now = Instant::now();
        let expires_at = now
            .checked_add(ttl)
            .ok_or_else(|| anyhow::anyhow!("session ttl out of range: {}s", ttl.as_secs()))?;

        let mut entries = self.entries.write().await;
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(key, Entry { data, expires_at });
        Ok(())
    }

    async fn remove(&self, key: &SessionKey) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// Session settings: the secret that peppers store keys and the lifetime of
/// stored sessions.
pub struct SessionConfig {
    secret_key: SecretString,
    ttl: Duration,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("secret_key", &"***")
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl SessionConfig {
    /// # Errors
    /// Returns an error if the secret key is shorter than [`MIN_SECRET_KEY_LEN`].
    pub fn new(secret_key: SecretString) -> Result<Self> {
        let len = secret_key.expose_secret().trim().len();
        if len < MIN_SECRET_KEY_LEN {
            anyhow::bail!(
                "secret key must be at least {MIN_SECRET_KEY_LEN} characters, got {len}"
            );
        }

        Ok(Self {
            secret_key,
            ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECONDS),
        })
    }

    #[must_use]
    pub const fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Hash a session id with the secret key; the result is what the store sees.
    #[must_use]
    pub fn key_for(&self, session_id: &str) -> SessionKey {
        let mut hasher = Sha256::new();
        hasher.update(self.secret_key.expose_secret().as_bytes());
        hasher.update(b":");
        hasher.update(session_id.as_bytes());
        SessionKey(hasher.finalize().to_vec())
    }
}

struct SessionState {
    id: Option<String>,
    data: SessionData,
    modified: bool,
    rotate: bool,
}

/// Per-request handle to the client's session.
///
/// Cloning is cheap; every clone sees the same state.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Mutex<SessionState>>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").finish_non_exhaustive()
    }
}

impl Session {
    fn new(id: Option<String>, data: SessionData) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionState {
                id,
                data,
                modified: false,
                rotate: false,
            })),
        }
    }

    /// A session not yet backed by the store.
    #[must_use]
    pub fn fresh() -> Self {
        Self::new(None, SessionData::default())
    }

    pub async fn access_token(&self) -> Option<String> {
        self.inner.lock().await.data.access_token.clone()
    }

    /// Store a freshly issued token. The session id is rotated on commit.
    pub async fn set_access_token(&self, token: String) {
        let mut state = self.inner.lock().await;
        state.data.access_token = Some(token);
        state.modified = true;
        state.rotate = true;
    }

    /// Drop everything held for this client, returning the previous token.
    pub async fn clear(&self) -> Option<String> {
        let mut state = self.inner.lock().await;
        state.modified = true;
        std::mem::take(&mut state.data).access_token
    }
}

/// Create a new random session id for the cookie.
fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 32];
    OsRng
        .try_fill_bytes(&mut bytes)
        .context("failed to generate session id")?;
    Ok(Base64UrlUnpadded::encode_string(&bytes))
}

/// Build the session cookie. No `Max-Age`: expiry is enforced by the store.
fn session_cookie(session_id: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{SESSION_COOKIE_NAME}={session_id}; Path=/; HttpOnly; Secure; SameSite=Lax"
    ))
    .context("failed to build session cookie")
}

fn clear_session_cookie() -> HeaderValue {
    HeaderValue::from_static("portal_session=; Path=/; HttpOnly; Secure; SameSite=Lax; Max-Age=0")
}

pub(crate) fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(value) = header.to_str() else {
            continue;
        };
        for pair in value.split(';') {
            let mut parts = pair.trim().splitn(2, '=');
            let (Some(key), Some(val)) = (parts.next(), parts.next()) else {
                continue;
            };
            let val = val.trim();
            if key.trim() == SESSION_COOKIE_NAME && !val.is_empty() {
                return Some(val.to_string());
            }
        }
    }
    None
}

/// Persist a session after the handler ran.
///
/// Returns the `Set-Cookie` value to emit, if any.
async fn commit(
    store: &dyn SessionStore,
    config: &SessionConfig,
    session: &Session,
    stale_cookie: bool,
) -> Result<Option<HeaderValue>> {
    let state = session.inner.lock().await;

    if !state.modified {
        return Ok(stale_cookie.then(clear_session_cookie));
    }

    if state.data.is_empty() {
        if let Some(id) = &state.id {
            store.remove(&config.key_for(id)).await?;
        }
        return Ok((state.id.is_some() || stale_cookie).then(clear_session_cookie));
    }

    match (&state.id, state.rotate) {
        (Some(id), false) => {
            store
                .save(config.key_for(id), state.data.clone(), config.ttl())
                .await?;
            Ok(None)
        }
        (previous, _) => {
            if let Some(previous) = previous {
                store.remove(&config.key_for(previous)).await?;
            }
            let id = generate_session_id()?;
            store
                .save(config.key_for(&id), state.data.clone(), config.ttl())
                .await?;
            debug!("session id issued");
            Ok(Some(session_cookie(&id)?))
        }
    }
}

/// Middleware attaching a [`Session`] to every request.
pub async fn session_layer(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let store = state.session_store();
    let config = state.session_config();

    let cookie_id = extract_session_id(request.headers());
    let loaded = match &cookie_id {
        Some(id) => match store.load(&config.key_for(id)).await {
            Ok(data) => data,
            Err(err) => {
                error!("Failed to load session: {err:#}");
                return AppError::Session(err).into_response();
            }
        },
        None => None,
    };

    // A cookie the store does not know (expired, forged, from a restart) is
    // treated as no session at all.
    let stale_cookie = cookie_id.is_some() && loaded.is_none();
    let session = match loaded {
        Some(data) => Session::new(cookie_id, data),
        None => Session::fresh(),
    };

    request.extensions_mut().insert(session.clone());
    let mut response = next.run(request).await;

    match commit(store.as_ref(), config, &session, stale_cookie).await {
        Ok(Some(cookie)) => {
            response.headers_mut().append(SET_COOKIE, cookie);
            response
        }
        Ok(None) => response,
        Err(err) => {
            error!("Failed to save session: {err:#}");
            AppError::Session(err).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Result<SessionConfig> {
        SessionConfig::new(SecretString::from(
            "0123456789abcdef0123456789abcdef".to_string(),
        ))
    }

    #[test]
    fn secret_key_must_be_long_enough() {
        assert!(SessionConfig::new(SecretString::from("short".to_string())).is_err());
        assert!(SessionConfig::new(SecretString::from(" ".repeat(40))).is_err());
        assert!(config().is_ok());
    }

    #[test]
    fn key_depends_on_secret_and_id() -> Result<()> {
        let a = config()?;
        let b = SessionConfig::new(SecretString::from("x".repeat(MIN_SECRET_KEY_LEN)))?;
        assert_eq!(a.key_for("id-1"), a.key_for("id-1"));
        assert_ne!(a.key_for("id-1"), a.key_for("id-2"));
        assert_ne!(a.key_for("id-1"), b.key_for("id-1"));
        Ok(())
    }

    #[test]
    fn session_ids_are_unique_and_url_safe() -> Result<()> {
        let first = generate_session_id()?;
        let second = generate_session_id()?;
        assert_ne!(first, second);
        assert_eq!(first.len(), 43);
        assert!(first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        Ok(())
    }

    #[test]
    fn cookie_flags() -> Result<()> {
        let cookie = session_cookie("abc")?;
        let value = cookie.to_str()?;
        assert!(value.starts_with("portal_session=abc;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Secure"));
        assert!(value.contains("SameSite=Lax"));
        assert!(!value.contains("Max-Age"));
        assert!(clear_session_cookie().to_str()?.contains("Max-Age=0"));
        Ok(())
    }

    #[test]
    fn extract_session_id_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_static("theme=dark; portal_session=abc123; other=1"),
        );
        assert_eq!(extract_session_id(&headers), Some("abc123".to_string()));

        let mut empty = HeaderMap::new();
        empty.insert(COOKIE, HeaderValue::from_static("portal_session="));
        assert_eq!(extract_session_id(&empty), None);
        assert_eq!(extract_session_id(&HeaderMap::new()), None);
    }

    #[test]
    fn session_data_debug_redacts_token() {
        let data = SessionData {
            access_token: Some("secret-token".to_string()),
        };
        assert!(!format!("{data:?}").contains("secret-token"));
    }

    #[tokio::test]
    async fn memory_store_expires_entries() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;
        let data = SessionData {
            access_token: Some("t".to_string()),
        };

        store
            .save(cfg.key_for("live"), data.clone(), Duration::from_secs(60))
            .await?;
        store
            .save(cfg.key_for("dead"), data.clone(), Duration::ZERO)
            .await?;

        assert_eq!(store.load(&cfg.key_for("live")).await?, Some(data));
        assert_eq!(store.load(&cfg.key_for("dead")).await?, None);
        assert_eq!(store.len().await, 1);

        store.remove(&cfg.key_for("live")).await?;
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn memory_store_rejects_unrepresentable_ttl() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;
        let data = SessionData {
            access_token: Some("t".to_string()),
        };

        let result = store
            .save(cfg.key_for("sid"), data, Duration::from_secs(u64::MAX))
            .await;
        assert!(result.is_err_and(|e| e.to_string().contains("session ttl out of range")));
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn untouched_session_is_not_persisted() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;

        let cookie = commit(&store, &cfg, &Session::fresh(), false).await?;
        assert!(cookie.is_none());
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn setting_token_rotates_session_id() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;
        let data = SessionData {
            access_token: Some("old".to_string()),
        };
        store
            .save(cfg.key_for("existing"), data.clone(), cfg.ttl())
            .await?;

        let session = Session::new(Some("existing".to_string()), data);
        session.set_access_token("new".to_string()).await;

        let cookie = commit(&store, &cfg, &session, false).await?;
        let cookie = cookie.map(|c| c.to_str().map(ToString::to_string));
        let Some(Ok(cookie)) = cookie else {
            panic!("expected a new session cookie");
        };

        assert!(!cookie.contains("existing"));
        assert_eq!(store.load(&cfg.key_for("existing")).await?, None);
        assert_eq!(store.len().await, 1);
        Ok(())
    }

    #[tokio::test]
    async fn clearing_removes_entry_and_cookie() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;
        let data = SessionData {
            access_token: Some("token".to_string()),
        };
        store.save(cfg.key_for("sid"), data.clone(), cfg.ttl()).await?;

        let session = Session::new(Some("sid".to_string()), data);
        assert_eq!(session.clear().await, Some("token".to_string()));
        assert_eq!(session.access_token().await, None);

        let cookie = commit(&store, &cfg, &session, false).await?;
        assert_eq!(cookie, Some(clear_session_cookie()));
        assert!(store.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn stale_cookie_is_cleared() -> Result<()> {
        let store = MemorySessionStore::new();
        let cfg = config()?;

        let cookie = commit(&store, &cfg, &Session::fresh(), true).await?;
        assert_eq!(cookie, Some(clear_session_cookie()));
        Ok(())
    }
}
