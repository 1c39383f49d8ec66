//! Cookie-backed session identifiers.
//!
//! The middleware only resolves *which* session a request belongs to; loading
//! and persisting session contents is left to the handlers that need it.

use std::fmt;

use axum::{
    extract::{Request, State},
    http::{
        header::{COOKIE, SET_COOKIE},
        HeaderMap, HeaderValue,
    },
    middleware::Next,
    response::Response,
};
use uuid::{Timestamp, Uuid};

/// Opaque per-browser session identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh, time-ordered session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v7(Timestamp::now(uuid::NoContext)))
    }

    /// Parse a session id received from a client; anything that is not a UUID is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Session cookie parameters.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure: bool,
}

impl SessionConfig {
    pub fn new(cookie_name: impl Into<String>, secure: bool) -> Self {
        Self {
            cookie_name: cookie_name.into(),
            secure,
        }
    }

    fn set_cookie(&self, id: &SessionId) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; HttpOnly; SameSite=Lax",
            self.cookie_name, id
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}

/// Find a cookie value by name across all `Cookie` headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

/// Resolve the request's session id, issuing a new cookie when absent or invalid.
pub async fn session_middleware(
    State(config): State<SessionConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let existing = cookie_value(request.headers(), &config.cookie_name).and_then(SessionId::parse);
    let (session_id, fresh) = match existing {
        Some(id) => (id, false),
        None => (SessionId::generate(), true),
    };

    request.extensions_mut().insert(session_id.clone());
    let mut response = next.run(request).await;

    if fresh {
        match HeaderValue::from_str(&config.set_cookie(&session_id)) {
            Ok(value) => {
                response.headers_mut().append(SET_COOKIE, value);
                tracing::debug!(session = %session_id, "issued session cookie");
            }
            Err(error) => {
                tracing::warn!(%error, "session cookie is not a valid header value");
            }
        }
    }

    response
}
