//! Access gate in front of every `/api/v1` route.

use axum::{
    extract::{Query, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::attendance_logic::error::AppError;
use crate::attendance_logic::state::AppState;

/// Header carrying the shared secret.
pub const ACCESS_TOKEN_HEADER: &str = "access-token";

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    /// No token was presented.
    #[error("Access token is missing")]
    Missing,
    /// A token was presented but does not match.
    #[error("Invalid access token")]
    Invalid,
}

/// Decides whether a request may reach the routes.
pub trait AccessGate: Send + Sync {
    /// Checks the `access-token` header, falling back to `query_token` when
    /// the route accepts the token in its query string.
    fn check(&self, headers: &HeaderMap, query_token: Option<&str>) -> Result<(), AccessDenied>;
}

/// Accepts requests whose `access-token` equals a configured secret.
pub struct SharedSecretGate {
    token: String,
}

impl SharedSecretGate {
    pub fn new(token: impl Into<String>) -> Self {
        Self { token: token.into() }
    }
}

impl AccessGate for SharedSecretGate {
    fn check(&self, headers: &HeaderMap, query_token: Option<&str>) -> Result<(), AccessDenied> {
        let presented = match headers.get(ACCESS_TOKEN_HEADER) {
            Some(value) => value.as_bytes(),
            None => query_token.ok_or(AccessDenied::Missing)?.as_bytes(),
        };
        if presented == self.token.as_bytes() {
            Ok(())
        } else {
            Err(AccessDenied::Invalid)
        }
    }
}

// `?access-token=...` on the event stream route
#[derive(Debug, Default, Deserialize)]
struct TokenQuery {
    #[serde(rename = "access-token")]
    access_token: Option<String>,
}

/// Middleware running the configured gate before the wrapped routes. Only the
/// header is accepted.
pub async fn require_access(State(state): State<AppState>, request: Request, next: Next) -> Result<Response, AppError> {
    state.gate.check(request.headers(), None)?;
    debug!(path = %request.uri().path(), "access granted");
    Ok(next.run(request).await)
}

/// Gate for the event stream. Browsers open it with `EventSource`, which
/// cannot set headers, so the token may also come as `?access-token=`.
pub async fn require_stream_access(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let query = Query::<TokenQuery>::try_from_uri(request.uri())
        .map(|Query(query)| query)
        .unwrap_or_default();
    state.gate.check(request.headers(), query.access_token.as_deref())?;
    debug!(path = %request.uri().path(), "stream access granted");
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn shared_secret_gate_distinguishes_missing_and_wrong() {
        let gate = SharedSecretGate::new("s3cret");
        let mut headers = HeaderMap::new();
        assert_eq!(gate.check(&headers, None), Err(AccessDenied::Missing));

        headers.insert(ACCESS_TOKEN_HEADER, HeaderValue::from_static("nope"));
        assert_eq!(gate.check(&headers, None), Err(AccessDenied::Invalid));

        headers.insert(ACCESS_TOKEN_HEADER, HeaderValue::from_static("s3cret"));
        assert_eq!(gate.check(&headers, None), Ok(()));
    }

    #[test]
    fn query_token_is_used_only_without_a_header() {
        let gate = SharedSecretGate::new("s3cret");
        let empty = HeaderMap::new();
        assert_eq!(gate.check(&empty, Some("s3cret")), Ok(()));
        assert_eq!(gate.check(&empty, Some("nope")), Err(AccessDenied::Invalid));

        let mut headers = HeaderMap::new();
        headers.insert(ACCESS_TOKEN_HEADER, HeaderValue::from_static("nope"));
        assert_eq!(gate.check(&headers, Some("s3cret")), Err(AccessDenied::Invalid));
    }
}
