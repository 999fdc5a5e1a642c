//! Session cookie handling and the identity extractors.

use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{COOKIE, SET_COOKIE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, HeaderValue};
use hoi_workflow::Identity;
use time::OffsetDateTime;

use super::error::ApiError;
use super::state::AppState;

pub(crate) const SESSION_COOKIE: &str = "hoi_session";

/// The raw session token from the `Cookie` header, if any.
pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

pub(crate) fn set_session_cookie(state: &AppState, token: &str) -> (axum::http::HeaderName, HeaderValue) {
    let max_age = state.desk.sessions.ttl().whole_seconds();
    let secure = if state.secure_cookies { "; Secure" } else { "" };
    let cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}{}",
        SESSION_COOKIE, token, max_age, secure
    );
    (SET_COOKIE, header_value(cookie))
}

pub(crate) fn clear_session_cookie() -> (axum::http::HeaderName, HeaderValue) {
    let cookie = format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE);
    (SET_COOKIE, header_value(cookie))
}

/// Tokens are URL-safe base64, so the cookie is always a valid header value.
fn header_value(cookie: String) -> HeaderValue {
    HeaderValue::from_str(&cookie).unwrap_or_else(|_| HeaderValue::from_static(""))
}

/// The signed-in identity, or `None` for anonymous requests.
pub(crate) struct MaybeViewer(pub(crate) Option<Identity>);

impl FromRequestParts<Arc<AppState>> for MaybeViewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let Some(token) = session_token(&parts.headers) else {
            return Ok(MaybeViewer(None));
        };
        let identity = state
            .desk
            .sessions
            .resolve(&token, OffsetDateTime::now_utc())
            .await?;
        Ok(MaybeViewer(identity))
    }
}

/// The signed-in identity; anonymous requests are rejected with 401.
pub(crate) struct Viewer(pub(crate) Identity);

impl FromRequestParts<Arc<AppState>> for Viewer {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match MaybeViewer::from_request_parts(parts, state).await? {
            MaybeViewer(Some(identity)) => Ok(Viewer(identity)),
            MaybeViewer(None) => Err(ApiError::Unauthorized),
        }
    }
}

impl Viewer {
    /// Fail with 403, logged as a security event, unless the viewer is a
    /// reviewer.
    pub(crate) async fn require_reviewer(&self, state: &AppState, what: &str) -> Result<(), ApiError> {
        if self.0.is_reviewer() {
            return Ok(());
        }
        let err = state
            .desk
            .lifecycle
            .deny(&self.0, format!("{} Denied", what), OffsetDateTime::now_utc())
            .await;
        Err(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_session_among_other_cookies() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; hoi_session=abc123; lang=en"));
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_token(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("hoi_session="));
        assert_eq!(session_token(&headers), None);
    }
}
