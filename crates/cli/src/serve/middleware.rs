//! HTTP middleware: rate limiting on the login endpoints and
//! request-driven overdue promotion.

use std::sync::Arc;

use axum::extract::{ConnectInfo, State};
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;

use super::error::ApiError;
use super::state::AppState;

fn is_login_attempt(method: &Method, path: &str) -> bool {
    (method == Method::POST && path == "/") || path == "/api/send_otp"
}

fn wants_fresh_statuses(path: &str) -> bool {
    path == "/" || path == "/dashboard" || path.starts_with("/api/")
}

/// Per-IP limit on code requests and login form posts.
pub(crate) async fn rate_limit_middleware(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<std::net::SocketAddr>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if !is_login_attempt(request.method(), request.uri().path()) {
        return next.run(request).await;
    }
    match state.rate_limiter.check(addr.ip()).await {
        Ok(()) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(ip = %addr.ip(), retry_after, "login rate limit exceeded");
            ApiError::TooManyRequests { retry_after }.into_response()
        }
    }
}

/// Promote overdue submissions before dashboard and API reads.
///
/// A failed promotion is logged and the request continues.
pub(crate) async fn promote_middleware(
    State(state): State<Arc<AppState>>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Response {
    if wants_fresh_statuses(request.uri().path()) {
        if let Err(e) = state
            .desk
            .lifecycle
            .promote_overdue(OffsetDateTime::now_utc())
            .await
        {
            tracing::error!(error = %e, "overdue promotion failed");
        }
    }
    next.run(request).await
}
