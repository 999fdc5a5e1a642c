//! Login, code issue and logout handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::Json;
use hoi_workflow::{AuthError, AuthMode, Identity};
use serde::Deserialize;
use time::OffsetDateTime;

use super::error::ApiError;
use super::extract::{ApiForm, ApiJson};
use super::json_error;
use super::pages::{home_for, login_page};
use super::session::{clear_session_cookie, session_token, set_session_cookie, MaybeViewer};
use super::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct SendCodeRequest {
    #[serde(default)]
    email: String,
}

/// POST /api/send_otp
pub(crate) async fn handle_send_otp(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<SendCodeRequest>,
) -> Response {
    if state.auth_mode != AuthMode::Otp {
        return json_error(StatusCode::BAD_REQUEST, "one-time codes are not enabled").into_response();
    }
    let email = req.email.trim();
    if email.is_empty() {
        return json_error(StatusCode::BAD_REQUEST, "Email is required.").into_response();
    }

    match state
        .desk
        .auth
        .request_code(email, OffsetDateTime::now_utc())
        .await
    {
        Ok(()) => Json(serde_json::json!({
            "success": true,
            "message": "OTP sent successfully.",
        }))
        .into_response(),
        Err(e @ AuthError::UnknownIdentity) => {
            json_error(StatusCode::FORBIDDEN, &e.to_string()).into_response()
        }
        Err(e @ AuthError::CodeDeliveryFailed) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()).into_response()
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /
pub(crate) async fn handle_index(
    State(state): State<Arc<AppState>>,
    MaybeViewer(viewer): MaybeViewer,
) -> Response {
    match viewer {
        Some(identity) => Redirect::to(home_for(&identity)).into_response(),
        None => Html(login_page(state.auth_mode, None)).into_response(),
    }
}

/// Fields of the login form; which ones are used depends on the mode.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct LoginForm {
    email: String,
    otp: String,
    username: String,
    password: String,
}

/// POST /
pub(crate) async fn handle_login(
    State(state): State<Arc<AppState>>,
    ApiForm(form): ApiForm<LoginForm>,
) -> Response {
    let now = OffsetDateTime::now_utc();
    let attempt = match state.auth_mode {
        AuthMode::Otp => {
            state
                .desk
                .auth
                .verify_code(form.email.trim(), form.otp.trim(), now)
                .await
        }
        AuthMode::Password => {
            state
                .desk
                .auth
                .login(form.username.trim(), &form.password, now)
                .await
        }
    };

    match attempt {
        Ok(identity) => start_session(&state, &identity, now).await,
        Err(e) if e.is_rejection() => (
            StatusCode::UNAUTHORIZED,
            Html(login_page(state.auth_mode, Some(&e.to_string()))),
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "login failed internally");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(login_page(state.auth_mode, Some("Server error. Please try again."))),
            )
                .into_response()
        }
    }
}

async fn start_session(state: &AppState, identity: &Identity, now: OffsetDateTime) -> Response {
    match state.desk.sessions.open(identity, now).await {
        Ok(token) => (
            [set_session_cookie(state, &token)],
            Redirect::to(home_for(identity)),
        )
            .into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// GET /logout
pub(crate) async fn handle_logout(
    State(state): State<Arc<AppState>>,
    MaybeViewer(viewer): MaybeViewer,
    headers: HeaderMap,
) -> Response {
    if let Some(identity) = viewer {
        state
            .desk
            .auth
            .logout(&identity, OffsetDateTime::now_utc())
            .await;
    }
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.desk.sessions.close(&token).await {
            tracing::error!(error = %e, "session close failed");
        }
    }
    ([clear_session_cookie()], Redirect::to("/")).into_response()
}
