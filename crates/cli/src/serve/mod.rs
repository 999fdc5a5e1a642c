//! `hoi serve`: the HTTP front end.
//!
//! Endpoints:
//! - GET  /                          - Login page, or redirect when signed in
//! - POST /                          - Sign in (rate limited)
//! - GET  /logout                    - End the session
//! - GET  /dashboard                 - Reviewer landing page
//! - GET  /submitter_dashboard       - Submitter landing page
//! - GET  /forms/{name}              - A submitter's assigned form file
//! - GET  /health                    - Liveness
//! - POST /api/send_otp              - Issue a login code (rate limited)
//! - GET  /api/summary               - Dashboard counts (reviewer)
//! - GET  /api/activity              - Recent activity log (reviewer)
//! - GET  /api/submissions           - All submissions, `?status=` filter (reviewer)
//! - GET  /api/submission/{id}       - One submission (owner or reviewer)
//! - GET  /api/my_submissions        - The caller's submissions
//! - POST /api/submit_form           - Create a submission
//! - POST /api/process_approval      - Decide on a submission (reviewer)
//! - POST /api/chatbot_reply         - Dashboard assistant (reviewer)
//!
//! Errors are JSON `{"success": false, "error": ...}`.

mod api;
mod auth;
mod error;
mod extract;
mod forms;
mod middleware;
mod pages;
mod session;
mod state;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::http::{Method, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware as axum_middleware, Json, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use self::api::{
    handle_activity, handle_chatbot_reply, handle_get_submission, handle_health,
    handle_list_submissions, handle_my_submissions, handle_process_approval, handle_submit_form,
    handle_summary,
};
use self::auth::{handle_index, handle_login, handle_logout, handle_send_otp};
use self::forms::handle_form;
use self::middleware::{promote_middleware, rate_limit_middleware};
use self::pages::{handle_dashboard, handle_submitter_dashboard};
use self::state::{AppState, RateLimiter};
use crate::config::Config;
use crate::desk::Desk;

/// Maximum request body size: 2 MB.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);

/// Construct a JSON error response with the given status code and message.
fn json_error(status: StatusCode, message: &str) -> impl IntoResponse {
    (
        status,
        Json(serde_json::json!({"success": false, "error": message})),
    )
}

async fn handle_not_found() -> impl IntoResponse {
    json_error(StatusCode::NOT_FOUND, "not found")
}

fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index).post(handle_login))
        .route("/logout", get(handle_logout))
        .route("/dashboard", get(handle_dashboard))
        .route("/submitter_dashboard", get(handle_submitter_dashboard))
        .route("/forms/{name}", get(handle_form))
        .route("/health", get(handle_health))
        .route("/api/send_otp", post(handle_send_otp))
        .route("/api/summary", get(handle_summary))
        .route("/api/activity", get(handle_activity))
        .route("/api/submissions", get(handle_list_submissions))
        .route("/api/submission/{id}", get(handle_get_submission))
        .route("/api/my_submissions", get(handle_my_submissions))
        .route("/api/submit_form", post(handle_submit_form))
        .route("/api/process_approval", post(handle_process_approval))
        .route("/api/chatbot_reply", post(handle_chatbot_reply))
        .fallback(handle_not_found)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            promote_middleware,
        ))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .with_state(state)
}

/// Seed the roster, then serve until Ctrl+C or SIGTERM.
pub async fn start_server(config: Config, port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let desk = Desk::from_config(&config)?;
    let seeded = desk.seed_users(&config).await?;
    tracing::info!(seeded, total = config.users.len(), "user roster applied");

    if !config.server.forms_dir.is_dir() {
        tracing::warn!(dir = %config.server.forms_dir.display(), "forms directory does not exist");
    }

    let state = Arc::new(AppState {
        desk,
        auth_mode: config.auth.mode,
        forms_dir: config.server.forms_dir.clone(),
        secure_cookies: config.server.secure_cookies,
        rate_limiter: RateLimiter::new(config.server.rate_limit, RATE_LIMIT_WINDOW),
    });

    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, mode = %config.auth.mode, "HOI approval desk listening");
    axum::serve(
        listener,
        router(state).into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("server shut down");
    Ok(())
}

/// Wait for Ctrl+C (or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("received shutdown signal");
}
