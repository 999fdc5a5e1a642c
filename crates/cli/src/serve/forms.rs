//! GET /forms/{name}: static form files, one per submitter.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};
use time::OffsetDateTime;

use super::error::ApiError;
use super::session::Viewer;
use super::state::AppState;

/// Plain file names only: no separators, no parent references, no dotfiles.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && !name.contains("..")
        && !name.contains(['/', '\\', '\0'])
}

fn content_type(name: &str) -> &'static str {
    match name.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase()) {
        Some(ext) if ext == "html" || ext == "htm" => "text/html; charset=utf-8",
        Some(ext) if ext == "js" => "text/javascript; charset=utf-8",
        Some(ext) if ext == "css" => "text/css; charset=utf-8",
        Some(ext) if ext == "json" => "application/json",
        _ => "application/octet-stream",
    }
}

pub(crate) async fn handle_form(
    State(state): State<Arc<AppState>>,
    viewer: Viewer,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    if !is_safe_name(&name) {
        return Err(ApiError::BadRequest("invalid form name".to_string()));
    }

    let identity = &viewer.0;
    if !identity.is_reviewer() && identity.form_access.as_deref() != Some(name.as_str()) {
        let err = state
            .desk
            .lifecycle
            .deny(identity, format!("Form Access Denied: {}", name), OffsetDateTime::now_utc())
            .await;
        return Err(err.into());
    }

    let path = state.forms_dir.join(&name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => Ok(([(CONTENT_TYPE, content_type(&name))], bytes).into_response()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            Err(ApiError::NotFound(format!("form '{}' not found", name)))
        }
        Err(e) => Err(ApiError::Internal(format!("reading {}: {}", path.display(), e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traversal_names_are_rejected() {
        assert!(is_safe_name("Academics.html"));
        assert!(!is_safe_name("../hoi.db"));
        assert!(!is_safe_name("a/b.html"));
        assert!(!is_safe_name("a\\b.html"));
        assert!(!is_safe_name(".env"));
        assert!(!is_safe_name(""));
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type("Academics.HTML"), "text/html; charset=utf-8");
        assert_eq!(content_type("blob"), "application/octet-stream");
    }
}
