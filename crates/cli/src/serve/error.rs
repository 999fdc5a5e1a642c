//! The single error-to-response mapping for the HTTP surface.

use axum::extract::rejection::{FormRejection, JsonRejection};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use hoi_storage::StorageError;
use hoi_workflow::{AuthError, WorkflowError};

#[derive(Debug)]
pub(crate) enum ApiError {
    BadRequest(String),
    Unauthorized,
    /// The message is fixed so a denied caller learns nothing about the target.
    Forbidden,
    NotFound(String),
    TooManyRequests { retry_after: u64 },
    /// A request body the extractor could not accept.
    Rejected { status: StatusCode, message: String },
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::Rejected { message: msg, .. } => msg.clone(),
            ApiError::Unauthorized => "authentication required".to_string(),
            ApiError::Forbidden => "access denied".to_string(),
            ApiError::TooManyRequests { .. } => "rate limit exceeded".to_string(),
            ApiError::Internal(_) => "internal server error".to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "request failed");
        }
        let status = self.status();
        let body = Json(serde_json::json!({
            "success": false,
            "error": self.message(),
        }));
        match self {
            ApiError::TooManyRequests { retry_after } => (
                status,
                [(header::RETRY_AFTER, retry_after.to_string())],
                body,
            )
                .into_response(),
            _ => (status, body).into_response(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        ApiError::Rejected {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::SubmissionNotFound { id } => {
                ApiError::NotFound(format!("submission '{}' not found", id))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<WorkflowError> for ApiError {
    fn from(e: WorkflowError) -> Self {
        match e {
            WorkflowError::SubmissionNotFound { id } => {
                ApiError::NotFound(format!("submission '{}' not found", id))
            }
            WorkflowError::Forbidden(_) => ApiError::Forbidden,
            WorkflowError::Storage(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::UnknownIdentity => ApiError::Forbidden,
            AuthError::CodeDeliveryFailed => ApiError::Internal(e.to_string()),
            AuthError::PasswordHash(_) | AuthError::Storage(_) => ApiError::Internal(e.to_string()),
            rejection => ApiError::BadRequest(rejection.to_string()),
        }
    }
}
