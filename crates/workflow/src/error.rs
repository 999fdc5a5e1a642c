use hoi_storage::StorageError;

/// Authentication failures. The `Display` text is safe to show the user.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Access denied. Email not recognized.")]
    UnknownIdentity,

    #[error("No login code on record. Please request a new one.")]
    NoCodeIssued,

    #[error("OTP expired. Please request a new one.")]
    CodeExpired,

    #[error("Incorrect OTP.")]
    CodeMismatch,

    #[error("Invalid username or password.")]
    InvalidCredentials,

    /// The code was stored but the mail transport refused it.
    #[error("Failed to send the login code. Please try again later.")]
    CodeDeliveryFailed,

    #[error("password hashing failed: {0}")]
    PasswordHash(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Whether this is a credential problem (as opposed to an internal fault).
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            AuthError::CodeDeliveryFailed | AuthError::PasswordHash(_) | AuthError::Storage(_)
        )
    }
}

/// Errors from submission lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("submission not found: {id}")]
    SubmissionNotFound { id: String },

    /// The caller's role or ownership does not permit the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error(transparent)]
    Storage(StorageError),
}

impl From<StorageError> for WorkflowError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::SubmissionNotFound { id } => WorkflowError::SubmissionNotFound { id },
            other => WorkflowError::Storage(other),
        }
    }
}
