/// All errors that can be returned by a WorkflowStore implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// No submission with the given id.
    #[error("submission not found: {id}")]
    SubmissionNotFound { id: String },

    /// A submission with this id already exists. Callers regenerate the id
    /// and retry.
    #[error("submission already exists: {id}")]
    DuplicateSubmission { id: String },

    /// A stored value could not be decoded into its record type (unknown
    /// role or status string, unrepresentable timestamp, bad JSON).
    #[error("corrupt record in {table}: {message}")]
    Corrupt { table: &'static str, message: String },

    /// A backend-specific storage error (DB connection, constraint, I/O).
    #[error("storage backend error: {0}")]
    Backend(String),
}
