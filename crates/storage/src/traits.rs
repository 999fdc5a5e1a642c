use async_trait::async_trait;
use time::OffsetDateTime;

use crate::error::StorageError;
use crate::record::{
    ActivityRecord, CodeRecord, DecisionUpdate, NewActivity, SessionRecord, SubmissionCounts,
    SubmissionFilter, SubmissionRecord, UserRecord,
};

/// The storage trait for the approval desk.
///
/// A `WorkflowStore` owns every entity: users, one-time codes, sessions,
/// submissions and the activity log. Nothing is cached in process; each call
/// re-reads the backing store, so several server processes can share one
/// database file.
///
/// ## Atomicity
///
/// Every method is its own unit of work. Methods that touch more than one
/// row or table (`apply_decision`, `promote_overdue`) MUST commit all of
/// their writes in one transaction or none of them.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` to be shared through
/// axum application state and across async task boundaries.
#[async_trait]
pub trait WorkflowStore: Send + Sync + 'static {
    // ── Users ────────────────────────────────────────────────────────────────

    /// Insert a user unless one with the same username exists.
    ///
    /// Returns `true` if the row was inserted. Existing users are left
    /// untouched (users are immutable once seeded).
    async fn seed_user(&self, user: UserRecord) -> Result<bool, StorageError>;

    /// Look up a user by username.
    async fn get_user(&self, username: &str) -> Result<Option<UserRecord>, StorageError>;

    /// List all users ordered by role then username.
    async fn list_users(&self) -> Result<Vec<UserRecord>, StorageError>;

    // ── One-time codes ───────────────────────────────────────────────────────

    /// Store a code, replacing any previous code for the same identity.
    async fn put_code(&self, record: CodeRecord) -> Result<(), StorageError>;

    /// Read the live code for an identity. Expiry is the caller's concern.
    async fn get_code(&self, identity: &str) -> Result<Option<CodeRecord>, StorageError>;

    /// Delete the code for an identity. Returns `true` if a row was removed.
    async fn delete_code(&self, identity: &str) -> Result<bool, StorageError>;

    // ── Sessions ─────────────────────────────────────────────────────────────

    async fn insert_session(&self, record: SessionRecord) -> Result<(), StorageError>;

    /// Read a session by token hash. Expiry is the caller's concern.
    async fn get_session(&self, token_hash: &str) -> Result<Option<SessionRecord>, StorageError>;

    /// Returns `true` if a row was removed.
    async fn delete_session(&self, token_hash: &str) -> Result<bool, StorageError>;

    /// Remove every session that expired at or before `now`. Returns the count.
    async fn purge_sessions(&self, now: OffsetDateTime) -> Result<usize, StorageError>;

    // ── Submissions ──────────────────────────────────────────────────────────

    /// Insert a new submission.
    ///
    /// Returns `Err(StorageError::DuplicateSubmission)` if the id is taken.
    async fn insert_submission(&self, record: SubmissionRecord) -> Result<(), StorageError>;

    /// Returns `Err(StorageError::SubmissionNotFound)` if the id is unknown.
    async fn get_submission(&self, id: &str) -> Result<SubmissionRecord, StorageError>;

    /// List submissions matching `filter`, newest first.
    ///
    /// `limit` of 0 means no limit.
    async fn list_submissions(
        &self,
        filter: SubmissionFilter,
        limit: usize,
    ) -> Result<Vec<SubmissionRecord>, StorageError>;

    /// Move every `activity` submission submitted strictly before `cutoff`
    /// to `pending`. Returns the number of rows changed.
    async fn promote_overdue(&self, cutoff: OffsetDateTime) -> Result<usize, StorageError>;

    /// Apply a reviewer decision and append its audit entry atomically.
    ///
    /// If the submission does not exist, returns
    /// `Err(StorageError::SubmissionNotFound)` and appends nothing.
    /// Returns the updated record.
    async fn apply_decision(
        &self,
        update: DecisionUpdate,
        entry: NewActivity,
    ) -> Result<SubmissionRecord, StorageError>;

    /// Aggregate counts. `approved_today` counts approvals decided after
    /// `approved_since`.
    async fn count_submissions(
        &self,
        approved_since: OffsetDateTime,
    ) -> Result<SubmissionCounts, StorageError>;

    // ── Activity log ─────────────────────────────────────────────────────────

    /// Append an entry. Returns its row id.
    async fn append_activity(&self, entry: NewActivity) -> Result<i64, StorageError>;

    /// The most recent `limit` entries, newest first.
    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, StorageError>;
}
