//! Persistent store for the HOI approval desk.
//!
//! [`WorkflowStore`] is the seam between the workflow engine and the
//! database; [`SqliteStore`] is the file-backed implementation. Backends can
//! verify themselves with [`conformance::run_conformance_suite`].

pub mod conformance;
mod error;
mod record;
mod sqlite;
mod traits;

pub use error::StorageError;
pub use record::{
    ActivityRecord, CodeRecord, DecisionUpdate, NewActivity, Role, SessionRecord,
    SubmissionCounts, SubmissionFilter, SubmissionRecord, SubmissionStatus, UserRecord,
};
pub use sqlite::SqliteStore;
pub use traits::WorkflowStore;
