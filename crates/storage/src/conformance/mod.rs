//! Conformance test suite for `WorkflowStore` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `WorkflowStore` implementation can run to verify correctness. The suite
//! covers:
//!
//! - **Users**: seeding is insert-or-ignore, lookups, listing order
//! - **Codes**: one live code per identity, overwrite, deletion
//! - **Sessions**: insert, lookup, deletion, expiry purge
//! - **Submissions**: insert, duplicate detection, filters, overdue promotion
//! - **Decisions**: atomic update + audit entry, nothing written on unknown id
//! - **Activity**: append order, limits, aggregate counts
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use hoi_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test]
//! async fn my_backend_conformance() {
//!     let report = run_conformance_suite(|| async { create_test_store().await }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod activity;
mod codes;
mod decisions;
mod sessions;
mod submissions;
mod users;

use std::fmt;
use std::future::Future;

use time::macros::datetime;
use time::OffsetDateTime;

use crate::record::{NewActivity, Role, SubmissionRecord, SubmissionStatus, UserRecord};
use crate::WorkflowStore;

/// Fixed reference instant for every conformance test.
const T0: OffsetDateTime = datetime!(2025-01-01 09:00 UTC);

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "users", "decisions").
    pub category: String,
    /// Test name (e.g. "seed_user_ignores_duplicate").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        let (passed, message) = match result {
            Ok(()) => (true, None),
            Err(msg) => (false, Some(msg)),
        };
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed,
            message,
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(users::run_user_tests(&factory).await);
    results.extend(codes::run_code_tests(&factory).await);
    results.extend(sessions::run_session_tests(&factory).await);
    results.extend(submissions::run_submission_tests(&factory).await);
    results.extend(decisions::run_decision_tests(&factory).await);
    results.extend(activity::run_activity_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers: record constructors with sensible defaults ──────────────────────

fn make_user(username: &str, role: Role, form: Option<&str>) -> UserRecord {
    UserRecord {
        username: username.to_string(),
        role,
        form_access: form.map(str::to_string),
        password_hash: None,
    }
}

fn make_submission(id: &str, user: &str, submitted_at: OffsetDateTime) -> SubmissionRecord {
    SubmissionRecord {
        id: id.to_string(),
        form: "Academics".to_string(),
        user: user.to_string(),
        subject: format!("Subject of {}", id),
        payload: serde_json::json!({"form_type": "Academics", "rows": [1, 2, 3]}),
        status: SubmissionStatus::Activity,
        submitted_at,
        decided_at: None,
        reviewed_by: None,
        remarks: None,
    }
}

fn make_activity(event: &str, category: &str, timestamp: OffsetDateTime) -> NewActivity {
    NewActivity {
        timestamp,
        user: "conformance@test".to_string(),
        event: event.to_string(),
        description: format!("{} happened", event),
        category: category.to_string(),
    }
}

/// Shorthand for turning any displayable error into the suite's `String` error.
fn err<E: fmt::Display>(e: E) -> String {
    e.to_string()
}
