//! Submission lifecycle: submit, overdue promotion, reviewer decisions
//! and the read side.

use std::sync::Arc;

use hoi_storage::{
    ActivityRecord, DecisionUpdate, StorageError, SubmissionCounts, SubmissionFilter,
    SubmissionRecord, SubmissionStatus, WorkflowStore,
};
use rand::Rng;
use serde::Serialize;
use time::{Duration, OffsetDateTime};

use crate::activity::{ActivityLogger, Category};
use crate::error::WorkflowError;
use crate::identity::{Actor, Identity};
use crate::notify::{templates, Notifier};
use crate::GRACE_WINDOW;

pub const DEFAULT_FORM_KIND: &str = "Unknown Form";
pub const DEFAULT_REMARKS: &str = "No remarks provided.";

const ID_ATTEMPTS: usize = 5;

/// A submission as received from a form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSubmission {
    pub form_kind: String,
    pub submitter: String,
    pub subject: String,
    pub payload: serde_json::Value,
}

impl NewSubmission {
    /// Read `form_type` and `subject` out of a form body, applying the
    /// defaults. The whole body is kept as the payload.
    pub fn from_form_body(submitter: impl Into<String>, body: serde_json::Value) -> Self {
        let form_kind = non_empty_str(&body, "form_type")
            .unwrap_or(DEFAULT_FORM_KIND)
            .to_string();
        let subject = non_empty_str(&body, "subject")
            .map(str::to_string)
            .unwrap_or_else(|| format!("Submission from {}", form_kind));
        Self {
            form_kind,
            submitter: submitter.into(),
            subject,
            payload: body,
        }
    }
}

fn non_empty_str<'a>(body: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Map a reviewer's action string to a status. Anything unrecognized
/// returns the submission to `pending`.
pub fn decision_status(action: &str) -> SubmissionStatus {
    match action {
        "approved" => SubmissionStatus::Approved,
        "disapproved" => SubmissionStatus::Disapproved,
        "alert" => SubmissionStatus::Alert,
        other => {
            tracing::warn!(action = %other, "unrecognized decision action, returning to pending");
            SubmissionStatus::Pending
        }
    }
}

/// What a committed decision did beyond the status change.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub submission: SubmissionRecord,
    pub submitter_notified: bool,
    /// Management addresses that accepted the digest.
    pub management_notified: usize,
    /// Management addresses the digest was sent to (0 unless approved or alert).
    pub management_attempted: usize,
}

impl DecisionOutcome {
    /// Whether every notification went out.
    pub fn fully_notified(&self) -> bool {
        self.submitter_notified && self.management_notified == self.management_attempted
    }
}

#[derive(Clone)]
pub struct Lifecycle {
    store: Arc<dyn WorkflowStore>,
    log: ActivityLogger,
    notifier: Notifier,
}

impl Lifecycle {
    pub fn new(store: Arc<dyn WorkflowStore>, log: ActivityLogger, notifier: Notifier) -> Self {
        Self {
            store,
            log,
            notifier,
        }
    }

    /// Store a new submission in `activity` status. Never notifies anyone.
    pub async fn submit(
        &self,
        submission: NewSubmission,
        now: OffsetDateTime,
    ) -> Result<SubmissionRecord, WorkflowError> {
        let actor = Actor::User(submission.submitter.clone());
        let form_kind = submission.form_kind.clone();

        match self.insert_with_fresh_id(submission, now).await {
            Ok(record) => {
                tracing::info!(id = %record.id, form = %record.form, user = %record.user, "submission stored");
                self.log
                    .record(
                        &actor,
                        format!("Form Submit: {}", record.form),
                        format!("New submission {} by {}.", record.id, record.user),
                        Category::FormSubmit,
                        now,
                    )
                    .await;
                Ok(record)
            }
            Err(e) => {
                tracing::error!(error = %e, form = %form_kind, "submission insert failed");
                self.log
                    .record(
                        &actor,
                        format!("Form Submit Failed: {}", form_kind),
                        e.to_string(),
                        Category::Error,
                        now,
                    )
                    .await;
                Err(e.into())
            }
        }
    }

    async fn insert_with_fresh_id(
        &self,
        submission: NewSubmission,
        now: OffsetDateTime,
    ) -> Result<SubmissionRecord, StorageError> {
        let mut record = SubmissionRecord {
            id: String::new(),
            form: submission.form_kind,
            user: submission.submitter,
            subject: submission.subject,
            payload: submission.payload,
            status: SubmissionStatus::Activity,
            submitted_at: now,
            decided_at: None,
            reviewed_by: None,
            remarks: None,
        };

        let mut last = None;
        for _ in 0..ID_ATTEMPTS {
            record.id = generate_id();
            match self.store.insert_submission(record.clone()).await {
                Ok(()) => return Ok(record),
                Err(e @ StorageError::DuplicateSubmission { .. }) => last = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last.unwrap_or_else(|| StorageError::Backend("no submission id attempted".into())))
    }

    /// Move every `activity` submission older than the grace window to
    /// `pending`. Returns the number moved. Idempotent.
    pub async fn promote_overdue(&self, now: OffsetDateTime) -> Result<usize, WorkflowError> {
        let moved = self.store.promote_overdue(now - GRACE_WINDOW).await?;
        if moved > 0 {
            tracing::info!(moved, "overdue submissions promoted to pending");
            self.log
                .record(
                    &Actor::System,
                    "System Check",
                    format!("Moved {} submissions to PENDING (Overdue).", moved),
                    Category::Automation,
                    now,
                )
                .await;
        }
        Ok(moved)
    }

    /// Apply a reviewer decision.
    ///
    /// The status change and its `REVIEW` entry commit together; mail goes
    /// out afterwards and a failed send does not undo the decision.
    pub async fn decide(
        &self,
        reviewer: &Identity,
        submission_id: &str,
        action: &str,
        remarks: Option<&str>,
        now: OffsetDateTime,
    ) -> Result<DecisionOutcome, WorkflowError> {
        if !reviewer.is_reviewer() {
            return Err(self
                .deny(reviewer, format!("Approval Denied: {}", submission_id), now)
                .await);
        }

        let status = decision_status(action);
        let remarks = remarks
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(DEFAULT_REMARKS)
            .to_string();
        let actor = reviewer.actor();

        let entry = ActivityLogger::entry(
            &actor,
            format!("Approval Process: {}", status.as_str().to_uppercase()),
            format!("Submission {} processed by {}.", submission_id, reviewer.user),
            Category::Review,
            now,
        );
        let update = DecisionUpdate {
            submission_id: submission_id.to_string(),
            status,
            decided_at: now,
            reviewed_by: reviewer.user.clone(),
            remarks: remarks.clone(),
        };

        let submission = match self.store.apply_decision(update, entry).await {
            Ok(record) => record,
            Err(e @ StorageError::SubmissionNotFound { .. }) => return Err(e.into()),
            Err(e) => {
                tracing::error!(error = %e, id = %submission_id, "decision not applied");
                self.log
                    .record(
                        &actor,
                        format!("Approval Failed: {}", submission_id),
                        e.to_string(),
                        Category::Error,
                        now,
                    )
                    .await;
                return Err(e.into());
            }
        };
        tracing::info!(id = %submission.id, status = %status, reviewer = %reviewer.user, "decision applied");

        let submitter_notified = if submission.user.trim().is_empty() {
            tracing::warn!(id = %submission.id, "submission has no submitter address");
            false
        } else {
            let mail = templates::decision_notice(&submission, &reviewer.user, &remarks);
            self.notifier.notify(&actor, mail, now).await
        };

        let (management_notified, management_attempted) = match status {
            SubmissionStatus::Approved | SubmissionStatus::Alert => {
                let (subject, body) = templates::management_digest(&submission, &reviewer.user, &remarks);
                let sent = self
                    .notifier
                    .notify_management(&actor, &subject, &body, now)
                    .await;
                (sent, self.notifier.management().len())
            }
            _ => (0, 0),
        };

        Ok(DecisionOutcome {
            submission,
            submitter_notified,
            management_notified,
            management_attempted,
        })
    }

    /// One submission, visible to reviewers and to its submitter.
    pub async fn submission(
        &self,
        viewer: &Identity,
        id: &str,
        now: OffsetDateTime,
    ) -> Result<SubmissionRecord, WorkflowError> {
        let record = self.store.get_submission(id).await?;
        if !viewer.is_reviewer() && record.user != viewer.user {
            return Err(self
                .deny(viewer, format!("Submission Access Denied: {}", id), now)
                .await);
        }
        Ok(record)
    }

    /// All submissions, optionally filtered by status. Reviewers only.
    pub async fn list_submissions(
        &self,
        viewer: &Identity,
        status: Option<SubmissionStatus>,
        now: OffsetDateTime,
    ) -> Result<Vec<SubmissionRecord>, WorkflowError> {
        if !viewer.is_reviewer() {
            return Err(self
                .deny(viewer, "Submission Listing Denied".to_string(), now)
                .await);
        }
        let filter = SubmissionFilter { status, user: None };
        Ok(self.store.list_submissions(filter, 0).await?)
    }

    /// The viewer's own submissions, newest first.
    pub async fn my_submissions(&self, viewer: &Identity) -> Result<Vec<SubmissionRecord>, WorkflowError> {
        let filter = SubmissionFilter {
            status: None,
            user: Some(viewer.user.clone()),
        };
        Ok(self.store.list_submissions(filter, 0).await?)
    }

    /// Dashboard counts; "approved today" means the last 24 hours.
    pub async fn summary(&self, now: OffsetDateTime) -> Result<SubmissionCounts, WorkflowError> {
        Ok(self.store.count_submissions(now - Duration::hours(24)).await?)
    }

    pub async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityRecord>, WorkflowError> {
        Ok(self.store.recent_activity(limit).await?)
    }

    /// Log a `SECURITY_BREACH` entry and build the matching error.
    pub async fn deny(&self, who: &Identity, event: String, now: OffsetDateTime) -> WorkflowError {
        tracing::warn!(user = %who.user, role = %who.role, %event, "forbidden access attempt");
        self.log
            .record(
                &who.actor(),
                event.clone(),
                format!("{} ({}) is not permitted to do this.", who.user, who.role),
                Category::SecurityBreach,
                now,
            )
            .await;
        WorkflowError::Forbidden(event)
    }
}

/// `S` followed by eight uppercase hex digits.
fn generate_id() -> String {
    format!("S{:08X}", rand::thread_rng().gen::<u32>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_actions_map_to_statuses() {
        assert_eq!(decision_status("approved"), SubmissionStatus::Approved);
        assert_eq!(decision_status("disapproved"), SubmissionStatus::Disapproved);
        assert_eq!(decision_status("alert"), SubmissionStatus::Alert);
    }

    #[test]
    fn unknown_actions_return_to_pending() {
        assert_eq!(decision_status("APPROVED"), SubmissionStatus::Pending);
        assert_eq!(decision_status(""), SubmissionStatus::Pending);
        assert_eq!(decision_status("activity"), SubmissionStatus::Pending);
    }

    #[test]
    fn form_body_defaults() {
        let sub = NewSubmission::from_form_body("staff@x", serde_json::json!({"rows": []}));
        assert_eq!(sub.form_kind, "Unknown Form");
        assert_eq!(sub.subject, "Submission from Unknown Form");

        let sub = NewSubmission::from_form_body(
            "staff@x",
            serde_json::json!({"form_type": "Academics", "subject": "  "}),
        );
        assert_eq!(sub.form_kind, "Academics");
        assert_eq!(sub.subject, "Submission from Academics");
        assert_eq!(sub.payload["form_type"], "Academics");
    }

    #[test]
    fn ids_have_fixed_shape() {
        let id = generate_id();
        assert_eq!(id.len(), 9);
        assert!(id.starts_with('S'));
        assert!(id[1..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_lowercase()));
    }
}
