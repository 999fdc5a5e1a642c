//! Submission lifecycle integration tests.

mod common;

use common::*;
use hoi_storage::{Role, SubmissionStatus, WorkflowStore};
use hoi_workflow::{Identity, NewSubmission, WorkflowError};
use time::Duration;

fn reviewer() -> Identity {
    Identity {
        user: REVIEWER.to_string(),
        role: Role::Reviewer,
        form_access: None,
    }
}

fn submitter(user: &str) -> Identity {
    Identity {
        user: user.to_string(),
        role: Role::Submitter,
        form_access: Some("Academics.html".to_string()),
    }
}

async fn submit(desk: &Desk, user: &str) -> String {
    let body = serde_json::json!({
        "form_type": "Academics",
        "subject": "Semester results",
        "rows": [{"course": "CS101", "pass": 41}],
    });
    desk.lifecycle
        .submit(NewSubmission::from_form_body(user, body), T0)
        .await
        .unwrap()
        .id
}

// ──────────────────────────────────────────────
// Submit and promotion
// ──────────────────────────────────────────────

#[tokio::test]
async fn submit_stores_activity_without_mail() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let stored = desk.store.get_submission(&id).await.unwrap();
    assert_eq!(stored.status, SubmissionStatus::Activity);
    assert_eq!(stored.submitted_at, T0);
    assert_eq!(stored.payload["rows"][0]["course"], "CS101");
    assert!(desk.mailer.sent().is_empty());
    assert_eq!(desk.activity_in("FORM_SUBMIT").await.len(), 1);
}

#[tokio::test]
async fn submissions_get_distinct_ids() {
    let desk = Desk::new().await;
    let a = submit(&desk, SUBMITTER).await;
    let b = submit(&desk, SUBMITTER).await;
    assert_ne!(a, b);
}

#[tokio::test]
async fn overdue_submission_becomes_pending_once() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let inside = desk.lifecycle.promote_overdue(T0 + Duration::hours(23)).await.unwrap();
    assert_eq!(inside, 0);
    assert!(desk.activity_in("AUTOMATION").await.is_empty());

    let later = T0 + Duration::hours(25);
    assert_eq!(desk.lifecycle.promote_overdue(later).await.unwrap(), 1);
    assert_eq!(desk.lifecycle.promote_overdue(later).await.unwrap(), 0);

    let stored = desk.store.get_submission(&id).await.unwrap();
    assert_eq!(stored.status, SubmissionStatus::Pending);

    let automation = desk.activity_in("AUTOMATION").await;
    assert_eq!(automation.len(), 1);
    assert_eq!(automation[0].user, "SYSTEM");
}

#[tokio::test]
async fn promotion_cutoff_is_exact_for_sub_second_submissions() {
    let desk = Desk::new().await;
    let submitted = T0 + Duration::nanoseconds(123_456_789);
    let body = serde_json::json!({ "form_type": "Academics" });
    let id = desk
        .lifecycle
        .submit(NewSubmission::from_form_body(SUBMITTER, body), submitted)
        .await
        .unwrap()
        .id;
    assert_eq!(desk.store.get_submission(&id).await.unwrap().submitted_at, submitted);

    let at_cutoff = submitted + Duration::hours(24);
    assert_eq!(desk.lifecycle.promote_overdue(at_cutoff).await.unwrap(), 0);
    let past_cutoff = at_cutoff + Duration::nanoseconds(1);
    assert_eq!(desk.lifecycle.promote_overdue(past_cutoff).await.unwrap(), 1);
}

// ──────────────────────────────────────────────
// Decisions
// ──────────────────────────────────────────────

#[tokio::test]
async fn approval_updates_notifies_and_logs() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;
    let decided_at = T0 + Duration::hours(2);

    let outcome = desk
        .lifecycle
        .decide(&reviewer(), &id, "approved", Some("Looks good"), decided_at)
        .await
        .unwrap();

    assert_eq!(outcome.submission.status, SubmissionStatus::Approved);
    assert_eq!(outcome.submission.decided_at, Some(decided_at));
    assert_eq!(outcome.submission.reviewed_by.as_deref(), Some(REVIEWER));
    assert_eq!(outcome.submission.remarks.as_deref(), Some("Looks good"));
    assert!(outcome.fully_notified());

    assert_eq!(desk.mailer.sent_to(SUBMITTER).len(), 1);
    for address in MANAGEMENT {
        assert_eq!(desk.mailer.sent_to(address).len(), 1);
    }
    assert_eq!(desk.mailer.sent().len(), 1 + MANAGEMENT.len());
    assert_eq!(desk.activity_in("REVIEW").await.len(), 1);
}

#[tokio::test]
async fn disapproval_skips_management() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let outcome = desk
        .lifecycle
        .decide(&reviewer(), &id, "disapproved", None, T0)
        .await
        .unwrap();
    assert_eq!(outcome.management_attempted, 0);
    assert_eq!(outcome.submission.remarks.as_deref(), Some("No remarks provided."));

    let mail = desk.mailer.sent_to(SUBMITTER);
    assert_eq!(mail.len(), 1);
    assert!(mail[0].body.contains("No remarks provided."));
    assert_eq!(desk.mailer.sent().len(), 1);
}

#[tokio::test]
async fn unknown_action_returns_to_pending() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let outcome = desk
        .lifecycle
        .decide(&reviewer(), &id, "escalate", Some("later"), T0)
        .await
        .unwrap();
    assert_eq!(outcome.submission.status, SubmissionStatus::Pending);
    assert!(desk.mailer.sent_to(SUBMITTER)[0].subject.contains("Pending"));
}

#[tokio::test]
async fn decide_on_unknown_id_changes_nothing() {
    let desk = Desk::new().await;
    let before = desk.activity().await.len();

    let err = desk
        .lifecycle
        .decide(&reviewer(), "S00000000", "approved", None, T0)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::SubmissionNotFound { .. }));
    assert_eq!(desk.activity().await.len(), before);
    assert!(desk.mailer.sent().is_empty());
}

#[tokio::test]
async fn submitter_cannot_decide() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let err = desk
        .lifecycle
        .decide(&submitter(SUBMITTER), &id, "approved", None, T0)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));

    let stored = desk.store.get_submission(&id).await.unwrap();
    assert_eq!(stored.status, SubmissionStatus::Activity);
    assert_eq!(desk.activity_in("SECURITY_BREACH").await.len(), 1);
}

#[tokio::test]
async fn failed_mail_does_not_roll_back() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;
    desk.mailer.fail_for(SUBMITTER);
    desk.mailer.fail_for(MANAGEMENT[0]);

    let outcome = desk
        .lifecycle
        .decide(&reviewer(), &id, "alert", Some("check totals"), T0)
        .await
        .unwrap();
    assert!(!outcome.submitter_notified);
    assert_eq!(outcome.management_notified, 1);
    assert_eq!(outcome.management_attempted, 2);
    assert!(!outcome.fully_notified());

    let stored = desk.store.get_submission(&id).await.unwrap();
    assert_eq!(stored.status, SubmissionStatus::Alert);
    assert_eq!(desk.activity_in("EMAIL_ERROR").await.len(), 2);
    assert_eq!(desk.activity_in("REVIEW").await.len(), 1);
}

// ──────────────────────────────────────────────
// Reads
// ──────────────────────────────────────────────

#[tokio::test]
async fn submitter_cannot_read_others_submission() {
    let desk = Desk::new().await;
    let id = submit(&desk, SUBMITTER).await;

    let own = desk.lifecycle.submission(&submitter(SUBMITTER), &id, T0).await;
    assert!(own.is_ok());

    let err = desk
        .lifecycle
        .submission(&submitter(OTHER_SUBMITTER), &id, T0)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
    assert!(!err.to_string().contains("Semester results"));

    let breaches = desk.activity_in("SECURITY_BREACH").await;
    assert_eq!(breaches.len(), 1);
    assert_eq!(breaches[0].user, OTHER_SUBMITTER);
}

#[tokio::test]
async fn listing_is_reviewer_only_and_filters() {
    let desk = Desk::new().await;
    let first = submit(&desk, SUBMITTER).await;
    submit(&desk, OTHER_SUBMITTER).await;
    desk.lifecycle
        .decide(&reviewer(), &first, "approved", None, T0)
        .await
        .unwrap();

    let all = desk.lifecycle.list_submissions(&reviewer(), None, T0).await.unwrap();
    assert_eq!(all.len(), 2);
    let approved = desk
        .lifecycle
        .list_submissions(&reviewer(), Some(SubmissionStatus::Approved), T0)
        .await
        .unwrap();
    assert_eq!(approved.len(), 1);
    assert_eq!(approved[0].id, first);

    let err = desk
        .lifecycle
        .list_submissions(&submitter(SUBMITTER), None, T0)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkflowError::Forbidden(_)));
}

#[tokio::test]
async fn my_submissions_only_lists_own() {
    let desk = Desk::new().await;
    submit(&desk, SUBMITTER).await;
    submit(&desk, OTHER_SUBMITTER).await;

    let mine = desk.lifecycle.my_submissions(&submitter(SUBMITTER)).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].user, SUBMITTER);
}

#[tokio::test]
async fn summary_counts_recent_approvals() {
    let desk = Desk::new().await;
    let a = submit(&desk, SUBMITTER).await;
    let b = submit(&desk, SUBMITTER).await;
    submit(&desk, SUBMITTER).await;
    desk.lifecycle.decide(&reviewer(), &a, "approved", None, T0).await.unwrap();
    desk.lifecycle.decide(&reviewer(), &b, "alert", None, T0).await.unwrap();

    let today = desk.lifecycle.summary(T0 + Duration::hours(1)).await.unwrap();
    assert_eq!(today.total_submissions, 3);
    assert_eq!(today.active_alerts, 1);
    assert_eq!(today.approved_today, 1);

    let next_week = desk.lifecycle.summary(T0 + Duration::days(7)).await.unwrap();
    assert_eq!(next_week.approved_today, 0);
}
