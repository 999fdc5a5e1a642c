use std::future::Future;

use time::Duration;

use super::{err, make_activity, make_submission, TestResult, T0};
use crate::{DecisionUpdate, StorageError, SubmissionStatus, WorkflowStore};

pub(super) async fn run_decision_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "decisions",
            "decision_updates_fields_and_logs",
            decision_updates_fields_and_logs(factory).await,
        ),
        TestResult::from_result(
            "decisions",
            "unknown_submission_writes_nothing",
            unknown_submission_writes_nothing(factory).await,
        ),
        TestResult::from_result(
            "decisions",
            "later_decision_wins",
            later_decision_wins(factory).await,
        ),
    ]
}

fn decision(id: &str, status: SubmissionStatus, remarks: &str) -> DecisionUpdate {
    DecisionUpdate {
        submission_id: id.to_string(),
        status,
        decided_at: T0 + Duration::hours(2),
        reviewed_by: "hoi@test".to_string(),
        remarks: remarks.to_string(),
    }
}

/// Status, decided-at, reviewer, remarks and the audit entry land together.
async fn decision_updates_fields_and_logs<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_submission(make_submission("S1", "staff@test", T0))
        .await
        .map_err(err)?;
    let updated = s
        .apply_decision(
            decision("S1", SubmissionStatus::Approved, "looks good"),
            make_activity("Approval Process: APPROVED", "REVIEW", T0 + Duration::hours(2)),
        )
        .await
        .map_err(err)?;
    if updated.status != SubmissionStatus::Approved
        || updated.decided_at != Some(T0 + Duration::hours(2))
        || updated.reviewed_by.as_deref() != Some("hoi@test")
        || updated.remarks.as_deref() != Some("looks good")
    {
        return Err(format!("decision not applied: {:?}", updated));
    }
    let stored = s.get_submission("S1").await.map_err(err)?;
    if stored != updated {
        return Err("returned record differs from stored record".to_string());
    }
    let log = s.recent_activity(10).await.map_err(err)?;
    if log.len() != 1 || log[0].category != "REVIEW" {
        return Err(format!("expected one REVIEW entry, got {:?}", log));
    }
    Ok(())
}

/// An unknown id fails with SubmissionNotFound and the audit entry is rolled back.
async fn unknown_submission_writes_nothing<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let result = s
        .apply_decision(
            decision("S404", SubmissionStatus::Approved, "n/a"),
            make_activity("Approval Process: APPROVED", "REVIEW", T0),
        )
        .await;
    match result {
        Err(StorageError::SubmissionNotFound { id }) if id == "S404" => {}
        other => return Err(format!("expected SubmissionNotFound, got {:?}", other)),
    }
    let log = s.recent_activity(10).await.map_err(err)?;
    if !log.is_empty() {
        return Err(format!("audit entry leaked: {:?}", log));
    }
    Ok(())
}

async fn later_decision_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_submission(make_submission("S1", "staff@test", T0))
        .await
        .map_err(err)?;
    s.apply_decision(
        decision("S1", SubmissionStatus::Alert, "check budget"),
        make_activity("Approval Process: ALERT", "REVIEW", T0),
    )
    .await
    .map_err(err)?;
    let second = s
        .apply_decision(
            decision("S1", SubmissionStatus::Disapproved, "resubmit"),
            make_activity("Approval Process: DISAPPROVED", "REVIEW", T0),
        )
        .await
        .map_err(err)?;
    if second.status != SubmissionStatus::Disapproved || second.remarks.as_deref() != Some("resubmit") {
        return Err(format!("second decision not applied: {:?}", second));
    }
    Ok(())
}
