use std::future::Future;

use time::Duration;

use super::{err, make_activity, make_submission, TestResult, T0};
use crate::{DecisionUpdate, SubmissionCounts, SubmissionStatus, WorkflowStore};

pub(super) async fn run_activity_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "activity",
            "recent_is_newest_first_and_limited",
            recent_is_newest_first_and_limited(factory).await,
        ),
        TestResult::from_result(
            "activity",
            "append_returns_increasing_ids",
            append_returns_increasing_ids(factory).await,
        ),
        TestResult::from_result(
            "activity",
            "counts_reflect_statuses",
            counts_reflect_statuses(factory).await,
        ),
    ]
}

async fn recent_is_newest_first_and_limited<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    for (i, event) in ["first", "second", "third"].iter().enumerate() {
        s.append_activity(make_activity(event, "AUTH", T0 + Duration::minutes(i as i64)))
            .await
            .map_err(err)?;
    }
    let events: Vec<String> = s
        .recent_activity(2)
        .await
        .map_err(err)?
        .into_iter()
        .map(|a| a.event)
        .collect();
    if events != ["third", "second"] {
        return Err(format!("unexpected order: {:?}", events));
    }
    Ok(())
}

async fn append_returns_increasing_ids<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let a = s
        .append_activity(make_activity("a", "AUTH", T0))
        .await
        .map_err(err)?;
    let b = s
        .append_activity(make_activity("b", "AUTH", T0))
        .await
        .map_err(err)?;
    if b <= a {
        return Err(format!("ids not increasing: {} then {}", a, b));
    }
    Ok(())
}

/// Totals, pending, alerts, and approvals decided after the cutoff.
async fn counts_reflect_statuses<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut pending = make_submission("P1", "a@test", T0);
    pending.status = SubmissionStatus::Pending;
    s.insert_submission(pending).await.map_err(err)?;
    s.insert_submission(make_submission("A1", "a@test", T0))
        .await
        .map_err(err)?;
    for (id, status, hours) in [
        ("OLDAPP", SubmissionStatus::Approved, 1),
        ("NEWAPP", SubmissionStatus::Approved, 30),
        ("ALERT", SubmissionStatus::Alert, 30),
    ] {
        s.insert_submission(make_submission(id, "b@test", T0))
            .await
            .map_err(err)?;
        s.apply_decision(
            DecisionUpdate {
                submission_id: id.to_string(),
                status,
                decided_at: T0 + Duration::hours(hours),
                reviewed_by: "hoi@test".to_string(),
                remarks: String::new(),
            },
            make_activity("decide", "REVIEW", T0 + Duration::hours(hours)),
        )
        .await
        .map_err(err)?;
    }

    let counts = s
        .count_submissions(T0 + Duration::hours(24))
        .await
        .map_err(err)?;
    let expected = SubmissionCounts {
        total_submissions: 5,
        pending_approvals: 1,
        active_alerts: 1,
        approved_today: 1,
    };
    if counts != expected {
        return Err(format!("expected {:?}, got {:?}", expected, counts));
    }
    Ok(())
}
