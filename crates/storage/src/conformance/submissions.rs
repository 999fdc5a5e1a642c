use std::future::Future;

use time::Duration;

use super::{err, make_submission, TestResult, T0};
use crate::{StorageError, SubmissionFilter, SubmissionStatus, WorkflowStore};

pub(super) async fn run_submission_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "submissions",
            "insert_then_get_preserves_fields",
            insert_then_get_preserves_fields(factory).await,
        ),
        TestResult::from_result(
            "submissions",
            "duplicate_id_rejected",
            duplicate_id_rejected(factory).await,
        ),
        TestResult::from_result(
            "submissions",
            "get_unknown_returns_not_found",
            get_unknown_returns_not_found(factory).await,
        ),
        TestResult::from_result(
            "submissions",
            "list_filters_and_orders_newest_first",
            list_filters_and_orders_newest_first(factory).await,
        ),
        TestResult::from_result(
            "submissions",
            "promote_moves_only_overdue_activity",
            promote_moves_only_overdue_activity(factory).await,
        ),
        TestResult::from_result(
            "submissions",
            "promote_twice_is_noop",
            promote_twice_is_noop(factory).await,
        ),
    ]
}

async fn insert_then_get_preserves_fields<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let record = make_submission("S00000001", "staff@test", T0);
    s.insert_submission(record.clone()).await.map_err(err)?;
    let got = s.get_submission("S00000001").await.map_err(err)?;
    if got != record {
        return Err(format!("round trip mismatch: {:?} != {:?}", got, record));
    }
    Ok(())
}

async fn duplicate_id_rejected<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_submission(make_submission("S1", "a@test", T0))
        .await
        .map_err(err)?;
    match s
        .insert_submission(make_submission("S1", "b@test", T0))
        .await
    {
        Err(StorageError::DuplicateSubmission { id }) if id == "S1" => {}
        other => return Err(format!("expected DuplicateSubmission, got {:?}", other)),
    }
    let kept = s.get_submission("S1").await.map_err(err)?;
    if kept.user != "a@test" {
        return Err("duplicate insert overwrote the original".to_string());
    }
    Ok(())
}

async fn get_unknown_returns_not_found<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_submission("S404").await {
        Err(StorageError::SubmissionNotFound { id }) if id == "S404" => Ok(()),
        other => Err(format!("expected SubmissionNotFound, got {:?}", other)),
    }
}

async fn list_filters_and_orders_newest_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_submission(make_submission("S1", "a@test", T0))
        .await
        .map_err(err)?;
    s.insert_submission(make_submission("S2", "b@test", T0 + Duration::minutes(1)))
        .await
        .map_err(err)?;
    let mut pending = make_submission("S3", "a@test", T0 + Duration::minutes(2));
    pending.status = SubmissionStatus::Pending;
    s.insert_submission(pending).await.map_err(err)?;

    let ids = |v: Vec<crate::SubmissionRecord>| v.into_iter().map(|r| r.id).collect::<Vec<_>>();

    let all = ids(s
        .list_submissions(SubmissionFilter::default(), 0)
        .await
        .map_err(err)?);
    if all != ["S3", "S2", "S1"] {
        return Err(format!("unfiltered order wrong: {:?}", all));
    }

    let mine = ids(s
        .list_submissions(
            SubmissionFilter {
                user: Some("a@test".to_string()),
                ..SubmissionFilter::default()
            },
            0,
        )
        .await
        .map_err(err)?);
    if mine != ["S3", "S1"] {
        return Err(format!("user filter wrong: {:?}", mine));
    }

    let pending = ids(s
        .list_submissions(
            SubmissionFilter {
                status: Some(SubmissionStatus::Pending),
                ..SubmissionFilter::default()
            },
            0,
        )
        .await
        .map_err(err)?);
    if pending != ["S3"] {
        return Err(format!("status filter wrong: {:?}", pending));
    }

    let limited = ids(s
        .list_submissions(SubmissionFilter::default(), 2)
        .await
        .map_err(err)?);
    if limited != ["S3", "S2"] {
        return Err(format!("limit wrong: {:?}", limited));
    }
    Ok(())
}

async fn promote_moves_only_overdue_activity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let cutoff = T0;
    s.insert_submission(make_submission("OLD", "a@test", cutoff - Duration::hours(1)))
        .await
        .map_err(err)?;
    s.insert_submission(make_submission("NEW", "a@test", cutoff + Duration::hours(1)))
        .await
        .map_err(err)?;
    let mut decided = make_submission("DONE", "a@test", cutoff - Duration::hours(5));
    decided.status = SubmissionStatus::Approved;
    s.insert_submission(decided).await.map_err(err)?;

    let moved = s.promote_overdue(cutoff).await.map_err(err)?;
    if moved != 1 {
        return Err(format!("expected 1 promoted, got {}", moved));
    }
    for (id, expected) in [
        ("OLD", SubmissionStatus::Pending),
        ("NEW", SubmissionStatus::Activity),
        ("DONE", SubmissionStatus::Approved),
    ] {
        let status = s.get_submission(id).await.map_err(err)?.status;
        if status != expected {
            return Err(format!("{}: expected {}, got {}", id, expected, status));
        }
    }
    Ok(())
}

async fn promote_twice_is_noop<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_submission(make_submission("OLD", "a@test", T0 - Duration::hours(30)))
        .await
        .map_err(err)?;
    let first = s.promote_overdue(T0).await.map_err(err)?;
    let second = s.promote_overdue(T0).await.map_err(err)?;
    if first != 1 || second != 0 {
        return Err(format!("expected (1, 0), got ({}, {})", first, second));
    }
    Ok(())
}
