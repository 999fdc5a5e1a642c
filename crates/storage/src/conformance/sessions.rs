use std::future::Future;

use time::Duration;

use super::{err, TestResult, T0};
use crate::{Role, SessionRecord, WorkflowStore};

pub(super) async fn run_session_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "sessions",
            "insert_then_get",
            insert_then_get(factory).await,
        ),
        TestResult::from_result(
            "sessions",
            "delete_session_removes_row",
            delete_session_removes_row(factory).await,
        ),
        TestResult::from_result(
            "sessions",
            "purge_removes_only_expired",
            purge_removes_only_expired(factory).await,
        ),
    ]
}

fn session(hash: &str, ttl_hours: i64) -> SessionRecord {
    SessionRecord {
        token_hash: hash.to_string(),
        identity: "staff@test".to_string(),
        role: Role::Submitter,
        form_access: Some("academics.html".to_string()),
        created_at: T0,
        expires_at: T0 + Duration::hours(ttl_hours),
    }
}

async fn insert_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_session(session("h1", 8)).await.map_err(err)?;
    let got = s
        .get_session("h1")
        .await
        .map_err(err)?
        .ok_or("session not stored")?;
    if got != session("h1", 8) {
        return Err(format!("unexpected session: {:?}", got));
    }
    if s.get_session("h2").await.map_err(err)?.is_some() {
        return Err("unknown hash resolved".to_string());
    }
    Ok(())
}

async fn delete_session_removes_row<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_session(session("h1", 8)).await.map_err(err)?;
    if !s.delete_session("h1").await.map_err(err)? {
        return Err("delete reported nothing removed".to_string());
    }
    if s.get_session("h1").await.map_err(err)?.is_some() {
        return Err("session still present".to_string());
    }
    Ok(())
}

async fn purge_removes_only_expired<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.insert_session(session("short", 1)).await.map_err(err)?;
    s.insert_session(session("long", 8)).await.map_err(err)?;
    let purged = s
        .purge_sessions(T0 + Duration::hours(2))
        .await
        .map_err(err)?;
    if purged != 1 {
        return Err(format!("expected 1 purged, got {}", purged));
    }
    if s.get_session("short").await.map_err(err)?.is_some() {
        return Err("expired session survived purge".to_string());
    }
    if s.get_session("long").await.map_err(err)?.is_none() {
        return Err("live session was purged".to_string());
    }
    Ok(())
}
