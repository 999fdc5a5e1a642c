use std::future::Future;

use time::Duration;

use super::{err, TestResult, T0};
use crate::{CodeRecord, WorkflowStore};

pub(super) async fn run_code_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result("codes", "put_then_get", put_then_get(factory).await),
        TestResult::from_result(
            "codes",
            "put_overwrites_previous_code",
            put_overwrites_previous_code(factory).await,
        ),
        TestResult::from_result(
            "codes",
            "delete_removes_code",
            delete_removes_code(factory).await,
        ),
    ]
}

fn code(identity: &str, value: &str, offset_secs: i64) -> CodeRecord {
    CodeRecord {
        identity: identity.to_string(),
        code: value.to_string(),
        issued_at: T0 + Duration::seconds(offset_secs),
    }
}

async fn put_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put_code(code("a@test", "123456", 0)).await.map_err(err)?;
    let got = s
        .get_code("a@test")
        .await
        .map_err(err)?
        .ok_or("code not stored")?;
    if got != code("a@test", "123456", 0) {
        return Err(format!("unexpected code record: {:?}", got));
    }
    Ok(())
}

/// At most one live code per identity: the second put replaces the first.
async fn put_overwrites_previous_code<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put_code(code("a@test", "111111", 0)).await.map_err(err)?;
    s.put_code(code("a@test", "222222", 30)).await.map_err(err)?;
    let got = s
        .get_code("a@test")
        .await
        .map_err(err)?
        .ok_or("code missing after overwrite")?;
    if got.code != "222222" || got.issued_at != T0 + Duration::seconds(30) {
        return Err(format!("overwrite not applied: {:?}", got));
    }
    Ok(())
}

async fn delete_removes_code<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.put_code(code("a@test", "123456", 0)).await.map_err(err)?;
    if !s.delete_code("a@test").await.map_err(err)? {
        return Err("delete reported nothing removed".to_string());
    }
    if s.get_code("a@test").await.map_err(err)?.is_some() {
        return Err("code still present after delete".to_string());
    }
    if s.delete_code("a@test").await.map_err(err)? {
        return Err("second delete reported a removal".to_string());
    }
    Ok(())
}
