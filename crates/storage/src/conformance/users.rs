use std::future::Future;

use super::{err, make_user, TestResult};
use crate::{Role, WorkflowStore};

pub(super) async fn run_user_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "users",
            "seed_user_then_get",
            seed_user_then_get(factory).await,
        ),
        TestResult::from_result(
            "users",
            "seed_user_ignores_duplicate",
            seed_user_ignores_duplicate(factory).await,
        ),
        TestResult::from_result(
            "users",
            "get_unknown_user_is_none",
            get_unknown_user_is_none(factory).await,
        ),
        TestResult::from_result(
            "users",
            "list_users_orders_reviewers_first",
            list_users_orders_reviewers_first(factory).await,
        ),
    ]
}

/// A seeded submitter comes back with role and form intact.
async fn seed_user_then_get<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let inserted = s
        .seed_user(make_user("staff@test", Role::Submitter, Some("academics.html")))
        .await
        .map_err(err)?;
    if !inserted {
        return Err("first seed should insert".to_string());
    }
    let user = s
        .get_user("staff@test")
        .await
        .map_err(err)?
        .ok_or("seeded user not found")?;
    if user.role != Role::Submitter || user.form_access.as_deref() != Some("academics.html") {
        return Err(format!("unexpected user: {:?}", user));
    }
    Ok(())
}

/// Seeding an existing username leaves the original row untouched.
async fn seed_user_ignores_duplicate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.seed_user(make_user("hoi@test", Role::Reviewer, None))
        .await
        .map_err(err)?;
    let inserted = s
        .seed_user(make_user("hoi@test", Role::Submitter, Some("budget.html")))
        .await
        .map_err(err)?;
    if inserted {
        return Err("duplicate seed reported as inserted".to_string());
    }
    let user = s
        .get_user("hoi@test")
        .await
        .map_err(err)?
        .ok_or("user vanished")?;
    if user.role != Role::Reviewer {
        return Err(format!("role overwritten: {}", user.role));
    }
    Ok(())
}

async fn get_unknown_user_is_none<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_user("nobody@test").await.map_err(err)? {
        None => Ok(()),
        Some(u) => Err(format!("expected None, got {:?}", u)),
    }
}

async fn list_users_orders_reviewers_first<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStore,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    s.seed_user(make_user("b-staff@test", Role::Submitter, Some("b.html")))
        .await
        .map_err(err)?;
    s.seed_user(make_user("z-hoi@test", Role::Reviewer, None))
        .await
        .map_err(err)?;
    s.seed_user(make_user("a-staff@test", Role::Submitter, Some("a.html")))
        .await
        .map_err(err)?;
    let names: Vec<String> = s
        .list_users()
        .await
        .map_err(err)?
        .into_iter()
        .map(|u| u.username)
        .collect();
    if names != ["z-hoi@test", "a-staff@test", "b-staff@test"] {
        return Err(format!("unexpected order: {:?}", names));
    }
    Ok(())
}
