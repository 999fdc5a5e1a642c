//! Authentication gate integration tests: code issue and verification,
//! password login, and the one-entry-per-attempt audit rule.

mod common;

use common::*;
use hoi_storage::{Role, UserRecord, WorkflowStore};
use hoi_workflow::{hash_password, AuthError};
use time::Duration;

#[tokio::test]
async fn unknown_identity_gets_no_code() {
    let desk = Desk::new().await;

    let err = desk.auth.request_code("stranger@x", T0).await.unwrap_err();
    assert!(matches!(err, AuthError::UnknownIdentity));
    assert!(desk.store.get_code("stranger@x").await.unwrap().is_none());
    assert!(desk.mailer.sent().is_empty());

    let fails = desk.activity_in("AUTH_FAIL").await;
    assert_eq!(fails.len(), 1);
    assert_eq!(fails[0].user, "UNAUTHENTICATED_USER");
}

#[tokio::test]
async fn code_round_trip_binds_role_and_form() {
    let desk = Desk::new().await;

    desk.auth.request_code(SUBMITTER, T0).await.unwrap();
    let code = last_code(&desk.mailer, SUBMITTER);
    assert!(desk.mailer.sent()[0].subject.contains("Form Submitter"));

    let identity = desk
        .auth
        .verify_code(SUBMITTER, &code, T0 + Duration::seconds(30))
        .await
        .unwrap();
    assert_eq!(identity.user, SUBMITTER);
    assert_eq!(identity.role, Role::Submitter);
    assert_eq!(identity.form_access.as_deref(), Some("Academics.html"));

    // request + verify
    assert_eq!(desk.activity_in("AUTH").await.len(), 2);
}

#[tokio::test]
async fn code_is_single_use() {
    let desk = Desk::new().await;
    desk.auth.request_code(REVIEWER, T0).await.unwrap();
    let code = last_code(&desk.mailer, REVIEWER);

    desk.auth.verify_code(REVIEWER, &code, T0).await.unwrap();
    let err = desk.auth.verify_code(REVIEWER, &code, T0).await.unwrap_err();
    assert!(matches!(err, AuthError::NoCodeIssued));
}

#[tokio::test]
async fn expired_code_fails_even_when_correct() {
    let desk = Desk::new().await;
    desk.auth.request_code(REVIEWER, T0).await.unwrap();
    let code = last_code(&desk.mailer, REVIEWER);

    let at_limit = desk
        .auth
        .verify_code(REVIEWER, "000000", T0 + Duration::seconds(120))
        .await
        .unwrap_err();
    assert!(matches!(at_limit, AuthError::CodeMismatch));

    let err = desk
        .auth
        .verify_code(REVIEWER, &code, T0 + Duration::seconds(121))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::CodeExpired));
}

#[tokio::test]
async fn code_with_sub_second_issue_time_is_valid_at_exactly_ttl() {
    for nanos in [123_456_789, 987_654_321, 500_000_001, 333_333_333, 777_777_777] {
        let desk = Desk::new().await;
        let issued = T0 + Duration::nanoseconds(nanos);
        desk.auth.request_code(REVIEWER, issued).await.unwrap();
        let code = last_code(&desk.mailer, REVIEWER);

        let identity = desk
            .auth
            .verify_code(REVIEWER, &code, issued + Duration::seconds(120))
            .await
            .unwrap_or_else(|e| panic!("issued at +{}ns: {}", nanos, e));
        assert_eq!(identity.user, REVIEWER);
    }
}

#[tokio::test]
async fn new_request_replaces_old_code() {
    let desk = Desk::new().await;
    desk.auth.request_code(REVIEWER, T0).await.unwrap();
    let first = last_code(&desk.mailer, REVIEWER);
    desk.auth
        .request_code(REVIEWER, T0 + Duration::seconds(10))
        .await
        .unwrap();
    let second = last_code(&desk.mailer, REVIEWER);

    let stored = desk.store.get_code(REVIEWER).await.unwrap().unwrap();
    assert_eq!(stored.code, second);
    if first != second {
        let err = desk
            .auth
            .verify_code(REVIEWER, &first, T0 + Duration::seconds(20))
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::CodeMismatch));
    }
}

#[tokio::test]
async fn delivery_failure_is_reported() {
    let desk = Desk::new().await;
    desk.mailer.fail_for(REVIEWER);

    let err = desk.auth.request_code(REVIEWER, T0).await.unwrap_err();
    assert!(matches!(err, AuthError::CodeDeliveryFailed));
    // The code was stored before the send was attempted.
    assert!(desk.store.get_code(REVIEWER).await.unwrap().is_some());

    assert_eq!(desk.activity_in("EMAIL_ERROR").await.len(), 1);
    assert_eq!(desk.activity_in("AUTH_ERROR").await.len(), 1);
}

#[tokio::test]
async fn every_attempt_logs_exactly_one_auth_entry() {
    let desk = Desk::new().await;
    desk.auth.request_code(REVIEWER, T0).await.unwrap();
    let _ = desk.auth.verify_code(REVIEWER, "111111", T0).await;
    let _ = desk.auth.verify_code("nobody@x", "111111", T0).await;

    let auth_entries: Vec<_> = desk
        .activity()
        .await
        .into_iter()
        .filter(|e| e.category.starts_with("AUTH"))
        .collect();
    assert_eq!(auth_entries.len(), 3);
}

// ──────────────────────────────────────────────
// Password mode
// ──────────────────────────────────────────────

async fn seed_password_user(desk: &Desk, username: &str, password: &str) {
    desk.store
        .seed_user(UserRecord {
            username: username.to_string(),
            role: Role::Reviewer,
            form_access: None,
            password_hash: Some(hash_password(password).unwrap()),
        })
        .await
        .unwrap();
}

#[tokio::test]
async fn password_login_succeeds() {
    let desk = Desk::new().await;
    seed_password_user(&desk, "admin", "correct horse").await;

    let identity = desk.auth.login("admin", "correct horse", T0).await.unwrap();
    assert_eq!(identity.role, Role::Reviewer);
    assert_eq!(desk.activity_in("AUTH").await.len(), 1);
}

#[tokio::test]
async fn wrong_password_is_invalid_credentials() {
    let desk = Desk::new().await;
    seed_password_user(&desk, "admin", "correct horse").await;

    let err = desk.auth.login("admin", "battery staple", T0).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    assert_eq!(desk.activity_in("AUTH_FAIL").await.len(), 1);
    assert!(desk.activity_in("AUTH").await.is_empty());
}

#[tokio::test]
async fn missing_user_or_hash_is_invalid_credentials() {
    let desk = Desk::new().await;

    let err = desk.auth.login("ghost", "pw", T0).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
    let err = desk
        .auth
        .login("ghost", "hoi-dummy-password", T0)
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    // Seeded without a hash.
    let err = desk.auth.login(REVIEWER, "pw", T0).await.unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));
}

#[tokio::test]
async fn logout_is_logged() {
    let desk = Desk::new().await;
    desk.auth.request_code(REVIEWER, T0).await.unwrap();
    let code = last_code(&desk.mailer, REVIEWER);
    let identity = desk.auth.verify_code(REVIEWER, &code, T0).await.unwrap();

    desk.auth.logout(&identity, T0).await;
    let entries = desk.activity_in("LOGOUT").await;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].user, REVIEWER);
}
