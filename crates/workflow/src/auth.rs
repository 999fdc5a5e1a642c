//! The authentication gate.
//!
//! Two modes share the same identity model: emailed one-time codes
//! ([`AuthGate::request_code`] then [`AuthGate::verify_code`]) and stored
//! argon2 password hashes ([`AuthGate::login`]). Every attempt appends
//! exactly one activity entry.

use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use hoi_storage::{CodeRecord, UserRecord, WorkflowStore};
use rand::Rng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use time::OffsetDateTime;

use crate::activity::{ActivityLogger, Category};
use crate::error::AuthError;
use crate::identity::{Actor, Identity};
use crate::notify::{templates, Notifier};
use crate::CODE_TTL;

/// Which credential the login form asks for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMode {
    #[default]
    Otp,
    Password,
}

impl fmt::Display for AuthMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AuthMode::Otp => "otp",
            AuthMode::Password => "password",
        })
    }
}

impl FromStr for AuthMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "otp" => Ok(AuthMode::Otp),
            "password" => Ok(AuthMode::Password),
            other => Err(format!("unknown auth mode '{}'", other)),
        }
    }
}

#[derive(Clone)]
pub struct AuthGate {
    store: Arc<dyn WorkflowStore>,
    log: ActivityLogger,
    notifier: Notifier,
}

impl AuthGate {
    pub fn new(store: Arc<dyn WorkflowStore>, log: ActivityLogger, notifier: Notifier) -> Self {
        Self {
            store,
            log,
            notifier,
        }
    }

    /// Issue a fresh code for `identity` and mail it.
    ///
    /// Any earlier code for the same identity is replaced. If the mail
    /// transport fails the new code stays stored but the call returns
    /// [`AuthError::CodeDeliveryFailed`].
    pub async fn request_code(&self, identity: &str, now: OffsetDateTime) -> Result<(), AuthError> {
        let result = self.issue_code(identity, now).await;
        let (event, description, category) = match &result {
            Ok(user) => (
                format!("OTP Sent to {}", identity),
                format!("OTP stored successfully for {}.", user.role),
                Category::Auth,
            ),
            Err(AuthError::UnknownIdentity) => (
                format!("OTP Attempt Failed: {}", identity),
                "Email not registered in the system.".to_string(),
                Category::AuthFail,
            ),
            Err(e) => (
                format!("OTP Error for {}", identity),
                e.to_string(),
                Category::AuthError,
            ),
        };
        self.log
            .record(&Actor::Unauthenticated, event, description, category, now)
            .await;
        result.map(|_| ())
    }

    async fn issue_code(&self, identity: &str, now: OffsetDateTime) -> Result<UserRecord, AuthError> {
        let user = self
            .store
            .get_user(identity)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;

        let code = generate_code();
        self.store
            .put_code(CodeRecord {
                identity: identity.to_string(),
                code: code.clone(),
                issued_at: now,
            })
            .await?;

        let mail = templates::login_code(identity, user.role, &code, CODE_TTL.whole_seconds());
        if !self.notifier.notify(&Actor::Unauthenticated, mail, now).await {
            return Err(AuthError::CodeDeliveryFailed);
        }
        Ok(user)
    }

    /// Check a code. On success the code is consumed.
    pub async fn verify_code(
        &self,
        identity: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<Identity, AuthError> {
        let result = self.check_code(identity, code, now).await;
        self.record_login(identity, "OTP", &result, now).await;
        result
    }

    async fn check_code(
        &self,
        identity: &str,
        code: &str,
        now: OffsetDateTime,
    ) -> Result<Identity, AuthError> {
        let record = self
            .store
            .get_code(identity)
            .await?
            .ok_or(AuthError::NoCodeIssued)?;

        if now - record.issued_at > CODE_TTL {
            return Err(AuthError::CodeExpired);
        }
        if !codes_match(&record.code, code) {
            return Err(AuthError::CodeMismatch);
        }

        let user = self
            .store
            .get_user(identity)
            .await?
            .ok_or(AuthError::UnknownIdentity)?;
        self.store.delete_code(identity).await?;
        Ok(identity_of(user))
    }

    /// Check a username and password against the stored hash.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        now: OffsetDateTime,
    ) -> Result<Identity, AuthError> {
        let result = self.check_password(username, password).await;
        self.record_login(username, "Password", &result, now).await;
        result
    }

    async fn check_password(&self, username: &str, password: &str) -> Result<Identity, AuthError> {
        let user = self.store.get_user(username).await?;
        // Unknown users and users without a hash still run one argon2 verify.
        let (user, hash) = match user {
            Some(user) => match user.password_hash.clone() {
                Some(hash) => (Some(user), Some(hash)),
                None => (None, dummy_hash()),
            },
            None => (None, dummy_hash()),
        };

        let password = password.to_string();
        let matches = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => verify_password(&password, &hash),
            None => Ok(false),
        })
        .await
        .map_err(|e| AuthError::PasswordHash(format!("task join error: {}", e)))??;

        match user {
            Some(user) if matches => Ok(identity_of(user)),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn record_login(
        &self,
        who: &str,
        method: &str,
        result: &Result<Identity, AuthError>,
        now: OffsetDateTime,
    ) {
        let (actor, event, description, category) = match result {
            Ok(identity) => (
                identity.actor(),
                format!("Login Success: {}", identity.role),
                format!("{} login by {}.", method, who),
                Category::Auth,
            ),
            Err(e) if e.is_rejection() => (
                Actor::Unauthenticated,
                format!("Login Failed: {}", who),
                e.to_string(),
                Category::AuthFail,
            ),
            Err(e) => (
                Actor::Unauthenticated,
                format!("Login Error: {}", who),
                e.to_string(),
                Category::AuthError,
            ),
        };
        self.log.record(&actor, event, description, category, now).await;
    }

    pub async fn logout(&self, identity: &Identity, now: OffsetDateTime) {
        self.log
            .record(
                &identity.actor(),
                "Logout",
                format!("{} signed out.", identity.user),
                Category::Logout,
                now,
            )
            .await;
    }
}

fn identity_of(user: UserRecord) -> Identity {
    Identity {
        user: user.username,
        role: user.role,
        form_access: user.form_access,
    }
}

/// Six decimal digits, uniform over 100000..=999999.
fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999u32).to_string()
}

fn codes_match(stored: &str, given: &str) -> bool {
    bool::from(stored.as_bytes().ct_eq(given.as_bytes()))
}

/// Hash verified against when the user has none of their own.
fn dummy_hash() -> Option<String> {
    static DUMMY: OnceLock<Option<String>> = OnceLock::new();
    DUMMY
        .get_or_init(|| hash_password("hoi-dummy-password").ok())
        .clone()
}

/// Hash a password into an argon2 PHC string.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = match PasswordHash::new(hash) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is malformed");
            return Ok(false);
        }
    };
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
