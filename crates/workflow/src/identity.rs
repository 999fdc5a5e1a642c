//! Request-scoped identities.

use hoi_storage::Role;
use serde::Serialize;

/// Actor label for requests without a session.
pub const UNAUTHENTICATED_USER: &str = "UNAUTHENTICATED_USER";

/// Actor label for actions the system takes on its own.
pub const SYSTEM_USER: &str = "SYSTEM";

/// An authenticated user as established by the [`AuthGate`](crate::AuthGate).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub user: String,
    pub role: Role,
    /// The single form a submitter may open. Always `None` for reviewers
    /// in practice, but not enforced.
    pub form_access: Option<String>,
}

impl Identity {
    pub fn is_reviewer(&self) -> bool {
        self.role == Role::Reviewer
    }

    pub fn actor(&self) -> Actor {
        Actor::User(self.user.clone())
    }
}

/// Who an activity log entry is attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    Unauthenticated,
    System,
}

impl Actor {
    pub fn label(&self) -> &str {
        match self {
            Actor::User(user) => user,
            Actor::Unauthenticated => UNAUTHENTICATED_USER,
            Actor::System => SYSTEM_USER,
        }
    }
}
