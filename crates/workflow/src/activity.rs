//! The append-only audit trail.

use std::fmt;
use std::sync::Arc;

use hoi_storage::{NewActivity, WorkflowStore};
use time::OffsetDateTime;

use crate::identity::Actor;

/// Activity log categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Auth,
    AuthFail,
    AuthError,
    Logout,
    FormSubmit,
    Review,
    Automation,
    EmailError,
    SecurityBreach,
    Error,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Auth => "AUTH",
            Category::AuthFail => "AUTH_FAIL",
            Category::AuthError => "AUTH_ERROR",
            Category::Logout => "LOGOUT",
            Category::FormSubmit => "FORM_SUBMIT",
            Category::Review => "REVIEW",
            Category::Automation => "AUTOMATION",
            Category::EmailError => "EMAIL_ERROR",
            Category::SecurityBreach => "SECURITY_BREACH",
            Category::Error => "ERROR",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Appends activity entries to the store.
///
/// A failed append never fails the caller's operation; it is reported
/// through `tracing` and dropped.
#[derive(Clone)]
pub struct ActivityLogger {
    store: Arc<dyn WorkflowStore>,
}

impl ActivityLogger {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    /// Build an entry without writing it. Used where the entry must commit
    /// together with another write.
    pub fn entry(
        actor: &Actor,
        event: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        now: OffsetDateTime,
    ) -> NewActivity {
        NewActivity {
            timestamp: now,
            user: actor.label().to_string(),
            event: event.into(),
            description: description.into(),
            category: category.as_str().to_string(),
        }
    }

    /// Append one entry. Returns the row id, or `None` if the write failed.
    pub async fn record(
        &self,
        actor: &Actor,
        event: impl Into<String>,
        description: impl Into<String>,
        category: Category,
        now: OffsetDateTime,
    ) -> Option<i64> {
        let entry = Self::entry(actor, event, description, category, now);
        match self.store.append_activity(entry).await {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, category = %category, "failed to append activity entry");
                None
            }
        }
    }
}
