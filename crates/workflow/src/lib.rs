//! Approval-desk workflow engine.
//!
//! Every component borrows a shared [`WorkflowStore`](hoi_storage::WorkflowStore)
//! and takes the acting identity and the current instant as explicit
//! parameters; nothing here keeps request state between calls.
//!
//! - [`AuthGate`] validates one-time codes or passwords.
//! - [`Sessions`] maps opaque bearer tokens to identities.
//! - [`Lifecycle`] creates submissions, promotes overdue ones, applies decisions.
//! - [`Notifier`] sends mail through a pluggable [`Mailer`].
//! - [`Assistant`] answers dashboard questions or delegates to a [`TextGenerator`].
//! - [`ActivityLogger`] appends the audit trail.

pub mod activity;
pub mod assistant;
pub mod auth;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod notify;
pub mod session;

use time::Duration;

pub use activity::{ActivityLogger, Category};
pub use assistant::{Assistant, AssistantReply, GenerationError, ReplySource, TextGenerator};
pub use auth::{hash_password, AuthGate, AuthMode};
pub use error::{AuthError, WorkflowError};
pub use identity::{Actor, Identity};
pub use lifecycle::{DecisionOutcome, Lifecycle, NewSubmission};
pub use notify::{Email, MailError, Mailer, Notifier};
pub use session::Sessions;

/// How long a fresh submission stays in `activity` before it is overdue.
pub const GRACE_WINDOW: Duration = Duration::hours(24);

/// Lifetime of a one-time login code.
pub const CODE_TTL: Duration = Duration::seconds(120);

/// Default lifetime of a login session.
pub const DEFAULT_SESSION_TTL: Duration = Duration::hours(8);
