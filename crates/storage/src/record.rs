use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Access role of a registered user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// HOI admin: decides on submissions and sees everything.
    Reviewer,
    /// Department staff: one assigned form, own submissions only.
    Submitter,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Reviewer => "reviewer",
            Role::Submitter => "submitter",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reviewer" => Ok(Role::Reviewer),
            "submitter" => Ok(Role::Submitter),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

/// Lifecycle state of a submission.
///
/// `Activity` is the initial state inside the grace window; `Pending` means
/// overdue for review. The remaining three are reviewer decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Activity,
    Pending,
    Approved,
    Disapproved,
    Alert,
}

impl SubmissionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SubmissionStatus::Activity => "activity",
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Disapproved => "disapproved",
            SubmissionStatus::Alert => "alert",
        }
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubmissionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "activity" => Ok(SubmissionStatus::Activity),
            "pending" => Ok(SubmissionStatus::Pending),
            "approved" => Ok(SubmissionStatus::Approved),
            "disapproved" => Ok(SubmissionStatus::Disapproved),
            "alert" => Ok(SubmissionStatus::Alert),
            other => Err(format!("unknown submission status '{}'", other)),
        }
    }
}

/// A registered user. Seeded once, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Email address or username.
    pub username: String,
    pub role: Role,
    /// The single form file a submitter may open.
    pub form_access: Option<String>,
    /// Argon2 PHC string. Only present for password-mode users.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
}

/// The live one-time code for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeRecord {
    pub identity: String,
    pub code: String,
    pub issued_at: OffsetDateTime,
}

/// A stored submission. `payload` is the opaque JSON body as submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRecord {
    pub id: String,
    pub form: String,
    pub user: String,
    pub subject: String,
    pub payload: serde_json::Value,
    pub status: SubmissionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub submitted_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub decided_at: Option<OffsetDateTime>,
    pub reviewed_by: Option<String>,
    pub remarks: Option<String>,
}

/// Field changes applied by a reviewer decision.
#[derive(Debug, Clone)]
pub struct DecisionUpdate {
    pub submission_id: String,
    pub status: SubmissionStatus,
    pub decided_at: OffsetDateTime,
    pub reviewed_by: String,
    pub remarks: String,
}

/// Filter for listing submissions. Empty filter lists everything.
#[derive(Debug, Clone, Default)]
pub struct SubmissionFilter {
    pub status: Option<SubmissionStatus>,
    pub user: Option<String>,
}

/// Aggregate counts for the dashboard summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionCounts {
    pub total_submissions: u64,
    pub pending_approvals: u64,
    pub active_alerts: u64,
    pub approved_today: u64,
}

/// An activity log entry to append.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub timestamp: OffsetDateTime,
    pub user: String,
    pub event: String,
    pub description: String,
    pub category: String,
}

/// A stored activity log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub user: String,
    pub event: String,
    pub description: String,
    pub category: String,
}

/// A server-side login session. Only the token hash is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token_hash: String,
    pub identity: String,
    pub role: Role,
    pub form_access: Option<String>,
    pub created_at: OffsetDateTime,
    pub expires_at: OffsetDateTime,
}
