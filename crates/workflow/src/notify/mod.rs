//! Outbound mail.
//!
//! [`Notifier`] never raises: a failed send is logged as an `EMAIL_ERROR`
//! activity entry and reported to the caller as `false`.

pub mod templates;
mod transport;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::activity::{ActivityLogger, Category};
use crate::identity::Actor;

pub use transport::{LogMailer, OutboxMailer};
#[cfg(feature = "relay")]
pub use transport::RelayMailer;

/// A plain-text message to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl Email {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("mail I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("mail relay error: {0}")]
    Relay(String),

    #[error("mail encoding error: {0}")]
    Encode(String),
}

/// A mail transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, email: &Email) -> Result<(), MailError>;

    /// Short transport name for logs.
    fn name(&self) -> &'static str;
}

/// Sends mail and records delivery failures.
#[derive(Clone)]
pub struct Notifier {
    mailer: Arc<dyn Mailer>,
    management: Arc<Vec<String>>,
    log: ActivityLogger,
}

impl Notifier {
    pub fn new(mailer: Arc<dyn Mailer>, management: Vec<String>, log: ActivityLogger) -> Self {
        Self {
            mailer,
            management: Arc::new(management),
            log,
        }
    }

    /// The management distribution list.
    pub fn management(&self) -> &[String] {
        &self.management
    }

    /// Send one message. Returns whether the transport accepted it.
    pub async fn notify(&self, actor: &Actor, email: Email, now: OffsetDateTime) -> bool {
        match self.mailer.send(&email).await {
            Ok(()) => {
                tracing::info!(
                    transport = self.mailer.name(),
                    to = %email.to,
                    subject = %email.subject,
                    "mail sent"
                );
                true
            }
            Err(e) => {
                tracing::warn!(
                    transport = self.mailer.name(),
                    to = %email.to,
                    error = %e,
                    "mail delivery failed"
                );
                self.log
                    .record(
                        actor,
                        format!("Email Failed: {}", email.to),
                        format!("Subject: {}. Error: {}", email.subject, e),
                        Category::EmailError,
                        now,
                    )
                    .await;
                false
            }
        }
    }

    /// Send the same message to every management address. Returns how many
    /// were accepted.
    pub async fn notify_management(
        &self,
        actor: &Actor,
        subject: &str,
        body: &str,
        now: OffsetDateTime,
    ) -> usize {
        let mut delivered = 0;
        for address in self.management.iter() {
            if self.notify(actor, Email::new(address, subject, body), now).await {
                delivered += 1;
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoi_storage::{SqliteStore, WorkflowStore};
    use std::sync::Mutex;
    use time::macros::datetime;

    /// Accepts everything except mail to addresses containing "bounce".
    #[derive(Default)]
    struct PickyMailer {
        sent: Mutex<Vec<Email>>,
    }

    #[async_trait]
    impl Mailer for PickyMailer {
        async fn send(&self, email: &Email) -> Result<(), MailError> {
            if email.to.contains("bounce") {
                return Err(MailError::Relay("mailbox unavailable".into()));
            }
            self.sent.lock().unwrap().push(email.clone());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "picky"
        }
    }

    #[tokio::test]
    async fn management_fanout_counts_successes_and_logs_failures() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("hoi.db")).unwrap());
        let mailer = Arc::new(PickyMailer::default());
        let notifier = Notifier::new(
            mailer.clone(),
            vec![
                "ceo@corp".into(),
                "bounce@corp".into(),
                "cfo@corp".into(),
            ],
            ActivityLogger::new(store.clone()),
        );
        let now = datetime!(2025-03-01 10:00 UTC);

        let delivered = notifier
            .notify_management(&Actor::System, "subject", "body", now)
            .await;
        assert_eq!(delivered, 2);
        assert_eq!(mailer.sent.lock().unwrap().len(), 2);

        let log = store.recent_activity(10).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].category, "EMAIL_ERROR");
        assert!(log[0].event.contains("bounce@corp"));
    }
}
