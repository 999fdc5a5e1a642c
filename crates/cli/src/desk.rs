//! Wires configuration into the workflow components.

use std::sync::Arc;

use hoi_storage::{SqliteStore, StorageError, UserRecord, WorkflowStore};
use hoi_workflow::assistant::select_generator;
use hoi_workflow::notify::{LogMailer, OutboxMailer, RelayMailer};
use hoi_workflow::{ActivityLogger, Assistant, AuthGate, Lifecycle, Mailer, Notifier, Sessions};
use time::Duration;

use crate::config::{Config, ConfigError, MailTransport};

/// Every workflow component, sharing one store.
#[derive(Clone)]
pub struct Desk {
    pub store: Arc<dyn WorkflowStore>,
    pub auth: AuthGate,
    pub sessions: Sessions,
    pub lifecycle: Lifecycle,
    pub assistant: Assistant,
}

impl Desk {
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let store: Arc<dyn WorkflowStore> = Arc::new(SqliteStore::open(&config.store.path)?);
        tracing::info!(path = %config.store.path.display(), "store opened");

        let mailer = build_mailer(config)?;
        let log = ActivityLogger::new(store.clone());
        let notifier = Notifier::new(mailer, config.mail.management.clone(), log.clone());
        let generator = select_generator(config.assistant.api_key.clone(), &config.assistant.model);

        Ok(Self {
            auth: AuthGate::new(store.clone(), log.clone(), notifier.clone()),
            sessions: Sessions::new(store.clone(), Duration::seconds(config.server.session_ttl_secs)),
            lifecycle: Lifecycle::new(store.clone(), log, notifier),
            assistant: Assistant::new(store.clone(), generator),
            store,
        })
    }

    /// Insert the configured roster. Existing users are left as they are.
    /// Returns how many were new.
    pub async fn seed_users(&self, config: &Config) -> Result<usize, StorageError> {
        let mut inserted = 0;
        for user in &config.users {
            if self.store.seed_user(UserRecord::from(user)).await? {
                tracing::info!(user = %user.username, role = %user.role, "user seeded");
                inserted += 1;
            }
        }
        Ok(inserted)
    }
}

fn build_mailer(config: &Config) -> Result<Arc<dyn Mailer>, ConfigError> {
    let mail = &config.mail;
    let mailer: Arc<dyn Mailer> = match mail.transport {
        MailTransport::Log => Arc::new(LogMailer),
        MailTransport::Outbox => Arc::new(OutboxMailer::new(&mail.outbox)),
        MailTransport::Relay => {
            let url = mail.relay_url.clone().ok_or_else(|| {
                ConfigError::Invalid("mail.relay_url is required for the relay transport".into())
            })?;
            Arc::new(RelayMailer::new(url, &mail.sender, mail.relay_token.clone()))
        }
    };
    tracing::info!(transport = mailer.name(), "mail transport selected");
    Ok(mailer)
}
