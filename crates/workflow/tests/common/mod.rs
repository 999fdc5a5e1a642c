//! Shared fixtures: a tempfile-backed store, a recording mailer and a
//! scripted text generator.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use hoi_storage::{ActivityRecord, Role, SqliteStore, UserRecord, WorkflowStore};
use hoi_workflow::{
    ActivityLogger, Assistant, AuthGate, Email, GenerationError, Lifecycle, MailError, Mailer,
    Notifier, TextGenerator,
};
use time::macros::datetime;
use time::OffsetDateTime;

pub const REVIEWER: &str = "hoi@college.test";
pub const SUBMITTER: &str = "staff@college.test";
pub const OTHER_SUBMITTER: &str = "other@college.test";
pub const MANAGEMENT: [&str; 2] = ["principal@college.test", "registrar@college.test"];

pub const T0: OffsetDateTime = datetime!(2025-06-02 09:00 UTC);

/// Records every message. Addresses listed in `failing` are refused.
#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub failing: Mutex<Vec<String>>,
}

impl RecordingMailer {
    pub fn fail_for(&self, address: &str) {
        self.failing.lock().unwrap().push(address.to_string());
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, address: &str) -> Vec<Email> {
        self.sent().into_iter().filter(|m| m.to == address).collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        if self.failing.lock().unwrap().iter().any(|a| a == &email.to) {
            return Err(MailError::Relay(format!("refused {}", email.to)));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// Returns a fixed answer and counts calls.
pub struct StubGenerator {
    pub answer: Result<String, String>,
    pub calls: AtomicUsize,
}

impl StubGenerator {
    pub fn answering(text: &str) -> Self {
        Self {
            answer: Ok(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            answer: Err("upstream 503".to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for StubGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answer
            .clone()
            .map_err(GenerationError::Network)
    }
}

/// A fully wired workflow over a fresh database.
pub struct Desk {
    _dir: tempfile::TempDir,
    pub store: Arc<SqliteStore>,
    pub mailer: Arc<RecordingMailer>,
    pub auth: AuthGate,
    pub lifecycle: Lifecycle,
}

impl Desk {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SqliteStore::open(dir.path().join("hoi.db")).unwrap());
        seed(&*store).await;

        let mailer = Arc::new(RecordingMailer::default());
        let log = ActivityLogger::new(store.clone());
        let notifier = Notifier::new(
            mailer.clone(),
            MANAGEMENT.iter().map(|s| s.to_string()).collect(),
            log.clone(),
        );
        Self {
            auth: AuthGate::new(store.clone(), log.clone(), notifier.clone()),
            lifecycle: Lifecycle::new(store.clone(), log, notifier),
            store,
            mailer,
            _dir: dir,
        }
    }

    pub fn assistant(&self, generator: Arc<dyn TextGenerator>) -> Assistant {
        Assistant::new(self.store.clone(), generator)
    }

    /// The full activity log, oldest first.
    pub async fn activity(&self) -> Vec<ActivityRecord> {
        let mut entries = self.store.recent_activity(10_000).await.unwrap();
        entries.reverse();
        entries
    }

    pub async fn activity_in(&self, category: &str) -> Vec<ActivityRecord> {
        self.activity()
            .await
            .into_iter()
            .filter(|e| e.category == category)
            .collect()
    }
}

async fn seed(store: &SqliteStore) {
    let users = [
        (REVIEWER, Role::Reviewer, None),
        (SUBMITTER, Role::Submitter, Some("Academics.html")),
        (OTHER_SUBMITTER, Role::Submitter, Some("Finance.html")),
    ];
    for (username, role, form) in users {
        store
            .seed_user(UserRecord {
                username: username.to_string(),
                role,
                form_access: form.map(str::to_string),
                password_hash: None,
            })
            .await
            .unwrap();
    }
}

/// The six-digit code in the most recent mail to `address`.
pub fn last_code(mailer: &RecordingMailer, address: &str) -> String {
    let mail = mailer.sent_to(address).pop().expect("no mail sent");
    mail.body
        .split(|c: char| !c.is_ascii_digit())
        .find(|chunk| chunk.len() == 6)
        .expect("no code in mail")
        .to_string()
}
