use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Email, MailError, Mailer};

/// Writes every message to the structured log. Development default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            body = %email.body,
            "outgoing mail (log transport)"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Appends every message as one JSON line to a file.
#[derive(Debug)]
pub struct OutboxMailer {
    path: PathBuf,
    lock: Mutex<()>,
}

impl OutboxMailer {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every message written so far.
    pub async fn read_all(path: impl AsRef<Path>) -> Result<Vec<Email>, MailError> {
        let text = match tokio::fs::read_to_string(path.as_ref()).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(|e| MailError::Encode(e.to_string())))
            .collect()
    }
}

#[async_trait]
impl Mailer for OutboxMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let mut line = serde_json::to_string(email).map_err(|e| MailError::Encode(e.to_string()))?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "outbox"
    }
}

/// POSTs `{from, to, subject, body}` to an HTTP mail relay.
#[cfg(feature = "relay")]
#[derive(Debug, Clone)]
pub struct RelayMailer {
    url: String,
    sender: String,
    token: Option<String>,
}

#[cfg(feature = "relay")]
impl RelayMailer {
    pub fn new(url: impl Into<String>, sender: impl Into<String>, token: Option<String>) -> Self {
        Self {
            url: url.into(),
            sender: sender.into(),
            token,
        }
    }
}

#[cfg(feature = "relay")]
#[async_trait]
impl Mailer for RelayMailer {
    async fn send(&self, email: &Email) -> Result<(), MailError> {
        let url = self.url.clone();
        let token = self.token.clone();
        let body = serde_json::json!({
            "from": self.sender,
            "to": email.to,
            "subject": email.subject,
            "body": email.body,
        });

        tokio::task::spawn_blocking(move || {
            let agent = ureq::Agent::new_with_defaults();
            let mut request = agent.post(&url).header("content-type", "application/json");
            if let Some(ref token) = token {
                request = request.header("Authorization", &format!("Bearer {}", token));
            }
            request
                .send_json(body)
                .map(|_| ())
                .map_err(|e| MailError::Relay(e.to_string()))
        })
        .await
        .map_err(|e| MailError::Relay(format!("task join error: {}", e)))?
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}
