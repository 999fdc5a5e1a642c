//! Configuration for `hoi`.
//!
//! Every section is optional. Secrets never live in the file: the Gemini
//! key comes from `GEMINI_API_KEY` and the relay token from
//! `HOI_MAIL_RELAY_TOKEN`.
//!
//! # Example
//!
//! ```toml
//! [server]
//! port = 5000
//! forms_dir = "forms"
//! session_ttl_secs = 28800
//! rate_limit = 20
//!
//! [store]
//! path = "hoi.db"
//!
//! [auth]
//! mode = "otp"
//!
//! [mail]
//! transport = "relay"
//! relay_url = "https://mail.internal/send"
//! sender = "hoi-dashboard@college.test"
//! management = ["principal@college.test"]
//!
//! [assistant]
//! model = "gemini-2.5-flash"
//!
//! [[users]]
//! username = "hoi@college.test"
//! role = "reviewer"
//!
//! [[users]]
//! username = "staff@college.test"
//! role = "submitter"
//! form_access = "Academics.html"
//! ```

use std::path::{Path, PathBuf};

use hoi_storage::{Role, UserRecord};
use hoi_workflow::AuthMode;
use serde::Deserialize;

// ── Types ─────────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("could not parse '{path}': {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
    pub assistant: AssistantConfig,
    /// Seed roster. Applied insert-or-ignore on `init-db` and `serve`.
    pub users: Vec<SeedUser>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub port: u16,
    /// Directory holding the static form files served under `/forms/`.
    pub forms_dir: PathBuf,
    pub session_ttl_secs: i64,
    /// Code requests and login attempts per IP per minute.
    pub rate_limit: u64,
    /// Mark the session cookie `Secure`.
    pub secure_cookies: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            forms_dir: PathBuf::from("forms"),
            session_ttl_secs: hoi_workflow::DEFAULT_SESSION_TTL.whole_seconds(),
            rate_limit: 20,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("hoi.db"),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    pub mode: AuthMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    #[default]
    Log,
    Outbox,
    Relay,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MailConfig {
    pub transport: MailTransport,
    /// JSON-lines file for the `outbox` transport.
    pub outbox: PathBuf,
    pub relay_url: Option<String>,
    pub sender: String,
    /// Addresses that receive the approval/alert digest.
    pub management: Vec<String>,
    #[serde(skip)]
    pub relay_token: Option<String>,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::Log,
            outbox: PathBuf::from("outbox.jsonl"),
            relay_url: None,
            sender: "hoi-dashboard@localhost".to_string(),
            management: Vec::new(),
            relay_token: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantConfig {
    pub model: String,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            api_key: None,
        }
    }
}

/// One `[[users]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SeedUser {
    pub username: String,
    pub role: Role,
    pub form_access: Option<String>,
    /// Argon2 PHC string from `hoi hash-password`.
    pub password_hash: Option<String>,
}

impl From<&SeedUser> for UserRecord {
    fn from(user: &SeedUser) -> Self {
        UserRecord {
            username: user.username.clone(),
            role: user.role,
            form_access: user.form_access.clone(),
            password_hash: user.password_hash.clone(),
        }
    }
}

// ── Functions ─────────────────────────────────────────────────────────────────

impl Config {
    /// Load from `path` (or defaults when `None`), then apply environment
    /// secrets and validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        self.assistant.api_key = non_empty("GEMINI_API_KEY");
        self.mail.relay_token = non_empty("HOI_MAIL_RELAY_TOKEN");
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.server.session_ttl_secs <= 0 {
            return Err(ConfigError::Invalid(
                "server.session_ttl_secs must be positive".to_string(),
            ));
        }
        if self.server.rate_limit == 0 {
            return Err(ConfigError::Invalid(
                "server.rate_limit must be at least 1".to_string(),
            ));
        }
        if self.mail.transport == MailTransport::Relay && self.mail.relay_url.is_none() {
            return Err(ConfigError::Invalid(
                "mail.transport = \"relay\" requires mail.relay_url".to_string(),
            ));
        }
        if self.auth.mode == AuthMode::Password {
            if let Some(user) = self.users.iter().find(|u| u.password_hash.is_none()) {
                tracing::warn!(user = %user.username, "password mode but user has no password_hash");
            }
        }
        Ok(())
    }
}
