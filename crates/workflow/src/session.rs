//! Server-side login sessions.
//!
//! The browser holds a random bearer token; the store only ever sees its
//! SHA-256 digest.

use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hoi_storage::{SessionRecord, StorageError, WorkflowStore};
use rand::RngCore;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};

use crate::identity::Identity;

#[derive(Clone)]
pub struct Sessions {
    store: Arc<dyn WorkflowStore>,
    ttl: Duration,
}

impl Sessions {
    pub fn new(store: Arc<dyn WorkflowStore>, ttl: Duration) -> Self {
        Self { store, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Start a session and return the raw token for the cookie.
    pub async fn open(&self, identity: &Identity, now: OffsetDateTime) -> Result<String, StorageError> {
        let purged = self.store.purge_sessions(now).await?;
        if purged > 0 {
            tracing::debug!(purged, "expired sessions removed");
        }

        let mut raw = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut raw);
        let token = URL_SAFE_NO_PAD.encode(raw);

        self.store
            .insert_session(SessionRecord {
                token_hash: hash_token(&token),
                identity: identity.user.clone(),
                role: identity.role,
                form_access: identity.form_access.clone(),
                created_at: now,
                expires_at: now + self.ttl,
            })
            .await?;
        Ok(token)
    }

    /// The identity behind a live token. Expired sessions are deleted.
    pub async fn resolve(&self, token: &str, now: OffsetDateTime) -> Result<Option<Identity>, StorageError> {
        let hash = hash_token(token);
        let Some(record) = self.store.get_session(&hash).await? else {
            return Ok(None);
        };
        if record.expires_at <= now {
            self.store.delete_session(&hash).await?;
            return Ok(None);
        }
        Ok(Some(Identity {
            user: record.identity,
            role: record.role,
            form_access: record.form_access,
        }))
    }

    /// Returns `true` if the token named a stored session.
    pub async fn close(&self, token: &str) -> Result<bool, StorageError> {
        self.store.delete_session(&hash_token(token)).await
    }
}

fn hash_token(token: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(token.as_bytes()))
}
