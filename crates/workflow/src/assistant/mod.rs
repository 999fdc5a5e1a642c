//! Dashboard assistant.
//!
//! Questions about counts or recent activity are answered from the store;
//! anything else is handed to a [`TextGenerator`]. This path never writes.

#[cfg(feature = "gemini")]
mod gemini;

use std::sync::Arc;

use async_trait::async_trait;
use hoi_storage::WorkflowStore;
use serde::Serialize;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

#[cfg(feature = "gemini")]
pub use gemini::GeminiClient;

const SUMMARY_KEYWORDS: &[&str] = &[
    "stats", "count", "summary", "forms", "pending", "alert", "status", "today",
];
const ACTIVITY_KEYWORDS: &[&str] = &["recent", "log", "activity", "usage"];

const RECENT_LIMIT: usize = 5;

pub const DISABLED_REPLY: &str =
    "The assistant is disabled (no API key configured). Ask about stats or recent logs instead.";
const APOLOGY: &str =
    "Sorry, the AI service is unavailable right now. Please try again later.";
const SUMMARY_UNAVAILABLE: &str =
    "Sorry, I couldn't retrieve the submission statistics from the database right now.";
const ACTIVITY_UNAVAILABLE: &str =
    "Sorry, I couldn't retrieve the recent activity from the database right now.";

const PREAMBLE: &str = "You are an Executive HOI Dashboard Assistant. Provide only business-related, \
factual and concise answers based on the provided context or general business knowledge. \
Do not provide programming advice.";

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("text generation is not configured")]
    Disabled,

    #[error("generation request failed: {0}")]
    Network(String),

    #[error("generation API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("unreadable generation response: {0}")]
    Parse(String),
}

/// Free-text generation capability.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerationError>;
}

/// Used when no API key is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledGenerator;

#[async_trait]
impl TextGenerator for DisabledGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerationError> {
        Err(GenerationError::Disabled)
    }
}

/// Pick the Gemini client when a key is present, otherwise the disabled one.
pub fn select_generator(api_key: Option<String>, model: &str) -> Arc<dyn TextGenerator> {
    match api_key.filter(|k| !k.trim().is_empty()) {
        #[cfg(feature = "gemini")]
        Some(key) => {
            tracing::info!(model, "assistant text generation enabled");
            Arc::new(GeminiClient::new(key, model))
        }
        #[cfg(not(feature = "gemini"))]
        Some(_) => {
            tracing::warn!("API key configured but built without the gemini feature");
            Arc::new(DisabledGenerator)
        }
        None => {
            tracing::info!("assistant text generation disabled");
            Arc::new(DisabledGenerator)
        }
    }
}

/// Which handler a message goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRoute {
    Summary,
    RecentActivity,
    Generate,
}

/// Summary keywords win over activity keywords.
pub fn classify(message: &str) -> QueryRoute {
    let lowered = message.to_lowercase();
    if SUMMARY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        QueryRoute::Summary
    } else if ACTIVITY_KEYWORDS.iter().any(|k| lowered.contains(k)) {
        QueryRoute::RecentActivity
    } else {
        QueryRoute::Generate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
    Summary,
    Activity,
    Generated,
    Unavailable,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssistantReply {
    pub text: String,
    pub source: ReplySource,
}

impl AssistantReply {
    fn new(text: impl Into<String>, source: ReplySource) -> Self {
        Self {
            text: text.into(),
            source,
        }
    }
}

#[derive(Clone)]
pub struct Assistant {
    store: Arc<dyn WorkflowStore>,
    generator: Arc<dyn TextGenerator>,
}

impl Assistant {
    pub fn new(store: Arc<dyn WorkflowStore>, generator: Arc<dyn TextGenerator>) -> Self {
        Self { store, generator }
    }

    pub async fn reply(&self, message: &str, now: OffsetDateTime) -> AssistantReply {
        match classify(message) {
            QueryRoute::Summary => self.summary_reply(now).await,
            QueryRoute::RecentActivity => self.activity_reply().await,
            QueryRoute::Generate => self.generated_reply(message).await,
        }
    }

    async fn summary_reply(&self, now: OffsetDateTime) -> AssistantReply {
        match self.store.count_submissions(now - Duration::hours(24)).await {
            Ok(counts) => AssistantReply::new(
                format!(
                    "Dashboard Summary (Live Data):\n\n\
                     - Total Submissions: {}\n\
                     - Pending Approvals: {} (Overdue)\n\
                     - Active Alerts: {}\n\
                     - Approved Today: {}\n\n\
                     Ask for 'recent logs' for system activity.",
                    counts.total_submissions,
                    counts.pending_approvals,
                    counts.active_alerts,
                    counts.approved_today,
                ),
                ReplySource::Summary,
            ),
            Err(e) => {
                tracing::error!(error = %e, "assistant could not read counts");
                AssistantReply::new(SUMMARY_UNAVAILABLE, ReplySource::Unavailable)
            }
        }
    }

    async fn activity_reply(&self) -> AssistantReply {
        let entries = match self.store.recent_activity(RECENT_LIMIT).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::error!(error = %e, "assistant could not read activity");
                return AssistantReply::new(ACTIVITY_UNAVAILABLE, ReplySource::Unavailable);
            }
        };
        if entries.is_empty() {
            return AssistantReply::new("No recent activity logs found.", ReplySource::Activity);
        }

        let clock = format_description!("[hour]:[minute]:[second]");
        let mut lines = vec![format!("Recent System Activity (Last {} Events):", RECENT_LIMIT)];
        for (i, entry) in entries.iter().enumerate() {
            let at = entry
                .timestamp
                .format(&clock)
                .unwrap_or_else(|_| "--:--:--".to_string());
            lines.push(format!("{}. [{}] {}: {}", i + 1, at, entry.event, entry.description));
        }
        AssistantReply::new(lines.join("\n"), ReplySource::Activity)
    }

    async fn generated_reply(&self, message: &str) -> AssistantReply {
        let prompt = format!("{}\n\nUser Query: {}", PREAMBLE, message);
        match self.generator.generate(&prompt).await {
            Ok(text) => AssistantReply::new(text, ReplySource::Generated),
            Err(GenerationError::Disabled) => {
                AssistantReply::new(DISABLED_REPLY, ReplySource::Unavailable)
            }
            Err(e) => {
                tracing::warn!(error = %e, "text generation failed");
                AssistantReply::new(APOLOGY, ReplySource::Unavailable)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_checked_before_activity() {
        assert_eq!(classify("show me pending stats"), QueryRoute::Summary);
        assert_eq!(classify("today's activity"), QueryRoute::Summary);
        assert_eq!(classify("Recent LOGS please"), QueryRoute::RecentActivity);
        assert_eq!(classify("system usage"), QueryRoute::RecentActivity);
        assert_eq!(classify("draft a memo to finance"), QueryRoute::Generate);
    }

    #[tokio::test]
    async fn disabled_generator_reports_disabled() {
        let err = DisabledGenerator.generate("hi").await.unwrap_err();
        assert!(matches!(err, GenerationError::Disabled));
    }
}
