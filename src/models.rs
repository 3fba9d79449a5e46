use chrono::{DateTime, Utc};
use enumset::EnumSet;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::capability::Capability;

/// Resolved session state, owned by the upstream auth layer.
/// This crate only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
    pub authenticated: bool,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub capabilities: EnumSet<Capability>,
}

/// A single row of the site maintenance table.
///
/// The "current" record is the one with the latest `created_at`; everything
/// else in the table is ignored. Replaced wholesale on every refresh, never
/// field-mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: String,
    pub is_enabled: bool,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_completion: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_info: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw usage counters for a user, read from the billing store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageCounters {
    pub current_usage: u64,
    pub quota_limit: u64,
    pub can_use_ai: bool,
}

/// Derived usage view, recomputed per request from upstream values.
/// Never cached and never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub current_usage: u64,
    pub quota_limit: u64,
    pub plan_name: String,
}

impl UsageSnapshot {
    pub fn remaining(&self) -> u64 {
        self.quota_limit.saturating_sub(self.current_usage)
    }

    pub fn usage_percentage(&self) -> f64 {
        if self.quota_limit == 0 {
            0.0
        } else {
            self.current_usage as f64 / self.quota_limit as f64 * 100.0
        }
    }
}

/// One prior turn of a conversation, replayed to the chat router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatTurn {
    /// `"user"` or `"assistant"`.
    pub role: String,
    pub content: String,
}

/// Caller-supplied portion of a chat request, before canonicalization.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequestDraft {
    pub message: String,
    pub session_id: String,
    pub selected_model_id: String,
    #[serde(default)]
    pub conversation_history: Vec<ChatTurn>,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// Canonical outbound chat request.
///
/// Constructed at submission time and discarded after the call resolves.
/// `request_id` is stable across retries of the same envelope instance; a
/// fresh one is minted per user-initiated submission.
#[derive(Debug, Clone, Serialize)]
pub struct ChatRequestEnvelope {
    pub message: String,
    pub session_id: String,
    pub selected_model_id: String,
    pub conversation_history: Vec<ChatTurn>,
    pub conversation_id: String,
    pub request_id: String,
    pub timestamp_utc: DateTime<Utc>,
}

impl ChatRequestEnvelope {
    /// Canonicalize a draft: the conversation id falls back to the session
    /// id (never empty), the request id is minted once, and the timestamp
    /// defaults to construction time.
    pub fn from_draft(draft: ChatRequestDraft) -> Self {
        let conversation_id = match draft.conversation_id {
            Some(id) if !id.is_empty() => id,
            _ => draft.session_id.clone(),
        };
        Self {
            message: draft.message,
            session_id: draft.session_id,
            selected_model_id: draft.selected_model_id,
            conversation_history: draft.conversation_history,
            conversation_id,
            request_id: mint_request_id(),
            timestamp_utc: Utc::now(),
        }
    }
}

/// Request ids combine a millisecond timestamp with a random suffix so that
/// rapid successive submissions from the same client cannot collide.
fn mint_request_id() -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..0x1000000);
    format!("req-{}-{:06x}", Utc::now().timestamp_millis(), suffix)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationSeverity {
    Info,
    Destructive,
}

/// User-visible notification emitted as an observable side effect, e.g. when
/// a chat dispatch fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserNotification {
    pub title: String,
    pub description: String,
    pub severity: NotificationSeverity,
}

impl UserNotification {
    pub fn destructive(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity: NotificationSeverity::Destructive,
        }
    }
}
