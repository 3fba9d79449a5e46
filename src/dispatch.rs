use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{GatewayError, Result};
use crate::models::{ChatRequestDraft, ChatRequestEnvelope, UserNotification};
use crate::notify::NotificationSink;

/// Remote chat-routing callable. Implementations return `Ok(None)` when the
/// call succeeded but carried no payload.
#[async_trait]
pub trait ChatRouter: Send + Sync {
    async fn route(&self, envelope: &ChatRequestEnvelope) -> Result<Option<Value>>;
}

#[derive(Deserialize)]
struct RouterErrorBody {
    message: String,
}

/// HTTP implementation posting the envelope JSON to the configured chat
/// router endpoint. No local timeout: the remote call's own timeout, if
/// any, governs.
pub struct HttpChatRouter {
    client: Client,
    url: String,
}

impl HttpChatRouter {
    pub fn new(url: String) -> Self {
        Self {
            client: Client::new(),
            url,
        }
    }
}

#[async_trait]
impl ChatRouter for HttpChatRouter {
    async fn route(&self, envelope: &ChatRequestEnvelope) -> Result<Option<Value>> {
        let response = self
            .client
            .post(&self.url)
            .json(envelope)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            // Failed invocations answer with an error object `{message}`.
            let message = response
                .json::<RouterErrorBody>()
                .await
                .map(|body| body.message)
                .unwrap_or_else(|_| format!("chat router returned status {status}"));
            return Err(GatewayError::Transport(message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let payload: Value = serde_json::from_slice(&bytes)?;
        if payload.is_null() {
            Ok(None)
        } else {
            Ok(Some(payload))
        }
    }
}

/// Builds the canonical envelope, performs the remote call and classifies
/// failures. The response payload passes through unvalidated; its schema is
/// the downstream consumer's responsibility.
pub struct ChatDispatcher {
    router: Arc<dyn ChatRouter>,
    notifications: NotificationSink,
    in_flight: AtomicBool,
}

impl ChatDispatcher {
    pub fn new(router: Arc<dyn ChatRouter>, notifications: NotificationSink) -> Self {
        Self {
            router,
            notifications,
            in_flight: AtomicBool::new(false),
        }
    }

    /// True while a call is outstanding. Overlapping sends are neither
    /// queued nor rejected: they run concurrently and race to clear the
    /// flag. Known limitation of the current contract.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Canonicalize and dispatch one chat submission.
    ///
    /// Every classified failure first surfaces a destructive user
    /// notification, then is returned to the caller. The notification does
    /// not substitute for the caller's own error handling.
    pub async fn send(&self, draft: ChatRequestDraft) -> Result<Value> {
        let envelope = ChatRequestEnvelope::from_draft(draft);
        tracing::info!(
            request_id = %envelope.request_id,
            conversation_id = %envelope.conversation_id,
            model = %envelope.selected_model_id,
            "Dispatching chat request"
        );

        self.in_flight.store(true, Ordering::SeqCst);
        let routed = self.router.route(&envelope).await;
        self.in_flight.store(false, Ordering::SeqCst);

        let result = match routed {
            Ok(Some(payload)) => Ok(payload),
            Ok(None) => Err(GatewayError::EmptyResponse),
            Err(e) => Err(e),
        };

        match result {
            Ok(payload) => Ok(payload),
            Err(e) => {
                tracing::error!(request_id = %envelope.request_id, "Chat dispatch failed: {e}");
                self.notifications.publish(UserNotification::destructive(
                    "Chat request failed",
                    failure_description(&e),
                ));
                Err(e)
            }
        }
    }
}

/// Notification copy comes from the remote error message where one exists.
fn failure_description(error: &GatewayError) -> String {
    match error {
        GatewayError::Transport(message) => message.clone(),
        other => other.to_string(),
    }
}
