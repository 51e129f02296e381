//! Error Notifier (§4.12, §4.17). A process-wide handle wraps an
//! `mpsc::UnboundedSender<Alert>`; a single background task drains the
//! receiver and POSTs each alert to an external chat-transport webhook via
//! `reqwest` (the same client type the LLM client already depends on,
//! per §4.17). Dispatch never blocks a caller and a failure to deliver is
//! only ever logged locally.

use crate::retry::{retry_with_backoff_conditional, RetryConfig};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::error;

/// A structured fault report (§4.12): environment, timestamp, truncated
/// error type/message, request context, truncated stack context.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub environment: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub error_type: String,
    pub message: String,
    pub method: Option<String>,
    pub path: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
    pub context: String,
}

const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_CONTEXT_CHARS: usize = 4000;

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    text.chars().take(max_chars).collect::<String>() + "…"
}

impl Alert {
    pub fn new(environment: impl Into<String>, error_type: impl Into<String>, message: impl Into<String>) -> Self {
        Alert {
            environment: environment.into(),
            timestamp: chrono::Utc::now(),
            error_type: error_type.into(),
            message: truncate(&message.into(), MAX_MESSAGE_CHARS),
            method: None,
            path: None,
            user_id: None,
            session_id: None,
            context: String::new(),
        }
    }

    pub fn with_request(mut self, method: impl Into<String>, path: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self.path = Some(path.into());
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = truncate(&context.into(), MAX_CONTEXT_CHARS);
        self
    }
}

/// Process-wide handle, constructed once at startup and cloned into
/// handlers/workers (§9 "no package-level mutable globals").
#[derive(Clone)]
pub struct Notifier {
    sender: mpsc::UnboundedSender<Alert>,
}

impl Notifier {
    /// Spawn the background dispatcher and return the handle. `webhook_url`
    /// is `None` when no sink is configured: alerts are still logged
    /// locally via `tracing::error!`, just never POSTed anywhere.
    pub fn spawn(webhook_url: Option<String>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Alert>();

        tokio::spawn(async move {
            let client = reqwest::Client::new();
            while let Some(alert) = receiver.recv().await {
                error!(
                    environment = %alert.environment,
                    error_type = %alert.error_type,
                    message = %alert.message,
                    "error notifier: local signal"
                );

                let Some(url) = webhook_url.as_deref() else { continue };

                let config = RetryConfig::new().with_max_attempts(2);
                let outcome = retry_with_backoff_conditional(config, || async {
                    client
                        .post(url)
                        .json(&alert)
                        .timeout(Duration::from_secs(5))
                        .send()
                        .await
                        .map_err(crate::error::Error::from)?
                        .error_for_status()
                        .map_err(crate::error::Error::from)?;
                    Ok(())
                })
                .await;

                if let Err(err) = outcome {
                    error!(error = %err, "error notifier: failed to deliver alert to webhook sink");
                }
            }
        });

        Notifier { sender }
    }

    /// Enqueue an alert for dispatch. Never blocks; a full/closed channel
    /// only ever produces a local log line, never a propagated error.
    pub fn notify(&self, alert: Alert) {
        if self.sender.send(alert).is_err() {
            error!("error notifier: dispatcher channel closed, alert dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_message_is_truncated() {
        let alert = Alert::new("production", "InternalError", "x".repeat(3000));
        assert!(alert.message.chars().count() <= MAX_MESSAGE_CHARS + 1);
    }

    #[tokio::test]
    async fn notify_without_webhook_does_not_panic() {
        let notifier = Notifier::spawn(None);
        notifier.notify(Alert::new("test", "InternalError", "boom").with_request("POST", "/api/v1/chat"));
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
