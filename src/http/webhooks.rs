//! Signed webhook ingress (§4.7, §6). Each handler does only
//! signature-verify-then-enqueue synchronously, meeting the 3-second ack
//! budget; the actual extract/embed/upsert work happens on the ingestion
//! coordinator's background workers.

use crate::error::{Error, Result};
use crate::http::AppState;
use crate::ingestion::collectors::InboundMessage;
use crate::ingestion::WebhookCollector;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct InboundMessageDto {
    external_id: String,
    #[serde(default)]
    title: String,
    content: String,
    #[serde(default)]
    metadata: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
    messages: Vec<InboundMessageDto>,
}

fn header(headers: &HeaderMap, name: &str) -> Result<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
        .ok_or_else(|| Error::auth(format!("missing {name} header")))
}

async fn dispatch(
    collector: &dyn WebhookCollector,
    coordinator: &std::sync::Arc<crate::ingestion::IngestionCoordinator>,
    headers: &HeaderMap,
    raw_body: &[u8],
) -> Result<StatusCode> {
    let timestamp = header(headers, "x-webhook-timestamp")?;
    let signature = header(headers, "x-webhook-signature")?;
    let body_str = std::str::from_utf8(raw_body).map_err(|_| Error::validation("webhook body is not valid UTF-8"))?;
    let payload: WebhookPayload = serde_json::from_str(body_str)?;
    let messages = payload
        .messages
        .into_iter()
        .map(|m| InboundMessage { external_id: m.external_id, title: m.title, content: m.content, metadata: m.metadata })
        .collect();
    collector.handle_webhook(coordinator, &timestamp, body_str, &signature, messages).await?;
    Ok(StatusCode::OK)
}

pub async fn slack(State(state): State<AppState>, headers: HeaderMap, raw_body: axum::body::Bytes) -> Result<StatusCode> {
    let collector = state.slack_collector.clone().ok_or_else(|| Error::config("slack ingestion is not configured"))?;
    dispatch(&*collector, &state.ingestion, &headers, &raw_body).await
}

pub async fn whatsapp(State(state): State<AppState>, headers: HeaderMap, raw_body: axum::body::Bytes) -> Result<StatusCode> {
    let collector = state.whatsapp_collector.clone().ok_or_else(|| Error::config("whatsapp ingestion is not configured"))?;
    dispatch(&*collector, &state.ingestion, &headers, &raw_body).await
}

/// Telegram's normal ingress path is the long-lived listener (§4.7,
/// `TelegramCollector::run_listener_supervised`); this endpoint exists for
/// vendors that also offer a webhook push mode, verified with the same
/// shared-secret HMAC scheme as Slack/WhatsApp.
struct TelegramWebhook {
    signing_secret: String,
}

#[async_trait::async_trait]
impl WebhookCollector for TelegramWebhook {
    fn source(&self) -> crate::domain::Source {
        crate::domain::Source::Telegram
    }

    fn signing_secret(&self) -> &str {
        &self.signing_secret
    }

    fn build_key(&self, message: &InboundMessage) -> String {
        message.external_id.clone()
    }
}

pub async fn telegram(State(state): State<AppState>, headers: HeaderMap, raw_body: axum::body::Bytes) -> Result<StatusCode> {
    let secret = state.telegram_signing_secret.clone().ok_or_else(|| Error::config("telegram webhook is not configured"))?;
    let collector = TelegramWebhook { signing_secret: secret.to_string() };
    dispatch(&collector, &state.ingestion, &headers, &raw_body).await
}
