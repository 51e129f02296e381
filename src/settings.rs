//! Runtime configuration loaded once from the process environment at startup
//! (§4.16). Generalizes the teacher SDK's `config::get_base_url`/`get_model`
//! (two ad-hoc env lookups with a fallback default, appropriate for a
//! quick-start SDK) into one exhaustive, fail-fast loader appropriate for a
//! service: required secrets missing at startup are a configuration error,
//! not a silent fallback to localhost.

use crate::error::{Error, Result};
use std::env;
use std::time::Duration;

/// One well-known LLM/embedding provider family. Unlike the teacher's
/// `Provider` (four local-server flavours of the same OpenAI-compatible
/// wire format), these name genuinely different APIs (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Azure,
    Google,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "azure" => Ok(ProviderKind::Azure),
            "google" => Ok(ProviderKind::Google),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub environment: String,
    pub bind_addr: String,

    pub llm_provider: ProviderKind,
    pub llm_base_url: String,
    pub llm_api_key: String,

    pub embedding_base_url: String,
    pub embedding_api_key: String,

    pub vector_store_url: String,
    pub vector_store_credentials: String,

    pub slack_signing_secret: Option<String>,
    pub whatsapp_signing_secret: Option<String>,
    pub telegram_signing_secret: Option<String>,
    pub telegram_session_token: Option<String>,

    pub pii_anonymization_enabled: bool,
    pub pii_default_strategy: String,
    pub pii_redaction_placeholder: String,
    pub pii_min_confidence_score: f64,

    pub history_message_cap: usize,
    pub history_token_cap: usize,

    pub confidence_default_method: String,
    pub error_notifier_webhook_url: Option<String>,

    pub ingestion_worker_count: usize,
    pub ingestion_queue_depth: usize,
}

impl Settings {
    /// Load settings from the process environment, failing fast if a
    /// required secret is absent. See §6 "Configuration via environment".
    pub fn from_env() -> Result<Self> {
        let required = |key: &str| -> Result<String> {
            env::var(key).map_err(|_| Error::config(format!("missing required environment variable {key}")))
        };

        let provider_str = env::var("RAG_AGENT_LLM_PROVIDER").unwrap_or_else(|_| "openai".to_string());
        let llm_provider: ProviderKind = provider_str
            .parse()
            .map_err(|e| Error::config(format!("invalid RAG_AGENT_LLM_PROVIDER: {e}")))?;

        Ok(Settings {
            environment: env::var("RAG_AGENT_ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            bind_addr: env::var("RAG_AGENT_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string()),

            llm_provider,
            llm_base_url: required("RAG_AGENT_LLM_BASE_URL")?,
            llm_api_key: required("RAG_AGENT_LLM_API_KEY")?,

            embedding_base_url: env::var("RAG_AGENT_EMBEDDING_BASE_URL")
                .unwrap_or_else(|_| required("RAG_AGENT_LLM_BASE_URL").unwrap_or_default()),
            embedding_api_key: env::var("RAG_AGENT_EMBEDDING_API_KEY")
                .unwrap_or_else(|_| env::var("RAG_AGENT_LLM_API_KEY").unwrap_or_default()),

            vector_store_url: required("RAG_AGENT_VECTOR_STORE_URL")?,
            vector_store_credentials: env::var("RAG_AGENT_VECTOR_STORE_CREDENTIALS").unwrap_or_default(),

            slack_signing_secret: env::var("RAG_AGENT_SLACK_SIGNING_SECRET").ok(),
            whatsapp_signing_secret: env::var("RAG_AGENT_WHATSAPP_SIGNING_SECRET").ok(),
            telegram_signing_secret: env::var("RAG_AGENT_TELEGRAM_SIGNING_SECRET").ok(),
            telegram_session_token: env::var("RAG_AGENT_TELEGRAM_SESSION_TOKEN").ok(),

            pii_anonymization_enabled: env::var("RAG_AGENT_PII_ENABLED")
                .map(|v| v != "false" && v != "0")
                .unwrap_or(true),
            pii_default_strategy: env::var("RAG_AGENT_PII_DEFAULT_STRATEGY").unwrap_or_else(|_| "redact".to_string()),
            pii_redaction_placeholder: env::var("RAG_AGENT_PII_PLACEHOLDER").unwrap_or_else(|_| "[REDACTED]".to_string()),
            pii_min_confidence_score: env::var("RAG_AGENT_PII_MIN_SCORE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(0.6),

            history_message_cap: env::var("RAG_AGENT_HISTORY_MESSAGE_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            history_token_cap: env::var("RAG_AGENT_HISTORY_TOKEN_CAP")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4000),

            confidence_default_method: env::var("RAG_AGENT_CONFIDENCE_METHOD").unwrap_or_else(|_| "formula".to_string()),
            error_notifier_webhook_url: env::var("RAG_AGENT_ERROR_NOTIFIER_WEBHOOK_URL").ok(),

            ingestion_worker_count: env::var("RAG_AGENT_INGESTION_WORKERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(4),
            ingestion_queue_depth: env::var("RAG_AGENT_INGESTION_QUEUE_DEPTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(256),
        })
    }

    pub fn confidence_llm_deadline(&self) -> Duration {
        Duration::from_millis(2000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_kind_parses_case_insensitively() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAi);
        assert_eq!("anthropic".parse::<ProviderKind>().unwrap(), ProviderKind::Anthropic);
        assert!("made-up".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn from_env_fails_fast_without_required_secrets() {
        // SAFETY: test-local env var isolation; these keys are specific to this crate.
        unsafe {
            env::remove_var("RAG_AGENT_LLM_BASE_URL");
            env::remove_var("RAG_AGENT_LLM_API_KEY");
            env::remove_var("RAG_AGENT_VECTOR_STORE_URL");
        }
        let result = Settings::from_env();
        assert!(result.is_err());
    }
}
