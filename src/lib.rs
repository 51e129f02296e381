//! # Finance Ops Retrieval Agent
//!
//! A retrieval-augmented question-answering agent for finance and payment
//! operations. Chat, document, and admin-upload traffic from Slack,
//! WhatsApp, Telegram, and direct upload is ingested, anonymized, chunked,
//! embedded, and indexed into a vector store; incoming questions are
//! answered by a multi-step agent graph combining hybrid retrieval, tool
//! calling, LLM generation, and a self-scored confidence estimate that
//! drives escalation to a human.
//!
//! ## Architecture
//!
//! - **domain**: core record types (documents, chunks, sessions, config,
//!   prompts, tools, MCP servers) shared by every other module.
//! - **store**: async persistence traits plus in-process implementations
//!   for the vector store, session store, config/prompt store, MCP server
//!   registry, and audit log.
//! - **ingestion**: per-source collectors (Slack, WhatsApp, Telegram,
//!   admin upload) and the coordinator that runs the
//!   extract/anonymize/chunk/embed/upsert pipeline.
//! - **pii**: regex-based PII detection and redaction applied before any
//!   content is embedded or stored.
//! - **chunker**: token-aware document chunking.
//! - **llm**: OpenAI-compatible chat/embedding clients, SSE streaming, and
//!   tool-call aggregation.
//! - **tools**: the callable tool registry (built-in and MCP-discovered).
//! - **agent**: the query-answering graph — retrieval, generation,
//!   confidence scoring, and escalation.
//! - **token_budget**: conversation history truncation to fit context
//!   windows.
//! - **http**: the `/api/v1` HTTP surface binding every external endpoint
//!   to the agent core.
//! - **notifier**: best-effort operational alerting (escalations, store
//!   failures) delivered to an external webhook.
//! - **observability**: structured logging setup.
//! - **settings**: environment-driven configuration for the running
//!   process.
//! - **error**: the crate-wide `Error` enum and `Result` alias.

pub mod agent;
pub mod chunker;
pub mod domain;
pub mod error;
pub mod http;
pub mod ingestion;
pub mod llm;
pub mod notifier;
pub mod observability;
pub mod pii;
pub mod retry;
pub mod settings;
pub mod store;
pub mod token_budget;
pub mod tools;

pub use error::{Error, Result};
pub use settings::Settings;

/// Convenience module for the most commonly used types across the crate.
/// Import with `use rag_finance_agent::prelude::*;`.
pub mod prelude {
    pub use crate::agent::{AgentDeps, AgentResponse};
    pub use crate::domain::{AgentConfig, Document, Message, Session, Source};
    pub use crate::error::{Error, Result};
    pub use crate::settings::Settings;
}
