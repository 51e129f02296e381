//! Embedding & LLM Clients (§4.3): a provider-agnostic capability trait
//! pair plus one OpenAI-compatible implementation and wire types.

pub mod client;
pub mod wire;

pub use client::{
    build_embedding_client, build_llm_client, ChatMessage, ChatOptions, ContentBlock, ContentStream,
    EmbeddingClient, LlmClient, OpenAiCompatibleClient,
};
