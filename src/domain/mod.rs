//! Core data model (§3): the record types shared by every component, kept
//! free of storage or transport concerns. Each submodule corresponds to one
//! or more of spec's named entities.

mod config;
mod document;
mod mcp;
mod prompt;
mod session;
mod tool;

pub use config::{
    apply_patch, AgentConfig, ConfidenceCalculation, ConfidenceMethod, ConfidenceThresholds,
    ConfigPatch, FormulaWeights, HybridWeights, LlmConfidenceSettings, ModelSettings, RateLimits,
    SearchSettings,
};
pub use document::{Chunk, Document, ProcessingStatus, Source};
pub use mcp::{HealthStatus, McpServer};
pub use prompt::Prompt;
pub use session::{Message, MessageRole, Session};
pub use tool::{ToolCategory, ToolOrigin, ToolRecord};
