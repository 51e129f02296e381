//! Persistence substrate (§4.1a): async traits for every store the core
//! depends on, each with one in-process implementation so the crate runs
//! standalone and in tests without a live database.

pub mod audit;
pub mod config_store;
pub mod mcp_store;
pub mod session_store;
pub mod vector_store;

pub use audit::{AuditEntry, AuditLog};
pub use config_store::{ConfigStore, InMemoryConfigStore, PromptStore};
pub use mcp_store::{InMemoryMcpServerStore, McpServerStore};
pub use session_store::{HistoryWindowLimits, InMemorySessionStore, SessionListing, SessionPage, SessionStore};
pub use vector_store::{DocumentFilters, InMemoryVectorStore, Page, Paginated, ScoredChunk, VectorStore};
