//! Agent Graph (§4.9) — the central component. `state.rs` carries the
//! per-request `AgentState`/`GraphNode`; `confidence.rs` the three
//! confidence methods; `graph.rs` the transition functions and driver loop.

pub mod confidence;
pub mod graph;
pub mod state;

pub use confidence::{ConfidenceBreakdown, ConfidenceResult, FormulaBreakdown, HybridBreakdown, LlmBreakdown};
pub use graph::{AgentDeps, AgentResponse, SourceView, run_graph};
pub use state::{AgentState, GraphNode, QueryAnalysis, QueryType, SourceEntry, Strategy, ToolCallRequest, ToolCallResult, Urgency};
