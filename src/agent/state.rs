//! `AgentState` and the `GraphNode` enum (§4.9, §4.9.9). One `AgentState` is
//! created per chat request and threaded through every transition function.

use crate::agent::confidence::ConfidenceBreakdown;
use crate::domain::{ConfidenceMethod, MessageRole};
use crate::store::ScoredChunk;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphNode {
    AnalyseQuery,
    Route,
    InvokeTools,
    RetrieveContext,
    DirectResponse,
    Generate,
    ComputeConfidence,
    Decide,
    FormatOutput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    DirectQuestion,
    Calculation,
    MultiPart,
    ClarificationNeeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    StandardRag,
    InvokeTools,
    DirectEscalation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    High,
    Medium,
    Low,
}

/// Output of `analyse_query` (§4.9.1). Falls back to this exact shape
/// (`DirectQuestion`/`StandardRag`/`Medium`/no topics) on any parse failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryAnalysis {
    pub query_type: QueryType,
    pub strategy: Strategy,
    pub urgency: Urgency,
    pub topics: Vec<String>,
    pub reasoning: String,
}

impl Default for QueryAnalysis {
    fn default() -> Self {
        QueryAnalysis {
            query_type: QueryType::DirectQuestion,
            strategy: Strategy::StandardRag,
            urgency: Urgency::Medium,
            topics: Vec::new(),
            reasoning: String::new(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

#[derive(Debug, Clone)]
pub struct ToolCallResult {
    pub id: String,
    pub name: String,
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// One retrieved chunk as surfaced in the final response payload (§4.9.8).
#[derive(Debug, Clone, Serialize)]
pub struct SourceEntry {
    pub content: String,
    pub source: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub metadata: serde_json::Value,
    pub similarity_score: f64,
}

pub struct AgentState {
    pub node: GraphNode,

    pub query: String,
    pub session_id: String,
    pub user_id: Uuid,
    pub conversation_history: Vec<(MessageRole, String)>,

    pub analysis: QueryAnalysis,

    pub tool_calls: Vec<ToolCallRequest>,
    pub tool_results: Vec<ToolCallResult>,

    pub context_chunks: Vec<ScoredChunk>,
    pub context_text: String,

    pub response: String,

    pub confidence_score: f64,
    pub confidence_method: ConfidenceMethod,
    pub confidence_breakdown: Option<ConfidenceBreakdown>,

    pub escalated: bool,
    pub escalation_reason: Option<String>,

    pub sources_used: Vec<SourceEntry>,
    pub prompt_versions_used: HashMap<String, u32>,
}

impl AgentState {
    pub fn new(query: impl Into<String>, session_id: impl Into<String>, user_id: Uuid, conversation_history: Vec<(MessageRole, String)>) -> Self {
        AgentState {
            node: GraphNode::AnalyseQuery,
            query: query.into(),
            session_id: session_id.into(),
            user_id,
            conversation_history,
            analysis: QueryAnalysis::default(),
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            context_chunks: Vec::new(),
            context_text: String::new(),
            response: String::new(),
            confidence_score: 0.0,
            confidence_method: ConfidenceMethod::Formula,
            confidence_breakdown: None,
            escalated: false,
            escalation_reason: None,
            sources_used: Vec::new(),
            prompt_versions_used: HashMap::new(),
        }
    }
}
