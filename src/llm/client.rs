//! Embedding & LLM Clients (§4.3). Generalizes the teacher's single
//! OpenAI-compatible `client.rs`/`utils.rs` into a `LlmClient`/
//! `EmbeddingClient` trait pair with one concrete implementation, selected
//! per `AgentConfig.model_settings.provider` by `build_llm_client`.

use super::wire::*;
use crate::domain::AgentConfig;
use crate::error::{Error, Result};
use crate::retry::{retry_with_backoff_conditional, RetryConfig};
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

/// A unit of generated content, mirroring the teacher's `ContentBlock`
/// but trimmed to what this agent consumes (text and tool calls; no
/// vision/tool-result blocks, out of scope here).
#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text(String),
    ToolUse { id: String, name: String, input: serde_json::Value },
}

pub type ContentStream = Pin<Box<dyn Stream<Item = Result<ContentBlock>> + Send>>;

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct ChatOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub tools: Vec<serde_json::Value>,
    pub deadline: Duration,
}

impl Default for ChatOptions {
    fn default() -> Self {
        ChatOptions { model: "gpt-4o".to_string(), temperature: 0.2, max_tokens: None, tools: Vec::new(), deadline: Duration::from_secs(60) }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Non-streaming chat call collecting every content block (§4.3).
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<Vec<ContentBlock>>;

    /// Streaming chat call; yields text deltas as they arrive (§4.9.5, §4.11).
    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ContentStream>;
}

#[async_trait]
pub trait EmbeddingClient: Send + Sync {
    /// Batched embedding call returning vectors in input order (§4.3).
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// One concrete client for any OpenAI-compatible provider (OpenAI, Azure,
/// and local/self-hosted servers sharing the same wire format). Anthropic
/// and Google are routed through the same HTTP shape per their
/// OpenAI-compatible endpoints; a divergent wire format would need its own
/// implementation of these traits, not a change to this one.
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    embedding_model: String,
    retry: RetryConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, embedding_model: impl Into<String>) -> Self {
        OpenAiCompatibleClient {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            embedding_model: embedding_model.into(),
            retry: RetryConfig::default(),
        }
    }

    fn request(&self, messages: &[ChatMessage], options: &ChatOptions, stream: bool) -> OpenAiRequest {
        OpenAiRequest {
            model: options.model.clone(),
            messages: messages
                .iter()
                .map(|m| OpenAiMessage { role: m.role.to_string(), content: m.content.clone(), tool_calls: None, tool_call_id: None })
                .collect(),
            stream,
            max_tokens: options.max_tokens,
            temperature: Some(options.temperature),
            tools: (!options.tools.is_empty()).then(|| options.tools.clone()),
        }
    }

    async fn send_chat(&self, request: &OpenAiRequest, deadline: Duration) -> Result<reqwest::Response> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = tokio::time::timeout(
            deadline,
            self.http
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .json(request)
                .send(),
        )
        .await
        .map_err(|_| Error::timeout("chat completion deadline exceeded"))?
        .map_err(Error::Http)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if status.as_u16() == 401 || status.as_u16() == 403 {
                return Err(Error::auth(format!("provider rejected credentials: {body}")));
            }
            if status.as_u16() == 429 {
                return Err(Error::rate_limited(format!("provider rate limited: {body}")));
            }
            if status.is_client_error() {
                return Err(Error::validation(format!("provider rejected request {status}: {body}")));
            }
            return Err(Error::upstream(format!("provider error {status}: {body}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<Vec<ContentBlock>> {
        let mut stream = self.chat_stream(messages, options).await?;
        let mut blocks = Vec::new();
        while let Some(item) = stream.next().await {
            blocks.push(item?);
        }
        Ok(blocks)
    }

    async fn chat_stream(&self, messages: &[ChatMessage], options: &ChatOptions) -> Result<ContentStream> {
        let request = self.request(messages, options, true);
        let deadline = options.deadline;
        let response = retry_with_backoff_conditional(self.retry.clone(), || {
            let request = request.clone();
            async { self.send_chat(&request, deadline).await }
        })
        .await?;

        let sse_stream = parse_sse_stream(response);
        let stream = sse_stream.scan(ToolCallAggregator::new(), |aggregator, chunk_result| {
            let outcome = match chunk_result {
                Ok(chunk) => match aggregator.process_chunk(chunk) {
                    Ok(blocks) if blocks.is_empty() => Some(None),
                    Ok(blocks) => Some(Some(Ok(blocks))),
                    Err(e) => Some(Some(Err(e))),
                },
                Err(e) => Some(Some(Err(e))),
            };
            futures::future::ready(outcome)
        });

        let flattened = stream.filter_map(|item| async move { item }).flat_map(|result| {
            futures::stream::iter(match result {
                Ok(blocks) => blocks.into_iter().map(Ok).collect::<Vec<_>>(),
                Err(e) => vec![Err(e)],
            })
        });

        Ok(Box::pin(flattened))
    }
}

#[async_trait]
impl EmbeddingClient for OpenAiCompatibleClient {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/embeddings", self.base_url);
        let request = OpenAiEmbeddingRequest { model: self.embedding_model.clone(), input: texts.to_vec() };

        let response = retry_with_backoff_conditional(self.retry.clone(), || async {
            let resp = tokio::time::timeout(
                Duration::from_secs(30),
                self.http
                    .post(&url)
                    .header("Authorization", format!("Bearer {}", self.api_key))
                    .json(&request)
                    .send(),
            )
            .await
            .map_err(|_| Error::timeout("embedding deadline exceeded"))?
            .map_err(Error::Http)?;

            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(Error::upstream(format!("embedding provider error {status}: {body}")));
            }
            Ok(resp)
        })
        .await?;

        let parsed: OpenAiEmbeddingResponse = response.json().await.map_err(Error::Http)?;
        let mut ordered: Vec<Vec<f32>> = vec![Vec::new(); texts.len()];
        for item in parsed.data {
            if item.index < ordered.len() {
                ordered[item.index] = item.embedding;
            }
        }
        Ok(ordered)
    }
}

/// Selects a concrete client per `AgentConfig.model_settings.provider`
/// (§4.3). Every provider in the accepted set currently routes through the
/// same OpenAI-compatible shape; a provider with a genuinely different
/// wire format would add a new `LlmClient` impl here, not change this
/// factory's signature.
pub fn build_llm_client(
    config: &AgentConfig,
    base_url: &str,
    api_key: &str,
    embedding_model: &str,
) -> Arc<dyn LlmClient> {
    let _ = &config.model_settings.provider;
    Arc::new(OpenAiCompatibleClient::new(base_url, api_key, embedding_model))
}

pub fn build_embedding_client(base_url: &str, api_key: &str, embedding_model: &str) -> Arc<dyn EmbeddingClient> {
    Arc::new(OpenAiCompatibleClient::new(base_url, api_key, embedding_model))
}

// --- SSE parsing and tool-call aggregation, carried over from the
// teacher's utils.rs (§4.3, §4.9.5): identical wire format, so identical
// accumulation logic.

struct PartialToolCall {
    id: Option<String>,
    name: Option<String>,
    arguments: String,
}

impl Default for PartialToolCall {
    fn default() -> Self {
        PartialToolCall { id: None, name: None, arguments: String::new() }
    }
}

struct ToolCallAggregator {
    text_buffer: String,
    tool_calls: HashMap<u32, PartialToolCall>,
}

impl ToolCallAggregator {
    fn new() -> Self {
        ToolCallAggregator { text_buffer: String::new(), tool_calls: HashMap::new() }
    }

    fn process_chunk(&mut self, chunk: OpenAiChunk) -> Result<Vec<ContentBlock>> {
        let mut blocks = Vec::new();
        for choice in chunk.choices {
            if let Some(content) = choice.delta.content {
                self.text_buffer.push_str(&content);
            }

            if let Some(tool_calls) = choice.delta.tool_calls {
                for tool_call in tool_calls {
                    let entry = self.tool_calls.entry(tool_call.index).or_default();
                    if let Some(id) = tool_call.id {
                        entry.id = Some(id);
                    }
                    if let Some(function) = tool_call.function {
                        if let Some(name) = function.name {
                            entry.name = Some(name);
                        }
                        if let Some(args) = function.arguments {
                            entry.arguments.push_str(&args);
                        }
                    }
                }
            }

            if choice.finish_reason.is_some() {
                if !self.text_buffer.is_empty() {
                    blocks.push(ContentBlock::Text(std::mem::take(&mut self.text_buffer)));
                }
                for (_, partial) in self.tool_calls.drain() {
                    if let (Some(id), Some(name)) = (partial.id, partial.name) {
                        let input: serde_json::Value = if partial.arguments.is_empty() {
                            serde_json::json!({})
                        } else {
                            serde_json::from_str(&partial.arguments)
                                .map_err(|e| Error::upstream(format!("failed to parse tool arguments: {e}")))?
                        };
                        blocks.push(ContentBlock::ToolUse { id, name, input });
                    }
                }
            }
        }
        Ok(blocks)
    }
}

fn parse_sse_stream(body: reqwest::Response) -> Pin<Box<dyn Stream<Item = Result<OpenAiChunk>> + Send>> {
    let stream = body.bytes_stream().filter_map(move |result| async move {
        let bytes = match result.map_err(Error::Http) {
            Ok(b) => b,
            Err(e) => return Some(Err(e)),
        };
        let text = String::from_utf8_lossy(&bytes);
        for line in text.lines() {
            if let Some(data) = line.strip_prefix("data: ") {
                if data == "[DONE]" {
                    continue;
                }
                let chunk: OpenAiChunk = match serde_json::from_str(data) {
                    Ok(c) => c,
                    Err(e) => return Some(Err(Error::upstream(format!("failed to parse stream chunk: {e}")))),
                };
                return Some(Ok(chunk));
            }
        }
        None
    });
    Box::pin(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aggregator_emits_text_on_finish() {
        let mut aggregator = ToolCallAggregator::new();
        let chunk = OpenAiChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![OpenAiChoice {
                index: 0,
                delta: OpenAiDelta { role: None, content: Some("Hello".into()), tool_calls: None },
                finish_reason: None,
            }],
        };
        assert!(aggregator.process_chunk(chunk).unwrap().is_empty());

        let chunk2 = OpenAiChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![OpenAiChoice {
                index: 0,
                delta: OpenAiDelta { role: None, content: Some(" world".into()), tool_calls: None },
                finish_reason: Some("stop".into()),
            }],
        };
        let blocks = aggregator.process_chunk(chunk2).unwrap();
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::Text(text) => assert_eq!(text, "Hello world"),
            _ => panic!("expected text block"),
        }
    }

    #[test]
    fn aggregator_assembles_tool_call_across_chunks() {
        let mut aggregator = ToolCallAggregator::new();
        let chunk = OpenAiChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![OpenAiChoice {
                index: 0,
                delta: OpenAiDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAiToolCallDelta {
                        index: 0,
                        id: Some("call_1".into()),
                        call_type: Some("function".into()),
                        function: Some(OpenAiFunctionDelta { name: Some("search".into()), arguments: Some("{\"q\":".into()) }),
                    }]),
                },
                finish_reason: None,
            }],
        };
        aggregator.process_chunk(chunk).unwrap();

        let chunk2 = OpenAiChunk {
            id: "1".into(),
            object: "chat.completion.chunk".into(),
            created: 0,
            model: "m".into(),
            choices: vec![OpenAiChoice {
                index: 0,
                delta: OpenAiDelta {
                    role: None,
                    content: None,
                    tool_calls: Some(vec![OpenAiToolCallDelta {
                        index: 0,
                        id: None,
                        call_type: None,
                        function: Some(OpenAiFunctionDelta { name: None, arguments: Some("\"rust\"}".into()) }),
                    }]),
                },
                finish_reason: Some("tool_calls".into()),
            }],
        };
        let blocks = aggregator.process_chunk(chunk2).unwrap();
        assert_eq!(blocks.len(), 1);
        match &blocks[0] {
            ContentBlock::ToolUse { id, name, input } => {
                assert_eq!(id, "call_1");
                assert_eq!(name, "search");
                assert_eq!(input["q"], "rust");
            }
            _ => panic!("expected tool use block"),
        }
    }
}
