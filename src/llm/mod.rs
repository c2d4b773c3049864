//! Model client abstraction
//!
//! A model client translates between the engine's canonical messages and one
//! provider's wire format. The engine never sees provider shapes; tool-call
//! requests come back in whatever shape the provider emitted and are
//! normalized by the single parser in `domain::tool_call`.

mod openai;
mod stream;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use stream::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{FinishReason, Message, ToolCallRequest, UsageStats};
use crate::error::LlmResult;
use crate::token::TokenCounter;
use crate::tools::ToolDefinition;

/// Trait for LLM providers
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Provider name
    fn name(&self) -> &str;

    /// Model identifier in use
    fn model(&self) -> &str;

    /// One completion: canonical messages in, one assistant turn out
    async fn generate(&self, request: CompletionRequest) -> LlmResult<AssistantTurn>;

    /// Streamed completion yielding incremental deltas; the terminal chunk
    /// carries finish reason and usage. Consumers must drain the stream.
    fn generate_stream(&self, request: CompletionRequest) -> LlmStream;

    /// Approximate token count for a message sequence (±5% of the
    /// provider-reported count is acceptable)
    fn count_tokens(&self, messages: &[Message]) -> u32 {
        let counter = TokenCounter::new();
        counter.count_messages(messages)
    }
}

/// Request for a model completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionRequest {
    /// Conversation so far, canonical form
    pub messages: Vec<Message>,
    /// Model override
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Tools available for calling
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,
    /// Tool choice mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<ToolChoice>,
    /// Whether to stream the response
    #[serde(default)]
    pub stream: bool,
}

/// Tool choice mode
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    /// Let the model decide
    #[default]
    Auto,
    /// Don't use tools
    None,
    /// Must use a tool
    Required,
    /// Use a specific tool
    Tool { name: String },
}

/// One assistant turn, normalized from the provider response
#[derive(Debug, Clone)]
pub struct AssistantTurn {
    /// Textual content, if any
    pub content: Option<String>,
    /// Tool-call requests in the order the model emitted them
    pub tool_calls: Vec<ToolCallRequest>,
    /// Token usage for this call
    pub usage: Option<UsageStats>,
    /// Why the turn ended
    pub finish_reason: FinishReason,
}

impl AssistantTurn {
    /// Build the assistant message to append to memory
    pub fn to_message(&self) -> Message {
        Message::assistant(
            self.content.clone(),
            self.tool_calls.clone(),
            self.usage,
            Some(self.finish_reason),
        )
    }
}
