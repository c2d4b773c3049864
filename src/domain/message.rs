//! Conversation message model
//!
//! Every message is an immutable envelope (id, UTC timestamp, metadata)
//! around a role-tagged body. Two serialized forms exist: the storage form
//! (full serde round-trip of `Message`, used for checkpointing) and the wire
//! form (the shape a function-calling provider accepts, produced by
//! `to_wire` and ingested by `from_wire`).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use super::content::{flatten_blocks, ContentBlock};
use super::tool_call::{generate_call_id, ToolCallRequest};
use crate::domain::result::UsageStats;
use crate::error::{AgentError, AgentResult};

/// Why the model ended its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural stop
    Stop,
    /// Hit the output token limit
    Length,
    /// Tool calls requested
    ToolCalls,
    /// Content filtered by the provider
    ContentFilter,
}

/// A message in the conversation log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message identifier
    pub id: String,
    /// Creation timestamp, UTC
    pub created_at: DateTime<Utc>,
    /// Free-form metadata
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, Value>,
    /// Role-discriminated payload
    #[serde(flatten)]
    pub body: MessageBody,
}

/// Message payload, discriminated by role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum MessageBody {
    /// Instructions set once at the start of a conversation
    System { content: String },
    /// User input, possibly multimodal
    User {
        content: Vec<ContentBlock>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// The model's turn
    Assistant {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        tool_calls: Vec<ToolCallRequest>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        usage: Option<UsageStats>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        finish_reason: Option<FinishReason>,
    },
    /// A standalone tool invocation request
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    /// Result of executing a tool call
    ToolResult {
        call_id: String,
        content: Vec<ContentBlock>,
        #[serde(default)]
        is_error: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
}

impl Message {
    fn envelope(body: MessageBody) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            metadata: HashMap::new(),
            body,
        }
    }

    /// Create a system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::envelope(MessageBody::System {
            content: content.into(),
        })
    }

    /// Create a text user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::envelope(MessageBody::User {
            content: vec![ContentBlock::text(content)],
            name: None,
        })
    }

    /// Create a multimodal user message
    pub fn user_with_parts(content: Vec<ContentBlock>) -> Self {
        Self::envelope(MessageBody::User {
            content,
            name: None,
        })
    }

    /// Create an assistant message
    pub fn assistant(
        content: Option<String>,
        tool_calls: Vec<ToolCallRequest>,
        usage: Option<UsageStats>,
        finish_reason: Option<FinishReason>,
    ) -> Self {
        Self::envelope(MessageBody::Assistant {
            content,
            tool_calls,
            usage,
            finish_reason,
        })
    }

    /// Create a tool result message
    pub fn tool_result(
        call_id: impl Into<String>,
        content: Vec<ContentBlock>,
        is_error: bool,
        name: Option<String>,
    ) -> Self {
        Self::envelope(MessageBody::ToolResult {
            call_id: call_id.into(),
            content,
            is_error,
            name,
        })
    }

    /// The message role as a static string
    pub fn role(&self) -> &'static str {
        match &self.body {
            MessageBody::System { .. } => "system",
            MessageBody::User { .. } => "user",
            MessageBody::Assistant { .. } => "assistant",
            MessageBody::ToolCall { .. } => "tool_call",
            MessageBody::ToolResult { .. } => "tool_result",
        }
    }

    /// Plain-text rendering of the message content
    pub fn text(&self) -> String {
        match &self.body {
            MessageBody::System { content } => content.clone(),
            MessageBody::User { content, .. } => flatten_blocks(content),
            MessageBody::Assistant { content, .. } => content.clone().unwrap_or_default(),
            MessageBody::ToolCall { name, arguments, .. } => {
                format!("{}({})", name, arguments)
            }
            MessageBody::ToolResult { content, .. } => flatten_blocks(content),
        }
    }

    /// Convert to the function-calling wire form.
    ///
    /// Lossy: ids, timestamps, and metadata do not travel; tool-result
    /// content flattens to text the way providers expect.
    pub fn to_wire(&self) -> Value {
        match &self.body {
            MessageBody::System { content } => json!({
                "role": "system",
                "content": content,
            }),
            MessageBody::User { content, name } => {
                let mut msg = json!({
                    "role": "user",
                    "content": wire_user_content(content),
                });
                if let Some(name) = name {
                    msg["name"] = json!(name);
                }
                msg
            }
            MessageBody::Assistant {
                content,
                tool_calls,
                ..
            } => {
                let mut msg = json!({
                    "role": "assistant",
                    "content": content,
                });
                if !tool_calls.is_empty() {
                    msg["tool_calls"] = Value::Array(
                        tool_calls.iter().map(wire_tool_call).collect(),
                    );
                }
                msg
            }
            MessageBody::ToolCall {
                call_id,
                name,
                arguments,
            } => json!({
                "id": call_id,
                "type": "function",
                "function": {
                    "name": name,
                    "arguments": arguments.to_string(),
                },
            }),
            MessageBody::ToolResult {
                call_id, content, ..
            } => json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": flatten_blocks(content),
            }),
        }
    }

    /// Ingest a wire-form message, generating identity and timestamp.
    ///
    /// Fails with `AgentError::MessageDecode` on anything malformed; a run
    /// controller must not continue past a decode failure.
    pub fn from_wire(value: &Value) -> AgentResult<Self> {
        let role = value
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| AgentError::MessageDecode("missing role".to_string()))?;

        match role {
            "system" => {
                let content = value
                    .get("content")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AgentError::MessageDecode("system message without text content".to_string())
                    })?;
                Ok(Message::system(content))
            }
            "user" => {
                let content = value.get("content").ok_or_else(|| {
                    AgentError::MessageDecode("user message without content".to_string())
                })?;
                Ok(Message::user_with_parts(wire_content_blocks(content)?))
            }
            "assistant" => {
                let content = match value.get("content") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(text)) => Some(text.clone()),
                    Some(other) => {
                        return Err(AgentError::MessageDecode(format!(
                            "assistant content must be text, got {}",
                            other
                        )))
                    }
                };
                let tool_calls = match value.get("tool_calls") {
                    None | Some(Value::Null) => Vec::new(),
                    Some(calls) => serde_json::from_value(calls.clone()).map_err(|err| {
                        AgentError::MessageDecode(format!("bad tool_calls: {}", err))
                    })?,
                };
                Ok(Message::assistant(content, tool_calls, None, None))
            }
            "tool" | "tool_result" => {
                let call_id = value
                    .get("tool_call_id")
                    .or_else(|| value.get("call_id"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        AgentError::MessageDecode("tool result without call id".to_string())
                    })?;
                let content = value.get("content").ok_or_else(|| {
                    AgentError::MessageDecode("tool result without content".to_string())
                })?;
                let is_error = value
                    .get("is_error")
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                Ok(Message::tool_result(
                    call_id,
                    wire_content_blocks(content)?,
                    is_error,
                    None,
                ))
            }
            other => Err(AgentError::MessageDecode(format!(
                "unknown role: {}",
                other
            ))),
        }
    }
}

fn wire_user_content(blocks: &[ContentBlock]) -> Value {
    match blocks {
        [ContentBlock::Text { text }] => Value::String(text.clone()),
        _ => serde_json::to_value(blocks).unwrap_or(Value::Null),
    }
}

fn wire_tool_call(request: &ToolCallRequest) -> Value {
    match request {
        ToolCallRequest::Function { id, function } => json!({
            "id": id.clone().unwrap_or_else(generate_call_id),
            "type": "function",
            "function": {
                "name": function.name,
                "arguments": function.arguments,
            },
        }),
        ToolCallRequest::Mcp { name, input } => json!({
            "id": generate_call_id(),
            "type": "function",
            "function": {
                "name": name,
                "arguments": input.to_string(),
            },
        }),
        ToolCallRequest::Canonical(call) => json!({
            "id": call.id.clone().unwrap_or_else(generate_call_id),
            "type": "function",
            "function": {
                "name": call.name,
                "arguments": call.arguments.to_string(),
            },
        }),
    }
}

fn wire_content_blocks(content: &Value) -> AgentResult<Vec<ContentBlock>> {
    match content {
        Value::String(text) => Ok(vec![ContentBlock::text(text.clone())]),
        Value::Array(_) => serde_json::from_value(content.clone())
            .map_err(|err| AgentError::MessageDecode(format!("bad content blocks: {}", err))),
        other => Err(AgentError::MessageDecode(format!(
            "content must be text or a block array, got {}",
            other
        ))),
    }
}
