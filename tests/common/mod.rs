//! Shared test support: a scripted model client and a handful of tools

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use ergon::llm::{LlmStream, ModelClient, StreamChunk, ToolCallDelta};
use ergon::{
    AssistantTurn, CompletionRequest, FinishReason, LlmError, LlmResult, Tool, ToolCallRequest,
    ToolOutput, UsageStats,
};

/// Model client that replays a fixed sequence of assistant turns
pub struct ScriptedClient {
    turns: Mutex<VecDeque<AssistantTurn>>,
}

impl ScriptedClient {
    pub fn new(turns: Vec<AssistantTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }

    fn next_turn(&self) -> LlmResult<AssistantTurn> {
        self.turns
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::InvalidRequest("script exhausted".to_string()))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "scripted-1"
    }

    async fn generate(&self, _request: CompletionRequest) -> LlmResult<AssistantTurn> {
        self.next_turn()
    }

    fn generate_stream(&self, _request: CompletionRequest) -> LlmStream {
        let (sender, stream) = LlmStream::channel(16);
        let turn = self.next_turn();

        tokio::spawn(async move {
            let turn = match turn {
                Ok(turn) => turn,
                Err(err) => {
                    let _ = sender.send_error(err).await;
                    return;
                }
            };

            // Split the text into two deltas to exercise accumulation.
            if let Some(content) = &turn.content {
                let mid = content.len() / 2;
                let (head, tail) = content.split_at(mid);
                if !head.is_empty() {
                    let _ = sender.send(StreamChunk::text(head)).await;
                }
                if !tail.is_empty() {
                    let _ = sender.send(StreamChunk::text(tail)).await;
                }
            }

            for (index, call) in turn.tool_calls.iter().enumerate() {
                let _ = sender.send(StreamChunk::tool_call(to_delta(index, call))).await;
            }

            let _ = sender
                .send(StreamChunk::finish(turn.finish_reason, turn.usage))
                .await;
        });

        stream
    }
}

fn to_delta(index: usize, call: &ToolCallRequest) -> ToolCallDelta {
    match call {
        ToolCallRequest::Function { id, function } => {
            let mut delta = ToolCallDelta::new(index)
                .with_name(&function.name)
                .with_arguments(&function.arguments);
            if let Some(id) = id {
                delta = delta.with_id(id);
            }
            delta
        }
        ToolCallRequest::Mcp { name, input } => ToolCallDelta::new(index)
            .with_name(name)
            .with_arguments(input.to_string()),
        ToolCallRequest::Canonical(call) => {
            let mut delta = ToolCallDelta::new(index)
                .with_name(&call.name)
                .with_arguments(call.arguments.to_string());
            if let Some(id) = &call.id {
                delta = delta.with_id(id);
            }
            delta
        }
    }
}

/// A final text answer
pub fn text_turn(content: &str) -> AssistantTurn {
    AssistantTurn {
        content: Some(content.to_string()),
        tool_calls: Vec::new(),
        usage: Some(UsageStats {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        }),
        finish_reason: FinishReason::Stop,
    }
}

/// A turn requesting the given tool calls
pub fn tool_turn(content: Option<&str>, calls: Vec<ToolCallRequest>) -> AssistantTurn {
    AssistantTurn {
        content: content.map(str::to_string),
        tool_calls: calls,
        usage: Some(UsageStats {
            prompt_tokens: 20,
            completion_tokens: 8,
            total_tokens: 28,
        }),
        finish_reason: FinishReason::ToolCalls,
    }
}

/// Adds two integers
pub struct AddTool;

#[async_trait]
impl Tool for AddTool {
    fn name(&self) -> &str {
        "add"
    }

    fn description(&self) -> &str {
        "Adds two integers and returns their sum."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "a": {"type": "integer"},
                "b": {"type": "integer"}
            },
            "required": ["a", "b"]
        })
    }

    async fn execute(&self, arguments: Value) -> anyhow::Result<ToolOutput> {
        let a = arguments.get("a").and_then(Value::as_i64).unwrap_or(0);
        let b = arguments.get("b").and_then(Value::as_i64).unwrap_or(0);
        Ok(ToolOutput::json(&json!({"sum": a + b})))
    }
}

/// Always returns an execution error
pub struct FailTool;

#[async_trait]
impl Tool for FailTool {
    fn name(&self) -> &str {
        "boom"
    }

    fn description(&self) -> &str {
        "Fails every time."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _arguments: Value) -> anyhow::Result<ToolOutput> {
        Err(anyhow::anyhow!("exploded"))
    }
}

/// Sleeps for `sleep_ms`, then returns `label`
pub struct SleepEchoTool;

#[async_trait]
impl Tool for SleepEchoTool {
    fn name(&self) -> &str {
        "sleep_echo"
    }

    fn description(&self) -> &str {
        "Waits the given number of milliseconds, then returns the label."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "label": {"type": "string"},
                "sleep_ms": {"type": "integer"}
            },
            "required": ["label"]
        })
    }

    async fn execute(&self, arguments: Value) -> anyhow::Result<ToolOutput> {
        let sleep_ms = arguments.get("sleep_ms").and_then(Value::as_u64).unwrap_or(0);
        let label = arguments
            .get("label")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        tokio::time::sleep(Duration::from_millis(sleep_ms)).await;
        Ok(ToolOutput::text(label))
    }
}

/// Cancels the given token when executed
pub struct CancelTool {
    pub token: tokio_util::sync::CancellationToken,
}

#[async_trait]
impl Tool for CancelTool {
    fn name(&self) -> &str {
        "pull_plug"
    }

    fn description(&self) -> &str {
        "Signals cancellation."
    }

    fn input_schema(&self) -> Value {
        json!({"type": "object", "properties": {}, "required": []})
    }

    async fn execute(&self, _arguments: Value) -> anyhow::Result<ToolOutput> {
        self.token.cancel();
        Ok(ToolOutput::text("cancelled"))
    }
}
