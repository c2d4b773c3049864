//! Streaming types for model responses

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::domain::{FinishReason, ToolCallRequest, UsageStats};
use crate::error::LlmError;

/// A chunk of streamed model response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Delta text being generated
    #[serde(default)]
    pub content: String,
    /// Tool-call fragments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallDelta>,
    /// Finish reason, present only on the terminal chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
    /// Token usage, present only on the terminal chunk
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
}

impl StreamChunk {
    /// A text content chunk
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
            finish_reason: None,
            usage: None,
        }
    }

    /// A tool-call fragment chunk
    pub fn tool_call(delta: ToolCallDelta) -> Self {
        Self {
            content: String::new(),
            tool_calls: vec![delta],
            finish_reason: None,
            usage: None,
        }
    }

    /// The terminal chunk
    pub fn finish(reason: FinishReason, usage: Option<UsageStats>) -> Self {
        Self {
            content: String::new(),
            tool_calls: Vec::new(),
            finish_reason: Some(reason),
            usage,
        }
    }

    /// Whether this is the terminal chunk
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Partial update for one tool call in a streamed response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallDelta {
    /// Index of the tool call being updated
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Argument JSON fragment; fragments concatenate across deltas
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallDelta {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            id: None,
            name: None,
            arguments: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_arguments(mut self, args: impl Into<String>) -> Self {
        self.arguments = Some(args.into());
        self
    }
}

/// Rebuilds complete tool calls from streamed fragments
///
/// The accumulated calls come out as function-shaped requests with the raw
/// argument string untouched, so argument decoding stays in the one
/// normalizer and malformed JSON is caught there.
#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    builders: Vec<ToolCallBuilder>,
}

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fragment
    pub fn apply_delta(&mut self, delta: &ToolCallDelta) {
        while self.builders.len() <= delta.index {
            self.builders.push(ToolCallBuilder::default());
        }
        let builder = &mut self.builders[delta.index];
        if let Some(id) = &delta.id {
            builder.id.push_str(id);
        }
        if let Some(name) = &delta.name {
            builder.name.push_str(name);
        }
        if let Some(args) = &delta.arguments {
            builder.arguments.push_str(args);
        }
    }

    /// Finalize into tool-call requests, model order preserved
    pub fn build(self) -> Vec<ToolCallRequest> {
        self.builders
            .into_iter()
            .filter(|b| !b.name.is_empty())
            .map(|b| {
                ToolCallRequest::function(
                    if b.id.is_empty() { None } else { Some(b.id) },
                    b.name,
                    b.arguments,
                )
            })
            .collect()
    }

    /// Whether any fragments have arrived
    pub fn has_tool_calls(&self) -> bool {
        !self.builders.is_empty()
    }
}

/// Streamed response from a model client
pub struct LlmStream {
    receiver: mpsc::Receiver<Result<StreamChunk, LlmError>>,
}

impl LlmStream {
    /// Create a channel pair for building a stream
    pub fn channel(buffer: usize) -> (LlmStreamSender, Self) {
        let (tx, rx) = mpsc::channel(buffer);
        (LlmStreamSender { sender: tx }, Self { receiver: rx })
    }
}

impl Stream for LlmStream {
    type Item = Result<StreamChunk, LlmError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.receiver).poll_recv(cx)
    }
}

/// Sender half for building a model stream
#[derive(Clone)]
pub struct LlmStreamSender {
    sender: mpsc::Sender<Result<StreamChunk, LlmError>>,
}

impl LlmStreamSender {
    /// Send a chunk
    pub async fn send(
        &self,
        chunk: StreamChunk,
    ) -> Result<(), mpsc::error::SendError<Result<StreamChunk, LlmError>>> {
        self.sender.send(Ok(chunk)).await
    }

    /// Send an error
    pub async fn send_error(
        &self,
        error: LlmError,
    ) -> Result<(), mpsc::error::SendError<Result<StreamChunk, LlmError>>> {
        self.sender.send(Err(error)).await
    }

    /// Check if the receiver is closed
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_rebuilds_interleaved_calls() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply_delta(&ToolCallDelta::new(0).with_id("tc_a").with_name("add"));
        acc.apply_delta(&ToolCallDelta::new(1).with_id("tc_b").with_name("echo"));
        acc.apply_delta(&ToolCallDelta::new(0).with_arguments("{\"a\":"));
        acc.apply_delta(&ToolCallDelta::new(1).with_arguments("{}"));
        acc.apply_delta(&ToolCallDelta::new(0).with_arguments("1}"));

        let calls = acc.build();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].name(), "add");
        assert_eq!(calls[1].name(), "echo");
        match &calls[0] {
            ToolCallRequest::Function { id, function } => {
                assert_eq!(id.as_deref(), Some("tc_a"));
                assert_eq!(function.arguments, "{\"a\":1}");
            }
            other => panic!("expected function shape, got {:?}", other),
        }
    }

    #[test]
    fn accumulator_drops_nameless_fragments() {
        let mut acc = ToolCallAccumulator::new();
        acc.apply_delta(&ToolCallDelta::new(0).with_arguments("{}"));
        assert!(acc.build().is_empty());
    }
}
