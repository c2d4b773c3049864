//! # Ergon - Agent Execution Engine
//!
//! Ergon drives a large language model through a **Think → Act → Observe**
//! loop: the model reasons, requests tools, observes their results, and
//! repeats until it produces a final answer or a budget runs out. Every run
//! yields a single serializable [`AgentRunResult`] recording each step,
//! tool call, and token spent.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ergon::{Agent, OpenAiClient, OpenAiConfig, EchoTool};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = Arc::new(OpenAiClient::new(OpenAiConfig::from_env("gpt-4o-mini")?));
//!     let agent = Agent::builder("assistant", client)
//!         .description("Answers questions, echoing when asked")
//!         .tool(Arc::new(EchoTool))
//!         .build()?;
//!
//!     let result = agent.run("Say hi.").await;
//!     println!("{}", result.output);
//!     println!("{}", result.summary());
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - `domain/` - canonical types: messages, content blocks, tool-call shapes
//!   and their single normalizer, the run trace, streaming events
//! - `llm/` - the [`ModelClient`] trait plus an OpenAI-compatible adapter
//! - `memory/` - append-only conversation log with retention strategies
//! - `tools/` - the [`Tool`] trait and immutable registry
//! - `engine/` - step executor and run controller
//! - `guardrails` - input / output / pre-tool veto hooks

pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod guardrails;
pub mod llm;
pub mod memory;
pub mod token;
pub mod tools;

// Re-export commonly used types
pub use config::RunOptions;
pub use domain::{
    AgentRunResult, AggregatedUsage, ContentBlock, FinishReason, Message, MessageBody, RunEvent,
    RunEventStream, RunStatus, StepFinishReason, StepResult, ToolCallRecord, ToolCallRequest,
    UsageStats,
};
pub use engine::{Agent, AgentBuilder, UserInput};
pub use error::{AgentError, AgentResult, LlmError, LlmResult};
pub use guardrails::{Guardrail, GuardrailContext, GuardrailDecision, GuardrailStage};
pub use llm::{
    AssistantTurn, CompletionRequest, LlmStream, ModelClient, OpenAiClient, OpenAiConfig,
    StreamChunk, ToolChoice,
};
pub use memory::{ConversationMemory, RetentionStrategy, UnboundedMemory};
pub use tools::{ClockTool, EchoTool, Tool, ToolDefinition, ToolOutput, ToolRegistry};
