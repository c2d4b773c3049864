//! The agent execution engine
//!
//! An `Agent` bundles a model client, a tool registry, conversation memory,
//! and system instructions; the run controller drives the Think-Act-Observe
//! loop over them and produces one `AgentRunResult` per run.

mod runner;
mod step;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::RunOptions;
use crate::domain::{AgentRunResult, ContentBlock, Message, RunEventStream};
use crate::error::AgentResult;
use crate::guardrails::Guardrail;
use crate::llm::ModelClient;
use crate::memory::{ConversationMemory, UnboundedMemory};
use crate::tools::{Tool, ToolRegistry};

/// User input for one run: plain text or multimodal parts
#[derive(Debug, Clone)]
pub enum UserInput {
    Text(String),
    Parts(Vec<ContentBlock>),
}

impl UserInput {
    /// Plain-text rendering, for guardrails and logging
    pub fn text(&self) -> String {
        match self {
            UserInput::Text(text) => text.clone(),
            UserInput::Parts(parts) => crate::domain::flatten_blocks(parts),
        }
    }

    fn into_message(self) -> Message {
        match self {
            UserInput::Text(text) => Message::user(text),
            UserInput::Parts(parts) => Message::user_with_parts(parts),
        }
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        UserInput::Text(text.to_string())
    }
}

impl From<String> for UserInput {
    fn from(text: String) -> Self {
        UserInput::Text(text)
    }
}

impl From<Vec<ContentBlock>> for UserInput {
    fn from(parts: Vec<ContentBlock>) -> Self {
        UserInput::Parts(parts)
    }
}

/// Shared state cloned into each run
pub(crate) struct RunContext {
    pub agent_name: String,
    pub model_client: Arc<dyn ModelClient>,
    pub tools: Arc<ToolRegistry>,
    pub memory: Arc<dyn ConversationMemory>,
    pub system_instructions: Option<String>,
    pub guardrails: Vec<Arc<dyn Guardrail>>,
    pub options: RunOptions,
}

/// A configured agent
///
/// The tool registry is immutable after construction. Memory belongs to
/// this agent; concurrent runs should each use their own agent.
pub struct Agent {
    name: String,
    description: String,
    model_client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    memory: Arc<dyn ConversationMemory>,
    system_instructions: Option<String>,
    guardrails: Vec<Arc<dyn Guardrail>>,
    options: RunOptions,
}

impl Agent {
    /// Start building an agent
    pub fn builder(name: impl Into<String>, model_client: Arc<dyn ModelClient>) -> AgentBuilder {
        AgentBuilder::new(name, model_client)
    }

    /// Agent name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Agent description
    pub fn description(&self) -> &str {
        &self.description
    }

    /// The conversation memory backing this agent
    pub fn memory(&self) -> &Arc<dyn ConversationMemory> {
        &self.memory
    }

    /// Run options in effect
    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    /// Clear memory; the next run re-seeds the system instructions
    pub fn reset(&self) {
        self.memory.clear();
    }

    /// Drive one run to completion
    pub async fn run(&self, input: impl Into<UserInput>) -> AgentRunResult {
        self.run_with(input, CancellationToken::new()).await
    }

    /// Drive one run with an external cancellation handle
    pub async fn run_with(
        &self,
        input: impl Into<UserInput>,
        cancel: CancellationToken,
    ) -> AgentRunResult {
        runner::drive(self.context(), input.into(), cancel, None).await
    }

    /// Drive one run, streaming events as they happen.
    ///
    /// The final `run_finished` event carries the same result the blocking
    /// path would return. Dropping the stream cancels the run at the next
    /// safe boundary.
    pub fn run_stream(
        &self,
        input: impl Into<UserInput>,
        cancel: CancellationToken,
    ) -> RunEventStream {
        let (sender, stream) = RunEventStream::channel(64);
        let context = self.context();
        let input = input.into();
        tokio::spawn(async move {
            runner::drive(context, input, cancel, Some(sender)).await;
        });
        stream
    }

    fn context(&self) -> RunContext {
        RunContext {
            agent_name: self.name.clone(),
            model_client: self.model_client.clone(),
            tools: self.tools.clone(),
            memory: self.memory.clone(),
            system_instructions: self.system_instructions.clone(),
            guardrails: self.guardrails.clone(),
            options: self.options.clone(),
        }
    }
}

/// Builder for [`Agent`]
pub struct AgentBuilder {
    name: String,
    description: String,
    model_client: Arc<dyn ModelClient>,
    tools: Vec<Arc<dyn Tool>>,
    memory: Option<Arc<dyn ConversationMemory>>,
    system_instructions: Option<String>,
    guardrails: Vec<Arc<dyn Guardrail>>,
    options: RunOptions,
}

impl AgentBuilder {
    /// Create a builder with the required collaborators
    pub fn new(name: impl Into<String>, model_client: Arc<dyn ModelClient>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            model_client,
            tools: Vec::new(),
            memory: None,
            system_instructions: Some(
                "You are a helpful AI assistant. Use the provided tools to solve \
                 the user's request. Think step-by-step."
                    .to_string(),
            ),
            guardrails: Vec::new(),
            options: RunOptions::default(),
        }
    }

    /// Human-readable description
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// System instructions seeded once at the start of memory.
    pub fn system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    /// Run without system instructions
    pub fn no_system_instructions(mut self) -> Self {
        self.system_instructions = None;
        self
    }

    /// Add a tool
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Add several tools
    pub fn tools(mut self, tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        self.tools.extend(tools);
        self
    }

    /// Add a guardrail
    pub fn guardrail(mut self, guardrail: Arc<dyn Guardrail>) -> Self {
        self.guardrails.push(guardrail);
        self
    }

    /// Use a specific memory backend instead of the default unbounded log
    pub fn memory(mut self, memory: Arc<dyn ConversationMemory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Replace the run options wholesale
    pub fn options(mut self, options: RunOptions) -> Self {
        self.options = options;
        self
    }

    /// Iteration ceiling for the loop
    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.options.max_iterations = max_iterations;
        self
    }

    /// Finalize; fails on duplicate tool names
    pub fn build(self) -> AgentResult<Agent> {
        let mut registry = ToolRegistry::new();
        for tool in self.tools {
            registry.register(tool)?;
        }
        Ok(Agent {
            name: self.name,
            description: self.description,
            model_client: self.model_client,
            tools: Arc::new(registry),
            memory: self
                .memory
                .unwrap_or_else(|| Arc::new(UnboundedMemory::new())),
            system_instructions: self.system_instructions,
            guardrails: self.guardrails,
            options: self.options,
        })
    }
}
