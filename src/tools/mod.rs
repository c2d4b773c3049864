//! Tool interface and registry

mod builtin;

pub use builtin::{ClockTool, EchoTool};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::{flatten_blocks, ContentBlock};
use crate::error::{AgentError, AgentResult};

/// An executable tool
///
/// `execute` must produce a `ToolOutput` even for expected failures, with
/// `is_error` set and a text block describing the condition. A returned
/// `Err` is caught by the step executor and converted to an error output;
/// it never escapes the run loop.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within a registry
    fn name(&self) -> &str;

    /// Human-readable description shown to the model
    fn description(&self) -> &str;

    /// JSON Schema (object root) describing the arguments
    fn input_schema(&self) -> Value;

    /// Run the tool
    async fn execute(&self, arguments: Value) -> anyhow::Result<ToolOutput>;
}

/// Result of one tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutput {
    /// Ordered content blocks
    pub content: Vec<ContentBlock>,
    /// Whether the execution failed
    #[serde(default)]
    pub is_error: bool,
}

impl ToolOutput {
    /// A successful text result
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(text)],
            is_error: false,
        }
    }

    /// A successful JSON result, serialized to a text block
    pub fn json(value: &Value) -> Self {
        Self::text(value.to_string())
    }

    /// An error result describing the failure
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: vec![ContentBlock::text(message)],
            is_error: true,
        }
    }

    /// Flattened text of all content blocks
    pub fn text_content(&self) -> String {
        flatten_blocks(&self.content)
    }
}

/// Declarative description of a tool, for the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's input
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a new tool definition
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// The function-calling wire form handed to providers
    pub fn to_wire(&self) -> Value {
        // Providers require at least an object-typed schema.
        let params = if self.parameters.is_null()
            || self.parameters.as_object().map_or(true, |o| o.is_empty())
        {
            json!({
                "type": "object",
                "properties": {},
                "required": []
            })
        } else {
            self.parameters.clone()
        };
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": params,
            }
        })
    }
}

/// Immutable name → tool mapping, built once per agent
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, for deterministic definitions
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool; fails on duplicate names
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> AgentResult<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(AgentError::DuplicateTool(name));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    /// Definitions for every registered tool, in registration order
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| {
                ToolDefinition::new(tool.name(), tool.description(), tool.input_schema())
            })
            .collect()
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
