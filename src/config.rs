//! Run configuration for agents

use serde::{Deserialize, Serialize};

use crate::llm::ToolChoice;
use crate::memory::RetentionStrategy;

/// Options governing a single agent run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOptions {
    /// Maximum Think-Act-Observe iterations before the run is cut off
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
    /// Execute tool calls within a step concurrently
    #[serde(default)]
    pub parallel_tool_calls: bool,
    /// Tool choice mode forwarded to the model client
    #[serde(default)]
    pub tool_choice: ToolChoice,
    /// Wall-clock budget per tool invocation
    #[serde(default = "default_tool_timeout")]
    pub per_tool_timeout_seconds: f64,
    /// Overall run deadline; `None` means no deadline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_timeout_seconds: Option<f64>,
    /// Emit info-level progress logs
    #[serde(default)]
    pub verbose: bool,
    /// Temperature override forwarded to the model client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Max output tokens forwarded to the model client
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Retention strategy applied when building the LLM view of memory
    #[serde(default)]
    pub retention: RetentionStrategy,
}

fn default_max_iterations() -> u32 {
    10
}

fn default_tool_timeout() -> f64 {
    30.0
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            parallel_tool_calls: false,
            tool_choice: ToolChoice::default(),
            per_tool_timeout_seconds: default_tool_timeout(),
            overall_timeout_seconds: None,
            verbose: false,
            temperature: None,
            max_tokens: None,
            retention: RetentionStrategy::default(),
        }
    }
}
