//! Run trace structures
//!
//! `AgentRunResult` is the single source of truth for an agent run: every
//! field not in `steps` is either identity, timing, or a precomputed
//! aggregate. No flat conversation view is stored; derive one from the
//! memory log if needed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentResult;

/// Terminal status of an agent run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// The model produced a final answer with no tool calls
    Completed,
    /// The iteration ceiling was hit while the model still wanted tools
    MaxIterationsReached,
    /// An unrecoverable error ended the loop
    Error,
    /// Externally cancelled
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::MaxIterationsReached => write!(f, "max_iterations_reached"),
            RunStatus::Error => write!(f, "error"),
            RunStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Token usage for a single LLM call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageStats {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Token usage accumulated across all LLM calls in a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl AggregatedUsage {
    /// Fold one step's usage into the aggregate
    pub fn add(&mut self, usage: Option<&UsageStats>) {
        if let Some(usage) = usage {
            self.prompt_tokens += usage.prompt_tokens;
            self.completion_tokens += usage.completion_tokens;
            self.total_tokens += usage.total_tokens;
        }
    }
}

/// Why a step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFinishReason {
    /// Final answer, no tool calls
    Stop,
    /// The model requested tools
    ToolCalls,
    /// The step ended on an error
    Error,
}

/// Record of a single executed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub call_id: String,
    #[serde(default)]
    pub arguments: Value,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    /// Wall-clock time for this call, from a monotonic clock
    pub duration_ms: f64,
    pub timestamp: DateTime<Utc>,
}

/// One Think-Act-Observe cycle inside a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    /// 1-based step index
    pub step: u32,
    /// The model's text for this step; null when the model emitted none
    pub thought: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRecord>,
    /// Tokens for this step's LLM call
    pub usage: Option<UsageStats>,
    pub finish_reason: StepFinishReason,
}

impl StepResult {
    /// Whether the model requested tools in this step
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Complete result of one agent run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentRunResult {
    pub run_id: String,
    pub agent_name: String,
    /// Final answer, flattened to text
    pub output: String,
    pub status: RunStatus,
    /// Full reasoning trace, contiguous from step 1
    pub steps: Vec<StepResult>,
    pub usage: AggregatedUsage,
    pub tool_calls_total: u32,
    /// Exact multiset count of executed tool calls, keyed by tool name
    pub tool_calls_by_name: BTreeMap<String, u32>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Populated only when status is `error`
    pub error: Option<String>,
    pub max_iterations: u32,
}

impl AgentRunResult {
    /// Whether the run finished naturally
    pub fn success(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Number of steps executed
    pub fn steps_used(&self) -> usize {
        self.steps.len()
    }

    /// Canonical JSON snapshot for persistence and API responses
    pub fn to_value(&self) -> AgentResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decode a canonical JSON snapshot
    pub fn from_value(value: Value) -> AgentResult<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        let tool_info = if self.tool_calls_by_name.is_empty() {
            "none".to_string()
        } else {
            self.tool_calls_by_name
                .iter()
                .map(|(name, count)| format!("{}x{}", name, count))
                .collect::<Vec<_>>()
                .join(", ")
        };
        format!(
            "[{}] {} | {}/{} steps | {} tool calls ({}) | {} tokens | {:.2}s",
            self.status,
            self.agent_name,
            self.steps_used(),
            self.max_iterations,
            self.tool_calls_total,
            tool_info,
            self.usage.total_tokens,
            self.duration_seconds,
        )
    }
}
