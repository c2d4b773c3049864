//! Guardrail hooks
//!
//! A guardrail is an async check at one of three interception points: before
//! the user input reaches the model, after the model's final output, or
//! before a tool executes. A veto aborts the run with `status = "error"`
//! and a typed reason. Policy engines live outside this crate; this is only
//! the seam they attach to.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{AgentError, AgentResult};

/// Where a guardrail fires in the run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailStage {
    /// Before the user input enters the loop
    Input,
    /// After the model's final answer, before the run completes
    Output,
    /// Before a tool is executed
    ToolCall,
}

impl std::fmt::Display for GuardrailStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardrailStage::Input => write!(f, "input"),
            GuardrailStage::Output => write!(f, "output"),
            GuardrailStage::ToolCall => write!(f, "tool_call"),
        }
    }
}

/// Read-only snapshot handed to a guardrail check
#[derive(Debug, Clone, Default)]
pub struct GuardrailContext {
    pub agent_name: String,
    pub run_id: String,
    /// Input-stage: the user's text
    pub input_text: Option<String>,
    /// Output-stage: the model's final text
    pub output_text: Option<String>,
    /// Tool-stage: the tool about to run
    pub tool_name: Option<String>,
    /// Tool-stage: the normalized arguments
    pub tool_arguments: Option<Value>,
}

/// Outcome of a guardrail check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardrailDecision {
    /// Execution continues
    Pass,
    /// Execution halts; the run ends with `status = "error"`
    Veto { reason: String },
}

/// An async check that can veto execution at its declared stage
#[async_trait]
pub trait Guardrail: Send + Sync {
    /// Guardrail name, used in the surfaced error
    fn name(&self) -> &str;

    /// Stage at which this guardrail fires
    fn stage(&self) -> GuardrailStage;

    /// Inspect the context and decide
    async fn check(&self, context: &GuardrailContext) -> GuardrailDecision;
}

/// Run every guardrail registered for `stage`; the first veto wins
pub async fn run_guardrails(
    guardrails: &[std::sync::Arc<dyn Guardrail>],
    stage: GuardrailStage,
    context: &GuardrailContext,
) -> AgentResult<()> {
    for guardrail in guardrails.iter().filter(|g| g.stage() == stage) {
        if let GuardrailDecision::Veto { reason } = guardrail.check(context).await {
            return Err(AgentError::GuardrailVeto {
                name: guardrail.name().to_string(),
                stage,
                reason,
            });
        }
    }
    Ok(())
}
