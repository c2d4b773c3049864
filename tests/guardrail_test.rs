//! Guardrail vetoes at the engine level

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use common::{text_turn, tool_turn, AddTool, ScriptedClient};
use ergon::{
    Agent, Guardrail, GuardrailContext, GuardrailDecision, GuardrailStage, RunStatus,
    ToolCallRequest,
};

struct StageVeto {
    stage: GuardrailStage,
    trigger: String,
}

#[async_trait]
impl Guardrail for StageVeto {
    fn name(&self) -> &str {
        "stage_veto"
    }

    fn stage(&self) -> GuardrailStage {
        self.stage
    }

    async fn check(&self, context: &GuardrailContext) -> GuardrailDecision {
        let haystack = match self.stage {
            GuardrailStage::Input => context.input_text.clone(),
            GuardrailStage::Output => context.output_text.clone(),
            GuardrailStage::ToolCall => context.tool_name.clone(),
        };
        match haystack {
            Some(text) if text.contains(&self.trigger) => GuardrailDecision::Veto {
                reason: format!("matched '{}'", self.trigger),
            },
            _ => GuardrailDecision::Pass,
        }
    }
}

#[tokio::test]
async fn input_veto_fails_the_run_before_any_step() {
    let client = ScriptedClient::new(vec![text_turn("should never run")]);
    let agent = Agent::builder("guarded", Arc::new(client))
        .guardrail(Arc::new(StageVeto {
            stage: GuardrailStage::Input,
            trigger: "secret".into(),
        }))
        .build()
        .unwrap();

    let result = agent.run("tell me the secret").await;

    assert_eq!(result.status, RunStatus::Error);
    assert!(result.steps.is_empty());
    assert!(result.error.as_deref().unwrap().contains("vetoed input"));
}

#[tokio::test]
async fn tool_veto_fails_the_run_without_a_partial_step() {
    let client = ScriptedClient::new(vec![
        tool_turn(
            None,
            vec![ToolCallRequest::canonical("add", json!({"a": 1, "b": 1}))],
        ),
        text_turn("unreachable"),
    ]);
    let agent = Agent::builder("guarded", Arc::new(client))
        .tool(Arc::new(AddTool))
        .guardrail(Arc::new(StageVeto {
            stage: GuardrailStage::ToolCall,
            trigger: "add".into(),
        }))
        .build()
        .unwrap();

    let result = agent.run("add something").await;

    assert_eq!(result.status, RunStatus::Error);
    assert!(result.steps.is_empty());
    assert!(result.error.as_deref().unwrap().contains("vetoed tool_call"));
}

#[tokio::test]
async fn output_veto_fails_the_final_step() {
    let client = ScriptedClient::new(vec![text_turn("here is contraband")]);
    let agent = Agent::builder("guarded", Arc::new(client))
        .guardrail(Arc::new(StageVeto {
            stage: GuardrailStage::Output,
            trigger: "contraband".into(),
        }))
        .build()
        .unwrap();

    let result = agent.run("say something forbidden").await;

    assert_eq!(result.status, RunStatus::Error);
    assert!(result.error.as_deref().unwrap().contains("vetoed output"));
}

#[tokio::test]
async fn passing_guardrails_leave_the_run_untouched() {
    let client = ScriptedClient::new(vec![text_turn("all clear")]);
    let agent = Agent::builder("guarded", Arc::new(client))
        .guardrail(Arc::new(StageVeto {
            stage: GuardrailStage::Input,
            trigger: "secret".into(),
        }))
        .build()
        .unwrap();

    let result = agent.run("nothing suspicious").await;

    assert_eq!(result.status, RunStatus::Completed);
    assert_eq!(result.output, "all clear");
}
