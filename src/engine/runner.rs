//! Run controller
//!
//! Drives the iteration loop over the step executor and assembles the
//! `AgentRunResult`. Exactly one terminal status is reached per run; the
//! blocking and streaming paths share this driver so their traces cannot
//! diverge.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::step::StepExecutor;
use super::{RunContext, UserInput};
use crate::domain::{
    AgentRunResult, AggregatedUsage, Message, RunEvent, RunEventSender, RunStatus,
    StepFinishReason,
};
use crate::error::AgentError;
use crate::guardrails::{run_guardrails, GuardrailContext, GuardrailStage};
use crate::token::TokenCounter;

pub(crate) async fn drive(
    ctx: RunContext,
    input: UserInput,
    cancel: CancellationToken,
    events: Option<RunEventSender>,
) -> AgentRunResult {
    let run_id = Uuid::new_v4().to_string();
    let start_time = Utc::now();
    let started = Instant::now();
    let deadline = ctx
        .options
        .overall_timeout_seconds
        .map(Duration::from_secs_f64);
    let counter = TokenCounter::new();

    let input_text = input.text();
    if ctx.options.verbose {
        tracing::info!(
            agent = %ctx.agent_name,
            run_id = %run_id,
            input = %truncate(&input_text, 80),
            "starting run"
        );
    }

    // Seed system instructions once, then the user message.
    if ctx.memory.is_empty() {
        if let Some(instructions) = &ctx.system_instructions {
            ctx.memory.append(Message::system(instructions));
        }
    }
    ctx.memory.append(input.into_message());

    let mut steps = Vec::new();
    let mut usage = AggregatedUsage::default();
    let mut tool_calls_total: u32 = 0;
    let mut tool_calls_by_name: BTreeMap<String, u32> = BTreeMap::new();
    let mut output = String::new();
    let mut error: Option<String> = None;
    let mut status: Option<RunStatus> = None;

    let input_context = GuardrailContext {
        agent_name: ctx.agent_name.clone(),
        run_id: run_id.clone(),
        input_text: Some(input_text),
        ..Default::default()
    };
    if let Err(veto) = run_guardrails(&ctx.guardrails, GuardrailStage::Input, &input_context).await
    {
        tracing::error!(agent = %ctx.agent_name, run_id = %run_id, error = %veto, "input vetoed");
        status = Some(RunStatus::Error);
        error = Some(veto.to_string());
    }

    if status.is_none() {
        let executor = StepExecutor {
            ctx: &ctx,
            run_id: &run_id,
            cancel: &cancel,
            events: events.as_ref(),
            counter: &counter,
        };

        for step in 1..=ctx.options.max_iterations {
            if cancel.is_cancelled() {
                status = Some(RunStatus::Cancelled);
                break;
            }
            if let Some(deadline) = deadline {
                if started.elapsed() >= deadline {
                    status = Some(RunStatus::Error);
                    error = Some(AgentError::DeadlineExceeded.to_string());
                    break;
                }
            }
            if let Some(sender) = &events {
                // A dropped stream means nobody will see the result.
                if sender.is_closed() {
                    status = Some(RunStatus::Cancelled);
                    break;
                }
                let _ = sender.send(RunEvent::StepStarted { step }).await;
            }

            match executor.execute(step).await {
                Ok(result) => {
                    usage.add(result.usage.as_ref());
                    for record in &result.tool_calls {
                        tool_calls_total += 1;
                        *tool_calls_by_name.entry(record.tool_name.clone()).or_insert(0) += 1;
                    }

                    let finished = result.finish_reason == StepFinishReason::Stop;
                    if finished {
                        output = result.thought.clone().unwrap_or_default();
                    }
                    if let Some(sender) = &events {
                        let _ = sender
                            .send(RunEvent::StepFinished {
                                result: result.clone(),
                            })
                            .await;
                    }
                    steps.push(result);
                    if finished {
                        status = Some(RunStatus::Completed);
                        break;
                    }
                }
                Err(AgentError::Cancelled) => {
                    // Current step is discarded; completed steps stay.
                    status = Some(RunStatus::Cancelled);
                    break;
                }
                Err(err) => {
                    tracing::error!(
                        agent = %ctx.agent_name,
                        run_id = %run_id,
                        step,
                        error = %err,
                        "run aborted"
                    );
                    status = Some(RunStatus::Error);
                    error = Some(err.to_string());
                    break;
                }
            }
        }
    }

    let status = status.unwrap_or(RunStatus::MaxIterationsReached);
    if status == RunStatus::MaxIterationsReached {
        tracing::warn!(
            agent = %ctx.agent_name,
            run_id = %run_id,
            max_iterations = ctx.options.max_iterations,
            "hit max iterations"
        );
        // The last step's tool calls stay in the trace; surface whatever
        // the model last said.
        if let Some(last) = steps.last() {
            output = last.thought.clone().unwrap_or_default();
        }
    }

    let end_time = Utc::now();
    let duration_seconds = started.elapsed().as_secs_f64();

    if ctx.options.verbose {
        tracing::info!(
            agent = %ctx.agent_name,
            run_id = %run_id,
            status = %status,
            steps = steps.len(),
            tool_calls = tool_calls_total,
            "run finished"
        );
    }

    let result = AgentRunResult {
        run_id,
        agent_name: ctx.agent_name,
        output,
        status,
        steps,
        usage,
        tool_calls_total,
        tool_calls_by_name,
        start_time,
        end_time,
        duration_seconds,
        error,
        max_iterations: ctx.options.max_iterations,
    };

    if let Some(sender) = &events {
        let _ = sender
            .send(RunEvent::RunFinished {
                result: result.clone(),
            })
            .await;
    }

    result
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let prefix: String = text.chars().take(max_chars).collect();
        format!("{}...", prefix)
    }
}
