//! Step executor: one Think-Act-Observe iteration
//!
//! Tool-call parsing happens only through `domain::parse_tool_call`, and
//! tool failures of every kind (unknown name, malformed arguments, raised
//! error, timeout) become error tool results so the model can observe and
//! self-correct. Engine-level failures (model errors, guardrail vetoes,
//! cancellation) propagate to the controller instead.

use std::time::{Duration, Instant};

use chrono::Utc;
use futures::future::join_all;
use futures::StreamExt;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;

use super::RunContext;
use crate::domain::{
    parse_tool_call, FinishReason, Message, ParsedToolCall, RunEvent, RunEventSender,
    StepFinishReason, StepResult, ToolCallParseFailure, ToolCallRecord, ToolCallRequest,
};
use crate::error::{AgentError, AgentResult};
use crate::guardrails::{run_guardrails, GuardrailContext, GuardrailStage};
use crate::llm::{AssistantTurn, CompletionRequest, ToolCallAccumulator};
use crate::token::TokenCounter;

pub(crate) struct StepExecutor<'a> {
    pub ctx: &'a RunContext,
    pub run_id: &'a str,
    pub cancel: &'a CancellationToken,
    pub events: Option<&'a RunEventSender>,
    pub counter: &'a TokenCounter,
}

impl StepExecutor<'_> {
    /// Run one full iteration and seal its `StepResult`
    pub async fn execute(&self, step: u32) -> AgentResult<StepResult> {
        // Think
        let turn = if self.events.is_some() {
            self.think_streamed().await?
        } else {
            self.think().await?
        };
        self.ctx.memory.append(turn.to_message());

        let thought = turn.content.clone();

        // Decide
        if turn.tool_calls.is_empty() {
            if self.ctx.options.verbose {
                tracing::info!(
                    agent = %self.ctx.agent_name,
                    step,
                    "final answer"
                );
            }
            self.check_output_guardrails(thought.as_deref()).await?;
            return Ok(StepResult {
                step,
                thought,
                tool_calls: Vec::new(),
                usage: turn.usage,
                finish_reason: StepFinishReason::Stop,
            });
        }

        // Act
        if self.ctx.options.verbose {
            let names: Vec<&str> = turn.tool_calls.iter().map(|tc| tc.name()).collect();
            tracing::info!(
                agent = %self.ctx.agent_name,
                step,
                tools = ?names,
                "executing tool calls"
            );
        }
        let records = self.act(&turn.tool_calls).await?;

        Ok(StepResult {
            step,
            thought,
            tool_calls: records,
            usage: turn.usage,
            finish_reason: StepFinishReason::ToolCalls,
        })
    }

    fn completion_request(&self, stream: bool) -> CompletionRequest {
        let snapshot = self.ctx.memory.snapshot();
        let messages = self.ctx.options.retention.apply(&snapshot, self.counter);
        let definitions = self.ctx.tools.definitions();
        let has_tools = !definitions.is_empty();
        CompletionRequest {
            messages,
            model: None,
            temperature: self.ctx.options.temperature,
            max_tokens: self.ctx.options.max_tokens,
            tools: has_tools.then_some(definitions),
            tool_choice: has_tools.then(|| self.ctx.options.tool_choice.clone()),
            stream,
        }
    }

    /// One blocking LLM call
    async fn think(&self) -> AgentResult<AssistantTurn> {
        let request = self.completion_request(false);
        let started = Instant::now();
        let turn = self.ctx.model_client.generate(request).await?;
        tracing::debug!(
            agent = %self.ctx.agent_name,
            run_id = %self.run_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            has_tool_calls = !turn.tool_calls.is_empty(),
            "llm call finished"
        );
        Ok(turn)
    }

    /// One streamed LLM call, forwarding text deltas as events
    async fn think_streamed(&self) -> AgentResult<AssistantTurn> {
        let request = self.completion_request(true);
        let started = Instant::now();
        let mut stream = self.ctx.model_client.generate_stream(request);

        let mut content = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let mut finish_reason = FinishReason::Stop;
        let mut usage = None;

        while let Some(result) = stream.next().await {
            if self.cancel.is_cancelled() {
                return Err(AgentError::Cancelled);
            }
            let chunk = result?;

            if !chunk.content.is_empty() {
                content.push_str(&chunk.content);
                if let Some(events) = self.events {
                    let _ = events
                        .send(RunEvent::Delta {
                            text: chunk.content.clone(),
                        })
                        .await;
                }
            }
            for delta in &chunk.tool_calls {
                accumulator.apply_delta(delta);
            }
            if let Some(reason) = chunk.finish_reason {
                finish_reason = reason;
            }
            if chunk.usage.is_some() {
                usage = chunk.usage;
            }
        }

        tracing::debug!(
            agent = %self.ctx.agent_name,
            run_id = %self.run_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "streamed llm call finished"
        );

        Ok(AssistantTurn {
            content: (!content.is_empty()).then_some(content),
            tool_calls: accumulator.build(),
            usage,
            finish_reason,
        })
    }

    async fn check_output_guardrails(&self, output_text: Option<&str>) -> AgentResult<()> {
        let context = GuardrailContext {
            agent_name: self.ctx.agent_name.clone(),
            run_id: self.run_id.to_string(),
            output_text: output_text.map(str::to_string),
            ..Default::default()
        };
        run_guardrails(&self.ctx.guardrails, GuardrailStage::Output, &context).await
    }

    /// Execute the step's tool calls in model-emitted order.
    ///
    /// Under `parallel_tool_calls` the invocations run concurrently and the
    /// results are collated back into emitted order before anything is
    /// appended to memory. One failing call never aborts its peers.
    async fn act(&self, requests: &[ToolCallRequest]) -> AgentResult<Vec<ToolCallRecord>> {
        let parsed: Vec<Result<ParsedToolCall, ToolCallParseFailure>> =
            requests.iter().map(parse_tool_call).collect();

        for call in parsed.iter().flatten() {
            let context = GuardrailContext {
                agent_name: self.ctx.agent_name.clone(),
                run_id: self.run_id.to_string(),
                tool_name: Some(call.name.clone()),
                tool_arguments: Some(call.arguments.clone()),
                ..Default::default()
            };
            run_guardrails(&self.ctx.guardrails, GuardrailStage::ToolCall, &context).await?;
        }

        let mut records = Vec::with_capacity(parsed.len());

        if self.ctx.options.parallel_tool_calls && parsed.len() > 1 {
            for call in &parsed {
                self.emit_started(call).await;
            }
            let outcomes = join_all(parsed.iter().map(|call| self.dispatch(call))).await;
            for (record, message) in outcomes {
                self.ctx.memory.append(message);
                self.emit_finished(&record).await;
                records.push(record);
            }
        } else {
            for call in &parsed {
                if self.cancel.is_cancelled() {
                    return Err(AgentError::Cancelled);
                }
                self.emit_started(call).await;
                let (record, message) = self.dispatch(call).await;
                self.ctx.memory.append(message);
                self.emit_finished(&record).await;
                records.push(record);
            }
        }

        Ok(records)
    }

    /// Run one normalized call to a record + tool-result message pair
    async fn dispatch(
        &self,
        parsed: &Result<ParsedToolCall, ToolCallParseFailure>,
    ) -> (ToolCallRecord, Message) {
        let started = Instant::now();

        let call = match parsed {
            Err(failure) => {
                tracing::warn!(
                    agent = %self.ctx.agent_name,
                    tool = %failure.name,
                    error = %failure.error,
                    "tool arguments failed to decode"
                );
                return error_outcome(
                    &failure.name,
                    &failure.call_id,
                    Value::Object(Map::new()),
                    failure.error.clone(),
                    started,
                );
            }
            Ok(call) => call,
        };

        let tool = match self.ctx.tools.get(&call.name) {
            Some(tool) => tool,
            None => {
                tracing::warn!(
                    agent = %self.ctx.agent_name,
                    tool = %call.name,
                    "unknown tool requested"
                );
                return error_outcome(
                    &call.name,
                    &call.call_id,
                    call.arguments.clone(),
                    format!("unknown tool: {}", call.name),
                    started,
                );
            }
        };

        let timeout = self.ctx.options.per_tool_timeout_seconds;
        let execution = tool.execute(call.arguments.clone());
        let outcome = if timeout > 0.0 {
            match tokio::time::timeout(Duration::from_secs_f64(timeout), execution).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    tracing::warn!(
                        agent = %self.ctx.agent_name,
                        tool = %call.name,
                        timeout_seconds = timeout,
                        "tool timed out"
                    );
                    return error_outcome(
                        &call.name,
                        &call.call_id,
                        call.arguments.clone(),
                        format!("tool '{}' timed out after {}s", call.name, timeout),
                        started,
                    );
                }
            }
        } else {
            execution.await
        };

        match outcome {
            Ok(output) => {
                let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
                let record = ToolCallRecord {
                    tool_name: call.name.clone(),
                    call_id: call.call_id.clone(),
                    arguments: call.arguments.clone(),
                    result: output.text_content(),
                    is_error: output.is_error,
                    duration_ms,
                    timestamp: Utc::now(),
                };
                let message = Message::tool_result(
                    &call.call_id,
                    output.content,
                    output.is_error,
                    Some(call.name.clone()),
                );
                (record, message)
            }
            Err(err) => {
                tracing::warn!(
                    agent = %self.ctx.agent_name,
                    tool = %call.name,
                    error = %err,
                    "tool execution failed"
                );
                error_outcome(
                    &call.name,
                    &call.call_id,
                    call.arguments.clone(),
                    err.to_string(),
                    started,
                )
            }
        }
    }

    async fn emit_started(&self, parsed: &Result<ParsedToolCall, ToolCallParseFailure>) {
        if let Some(events) = self.events {
            let (tool_name, call_id, arguments) = match parsed {
                Ok(call) => (
                    call.name.clone(),
                    call.call_id.clone(),
                    call.arguments.clone(),
                ),
                Err(failure) => (
                    failure.name.clone(),
                    failure.call_id.clone(),
                    Value::Object(Map::new()),
                ),
            };
            let _ = events
                .send(RunEvent::ToolCallStarted {
                    tool_name,
                    call_id,
                    arguments,
                })
                .await;
        }
    }

    async fn emit_finished(&self, record: &ToolCallRecord) {
        if let Some(events) = self.events {
            let _ = events
                .send(RunEvent::ToolCallFinished {
                    record: record.clone(),
                })
                .await;
        }
    }
}

/// Build the error record + message pair for a failed call
fn error_outcome(
    tool_name: &str,
    call_id: &str,
    arguments: Value,
    error: String,
    started: Instant,
) -> (ToolCallRecord, Message) {
    let duration_ms = started.elapsed().as_secs_f64() * 1000.0;
    let record = ToolCallRecord {
        tool_name: tool_name.to_string(),
        call_id: call_id.to_string(),
        arguments,
        result: error.clone(),
        is_error: true,
        duration_ms,
        timestamp: Utc::now(),
    };
    let message = Message::tool_result(
        call_id,
        vec![crate::domain::ContentBlock::text(error)],
        true,
        Some(tool_name.to_string()),
    );
    (record, message)
}
