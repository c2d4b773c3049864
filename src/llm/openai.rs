//! OpenAI-compatible model client with streaming support

use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use std::env;

use async_trait::async_trait;

use super::{
    AssistantTurn, CompletionRequest, LlmStream, LlmStreamSender, ModelClient, StreamChunk,
    ToolCallDelta, ToolChoice,
};
use crate::domain::{FinishReason, ToolCallRequest, UsageStats};
use crate::error::{LlmError, LlmResult};

/// Configuration for an OpenAI-compatible endpoint
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl OpenAiConfig {
    /// Configuration for the given model, reading `OPENAI_API_KEY`
    pub fn from_env(model: impl Into<String>) -> LlmResult<Self> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| {
            LlmError::Authentication("OPENAI_API_KEY environment variable not set".to_string())
        })?;
        Ok(Self {
            api_key,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            temperature: None,
            max_tokens: None,
        })
    }
}

/// Model client for OpenAI-compatible chat-completions endpoints
///
/// The underlying reqwest client pools connections and is safe to share
/// across concurrent runs.
pub struct OpenAiClient {
    client: reqwest::Client,
    config: OpenAiConfig,
}

impl OpenAiClient {
    /// Create a client from configuration
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Build the request body for the chat-completions API
    fn build_request_body(&self, request: &CompletionRequest) -> Value {
        let mut body = json!({
            "model": request.model.as_ref().unwrap_or(&self.config.model),
            "messages": request.messages.iter().map(|m| m.to_wire()).collect::<Vec<_>>(),
        });

        if let Some(temp) = request.temperature.or(self.config.temperature) {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.max_tokens.or(self.config.max_tokens) {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(tools) = &request.tools {
            if !tools.is_empty() {
                body["tools"] = json!(tools.iter().map(|t| t.to_wire()).collect::<Vec<_>>());
            }
        }

        if let Some(tool_choice) = &request.tool_choice {
            body["tool_choice"] = match tool_choice {
                ToolChoice::Auto => json!("auto"),
                ToolChoice::None => json!("none"),
                ToolChoice::Required => json!("required"),
                ToolChoice::Tool { name } => json!({
                    "type": "function",
                    "function": { "name": name }
                }),
            };
        }

        if request.stream {
            body["stream"] = json!(true);
            body["stream_options"] = json!({ "include_usage": true });
        }

        body
    }

    fn parse_response(&self, response: &OpenAiResponse) -> LlmResult<AssistantTurn> {
        let choice = response
            .choices
            .first()
            .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

        // Keep the provider shape; the engine's normalizer decodes arguments.
        let tool_calls: Vec<ToolCallRequest> = choice
            .message
            .tool_calls
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|tc| {
                ToolCallRequest::function(
                    Some(tc.id.clone()),
                    tc.function.name.clone(),
                    tc.function.arguments.clone(),
                )
            })
            .collect();

        let content = choice.message.content.clone().filter(|c| !c.is_empty());

        let usage = response.usage.as_ref().map(OpenAiUsage::to_stats);

        Ok(AssistantTurn {
            content,
            tool_calls,
            usage,
            finish_reason: parse_finish_reason(choice.finish_reason.as_deref()),
        })
    }
}

fn parse_finish_reason(reason: Option<&str>) -> FinishReason {
    match reason {
        Some("length") => FinishReason::Length,
        Some("tool_calls") => FinishReason::ToolCalls,
        Some("content_filter") => FinishReason::ContentFilter,
        _ => FinishReason::Stop,
    }
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.config.model
    }

    async fn generate(&self, request: CompletionRequest) -> LlmResult<AssistantTurn> {
        let body = self.build_request_body(&request);

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message: error_text,
            });
        }

        let openai_response: OpenAiResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(format!("failed to parse response: {}", e)))?;

        self.parse_response(&openai_response)
    }

    fn generate_stream(&self, request: CompletionRequest) -> LlmStream {
        let (sender, stream) = LlmStream::channel(64);

        let client = self.client.clone();
        let api_key = self.config.api_key.clone();
        let base_url = self.config.base_url.clone();
        let mut req = request;
        req.stream = true;
        let body = self.build_request_body(&req);

        tokio::spawn(async move {
            if let Err(e) = stream_completion(client, api_key, base_url, body, sender.clone()).await
            {
                let _ = sender.send_error(e).await;
            }
        });

        stream
    }
}

async fn stream_completion(
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    body: Value,
    sender: LlmStreamSender,
) -> LlmResult<()> {
    let response = client
        .post(format!("{}/chat/completions", base_url))
        .header("Authorization", format!("Bearer {}", api_key))
        .header("Content-Type", "application/json")
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let error_text = response.text().await.unwrap_or_default();
        return Err(LlmError::Api {
            status: status.as_u16(),
            message: error_text,
        });
    }

    let mut stream = response.bytes_stream();
    let mut buffer = String::new();

    while let Some(chunk_result) = stream.next().await {
        let chunk = chunk_result.map_err(|e| LlmError::Streaming(e.to_string()))?;
        buffer.push_str(&String::from_utf8_lossy(&chunk));

        // Process complete SSE lines
        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer = buffer[pos + 1..].to_string();

            if line.is_empty() || !line.starts_with("data: ") {
                continue;
            }

            let data = &line[6..];
            if data == "[DONE]" {
                return Ok(());
            }

            if let Ok(parsed) = serde_json::from_str::<OpenAiStreamResponse>(data) {
                if let Some(chunk) = stream_chunk(&parsed) {
                    if sender.send(chunk).await.is_err() {
                        return Ok(()); // receiver dropped
                    }
                }
            }
        }
    }

    Ok(())
}

fn stream_chunk(parsed: &OpenAiStreamResponse) -> Option<StreamChunk> {
    let choice = parsed.choices.first()?;

    let mut chunk = StreamChunk {
        content: choice.delta.content.clone().unwrap_or_default(),
        tool_calls: Vec::new(),
        finish_reason: None,
        usage: None,
    };

    if let Some(tool_calls) = &choice.delta.tool_calls {
        for tc in tool_calls {
            let mut delta = ToolCallDelta::new(tc.index);
            if let Some(id) = &tc.id {
                delta = delta.with_id(id);
            }
            if let Some(func) = &tc.function {
                if let Some(name) = &func.name {
                    delta = delta.with_name(name);
                }
                if let Some(args) = &func.arguments {
                    delta = delta.with_arguments(args);
                }
            }
            chunk.tool_calls.push(delta);
        }
    }

    if let Some(reason) = &choice.finish_reason {
        chunk.finish_reason = Some(parse_finish_reason(Some(reason)));
    }

    if let Some(usage) = &parsed.usage {
        chunk.usage = Some(usage.to_stats());
    }

    Some(chunk)
}

// Provider response types

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiToolCall {
    id: String,
    function: OpenAiFunction,
}

#[derive(Debug, Deserialize)]
struct OpenAiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

impl OpenAiUsage {
    fn to_stats(&self) -> UsageStats {
        UsageStats {
            prompt_tokens: self.prompt_tokens,
            completion_tokens: self.completion_tokens,
            total_tokens: self.total_tokens,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamResponse {
    choices: Vec<OpenAiStreamChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiDelta {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiStreamToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamToolCall {
    index: usize,
    id: Option<String>,
    function: Option<OpenAiStreamFunction>,
}

#[derive(Debug, Deserialize)]
struct OpenAiStreamFunction {
    name: Option<String>,
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Message;
    use crate::tools::ToolDefinition;

    fn test_client() -> OpenAiClient {
        OpenAiClient::new(OpenAiConfig {
            api_key: "test-key".into(),
            base_url: "http://localhost:1".into(),
            model: "gpt-4o-mini".into(),
            temperature: Some(0.2),
            max_tokens: None,
        })
    }

    #[test]
    fn request_body_includes_tools_and_choice() {
        let client = test_client();
        let request = CompletionRequest {
            messages: vec![Message::user("hi")],
            tools: Some(vec![ToolDefinition::new(
                "add",
                "Adds numbers",
                json!({"type": "object", "properties": {}}),
            )]),
            tool_choice: Some(ToolChoice::Required),
            ..Default::default()
        };
        let body = client.build_request_body(&request);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["temperature"], 0.2);
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "add");
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn parses_tool_call_response_without_decoding_arguments() {
        let client = test_client();
        let response: OpenAiResponse = serde_json::from_value(json!({
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "function": {"name": "add", "arguments": "{\"a\":2,\"b\":3}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 6, "total_tokens": 18}
        }))
        .unwrap();

        let turn = client.parse_response(&response).unwrap();
        assert!(turn.content.is_none());
        assert_eq!(turn.finish_reason, FinishReason::ToolCalls);
        assert_eq!(turn.tool_calls.len(), 1);
        assert!(matches!(turn.tool_calls[0], ToolCallRequest::Function { .. }));
        assert_eq!(turn.usage.unwrap().total_tokens, 18);
    }

    #[test]
    fn empty_choices_is_a_parse_error() {
        let client = test_client();
        let response: OpenAiResponse =
            serde_json::from_value(json!({"choices": [], "usage": null})).unwrap();
        assert!(matches!(
            client.parse_response(&response),
            Err(LlmError::Parse(_))
        ));
    }
}
