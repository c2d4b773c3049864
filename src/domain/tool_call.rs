//! Tool-call shapes and the single normalizer
//!
//! Model providers emit tool calls in several shapes: our canonical record,
//! the function-calling convention (`{id, function: {name, arguments}}` with
//! arguments as a JSON string), and the MCP convention (`{name, input}`).
//! `parse_tool_call` is the only place any of these is interpreted; the rest
//! of the engine consumes `ParsedToolCall`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Canonical tool-call request: a stable id, a tool name, and an argument map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Stable identifier linking the call to its result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Name of the tool being called
    pub name: String,
    /// Arguments passed to the tool
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    /// Create a canonical tool call with a fresh id
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: Some(generate_call_id()),
            name: name.into(),
            arguments,
        }
    }
}

/// Function-calling payload: name plus arguments as a raw JSON string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

/// A tool-call request in any provider shape
///
/// Variant order matters for untagged deserialization: the function-calling
/// shape is keyed by `function`, the MCP shape by `input`, and everything
/// else falls through to the canonical record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ToolCallRequest {
    /// `{id, type: "function", function: {name, arguments: "<json>"}}`
    Function {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        function: FunctionCall,
    },
    /// `{name, input: {...}}`
    Mcp { name: String, input: Value },
    /// `{id?, name, arguments: {...}}`
    Canonical(ToolCall),
}

impl ToolCallRequest {
    /// Build a canonical request (convenience for tests and scripted clients)
    pub fn canonical(name: impl Into<String>, arguments: Value) -> Self {
        Self::Canonical(ToolCall::new(name, arguments))
    }

    /// Build a function-shaped request with raw string arguments
    pub fn function(id: Option<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self::Function {
            id,
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// The tool name, readable without full normalization
    pub fn name(&self) -> &str {
        match self {
            Self::Function { function, .. } => &function.name,
            Self::Mcp { name, .. } => name,
            Self::Canonical(call) => &call.name,
        }
    }
}

/// A normalized tool call, ready for registry lookup and execution
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedToolCall {
    pub call_id: String,
    pub name: String,
    /// Always a JSON object
    pub arguments: Value,
}

/// Failure to normalize a request; carries enough identity to record the
/// error against the originating call so the loop can continue
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallParseFailure {
    pub call_id: String,
    pub name: String,
    pub error: String,
}

/// Synthesize a stable call identifier
pub fn generate_call_id() -> String {
    format!("tc_{}", Uuid::new_v4().simple())
}

/// Normalize any tool-call shape into `(call_id, name, arguments)`.
///
/// Missing ids are synthesized. String arguments are JSON-decoded; a decode
/// failure is returned as a `ToolCallParseFailure` rather than an engine
/// error, so the model gets a chance to self-correct.
pub fn parse_tool_call(request: &ToolCallRequest) -> Result<ParsedToolCall, ToolCallParseFailure> {
    match request {
        ToolCallRequest::Function { id, function } => {
            let call_id = id.clone().unwrap_or_else(generate_call_id);
            let arguments = decode_arguments(&function.arguments).map_err(|error| {
                ToolCallParseFailure {
                    call_id: call_id.clone(),
                    name: function.name.clone(),
                    error,
                }
            })?;
            Ok(ParsedToolCall {
                call_id,
                name: function.name.clone(),
                arguments,
            })
        }
        ToolCallRequest::Mcp { name, input } => Ok(ParsedToolCall {
            call_id: generate_call_id(),
            name: name.clone(),
            arguments: ensure_object(input.clone()),
        }),
        ToolCallRequest::Canonical(call) => {
            let call_id = call.id.clone().unwrap_or_else(generate_call_id);
            let arguments = match &call.arguments {
                Value::String(raw) => decode_arguments(raw).map_err(|error| {
                    ToolCallParseFailure {
                        call_id: call_id.clone(),
                        name: call.name.clone(),
                        error,
                    }
                })?,
                other => ensure_object(other.clone()),
            };
            Ok(ParsedToolCall {
                call_id,
                name: call.name.clone(),
                arguments,
            })
        }
    }
}

fn decode_arguments(raw: &str) -> Result<Value, String> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(value) => Ok(ensure_object(value)),
        Err(err) => Err(format!("argument decode error: {}", err)),
    }
}

fn ensure_object(value: Value) -> Value {
    match value {
        Value::Object(_) => value,
        Value::Null => Value::Object(Map::new()),
        other => {
            let mut map = Map::new();
            map.insert("value".to_string(), other);
            Value::Object(map)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_canonical_shape() {
        let request: ToolCallRequest =
            serde_json::from_value(json!({"id": "tc_1", "name": "add", "arguments": {"a": 2}}))
                .unwrap();
        let parsed = parse_tool_call(&request).unwrap();
        assert_eq!(parsed.call_id, "tc_1");
        assert_eq!(parsed.name, "add");
        assert_eq!(parsed.arguments, json!({"a": 2}));
    }

    #[test]
    fn parses_function_shape_with_string_arguments() {
        let request: ToolCallRequest = serde_json::from_value(json!({
            "id": "call_9",
            "function": {"name": "echo", "arguments": "{\"text\": \"hi\"}"}
        }))
        .unwrap();
        let parsed = parse_tool_call(&request).unwrap();
        assert_eq!(parsed.call_id, "call_9");
        assert_eq!(parsed.name, "echo");
        assert_eq!(parsed.arguments, json!({"text": "hi"}));
    }

    #[test]
    fn parses_mcp_shape_and_synthesizes_id() {
        let request: ToolCallRequest =
            serde_json::from_value(json!({"name": "search", "input": {"q": "rust"}})).unwrap();
        assert!(matches!(request, ToolCallRequest::Mcp { .. }));
        let parsed = parse_tool_call(&request).unwrap();
        assert!(parsed.call_id.starts_with("tc_"));
        assert_eq!(parsed.arguments, json!({"q": "rust"}));
    }

    #[test]
    fn synthesizes_id_when_missing() {
        let request: ToolCallRequest =
            serde_json::from_value(json!({"name": "ping", "arguments": {}})).unwrap();
        let parsed = parse_tool_call(&request).unwrap();
        assert!(parsed.call_id.starts_with("tc_"));
    }

    #[test]
    fn reports_malformed_string_arguments() {
        let request = ToolCallRequest::function(Some("tc_bad".into()), "echo", "{not json");
        let failure = parse_tool_call(&request).unwrap_err();
        assert_eq!(failure.call_id, "tc_bad");
        assert_eq!(failure.name, "echo");
        assert!(failure.error.contains("argument decode error"));
    }

    #[test]
    fn empty_string_arguments_decode_to_empty_object() {
        let request = ToolCallRequest::function(None, "noop", "");
        let parsed = parse_tool_call(&request).unwrap();
        assert_eq!(parsed.arguments, json!({}));
    }

    #[test]
    fn untagged_roundtrip_preserves_shape() {
        let function = ToolCallRequest::function(Some("a".into()), "f", "{}");
        let json = serde_json::to_value(&function).unwrap();
        let back: ToolCallRequest = serde_json::from_value(json).unwrap();
        assert_eq!(function, back);
    }
}
