//! Built-in tools

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use super::{Tool, ToolOutput};

/// Echoes its input back; handy for wiring checks and demos
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Returns the provided text unchanged."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "text": {
                    "type": "string",
                    "description": "Text to echo back"
                }
            },
            "required": ["text"]
        })
    }

    async fn execute(&self, arguments: Value) -> anyhow::Result<ToolOutput> {
        match arguments.get("text").and_then(Value::as_str) {
            Some(text) => Ok(ToolOutput::text(text)),
            None => Ok(ToolOutput::error("missing required argument: text")),
        }
    }
}

/// Reports the current UTC date and time
pub struct ClockTool;

#[async_trait]
impl Tool for ClockTool {
    fn name(&self) -> &str {
        "clock"
    }

    fn description(&self) -> &str {
        "Returns the current date and time in UTC, ISO-8601 formatted."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, _arguments: Value) -> anyhow::Result<ToolOutput> {
        let now = Utc::now();
        Ok(ToolOutput::json(&json!({
            "datetime": now.to_rfc3339(),
            "timestamp": now.timestamp(),
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_returns_input() {
        let output = EchoTool.execute(json!({"text": "hello"})).await.unwrap();
        assert!(!output.is_error);
        assert_eq!(output.text_content(), "hello");
    }

    #[tokio::test]
    async fn echo_flags_missing_argument() {
        let output = EchoTool.execute(json!({})).await.unwrap();
        assert!(output.is_error);
        assert!(output.text_content().contains("text"));
    }

    #[tokio::test]
    async fn clock_reports_iso_datetime() {
        let output = ClockTool.execute(json!({})).await.unwrap();
        assert!(!output.is_error);
        let value: Value = serde_json::from_str(&output.text_content()).unwrap();
        assert!(value["datetime"].as_str().unwrap().contains('T'));
    }
}
