//! Error types for the agent execution engine

use thiserror::Error;

use crate::guardrails::GuardrailStage;

/// Errors that terminate an agent run
#[derive(Debug, Error)]
pub enum AgentError {
    /// A stored or wire-form message could not be decoded
    #[error("message decode error: {0}")]
    MessageDecode(String),

    /// A tool name was registered twice
    #[error("duplicate tool: {0}")]
    DuplicateTool(String),

    /// Model client failure (transient retries are the client's business;
    /// whatever reaches the engine ends the run)
    #[error("model error: {0}")]
    Model(#[from] LlmError),

    /// A guardrail vetoed the run
    #[error("guardrail '{name}' vetoed {stage}: {reason}")]
    GuardrailVeto {
        name: String,
        stage: GuardrailStage,
        reason: String,
    },

    /// Overall run deadline expired
    #[error("deadline_exceeded")]
    DeadlineExceeded,

    /// Run was cancelled externally
    #[error("run was cancelled")]
    Cancelled,

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

/// Errors from model client operations
#[derive(Debug, Error)]
pub enum LlmError {
    /// API error with HTTP status
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Rate limited
    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Authentication error
    #[error("authentication error: {0}")]
    Authentication(String),

    /// Network error
    #[error("network error: {0}")]
    Network(String),

    /// Streaming error
    #[error("streaming error: {0}")]
    Streaming(String),

    /// Response parse error
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out
    #[error("request timed out")]
    Timeout,
}

impl LlmError {
    /// Whether a retry could plausibly succeed. The engine itself never
    /// retries; clients use this to drive their own backoff.
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_)
            | LlmError::Streaming(_)
            | LlmError::Timeout
            | LlmError::RateLimited { .. } => true,
            LlmError::Api { status, .. } => *status >= 500,
            LlmError::Authentication(_)
            | LlmError::Parse(_)
            | LlmError::InvalidRequest(_) => false,
        }
    }
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_connect() {
            LlmError::Network(format!("connection error: {}", err))
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::Serialization(err.to_string())
    }
}

/// Result type alias for engine operations
pub type AgentResult<T> = Result<T, AgentError>;

/// Result type alias for model client operations
pub type LlmResult<T> = Result<T, LlmError>;
