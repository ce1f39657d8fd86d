//! Inference provider boundary
//!
//! Conversation data model, tool schemas, and the transport used to reach a
//! hosted model. The [`InferenceGateway`] wraps any [`Provider`] and records
//! every request/response pair to an [`AuditSink`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use thiserror::Error;

pub mod audit;
pub mod gateway;
pub mod openrouter;
pub mod retry;
pub mod schema;

pub use audit::{AuditRecord, AuditSink, FileAuditLog, MemoryAuditLog};
pub use gateway::{GatewayError, InferenceGateway};
pub use openrouter::OpenRouterProvider;
pub use retry::RetryPolicy;
pub use schema::{ParamType, ParameterSpec, ToolDescriptor};

/// Transport errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("SIGNAL LOST: {0}")]
    Request(#[from] reqwest::Error),

    #[error("MALFORMED PAYLOAD: {0}")]
    Json(#[from] serde_json::Error),

    #[error("PROVIDER REJECTED ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("ACCESS DENIED: NO API KEY")]
    NoApiKey,

    #[error("CORRUPTED RESPONSE: {0}")]
    InvalidResponse(String),

    #[error("RATE LIMITED")]
    RateLimited,

    #[error("GAVE UP AFTER {attempts} ATTEMPTS: {last}")]
    RetriesExhausted { attempts: u32, last: String },
}

impl ProviderError {
    /// Whether another attempt could succeed. Throttling, server faults and
    /// connection problems qualify; rejected or malformed requests do not.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            ProviderError::RateLimited => true,
            ProviderError::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// Author of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// One block of turn content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: Map<String, Value>,
    },
    ToolResult {
        tool_use_id: String,
        content: Value,
        #[serde(default)]
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_use(id: impl Into<String>, name: impl Into<String>, input: Map<String, Value>) -> Self {
        ContentBlock::ToolUse {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    pub fn tool_result(tool_use_id: impl Into<String>, content: Value) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content,
            is_error: false,
        }
    }

    /// Failed tool call; the message is what the model gets to see.
    pub fn tool_error(tool_use_id: impl Into<String>, message: impl Into<String>) -> Self {
        ContentBlock::ToolResult {
            tool_use_id: tool_use_id.into(),
            content: Value::String(message.into()),
            is_error: true,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, ContentBlock::ToolResult { is_error: true, .. })
    }
}

/// Borrowed view of a tool-use block
#[derive(Debug, Clone, Copy)]
pub struct ToolUseRef<'a> {
    pub id: &'a str,
    pub name: &'a str,
    pub input: &'a Map<String, Value>,
}

/// One entry in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

impl Turn {
    pub fn new(role: Role, content: Vec<ContentBlock>) -> Self {
        Self { role, content }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(Role::User, vec![ContentBlock::text(text)])
    }

    pub fn assistant(content: Vec<ContentBlock>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Results for a dispatch round travel back as a user turn.
    pub fn tool_results(results: Vec<ContentBlock>) -> Self {
        Self::new(Role::User, results)
    }

    pub fn tool_uses(&self) -> impl Iterator<Item = ToolUseRef<'_>> {
        self.content.iter().filter_map(|block| match block {
            ContentBlock::ToolUse { id, name, input } => Some(ToolUseRef { id, name, input }),
            _ => None,
        })
    }

    pub fn has_tool_uses(&self) -> bool {
        self.tool_uses().next().is_some()
    }

    pub fn tool_use_ids(&self) -> Vec<&str> {
        self.tool_uses().map(|call| call.id).collect()
    }

    pub fn tool_result_ids(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.iter().filter_map(ContentBlock::as_text)
    }

    pub fn first_text(&self) -> Option<&str> {
        self.texts().next()
    }
}

/// Why the model stopped generating
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    ToolUse,
    EndTurn,
    Other(String),
}

impl StopReason {
    /// Normalize a provider finish reason. Both the Anthropic and the
    /// OpenAI spellings are understood.
    pub fn from_provider(raw: &str) -> Self {
        match raw {
            "tool_use" | "tool_calls" | "function_call" => StopReason::ToolUse,
            "end_turn" | "stop" => StopReason::EndTurn,
            other => StopReason::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::ToolUse => f.write_str("tool_use"),
            StopReason::EndTurn => f.write_str("end_turn"),
            StopReason::Other(raw) => f.write_str(raw),
        }
    }
}

/// Resource consumption
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Sampling parameters sent with every request
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            top_p: 0.999,
            max_tokens: 4096,
        }
    }
}

/// Everything the provider needs for one call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub model: String,
    pub system: String,
    pub conversation: Vec<Turn>,
    pub sampling: SamplingConfig,
    pub tools: Vec<ToolDescriptor>,
}

/// Provider answer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResponse {
    pub turn: Turn,
    pub stop_reason: StopReason,
    #[serde(default)]
    pub usage: Usage,
    /// Provider-specific fields kept for the audit trail
    #[serde(default)]
    pub metadata: Value,
}

impl InferenceResponse {
    pub fn new(turn: Turn, stop_reason: StopReason) -> Self {
        Self {
            turn,
            stop_reason,
            usage: Usage::default(),
            metadata: Value::Null,
        }
    }

    /// Final answer made of a single text block
    pub fn end_turn(text: impl Into<String>) -> Self {
        Self::new(
            Turn::assistant(vec![ContentBlock::text(text)]),
            StopReason::EndTurn,
        )
    }

    /// Assistant turn requesting the given tool calls
    pub fn tool_use(blocks: Vec<ContentBlock>) -> Self {
        Self::new(Turn::assistant(blocks), StopReason::ToolUse)
    }
}

/// Model transport
#[async_trait]
pub trait Provider: Send + Sync {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse>;
    fn default_model(&self) -> String;
    fn is_configured(&self) -> bool;
}
