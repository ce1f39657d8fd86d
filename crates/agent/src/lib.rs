//! Agent core
//!
//! Tool registry, built-in news tools, and the tool-calling loop that drives
//! a model until it produces a final answer.

use thiserror::Error;

use newsdesk_provider::GatewayError;
use newsdesk_session::ConversationError;

pub mod context;
pub mod loop_agent;
pub mod tools;

pub use context::AgentSettings;
pub use loop_agent::{AgentEvent, AgentLoop};
pub use tools::{ToolRegistry, ToolTrait};

/// Agent errors. Tool failures never show up here; they are handed back to
/// the model as error results.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ {0}")]
    InferenceUnavailable(#[from] GatewayError),

    #[error("◆ RECURSION BUDGET EXCEEDED AFTER {rounds} TOOL ROUNDS")]
    RecursionBudgetExceeded { rounds: u32 },

    #[error("◆ UNEXPECTED STOP REASON: {0}")]
    UnexpectedStopReason(String),

    #[error("◆ MALFORMED RESPONSE: {0}")]
    MalformedResponse(String),

    #[error("◆ CONVERSATION ERROR: {0}")]
    Conversation(#[from] ConversationError),
}

pub type Result<T> = std::result::Result<T, AgentError>;

/// Rejected tool definitions. Fatal at startup.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistrationError {
    #[error("◆ INVALID TOOL NAME: '{0}'")]
    InvalidName(String),

    #[error("◆ TOOL '{0}' ALREADY REGISTERED")]
    DuplicateName(String),

    #[error("◆ TOOL '{0}' HAS NO DESCRIPTION")]
    MissingDescription(String),

    #[error("◆ PARAMETER '{param}' OF TOOL '{tool}' IS UNDOCUMENTED")]
    UndocumentedParameter { tool: String, param: String },

    #[error("◆ PARAMETER '{param}' OF TOOL '{tool}' DECLARED TWICE")]
    DuplicateParameter { tool: String, param: String },
}

/// Failures of a single tool call. The message becomes the tool result the
/// model sees.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool '{name}'. Available tools: {available}")]
    UnknownTool { name: String, available: String },

    #[error("Invalid arguments for '{tool}': {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("Tool '{tool}' failed: {message}")]
    Execution { tool: String, message: String },
}
