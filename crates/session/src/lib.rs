//! Conversation state for one chat session
//!
//! An append-only log of turns. Every tool request made by an assistant turn
//! must be answered by the very next turn before anything else is appended.

use chrono::{DateTime, Local};
use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use newsdesk_provider::{Role, Turn};

/// Conversation errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConversationError {
    #[error("EMPTY TURN")]
    EmptyTurn,

    #[error("TOOL REQUESTS STILL OPEN: {0:?}")]
    UnansweredToolUse(Vec<String>),

    #[error("TOOL RESULTS DO NOT MATCH REQUESTS: expected {expected:?}, got {found:?}")]
    MismatchedToolResults {
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("TOOL RESULT WITHOUT REQUEST: {0}")]
    UnexpectedToolResult(String),
}

pub type Result<T> = std::result::Result<T, ConversationError>;

/// Ordered, append-only sequence of turns
#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    key: String,
    turns: Vec<Turn>,
    created_at: DateTime<Local>,
    updated_at: DateTime<Local>,
}

impl Conversation {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            key: key.into(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Append a turn. This is the only mutator.
    pub fn append(&mut self, turn: Turn) -> Result<()> {
        if turn.content.is_empty() {
            return Err(ConversationError::EmptyTurn);
        }

        let pending = self.pending_tool_uses();
        let mut answered: Vec<String> =
            turn.tool_result_ids().into_iter().map(str::to_string).collect();

        if pending.is_empty() {
            if let Some(id) = answered.into_iter().next() {
                return Err(ConversationError::UnexpectedToolResult(id));
            }
        } else {
            if turn.role == Role::Assistant || answered.is_empty() {
                return Err(ConversationError::UnansweredToolUse(pending));
            }
            // Each request needs exactly one result: compare as multisets.
            let mut expected = pending;
            expected.sort();
            answered.sort();
            if expected != answered {
                return Err(ConversationError::MismatchedToolResults {
                    expected,
                    found: answered,
                });
            }
        }

        debug!(
            "Conversation {}: appending {} turn ({} blocks)",
            self.key,
            turn.role.as_str(),
            turn.content.len()
        );
        self.turns.push(turn);
        self.updated_at = Local::now();
        Ok(())
    }

    /// Copy of the current turns
    pub fn snapshot(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Tool-use ids of the last turn that still await a result
    pub fn pending_tool_uses(&self) -> Vec<String> {
        match self.turns.last() {
            Some(turn) if turn.role == Role::Assistant => {
                turn.tool_use_ids().into_iter().map(str::to_string).collect()
            }
            _ => Vec::new(),
        }
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Local> {
        self.updated_at
    }
}
