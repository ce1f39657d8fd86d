//! Agent loop - drives the model through tool-use rounds until it answers

use std::collections::HashSet;
use std::sync::Arc;

use futures::future::join_all;
use serde_json::{Map, Value};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use newsdesk_provider::{
    ContentBlock, InferenceGateway, InferenceResponse, Provider, StopReason, Turn,
};
use newsdesk_session::Conversation;

use crate::context::AgentSettings;
use crate::tools::ToolRegistry;
use crate::{AgentError, Result};

/// Progress notices for the console
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Text the model emitted alongside a tool request
    Thinking(String),
    ToolCall {
        id: String,
        name: String,
        input: Map<String, Value>,
    },
    ToolResult {
        id: String,
        name: String,
        is_error: bool,
    },
}

enum State {
    AwaitingModel,
    DispatchingTools(Turn),
    Done(String),
}

/// The agent loop owns the gateway and a shared read-only tool registry
pub struct AgentLoop<P: Provider> {
    gateway: InferenceGateway<P>,
    tools: Arc<ToolRegistry>,
    settings: AgentSettings,
    events: Option<UnboundedSender<AgentEvent>>,
}

impl<P: Provider> AgentLoop<P> {
    pub fn new(gateway: InferenceGateway<P>, tools: Arc<ToolRegistry>, settings: AgentSettings) -> Self {
        Self {
            gateway,
            tools,
            settings,
            events: None,
        }
    }

    /// Report progress on `sender`
    pub fn with_events(mut self, sender: UnboundedSender<AgentEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    pub fn gateway(&self) -> &InferenceGateway<P> {
        &self.gateway
    }

    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    pub fn settings(&self) -> &AgentSettings {
        &self.settings
    }

    /// Append `input` as a user turn and run until the model produces a
    /// final answer. Turns completed before a failure stay in `conversation`.
    pub async fn process_turn(&self, conversation: &mut Conversation, input: &str) -> Result<String> {
        debug!("Processing turn: {}", input.chars().take(100).collect::<String>());
        conversation.append(Turn::user(input))?;

        let descriptors = self.tools.describe_all();
        let mut budget = self.settings.max_recursions;
        let mut rounds = 0u32;
        let mut state = State::AwaitingModel;

        loop {
            state = match state {
                State::AwaitingModel => {
                    let request = self.settings.build_request(conversation, descriptors.clone());
                    let response = self.gateway.complete(request).await?;

                    info!(
                        "Iteration {}: stop reason {}, budget {}",
                        rounds + 1,
                        response.stop_reason,
                        budget
                    );

                    self.interpret(conversation, response, budget, rounds)?
                }
                State::DispatchingTools(turn) => {
                    conversation.append(turn)?;
                    let results = self.dispatch(conversation).await;
                    conversation.append(Turn::tool_results(results))?;

                    budget -= 1;
                    rounds += 1;
                    State::AwaitingModel
                }
                State::Done(answer) => return Ok(answer),
            };
        }
    }

    fn interpret(
        &self,
        conversation: &mut Conversation,
        response: InferenceResponse,
        budget: u32,
        rounds: u32,
    ) -> Result<State> {
        let turn = response.turn;

        match response.stop_reason {
            StopReason::ToolUse => {
                if !turn.has_tool_uses() {
                    return Err(AgentError::MalformedResponse(
                        "tool_use stop reason without tool requests".to_string(),
                    ));
                }
                if let Some(id) = duplicate_call_id(&turn) {
                    return Err(AgentError::MalformedResponse(format!(
                        "duplicate tool call id '{}'",
                        id
                    )));
                }
                if budget == 0 {
                    warn!("Recursion budget exhausted after {} rounds", rounds);
                    return Err(AgentError::RecursionBudgetExceeded { rounds });
                }
                Ok(State::DispatchingTools(turn))
            }
            StopReason::EndTurn => {
                if turn.has_tool_uses() {
                    return Err(AgentError::MalformedResponse(
                        "end_turn stop reason with pending tool requests".to_string(),
                    ));
                }
                let answer = match turn.first_text() {
                    Some(text) => text.to_string(),
                    None => {
                        warn!("Model ended its turn without text");
                        String::new()
                    }
                };
                if !turn.content.is_empty() {
                    conversation.append(turn)?;
                }
                Ok(State::Done(answer))
            }
            StopReason::Other(reason) => {
                if !turn.content.is_empty() && !turn.has_tool_uses() {
                    conversation.append(turn)?;
                }
                Err(AgentError::UnexpectedStopReason(reason))
            }
        }
    }

    /// Run every tool request of the last assistant turn and collect one
    /// result per request, in request order
    async fn dispatch(&self, conversation: &Conversation) -> Vec<ContentBlock> {
        let Some(turn) = conversation.last() else {
            return Vec::new();
        };

        for text in turn.texts().filter(|t| !t.trim().is_empty()) {
            self.emit(AgentEvent::Thinking(text.to_string()));
        }

        let calls: Vec<_> = turn
            .tool_uses()
            .map(|call| {
                self.emit(AgentEvent::ToolCall {
                    id: call.id.to_string(),
                    name: call.name.to_string(),
                    input: call.input.clone(),
                });
                (call.id.to_string(), call.name.to_string(), call.input.clone())
            })
            .collect();

        debug!("Dispatching {} tool calls", calls.len());

        let results = join_all(
            calls
                .iter()
                .map(|(id, name, input)| self.tools.invoke(id, name, input.clone())),
        )
        .await;

        for ((id, name, _), result) in calls.iter().zip(&results) {
            self.emit(AgentEvent::ToolResult {
                id: id.clone(),
                name: name.clone(),
                is_error: result.is_error(),
            });
        }

        results
    }

    fn emit(&self, event: AgentEvent) {
        if let Some(sender) = &self.events {
            // A dropped receiver only means nobody is watching.
            let _ = sender.send(event);
        }
    }
}

fn duplicate_call_id(turn: &Turn) -> Option<String> {
    let mut seen = HashSet::new();
    turn.tool_use_ids()
        .into_iter()
        .find(|id| !seen.insert(*id))
        .map(str::to_string)
}
