//! Request assembly for the agent loop

use newsdesk_config::Config;
use newsdesk_provider::{InferenceRequest, SamplingConfig, ToolDescriptor};
use newsdesk_session::Conversation;

/// Fixed parameters of every request the loop sends
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub model: String,
    pub system_prompt: String,
    pub sampling: SamplingConfig,
    /// Tool rounds allowed per user turn
    pub max_recursions: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl AgentSettings {
    pub fn from_config(config: &Config) -> Self {
        let agent = &config.agent;
        Self {
            model: agent.model.clone(),
            system_prompt: agent.system_prompt.clone(),
            sampling: SamplingConfig {
                temperature: agent.temperature,
                top_p: agent.top_p,
                max_tokens: agent.max_tokens,
            },
            max_recursions: agent.max_recursions,
        }
    }

    pub fn with_max_recursions(mut self, max_recursions: u32) -> Self {
        self.max_recursions = max_recursions;
        self
    }

    /// Snapshot the conversation into a request
    pub fn build_request(
        &self,
        conversation: &Conversation,
        tools: Vec<ToolDescriptor>,
    ) -> InferenceRequest {
        InferenceRequest {
            model: self.model.clone(),
            system: self.system_prompt.clone(),
            conversation: conversation.snapshot(),
            sampling: self.sampling,
            tools,
        }
    }
}
