//! OpenRouter / OpenAI-compatible transport
//!
//! Encodes an [`InferenceRequest`] as a chat-completions call and decodes the
//! reply back into turns and content blocks. Transient failures are retried
//! according to the configured [`RetryPolicy`].

use std::time::Duration;

use crate::*;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, trace};

/// Key holding tool arguments that did not decode to a JSON object
pub const RAW_ARGUMENTS_KEY: &str = "__raw_arguments";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenRouter node
pub struct OpenRouterProvider {
    client: Client,
    api_key: String,
    api_base: String,
    default_model: String,
    retry: RetryPolicy,
}

impl OpenRouterProvider {
    pub fn new(
        api_key: impl Into<String>,
        api_base: Option<String>,
        default_model: Option<String>,
    ) -> Self {
        let api_key = api_key.into();
        let is_openrouter = api_key.starts_with("sk-or-")
            || api_base
                .as_ref()
                .map(|b| b.contains("openrouter"))
                .unwrap_or(false);

        let api_base = api_base.unwrap_or_else(|| {
            if is_openrouter {
                "https://openrouter.ai/api/v1".to_string()
            } else {
                "https://api.openai.com/v1".to_string()
            }
        });

        let default_model = default_model.unwrap_or_else(|| {
            if is_openrouter {
                "anthropic/claude-3-haiku".to_string()
            } else {
                "gpt-4o-mini".to_string()
            }
        });

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            default_model,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    fn build_request(&self, request: &InferenceRequest) -> serde_json::Value {
        let mut messages = Vec::new();
        if !request.system.trim().is_empty() {
            messages.push(json!({ "role": "system", "content": request.system.trim() }));
        }
        for turn in &request.conversation {
            encode_turn(turn, &mut messages);
        }

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "max_tokens": request.sampling.max_tokens,
            "temperature": request.sampling.temperature,
            "top_p": request.sampling.top_p,
        });

        if !request.tools.is_empty() {
            let tools: Vec<serde_json::Value> = request
                .tools
                .iter()
                .map(ToolDescriptor::to_function_json)
                .collect();
            body["tools"] = json!(tools);
            body["tool_choice"] = json!("auto");
        }

        body
    }

    fn parse_response(&self, json: serde_json::Value) -> Result<InferenceResponse> {
        let choice = json["choices"]
            .get(0)
            .ok_or_else(|| ProviderError::InvalidResponse("no choices".to_string()))?;
        let message = &choice["message"];
        let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop").to_string();

        let mut content = Vec::new();
        if let Some(text) = message["content"].as_str() {
            if !text.is_empty() {
                content.push(ContentBlock::text(text));
            }
        }

        if let Some(calls) = message["tool_calls"].as_array() {
            for call in calls {
                let function = &call["function"];
                let name = function["name"]
                    .as_str()
                    .ok_or_else(|| ProviderError::InvalidResponse("tool call without name".to_string()))?;
                let id = call["id"]
                    .as_str()
                    .ok_or_else(|| ProviderError::InvalidResponse("tool call without id".to_string()))?;
                content.push(ContentBlock::tool_use(id, name, decode_arguments(&function["arguments"])));
            }
        }

        let turn = Turn::assistant(content);
        let mut stop_reason = StopReason::from_provider(&finish_reason);
        // Some routes report "stop" even when the message carries tool calls.
        if stop_reason == StopReason::EndTurn && turn.has_tool_uses() {
            stop_reason = StopReason::ToolUse;
        }

        let usage = if let Some(usage) = json["usage"].as_object() {
            let field = |key: &str| usage.get(key).and_then(|v| v.as_u64()).unwrap_or(0) as u32;
            Usage {
                prompt_tokens: field("prompt_tokens"),
                completion_tokens: field("completion_tokens"),
                total_tokens: field("total_tokens"),
            }
        } else {
            Usage::default()
        };

        Ok(InferenceResponse {
            turn,
            stop_reason,
            usage,
            metadata: json!({
                "id": json["id"],
                "model": json["model"],
                "finish_reason": finish_reason,
            }),
        })
    }

    async fn send_once(&self, body: &serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/chat/completions", self.api_base);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|j| j["error"]["message"].as_str().map(str::to_string))
                .unwrap_or(text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(serde_json::from_str(&text)?)
    }
}

fn encode_turn(turn: &Turn, messages: &mut Vec<serde_json::Value>) {
    match turn.role {
        Role::Assistant => {
            let text: Vec<&str> = turn.texts().collect();
            let mut obj = json!({ "role": "assistant" });
            obj["content"] = if text.is_empty() {
                serde_json::Value::Null
            } else {
                json!(text.join("\n"))
            };

            let tool_calls: Vec<serde_json::Value> = turn
                .tool_uses()
                .map(|call| {
                    json!({
                        "id": call.id,
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": serde_json::Value::Object(call.input.clone()).to_string()
                        }
                    })
                })
                .collect();
            if !tool_calls.is_empty() {
                obj["tool_calls"] = json!(tool_calls);
            }
            messages.push(obj);
        }
        Role::User | Role::Tool => {
            // Tool results must directly follow the assistant message that requested them.
            for block in &turn.content {
                if let ContentBlock::ToolResult {
                    tool_use_id,
                    content,
                    is_error,
                } = block
                {
                    let body = match content {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    let body = if *is_error {
                        format!("Error: {}", body)
                    } else {
                        body
                    };
                    messages.push(json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": body
                    }));
                }
            }
            let text: Vec<&str> = turn.texts().collect();
            if !text.is_empty() {
                messages.push(json!({ "role": "user", "content": text.join("\n") }));
            }
        }
    }
}

fn decode_arguments(raw: &serde_json::Value) -> serde_json::Map<String, serde_json::Value> {
    let parsed = match raw {
        serde_json::Value::String(s) if s.trim().is_empty() => return serde_json::Map::new(),
        serde_json::Value::String(s) => {
            serde_json::from_str(s).unwrap_or_else(|_| serde_json::Value::String(s.clone()))
        }
        serde_json::Value::Null => return serde_json::Map::new(),
        other => other.clone(),
    };

    match parsed {
        serde_json::Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert(RAW_ARGUMENTS_KEY.to_string(), other);
            map
        }
    }
}

#[async_trait::async_trait]
impl Provider for OpenRouterProvider {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse> {
        if self.api_key.is_empty() {
            return Err(ProviderError::NoApiKey);
        }

        trace!("Opening uplink to {}", self.api_base);
        let body = self.build_request(&request);
        let json = self.retry.run(|| self.send_once(&body)).await?;

        debug!(
            "Provider returned {} tool calls",
            json["choices"][0]["message"]["tool_calls"]
                .as_array()
                .map(|v| v.len())
                .unwrap_or(0)
        );

        self.parse_response(json)
    }

    fn default_model(&self) -> String {
        self.default_model.clone()
    }

    fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }
}
