//! Shared fixtures for agent tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use newsdesk_agent::tools::{DateTimeTool, ToolRegistry, ToolTrait};
use newsdesk_agent::{AgentLoop, AgentSettings};
use newsdesk_provider::{
    ContentBlock, InferenceGateway, InferenceRequest, InferenceResponse, MemoryAuditLog, ParamType,
    Provider, ProviderError, ToolDescriptor,
};
use serde_json::{Map, Value};

type Script = Box<dyn Fn(&InferenceRequest, usize) -> Result<InferenceResponse, ProviderError> + Send + Sync>;

/// Provider that answers from a closure and keeps every request it saw
pub struct ScriptedProvider {
    script: Script,
    requests: Mutex<Vec<InferenceRequest>>,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&InferenceRequest, usize) -> Result<InferenceResponse, ProviderError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<InferenceRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    async fn complete(&self, request: InferenceRequest) -> Result<InferenceResponse, ProviderError> {
        let index = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len() - 1
        };
        (self.script)(&request, index)
    }

    fn default_model(&self) -> String {
        "scripted".to_string()
    }

    fn is_configured(&self) -> bool {
        true
    }
}

/// Tool that counts its invocations and echoes its arguments
pub struct CountingTool {
    pub name: &'static str,
    pub calls: Arc<AtomicUsize>,
}

impl CountingTool {
    pub fn new(name: &'static str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Self {
                name,
                calls: calls.clone(),
            },
            calls,
        )
    }
}

#[async_trait]
impl ToolTrait for CountingTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name, "Counts calls").optional(
            "topic",
            ParamType::String,
            "Anything",
        )
    }

    async fn execute(
        &self,
        args: Map<String, Value>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Object(args))
    }
}

/// Tool whose body always fails
pub struct BrokenTool;

#[async_trait]
impl ToolTrait for BrokenTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new("broken", "Always fails")
    }

    async fn execute(
        &self,
        _args: Map<String, Value>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Err("news API returned 503 Service Unavailable".into())
    }
}

pub fn tool_call(id: &str, name: &str) -> ContentBlock {
    ContentBlock::tool_use(id, name, Map::new())
}

pub fn registry_with_clock() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(DateTimeTool).unwrap();
    registry
}

pub fn agent(
    provider: ScriptedProvider,
    registry: ToolRegistry,
    max_recursions: u32,
) -> (AgentLoop<ScriptedProvider>, Arc<MemoryAuditLog>) {
    let audit = Arc::new(MemoryAuditLog::new());
    let gateway = InferenceGateway::new(provider, audit.clone());
    let settings = AgentSettings::default().with_max_recursions(max_recursions);
    (
        AgentLoop::new(gateway, Arc::new(registry), settings),
        audit,
    )
}
