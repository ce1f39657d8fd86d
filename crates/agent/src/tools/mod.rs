//! Tool registry
//!
//! Tools declare their schema up front. The registry validates descriptors at
//! registration, checks and coerces arguments before a call, and turns every
//! failure into an error result addressed to the originating call id.

pub mod clock;
pub mod news;

pub use clock::DateTimeTool;
pub use news::{ArticleDetailsTool, NewsArticlesTool};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use newsdesk_config::NewsConfig;
use newsdesk_provider::openrouter::RAW_ARGUMENTS_KEY;
use newsdesk_provider::{ContentBlock, ParamType, ToolDescriptor};

use crate::{RegistrationError, ToolError};

const MAX_NAME_LEN: usize = 64;

/// A callable tool
#[async_trait]
pub trait ToolTrait: Send + Sync {
    fn descriptor(&self) -> ToolDescriptor;

    /// Run with arguments already checked against the descriptor
    async fn execute(
        &self,
        args: Map<String, Value>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>>;
}

struct Entry {
    descriptor: ToolDescriptor,
    tool: Arc<dyn ToolTrait>,
}

/// Tool registry
#[derive(Default)]
pub struct ToolRegistry {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<T: ToolTrait + 'static>(&mut self, tool: T) -> Result<(), RegistrationError> {
        let descriptor = tool.descriptor();
        validate_descriptor(&descriptor)?;
        if self.index.contains_key(&descriptor.name) {
            return Err(RegistrationError::DuplicateName(descriptor.name));
        }

        debug!("Registered tool {}", descriptor.name);
        self.index.insert(descriptor.name.clone(), self.entries.len());
        self.entries.push(Entry {
            descriptor,
            tool: Arc::new(tool),
        });
        Ok(())
    }

    /// Descriptors in registration order
    pub fn describe_all(&self) -> Vec<ToolDescriptor> {
        self.entries.iter().map(|e| e.descriptor.clone()).collect()
    }

    /// Descriptor set in the function-calling JSON shape
    pub fn provider_schema(&self) -> Value {
        Value::Array(
            self.entries
                .iter()
                .map(|e| e.descriptor.to_function_json())
                .collect(),
        )
    }

    pub fn descriptor(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.entries[i].descriptor)
    }

    pub fn has(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries
            .iter()
            .map(|e| e.descriptor.name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Call a tool on behalf of a tool-use request. Never fails: errors come
    /// back as an `is_error` result for the same call id.
    pub async fn invoke(&self, call_id: &str, name: &str, input: Map<String, Value>) -> ContentBlock {
        match self.try_invoke(name, input).await {
            Ok(output) => ContentBlock::tool_result(call_id, output),
            Err(e) => {
                warn!("Tool call {} ({}) failed: {}", call_id, name, e);
                ContentBlock::tool_error(call_id, e.to_string())
            }
        }
    }

    /// Look up, check arguments, and run a tool
    pub async fn try_invoke(&self, name: &str, input: Map<String, Value>) -> Result<Value, ToolError> {
        let entry = self
            .index
            .get(name)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| ToolError::UnknownTool {
                name: name.to_string(),
                available: self.names().join(", "),
            })?;

        let args = check_arguments(&entry.descriptor, input)?;
        let tool = Arc::clone(&entry.tool);

        // A panic surfaces as a JoinError.
        let handle = tokio::spawn(async move { tool.execute(args).await.map_err(|e| e.to_string()) });

        match handle.await {
            Ok(Ok(output)) => Ok(output),
            Ok(Err(message)) => Err(ToolError::Execution {
                tool: name.to_string(),
                message,
            }),
            Err(join_err) => Err(ToolError::Execution {
                tool: name.to_string(),
                message: panic_message(join_err),
            }),
        }
    }
}

/// Register the news assistant tools
pub fn register_default_tools(
    registry: &mut ToolRegistry,
    news: &NewsConfig,
) -> Result<(), RegistrationError> {
    registry.register(DateTimeTool)?;
    registry.register(NewsArticlesTool::from_config(news))?;
    registry.register(ArticleDetailsTool::from_config(news))?;
    Ok(())
}

fn validate_descriptor(descriptor: &ToolDescriptor) -> Result<(), RegistrationError> {
    let name = &descriptor.name;
    let valid_name = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if !valid_name {
        return Err(RegistrationError::InvalidName(name.clone()));
    }
    if descriptor.description.trim().is_empty() {
        return Err(RegistrationError::MissingDescription(name.clone()));
    }

    let mut seen = std::collections::HashSet::new();
    for param in &descriptor.parameters {
        if param.description.trim().is_empty() {
            return Err(RegistrationError::UndocumentedParameter {
                tool: name.clone(),
                param: param.name.clone(),
            });
        }
        if !seen.insert(param.name.as_str()) {
            return Err(RegistrationError::DuplicateParameter {
                tool: name.clone(),
                param: param.name.clone(),
            });
        }
    }
    Ok(())
}

/// Check `input` against the descriptor and coerce values to declared types.
/// Null counts as absent.
pub fn check_arguments(
    descriptor: &ToolDescriptor,
    mut input: Map<String, Value>,
) -> Result<Map<String, Value>, ToolError> {
    let invalid = |reason: String| ToolError::InvalidArguments {
        tool: descriptor.name.clone(),
        reason,
    };

    if let Some(raw) = input.get(RAW_ARGUMENTS_KEY) {
        let raw = raw.as_str().map(str::to_string).unwrap_or_else(|| raw.to_string());
        return Err(invalid(format!("arguments were not a JSON object: {}", raw)));
    }
    if let Some(unknown) = input.keys().find(|k| descriptor.parameter(k).is_none()) {
        return Err(invalid(format!("unexpected argument '{}'", unknown)));
    }

    let mut args = Map::new();
    for param in &descriptor.parameters {
        match input.remove(&param.name) {
            None | Some(Value::Null) => {
                if param.required {
                    return Err(invalid(format!("missing required argument '{}'", param.name)));
                }
            }
            Some(value) => {
                let coerced = coerce(value, param.kind).ok_or_else(|| {
                    invalid(format!(
                        "argument '{}' is not a valid {}",
                        param.name,
                        param.kind.json_type()
                    ))
                })?;
                args.insert(param.name.clone(), coerced);
            }
        }
    }
    Ok(args)
}

fn coerce(value: Value, kind: ParamType) -> Option<Value> {
    match (kind, value) {
        (ParamType::String, Value::String(s)) => Some(Value::String(s)),
        (ParamType::String, Value::Number(n)) => Some(Value::String(n.to_string())),
        (ParamType::String, Value::Bool(b)) => Some(Value::String(b.to_string())),

        (ParamType::Integer, Value::Number(n)) => {
            if let Some(i) = n.as_i64() {
                Some(Value::from(i))
            } else {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                    .map(|f| Value::from(f as i64))
            }
        }
        (ParamType::Integer, Value::String(s)) => s.trim().parse::<i64>().ok().map(Value::from),

        (ParamType::Number, Value::Number(n)) => Some(Value::Number(n)),
        (ParamType::Number, Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number),

        (ParamType::Boolean, Value::Bool(b)) => Some(Value::Bool(b)),
        (ParamType::Boolean, Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },

        _ => None,
    }
}

fn panic_message(err: tokio::task::JoinError) -> String {
    if !err.is_panic() {
        return format!("task cancelled: {}", err);
    }
    let payload = err.into_panic();
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor() -> ToolDescriptor {
        ToolDescriptor::new("search", "Search articles")
            .required("topic", ParamType::String, "Topic")
            .optional("limit", ParamType::Integer, "Result cap")
            .optional("ratio", ParamType::Number, "Ratio")
            .optional("fresh", ParamType::Boolean, "Only fresh")
    }

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_check_arguments_coerces_strings() {
        let args = check_arguments(
            &descriptor(),
            map(json!({"topic": "s3", "limit": "5", "ratio": "0.5", "fresh": "TRUE"})),
        )
        .unwrap();

        assert_eq!(args["topic"], "s3");
        assert_eq!(args["limit"], 5);
        assert_eq!(args["ratio"], 0.5);
        assert_eq!(args["fresh"], true);
    }

    #[test]
    fn test_check_arguments_number_to_string_and_whole_float() {
        let args = check_arguments(&descriptor(), map(json!({"topic": 42, "limit": 3.0}))).unwrap();
        assert_eq!(args["topic"], "42");
        assert_eq!(args["limit"], 3);
    }

    #[test]
    fn test_check_arguments_missing_required() {
        let err = check_arguments(&descriptor(), map(json!({"limit": 1}))).unwrap_err();
        assert_eq!(
            err,
            ToolError::InvalidArguments {
                tool: "search".to_string(),
                reason: "missing required argument 'topic'".to_string(),
            }
        );
    }

    #[test]
    fn test_check_arguments_null_optional_is_dropped() {
        let args = check_arguments(&descriptor(), map(json!({"topic": "x", "limit": null}))).unwrap();
        assert!(!args.contains_key("limit"));
    }

    #[test]
    fn test_check_arguments_rejects_uncoercible() {
        let err = check_arguments(&descriptor(), map(json!({"topic": "x", "limit": 2.5}))).unwrap_err();
        assert!(err.to_string().contains("'limit' is not a valid integer"));

        let err = check_arguments(&descriptor(), map(json!({"topic": ["a"]}))).unwrap_err();
        assert!(err.to_string().contains("'topic' is not a valid string"));

        let err = check_arguments(&descriptor(), map(json!({"topic": "x", "fresh": "maybe"}))).unwrap_err();
        assert!(err.to_string().contains("boolean"));
    }

    #[test]
    fn test_check_arguments_rejects_unknown_keys() {
        let err = check_arguments(&descriptor(), map(json!({"topic": "x", "color": "red"}))).unwrap_err();
        assert!(err.to_string().contains("unexpected argument 'color'"));
    }

    #[test]
    fn test_check_arguments_reports_non_object_arguments() {
        let err = check_arguments(&descriptor(), map(json!({"__raw_arguments": "not json"}))).unwrap_err();
        assert_eq!(
            err,
            ToolError::InvalidArguments {
                tool: "search".to_string(),
                reason: "arguments were not a JSON object: not json".to_string(),
            }
        );

        let err = check_arguments(&descriptor(), map(json!({"__raw_arguments": [1, 2]}))).unwrap_err();
        assert!(err.to_string().contains("not a JSON object: [1,2]"));
        assert!(!err.to_string().contains("unexpected argument"));
    }
}
