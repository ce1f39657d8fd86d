//! Tool descriptors
//!
//! Declarative schema for a callable tool. Descriptors are built once when
//! a tool is registered and rendered into the provider's JSON shape on demand.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Declared type of a tool parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// JSON schema type keyword
    pub fn json_type(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
        }
    }
}

/// One named parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub description: String,
    pub required: bool,
}

/// Tool specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a required parameter
    pub fn required(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required: true,
        });
        self
    }

    /// Add an optional parameter
    pub fn optional(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParameterSpec {
            name: name.into(),
            kind,
            description: description.into(),
            required: false,
        });
        self
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Build JSON schema for the parameter object
    pub fn input_schema(&self) -> Value {
        let mut props = serde_json::Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            props.insert(
                param.name.clone(),
                json!({
                    "type": param.kind.json_type(),
                    "description": param.description
                }),
            );
            if param.required {
                required.push(param.name.clone());
            }
        }

        json!({
            "type": "object",
            "properties": props,
            "required": required
        })
    }

    /// Function-calling entry as chat-completions endpoints expect it
    pub fn to_function_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema()
            }
        })
    }
}
