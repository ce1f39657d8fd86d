//! Clock tool: get_current_date_time

use async_trait::async_trait;
use chrono::{Local, SecondsFormat};
use serde_json::{Map, Value};

use newsdesk_provider::ToolDescriptor;

use super::ToolTrait;

/// Reports the local date and time
pub struct DateTimeTool;

#[async_trait]
impl ToolTrait for DateTimeTool {
    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(
            "get_current_date_time",
            "Returns the current local date and time as an ISO-8601 timestamp.",
        )
    }

    async fn execute(
        &self,
        _args: Map<String, Value>,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        Ok(Value::String(
            Local::now().to_rfc3339_opts(SecondsFormat::Secs, false),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_returns_parseable_timestamp() {
        let value = DateTimeTool.execute(Map::new()).await.unwrap();
        let text = value.as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(text).is_ok());
    }

    #[test]
    fn test_descriptor_has_no_parameters() {
        let descriptor = DateTimeTool.descriptor();
        assert_eq!(descriptor.name, "get_current_date_time");
        assert!(descriptor.parameters.is_empty());
    }
}
