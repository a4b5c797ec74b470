use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::errors::DomainResult;
use crate::domain::ports::Tool;

/// Reports the current UTC time.
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn id(&self) -> &str {
        "current_time"
    }

    fn description(&self) -> &str {
        "Returns the current date and time in UTC."
    }

    fn input_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn prompt_fragment(&self) -> Option<String> {
        Some("Call current_time whenever the answer depends on today's date.".to_string())
    }

    async fn call(&self, _input: Value) -> DomainResult<Value> {
        let now = Utc::now();
        Ok(json!({
            "utc": now.to_rfc3339(),
            "unix": now.timestamp(),
        }))
    }
}
