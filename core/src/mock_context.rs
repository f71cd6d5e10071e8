//! Mock trigger contexts
//!
//! Resolves the trigger a test run should pretend to receive, then builds a
//! canned payload shaped like that integration's events.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value as JsonValue};
use std::collections::HashMap;
use uuid::Uuid;

use crate::parser::trigger::extract_trigger_info;
use crate::types::TriggerConfig;

pub const DEFAULT_INTEGRATION: &str = "default";
pub const DEFAULT_EVENT: &str = "default";

/// Where the effective trigger came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerSource {
    /// A `TriggerConfig` supplied by the editor
    Ui,
    /// Integration and event recovered from the script text
    Script,
    /// Neither was available
    Default,
}

/// The trigger a run is executed against
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveTrigger {
    pub integration: String,
    pub event: String,
    /// Options only ever come from a `TriggerConfig`
    pub options: HashMap<String, JsonValue>,
    pub source: TriggerSource,
}

impl EffectiveTrigger {
    /// A supplied config always wins; the script is not inspected in that case
    pub fn resolve(script: &str, config: Option<&TriggerConfig>) -> Self {
        if let Some(config) = config {
            return Self {
                integration: config.integration.clone(),
                event: config.event.clone(),
                options: config.options.clone(),
                source: TriggerSource::Ui,
            };
        }

        match extract_trigger_info(script) {
            Some(info) => match (info.integration, info.event) {
                (Some(integration), Some(event)) => Self {
                    integration,
                    event,
                    options: HashMap::new(),
                    source: TriggerSource::Script,
                },
                _ => Self::default_trigger(),
            },
            None => Self::default_trigger(),
        }
    }

    fn default_trigger() -> Self {
        Self {
            integration: DEFAULT_INTEGRATION.to_string(),
            event: DEFAULT_EVENT.to_string(),
            options: HashMap::new(),
            source: TriggerSource::Default,
        }
    }

    /// The info log line announcing how the trigger was chosen
    pub fn log_message(&self) -> String {
        match self.source {
            TriggerSource::Ui => {
                format!("Using UI-defined trigger: {}/{}", self.integration, self.event)
            }
            TriggerSource::Script => format!(
                "Trigger detected from code: {}/{}",
                self.integration, self.event
            ),
            TriggerSource::Default => "Using default trigger configuration".to_string(),
        }
    }

    fn option(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Build the canned payload for `trigger.integration`
pub fn build_mock_context(trigger: &EffectiveTrigger) -> JsonValue {
    match trigger.integration.as_str() {
        "http" => {
            let method = trigger.option("httpMethod").unwrap_or("GET").to_uppercase();
            let path = trigger.option("httpPath").unwrap_or("/api/hello");
            json!({
                "method": method,
                "url": format!("https://example.com{}", path),
                "headers": {
                    "content-type": "application/json",
                    "user-agent": "Mozilla/5.0",
                    "x-request-id": request_id(),
                },
                "body": { "data": "Sample request data" },
            })
        }
        "slack" => json!({
            "text": "How do I reset my password?",
            "user": "U123456",
            "channel": trigger.option("channel").unwrap_or("general"),
        }),
        "linkedin" => json!({
            "resume": "John Doe\n+1 (555) 123-4567\nSenior Software Engineer at ABC Corp\n5 years experience in React and Node.js",
            "source": trigger.option("source").unwrap_or("CompanyLinkedin"),
        }),
        "salesforce" => json!({
            "name": "Acme Inc",
            "email": "contact@acme.com",
            "company": "Acme",
            "leadSource": "Website",
        }),
        "github" => json!({
            "repository": trigger.option("repository").unwrap_or("username/repo"),
            "event": trigger.event,
            "commit": {
                "id": "abc123",
                "message": "Update README.md",
                "author": "User Name <user@example.com>",
            },
        }),
        "notion" => json!({
            "pageId": "abc123",
            "pageTitle": "Meeting Notes",
            "lastEditedBy": "User Name",
            "content": "Content of the page that was updated",
        }),
        _ => json!({
            "text": "Sample message content",
            "user": "user123",
            "channel": "general",
            "email": "user@example.com",
            "name": "Sample User",
            "company": "Sample Corp",
            "phone": "+1 (555) 987-6543",
            "data": {
                "id": "data123",
                "type": "sample",
                "attributes": { "field1": "value1", "field2": "value2" },
            },
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "resume": "John Doe\n+1 (555) 123-4567\nSenior Software Engineer\n5 years experience",
        }),
    }
}

/// `req_` followed by 13 random lowercase hex characters
fn request_id() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("req_{}", &id[..13])
}
