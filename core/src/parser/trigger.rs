//! Trigger-shape recognition
//!
//! Classifies a script by the authoring convention it follows and recovers any
//! trigger metadata written into the text. Conventions are tried in a fixed
//! priority order and the first match wins:
//!
//! 1. `export default async (ctx) => ...`
//! 2. `async (ctx) => ...`
//! 3. `trigger({ integration, event, channel|source })(async (ctx) => ...)`
//! 4. `flowops.trigger({ integration, event, ... })`
//!
//! The two head shapes are anchored at the start of the script; the trigger
//! calls are found anywhere in the text. This works on raw text and never
//! needs the script to parse.

use pest::iterators::Pairs;
use pest::Parser;
use pest_derive::Parser;
use serde::Serialize;

use crate::types::TriggerInfo;

#[derive(Parser)]
#[grammar = "parser/shapes.pest"]
struct ShapeParser;

/// The authoring convention a script follows
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum TriggerShape {
    ExportDefaultAsync {
        param: String,
    },
    BareAsync {
        param: String,
    },
    ModernTriggerCall {
        integration: String,
        event: String,
        channel_or_source: Option<String>,
    },
    LegacyTriggerCall {
        integration: String,
        event: String,
        channel_or_source: Option<String>,
    },
    Unrecognized,
}

impl TriggerShape {
    /// Classify `script`
    pub fn recognize(script: &str) -> Self {
        if let Some(param) = head_param(Rule::export_default_head, script) {
            return TriggerShape::ExportDefaultAsync { param };
        }
        if let Some(param) = head_param(Rule::bare_async_head, script) {
            return TriggerShape::BareAsync { param };
        }
        if let Some((integration, event, channel_or_source)) =
            trigger_fields(Rule::find_modern, script)
        {
            return TriggerShape::ModernTriggerCall {
                integration,
                event,
                channel_or_source,
            };
        }
        if let Some((integration, event, channel_or_source)) =
            trigger_fields(Rule::find_legacy, script)
        {
            return TriggerShape::LegacyTriggerCall {
                integration,
                event,
                channel_or_source,
            };
        }
        TriggerShape::Unrecognized
    }

    /// True for the two function-head conventions
    pub fn is_function_head(&self) -> bool {
        matches!(
            self,
            TriggerShape::ExportDefaultAsync { .. } | TriggerShape::BareAsync { .. }
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            TriggerShape::ExportDefaultAsync { .. } => "export-default-async",
            TriggerShape::BareAsync { .. } => "bare-async",
            TriggerShape::ModernTriggerCall { .. } => "modern-trigger-call",
            TriggerShape::LegacyTriggerCall { .. } => "legacy-trigger-call",
            TriggerShape::Unrecognized => "unrecognized",
        }
    }

    /// Trigger metadata carried by this shape; `None` when unrecognized
    pub fn info(&self) -> Option<TriggerInfo> {
        match self {
            TriggerShape::ExportDefaultAsync { param } | TriggerShape::BareAsync { param } => {
                Some(TriggerInfo {
                    integration: None,
                    event: None,
                    context_parameter_name: Some(param.clone()),
                })
            }
            TriggerShape::ModernTriggerCall {
                integration,
                event,
                channel_or_source,
            }
            | TriggerShape::LegacyTriggerCall {
                integration,
                event,
                channel_or_source,
            } => Some(TriggerInfo {
                integration: Some(integration.clone()),
                event: Some(event.clone()),
                context_parameter_name: channel_or_source.clone(),
            }),
            TriggerShape::Unrecognized => None,
        }
    }
}

/// Recover trigger metadata from script text
pub fn extract_trigger_info(script: &str) -> Option<TriggerInfo> {
    TriggerShape::recognize(script).info()
}

fn head_param(rule: Rule, script: &str) -> Option<String> {
    let pairs = ShapeParser::parse(rule, script).ok()?;
    find_value(pairs, Rule::param)
}

fn trigger_fields(rule: Rule, script: &str) -> Option<(String, String, Option<String>)> {
    let pairs = ShapeParser::parse(rule, script).ok()?;
    let integration = find_value(pairs.clone(), Rule::integration_value)?;
    let event = find_value(pairs.clone(), Rule::event_value)?;
    let channel = find_value(pairs, Rule::channel_value);
    Some((integration, event, channel))
}

fn find_value(pairs: Pairs<Rule>, rule: Rule) -> Option<String> {
    pairs
        .flatten()
        .find(|pair| pair.as_rule() == rule)
        .map(|pair| pair.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_default_head() {
        let shape = TriggerShape::recognize("export default async (context) => {\n  return 1\n}");
        assert_eq!(
            shape,
            TriggerShape::ExportDefaultAsync {
                param: "context".to_string()
            }
        );
        let info = shape.info().unwrap();
        assert_eq!(info.context_parameter_name.as_deref(), Some("context"));
        assert!(info.integration.is_none());
        assert!(info.event.is_none());
    }

    #[test]
    fn test_leading_whitespace_allowed() {
        let shape = TriggerShape::recognize("\n\n   async ( ctx )=> ctx.text");
        assert_eq!(
            shape,
            TriggerShape::BareAsync {
                param: "ctx".to_string()
            }
        );
    }

    #[test]
    fn test_head_must_be_at_start() {
        let shape = TriggerShape::recognize("const x = 1\nexport default async (ctx) => {}");
        assert_eq!(shape, TriggerShape::Unrecognized);
    }

    #[test]
    fn test_modern_trigger_call() {
        let script = r#"trigger({ integration: "slack", event: "message", channel: "support" })(async (ctx) => {
  await slack.reply(ctx.channel, "hi")
})"#;
        assert_eq!(
            TriggerShape::recognize(script),
            TriggerShape::ModernTriggerCall {
                integration: "slack".to_string(),
                event: "message".to_string(),
                channel_or_source: Some("support".to_string()),
            }
        );
    }

    #[test]
    fn test_modern_trigger_with_extra_fields() {
        let script = "trigger({integration: 'github', event: 'push', branch: 'main'})(async (e) => e)";
        let info = extract_trigger_info(script).unwrap();
        assert_eq!(info.integration.as_deref(), Some("github"));
        assert_eq!(info.event.as_deref(), Some("push"));
        assert_eq!(info.context_parameter_name, None);
    }

    #[test]
    fn test_legacy_trigger_call() {
        let script = "// old style\nflowops.trigger({ integration: 'linkedin', event: 'new_applicant', source: 'Careers' })";
        assert_eq!(
            TriggerShape::recognize(script),
            TriggerShape::LegacyTriggerCall {
                integration: "linkedin".to_string(),
                event: "new_applicant".to_string(),
                channel_or_source: Some("Careers".to_string()),
            }
        );
    }

    #[test]
    fn test_export_default_wins_over_trigger_text() {
        let script = r#"export default async (ctx) => {
  // flowops.trigger({ integration: "slack", event: "message" })
  return ctx
}"#;
        let shape = TriggerShape::recognize(script);
        assert!(matches!(shape, TriggerShape::ExportDefaultAsync { .. }));
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(TriggerShape::recognize("function main() {}"), TriggerShape::Unrecognized);
        assert_eq!(extract_trigger_info(""), None);
        // An export without `async` is not a recognized head
        assert_eq!(
            TriggerShape::recognize("export default (ctx) => ctx"),
            TriggerShape::Unrecognized
        );
    }
}
