//! Rule: Head Shape
//!
//! Reports an error at line 1 when the script neither starts with a
//! function head nor contains a recognized trigger call.
//!
//! # Examples
//!
//! ```js
//! // OK
//! export default async (context) => { return context.text }
//!
//! // OK (legacy)
//! flowops.trigger({ integration: "slack", event: "message" })
//!
//! // Error: no recognized convention
//! function handler(context) { return context.text }
//! ```

use crate::parser::trigger::TriggerShape;
use crate::types::ValidationError;

use super::super::ValidationRule;

pub const INVALID_HEAD_MESSAGE: &str =
    "Invalid workflow syntax. Use the pattern: export default async (context) => {...}";

pub struct HeadShapeRule;

impl ValidationRule for HeadShapeRule {
    fn id(&self) -> &'static str {
        "head-shape"
    }

    fn description(&self) -> &'static str {
        "Scripts must be an async single-parameter function or a trigger call"
    }

    fn validate(&self, _script: &str, shape: &TriggerShape) -> Vec<ValidationError> {
        match shape {
            TriggerShape::Unrecognized => vec![ValidationError::syntax(1, INVALID_HEAD_MESSAGE)],
            _ => vec![],
        }
    }
}
