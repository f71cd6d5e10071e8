//! Rule: Nesting Depth
//!
//! Brackets, template substitutions and chains of prefix operators may nest
//! at most [`MAX_NESTING_DEPTH`] levels. Deeper scripts are reported once,
//! on the line where the limit was crossed.

use crate::parser::nesting::{find_nesting_overflow, MAX_NESTING_DEPTH};
use crate::parser::trigger::TriggerShape;
use crate::types::ValidationError;

use super::super::ValidationRule;

pub struct NestingDepthRule;

impl ValidationRule for NestingDepthRule {
    fn id(&self) -> &'static str {
        "nesting-depth"
    }

    fn description(&self) -> &'static str {
        "Expressions must not nest too deeply"
    }

    fn validate(&self, script: &str, _shape: &TriggerShape) -> Vec<ValidationError> {
        find_nesting_overflow(script, MAX_NESTING_DEPTH)
            .map(|overflow| ValidationError::syntax(overflow.line, overflow.message()))
            .into_iter()
            .collect()
    }
}
