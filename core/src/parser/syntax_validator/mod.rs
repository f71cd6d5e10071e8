//! Syntax Validation for Workflow Scripts
//!
//! Decides whether a script is well-formed enough to attempt execution. The
//! checks are lexical and run on raw text, so they report problems even when
//! the script would not parse.
//!
//! # Usage
//!
//! ```ignore
//! use flowops_core::parser::syntax_validator::validate_syntax;
//!
//! let errors = validate_syntax(script);
//! if !errors.is_empty() {
//!     // Do not execute
//! }
//! ```
//!
//! # Adding a New Rule
//!
//! 1. Create a new file in `syntax_validator/rules/`
//! 2. Implement `ValidationRule` for your struct
//! 3. Add it to the `Validator::new()` constructor
//!
//! Rules run in registration order and their errors are concatenated, so the
//! order of the list is part of the output contract.

pub mod rules;

use super::trigger::TriggerShape;
use crate::types::ValidationError;

// ============================================================================
// ValidationRule Trait
// ============================================================================

/// Trait that all syntax rules must implement.
pub trait ValidationRule: Send + Sync {
    /// Unique identifier for this rule (e.g., "bracket-balance")
    fn id(&self) -> &'static str;

    /// Human-readable description of what this rule checks
    fn description(&self) -> &'static str;

    /// Run the check and return any errors found, in report order.
    ///
    /// # Arguments
    /// * `script` - The raw script text
    /// * `shape` - The script's recognized trigger shape
    fn validate(&self, script: &str, shape: &TriggerShape) -> Vec<ValidationError>;
}

// ============================================================================
// Validator - Runs All Rules
// ============================================================================

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    /// Create a new validator with all built-in rules.
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(rules::HeadShapeRule),
                Box::new(rules::BracketBalanceRule),
                Box::new(rules::NestingDepthRule),
            ],
        }
    }

    /// Run all rules and collect errors.
    pub fn validate(&self, script: &str) -> Vec<ValidationError> {
        let shape = TriggerShape::recognize(script);
        self.rules
            .iter()
            .flat_map(|rule| rule.validate(script, &shape))
            .collect()
    }

    /// Registered rules as `(id, description)` pairs
    pub fn rules(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.rules.iter().map(|r| (r.id(), r.description()))
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Validate a script's syntax and return all errors found.
///
/// Order: the head-shape error (if any), then unmatched closing brackets in
/// the order encountered, then unclosed brackets in the order they opened,
/// then the nesting-depth error (if any).
pub fn validate_syntax(script: &str) -> Vec<ValidationError> {
    Validator::new().validate(script)
}
