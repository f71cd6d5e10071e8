//! Rule: Bracket Balance
//!
//! Tracks `(`, `[` and `{` on a stack while scanning the text line by line.
//!
//! - A closing bracket that does not match the top of the stack is reported
//!   as `Unmatched closing bracket: X` on its line. The stack is left as is.
//! - Brackets still open at the end are reported as `Unclosed bracket: X` on
//!   the line where they were opened, in opening order.
//!
//! # Examples
//!
//! ```js
//! export default async (ctx) => {
//!   return ctx.text
//! }}   // Unmatched closing bracket: } (line 3)
//! ```
//!
//! # Notes
//!
//! The scan is purely lexical: brackets inside strings and comments count.

use crate::parser::trigger::TriggerShape;
use crate::types::ValidationError;

use super::super::ValidationRule;

pub struct BracketBalanceRule;

fn opener_for(close: char) -> Option<char> {
    match close {
        ')' => Some('('),
        ']' => Some('['),
        '}' => Some('{'),
        _ => None,
    }
}

impl ValidationRule for BracketBalanceRule {
    fn id(&self) -> &'static str {
        "bracket-balance"
    }

    fn description(&self) -> &'static str {
        "Parentheses, brackets and braces must be balanced"
    }

    fn validate(&self, script: &str, _shape: &TriggerShape) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        // (bracket, 1-indexed line)
        let mut open: Vec<(char, usize)> = Vec::new();

        for (idx, line) in script.split('\n').enumerate() {
            let line_no = idx + 1;
            for ch in line.chars() {
                match ch {
                    '(' | '[' | '{' => open.push((ch, line_no)),
                    ')' | ']' | '}' => {
                        let expected = opener_for(ch);
                        match open.last() {
                            Some((top, _)) if Some(*top) == expected => {
                                open.pop();
                            }
                            _ => errors.push(ValidationError::syntax(
                                line_no,
                                format!("Unmatched closing bracket: {}", ch),
                            )),
                        }
                    }
                    _ => {}
                }
            }
        }

        errors.extend(
            open.into_iter()
                .map(|(ch, line)| ValidationError::syntax(line, format!("Unclosed bracket: {}", ch))),
        );

        errors
    }
}
