//! Script-level error values
//!
//! Errors raised inside a script are ordinary values (`Val::Error`) so that
//! `try/catch` can bind them and read `.name` / `.message`.

use serde::{Deserialize, Serialize};

pub const ERROR: &str = "Error";
pub const TYPE_ERROR: &str = "TypeError";
pub const REFERENCE_ERROR: &str = "ReferenceError";
pub const RANGE_ERROR: &str = "RangeError";
pub const SYNTAX_ERROR: &str = "SyntaxError";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Constructor name (`Error`, `TypeError`, ...)
    pub code: String,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(TYPE_ERROR, message)
    }

    pub fn reference_error(message: impl Into<String>) -> Self {
        Self::new(REFERENCE_ERROR, message)
    }

    pub fn range_error(message: impl Into<String>) -> Self {
        Self::new(RANGE_ERROR, message)
    }
}

impl std::fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{}: {}", self.code, self.message)
        }
    }
}
