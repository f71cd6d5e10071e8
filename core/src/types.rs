//! Core data types shared by the validator, the sandbox and the CLI

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use serde_json::Value as JsonValue;

/* ===================== Validation Errors ===================== */

/// Category of a validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Malformed script, detected before any execution attempt
    Syntax,
    /// Thrown while executing the handler (line is always unknown)
    Runtime,
    /// Reserved; no rule currently emits warnings
    Warning,
    /// The run exceeded its wall-clock timeout or instruction budget
    Timeout,
}

/// A single problem found while validating or test-running a script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// 1-indexed source line, 0 when unknown
    pub line: usize,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: ErrorKind,
}

impl ValidationError {
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
            kind: ErrorKind::Syntax,
        }
    }

    /// Runtime errors cannot be mapped back to a source line
    pub fn runtime(message: impl Into<String>) -> Self {
        Self {
            line: 0,
            message: message.into(),
            kind: ErrorKind::Runtime,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            line: 0,
            message: message.into(),
            kind: ErrorKind::Timeout,
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            ErrorKind::Syntax => "syntax",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Warning => "warning",
            ErrorKind::Timeout => "timeout",
        };
        if self.line > 0 {
            write!(f, "{} error at line {}: {}", kind, self.line, self.message)
        } else {
            write!(f, "{} error: {}", kind, self.message)
        }
    }
}

/* ===================== Log Entries ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Info,
    Warning,
    Error,
    Result,
}

/// One line of output captured during a test run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
    /// Epoch milliseconds
    pub timestamp: i64,
}

impl LogEntry {
    pub fn new(kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogKind::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogKind::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogKind::Error, message)
    }

    pub fn result(message: impl Into<String>) -> Self {
        Self::new(LogKind::Result, message)
    }
}

/* ===================== Validation Result ===================== */

/// Outcome of validating and test-running a workflow script.
///
/// Validity is derived from the error list and cannot be set independently.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    is_valid: bool,
    errors: Vec<ValidationError>,
    logs: Vec<LogEntry>,
}

impl ValidationResult {
    pub fn new(errors: Vec<ValidationError>, logs: Vec<LogEntry>) -> Self {
        Self {
            is_valid: errors.is_empty(),
            errors,
            logs,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn logs(&self) -> &[LogEntry] {
        &self.logs
    }

    /// The `result` log entry, present only when the handler completed
    pub fn result_log(&self) -> Option<&LogEntry> {
        self.logs.iter().find(|entry| entry.kind == LogKind::Result)
    }
}

/* ===================== Trigger Data ===================== */

/// Trigger metadata recovered from script text
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    pub integration: Option<String>,
    pub event: Option<String>,
    /// Handler parameter name, or the channel/source field of trigger-call forms
    pub context_parameter_name: Option<String>,
}

/// Trigger configured in the editor UI; overrides anything found in the script
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerConfig {
    pub integration: String,
    pub event: String,
    #[serde(default)]
    pub options: HashMap<String, JsonValue>,
}

impl TriggerConfig {
    pub fn new(integration: impl Into<String>, event: impl Into<String>) -> Self {
        Self {
            integration: integration.into(),
            event: event.into(),
            options: HashMap::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// String-valued option, ignoring empty strings and non-string values
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options
            .get(key)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }
}
