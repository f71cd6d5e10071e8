//! Test helpers for executor tests
//!
//! Common utilities for parsing scripts and running their handlers

use serde_json::{json, Value as JsonValue};
use tokio_util::sync::CancellationToken;

use crate::executor::{run_handler, thrown_message, Control, Limits, Val, VM};
use crate::parser;
use crate::sandbox::console::Console;
use crate::types::LogEntry;

/// What a handler run produced
pub struct Run {
    pub result: Result<Val, Control>,
    pub logs: Vec<LogEntry>,
}

impl Run {
    /// The settled return value as JSON, panicking if the run did not complete
    pub fn json(&self) -> JsonValue {
        match &self.result {
            Ok(value) => value
                .to_json()
                .expect("Result converts to JSON")
                .unwrap_or(JsonValue::Null),
            Err(control) => panic!("Expected completion, got {:?}", control),
        }
    }

    /// Message of the uncaught throw, panicking if the run completed
    pub fn thrown(&self) -> String {
        match &self.result {
            Err(Control::Throw(value)) => thrown_message(value),
            other => panic!("Expected a throw, got {:?}", other),
        }
    }

    pub fn messages(&self) -> Vec<&str> {
        self.logs.iter().map(|entry| entry.message.as_str()).collect()
    }
}

/// Parse `source`, install the SDK for `integration` and run the handler
///
/// # Arguments
/// * `source` - Full workflow script, including the handler
/// * `integration` - Integration the SDK is installed for
/// * `context` - Value passed as the handler's only argument
/// * `limits` - Step and call depth limits
pub fn run_with(source: &str, integration: &str, context: JsonValue, limits: Limits) -> Run {
    let program = parser::parse_script(source).expect("Parse script failed");

    let console = Console::default();
    let capture = console.capture();

    let mut vm = VM::new(limits, console.clone(), CancellationToken::new());
    vm.install_sdk(integration, "test");
    let result = run_handler(&mut vm, &program, &context);

    Run {
        result,
        logs: capture.drain(),
    }
}

/// Run with the default integration, a small context and default limits
pub fn run(source: &str) -> Run {
    run_with(
        source,
        "default",
        json!({ "text": "hello", "user": "U1", "count": 2 }),
        Limits::default(),
    )
}

/// Wrap a handler body in `export default async (ctx) => { ... }` and run it
pub fn run_body(body: &str) -> Run {
    run(&format!("export default async (ctx) => {{\n{}\n}}", body))
}
