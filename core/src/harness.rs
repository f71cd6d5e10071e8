//! Workflow test harness
//!
//! Runs the full validate-then-execute pipeline for one script and always
//! answers with a [`ValidationResult`]:
//!
//! ```text
//! START → syntax check ──fail──► invalid (syntax errors, one error log)
//!           │ pass
//!           ▼
//!   trigger resolution → mock context → sandboxed run
//!                                        ├─ returned  ► valid (logs incl. result)
//!                                        ├─ threw     ► invalid (runtime error)
//!                                        └─ timed out ► invalid (timeout error)
//! ```

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::mock_context::{build_mock_context, EffectiveTrigger};
use crate::sandbox::console::Console;
use crate::sandbox::{RunOutcome, RunRequest, Sandbox, SandboxSettings};
use crate::types::{LogEntry, TriggerConfig, ValidationError, ValidationResult};

pub use crate::parser::syntax_validator::validate_syntax;
pub use crate::parser::trigger::extract_trigger_info;

/// Runs workflow tests against a shared console, one at a time
#[derive(Debug, Default)]
pub struct Harness {
    sandbox: Sandbox,
    console: Console,
    serial: Mutex<()>,
}

impl Harness {
    pub fn new(settings: SandboxSettings) -> Self {
        Self {
            sandbox: Sandbox::new(settings),
            console: Console::default(),
            serial: Mutex::new(()),
        }
    }

    /// Use `console` as the sink script output is forwarded to
    pub fn with_console(mut self, console: Console) -> Self {
        self.console = console;
        self
    }

    pub fn console(&self) -> &Console {
        &self.console
    }

    pub fn settings(&self) -> &SandboxSettings {
        self.sandbox.settings()
    }

    pub async fn execute(&self, script: &str, config: Option<&TriggerConfig>) -> ValidationResult {
        self.execute_with_cancel(script, config, CancellationToken::new())
            .await
    }

    /// Validate and test-run `script`; cancelling `cancel` stops the run early
    pub async fn execute_with_cancel(
        &self,
        script: &str,
        config: Option<&TriggerConfig>,
        cancel: CancellationToken,
    ) -> ValidationResult {
        // Capture swaps the shared console sink; runs must not interleave
        let _serial = self.serial.lock().await;

        let span = tracing::info_span!("workflow_test", script_bytes = script.len());
        self.run_pipeline(script, config, cancel)
            .instrument(span)
            .await
    }

    async fn run_pipeline(
        &self,
        script: &str,
        config: Option<&TriggerConfig>,
        cancel: CancellationToken,
    ) -> ValidationResult {
        tracing::debug!("run started");

        let syntax_errors = validate_syntax(script);
        if !syntax_errors.is_empty() {
            tracing::info!(errors = syntax_errors.len(), "syntax validation failed");
            return ValidationResult::new(
                syntax_errors,
                vec![LogEntry::error("Syntax validation failed")],
            );
        }

        let mut logs = vec![LogEntry::info("Starting workflow execution")];

        let trigger = EffectiveTrigger::resolve(script, config);
        tracing::debug!(
            integration = %trigger.integration,
            event = %trigger.event,
            source = ?trigger.source,
            "trigger resolved"
        );
        logs.push(LogEntry::info(trigger.log_message()));

        let context = build_mock_context(&trigger);
        logs.push(LogEntry::info(format!("Using mock context: {}", context)));

        let request = RunRequest {
            script: script.to_string(),
            context,
            integration: trigger.integration,
            event: trigger.event,
        };

        let outcome = {
            let capture = self.console.capture();
            let outcome = self
                .sandbox
                .run_with_cancel(request, self.console.clone(), cancel)
                .await;
            logs.extend(capture.drain());
            outcome
        };

        let mut errors = Vec::new();
        match outcome {
            RunOutcome::Completed { rendered } => {
                logs.push(LogEntry::result(format!("Execution result: {}", rendered)));
            }
            RunOutcome::Threw { message } => {
                errors.push(ValidationError::runtime(format!("Runtime error: {}", message)));
                logs.push(LogEntry::error(format!("Execution failed: {}", message)));
            }
            RunOutcome::TimedOut { message } => {
                logs.push(LogEntry::error(format!("Execution failed: {}", message)));
                errors.push(ValidationError::timeout(message));
            }
            RunOutcome::Cancelled => {
                let message = "Execution cancelled";
                errors.push(ValidationError::timeout(message));
                logs.push(LogEntry::error(format!("Execution failed: {}", message)));
            }
        }

        tracing::info!(valid = errors.is_empty(), logs = logs.len(), "run finished");
        ValidationResult::new(errors, logs)
    }
}

/// Validate and test-run a script with default settings
pub async fn execute_workflow(script: &str, config: Option<&TriggerConfig>) -> ValidationResult {
    Harness::default().execute(script, config).await
}
