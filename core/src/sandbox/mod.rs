//! Sandboxed script execution
//!
//! A run happens on its own worker thread that owns every piece of
//! interpreter state. Only plain data crosses the boundary: the script text
//! and JSON context go in, a [`RunOutcome`] comes back over a oneshot channel.
//!
//! The parser and the evaluator recurse on the worker's stack, so the thread
//! is spawned with [`WORKER_STACK_SIZE`] regardless of the host runtime.
//!
//! The caller side enforces a wall-clock timeout. When it fires, the worker's
//! cancellation token is triggered and the interpreter stops at its next
//! step; the worker is awaited before returning so no run outlives its call.

pub mod console;

use std::panic::{self, AssertUnwindSafe};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::Value as JsonValue;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::executor::{self, thrown_message, Control, HaltReason, Limits, VM};
use crate::parser;
use console::Console;

/// Default wall-clock limit for one run
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Stack reserved for each worker thread
pub const WORKER_STACK_SIZE: usize = 64 * 1024 * 1024;

type WorkerResult = thread::Result<RunOutcome>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SandboxSettings {
    pub timeout: Duration,
    pub limits: Limits,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            limits: Limits::default(),
        }
    }
}

/// Everything a worker needs to run one script
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub script: String,
    /// Mock trigger context handed to the handler
    pub context: JsonValue,
    /// Integration/event the capability SDK is installed for
    pub integration: String,
    pub event: String,
}

/// How a run ended
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The handler returned; `rendered` is `JSON.stringify(result)` or `undefined`
    Completed { rendered: String },
    /// The script threw, or could not be loaded
    Threw { message: String },
    /// Wall-clock timeout or instruction budget exhausted
    TimedOut { message: String },
    /// The caller cancelled the run
    Cancelled,
}

#[derive(Debug, Clone, Default)]
pub struct Sandbox {
    settings: SandboxSettings,
}

impl Sandbox {
    pub fn new(settings: SandboxSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &SandboxSettings {
        &self.settings
    }

    pub async fn run(&self, request: RunRequest, console: Console) -> RunOutcome {
        self.run_with_cancel(request, console, CancellationToken::new())
            .await
    }

    /// Run `request` on a worker thread, honoring the timeout and `cancel`
    pub async fn run_with_cancel(
        &self,
        request: RunRequest,
        console: Console,
        cancel: CancellationToken,
    ) -> RunOutcome {
        let start = Instant::now();
        let worker_cancel = cancel.child_token();
        let token = worker_cancel.clone();
        let limits = self.settings.limits;

        let mut done = match spawn_worker(move || execute(&request, console, limits, token)) {
            Ok(done) => done,
            Err(e) => {
                tracing::error!(error = %e, "failed to spawn sandbox worker");
                return RunOutcome::Threw {
                    message: format!("Failed to start sandbox worker: {}", e),
                };
            }
        };

        match tokio::time::timeout(self.settings.timeout, &mut done).await {
            Ok(Ok(Ok(outcome))) => {
                tracing::debug!(
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "sandbox run finished"
                );
                outcome
            }
            Ok(Ok(Err(payload))) => {
                let message = panic_message(payload.as_ref());
                tracing::error!(error = %message, "sandbox worker failed");
                RunOutcome::Threw { message }
            }
            Ok(Err(_closed)) => {
                tracing::error!("sandbox worker exited without reporting");
                RunOutcome::Threw {
                    message: "sandbox worker exited without a result".to_string(),
                }
            }
            Err(_elapsed) => {
                let timeout_ms = self.settings.timeout.as_millis() as u64;
                tracing::warn!(timeout_ms, "sandbox run timed out, cancelling worker");
                worker_cancel.cancel();
                // The worker stops at its next step
                let _ = done.await;
                RunOutcome::TimedOut {
                    message: format!("Execution timed out after {} ms", timeout_ms),
                }
            }
        }
    }
}

/// Start `job` on a fresh thread with [`WORKER_STACK_SIZE`] of stack
///
/// The receiver yields the job's outcome, or its panic payload.
fn spawn_worker<F>(job: F) -> std::io::Result<oneshot::Receiver<WorkerResult>>
where
    F: FnOnce() -> RunOutcome + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::Builder::new()
        .name("flowops-sandbox".to_string())
        .stack_size(WORKER_STACK_SIZE)
        .spawn(move || {
            let result = panic::catch_unwind(AssertUnwindSafe(job));
            // The caller may have stopped listening
            let _ = tx.send(result);
        })?;
    Ok(rx)
}

/// Worker body: parse, install the SDK, load the program and call the handler
pub fn execute(
    request: &RunRequest,
    console: Console,
    limits: Limits,
    cancel: CancellationToken,
) -> RunOutcome {
    let program = match parser::parse_script(&request.script) {
        Ok(program) => program,
        Err(e) => {
            return RunOutcome::Threw {
                message: e.summary(),
            }
        }
    };

    let mut vm = VM::new(limits, console, cancel);
    vm.install_sdk(&request.integration, &request.event);

    let outcome = executor::run_handler(&mut vm, &program, &request.context);
    tracing::trace!(steps = vm.steps(), "interpreter stopped");

    match outcome {
        Ok(value) => match value.stringify() {
            Ok(rendered) => RunOutcome::Completed {
                rendered: rendered.unwrap_or_else(|| "undefined".to_string()),
            },
            Err(e) => RunOutcome::Threw {
                message: e.to_error().message,
            },
        },
        Err(Control::Throw(value)) => RunOutcome::Threw {
            message: thrown_message(&value),
        },
        Err(Control::Halt(HaltReason::StepLimit)) => RunOutcome::TimedOut {
            message: format!(
                "Execution exceeded the instruction budget of {} steps",
                limits.max_steps
            ),
        },
        Err(Control::Halt(HaltReason::Cancelled)) => {
            tracing::debug!("sandbox run cancelled");
            RunOutcome::Cancelled
        }
        // `load_program` and function calls absorb these
        Err(Control::Return(_)) | Err(Control::Break) | Err(Control::Continue) => {
            RunOutcome::Threw {
                message: "Illegal control flow outside a function".to_string(),
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("sandbox worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("sandbox worker panicked: {}", s)
    } else {
        "sandbox worker panicked".to_string()
    }
}
