//! Control flow types

use super::values::Val;

/// Why the interpreter stopped a run from the outside
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    /// The instruction budget ran out
    StepLimit,
    /// The cancellation token fired (wall-clock timeout or caller abort)
    Cancelled,
}

/// Non-local exit from a statement or expression
///
/// Propagated as the `Err` side of `EvalResult` / `ExecResult` so `?` unwinds
/// naturally: loops absorb `Break`/`Continue`, calls absorb `Return`, `try`
/// absorbs `Throw`. `Halt` is never absorbed by script code.
#[derive(Debug, Clone)]
pub enum Control {
    Break,
    Continue,
    Return(Val),
    Throw(Val),
    Halt(HaltReason),
}

/// Result of evaluating an expression
pub type EvalResult = Result<Val, Control>;

/// Result of executing a statement
pub type ExecResult = Result<(), Control>;
