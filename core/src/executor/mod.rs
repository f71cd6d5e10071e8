//! Script Executor
//!
//! A tree-walking interpreter for the JavaScript subset workflow scripts are
//! written in. It replaces `eval` with an explicit, bounded runtime.
//!
//! ## Core Principles
//!
//! 1. **Everything is a value**: thrown errors, promises and functions are all
//!    `Val`s; nothing escapes into Rust panics
//! 2. **Control flow as `Err`**: `return`, `break`, `throw` and budget halts
//!    travel through `Result<_, Control>` so `?` unwinds naturally
//! 3. **Promises are settled**: async functions run to completion before they
//!    return, so `await` never suspends
//! 4. **Bounded**: every statement and call costs one step; the step budget,
//!    call depth and cancellation token are checked on each step
//!
//! ## Architecture
//!
//! - `types`: AST node types, runtime values, control signals
//! - `env`: lexical scope chain
//! - `vm`: VM state, limits, function calls
//! - `statements` / `expressions`: the evaluator, split by node kind
//! - `stdlib`: built-ins, the capability SDK and web stubs

pub mod env;
pub mod errors;
pub mod expressions;
pub mod statements;
pub mod stdlib;
pub mod types;
pub mod vm;

#[cfg(test)]
mod tests;

pub use errors::ErrorInfo;
pub use types::{Control, EvalResult, ExecResult, HaltReason, PromiseState, Stmt, Val};
pub use vm::{thrown_message, Limits, VM};

use serde_json::Value as JsonValue;

use crate::parser::Program;

/// Index of the top-level statement that produces the workflow handler
///
/// In order of preference:
/// 1. `export default <expr>`
/// 2. a bare function literal used as a statement (`async (ctx) => {...}`)
/// 3. a legacy `trigger({...})(handler)` / `flowops.trigger({...})(handler)` call
pub fn locate_handler(program: &Program) -> Option<usize> {
    let body = &program.body;

    if let Some(idx) = body
        .iter()
        .position(|s| matches!(s, Stmt::ExportDefault { .. }))
    {
        return Some(idx);
    }

    if let Some(idx) = body.iter().position(|s| {
        matches!(s, Stmt::Expr { expr: types::Expr::Function { .. }, .. })
    }) {
        return Some(idx);
    }

    body.iter().position(|s| match s {
        Stmt::Expr { expr, .. } => is_trigger_wrapper(expr),
        _ => false,
    })
}

/// `trigger(config)(fn)` or `flowops.trigger(config)(fn)`
fn is_trigger_wrapper(expr: &types::Expr) -> bool {
    use types::Expr;

    let Expr::Call { callee, args, .. } = expr else {
        return false;
    };
    if !matches!(args.first(), Some(Expr::Function { .. })) {
        return false;
    }
    let Expr::Call { callee: inner, .. } = callee.as_ref() else {
        return false;
    };
    match inner.as_ref() {
        Expr::Ident { name, .. } => name == "trigger",
        Expr::Member { property, .. } => property == "trigger",
        _ => false,
    }
}

/// Load `program`, then call its handler with `context`
///
/// Returns the settled handler result. The SDK must already be installed.
pub fn run_handler(vm: &mut VM, program: &Program, context: &JsonValue) -> EvalResult {
    let handler = vm.load_program(program)?;
    vm.invoke_handler(&handler, Val::from_json(context))
}
