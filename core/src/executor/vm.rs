//! Virtual Machine state
//!
//! The VM owns everything a single script run touches:
//! - globals: the root scope holding built-ins and the capability SDK
//! - budget: instruction and call-depth counters
//! - cancel: token checked on every step
//! - console: where `console.log` and SDK chatter go
//! - db: the run's private key-value store

use std::rc::Rc;

use tokio_util::sync::CancellationToken;

use super::env::{Env, Scope};
use super::errors::{self, ErrorInfo};
use super::stdlib::{self, sdk};
use super::types::{
    Closure, Control, EvalResult, Expr, FunctionBody, HaltReason, PromiseState, PropertyMap, Stmt,
    Val,
};
use crate::parser::Program;
use crate::sandbox::console::{Console, ConsoleLevel};

/* ===================== Limits ===================== */

/// Longest string a script may build, in bytes
pub const DEFAULT_MAX_STRING_LEN: usize = 1 << 22;

/// Longest array a script may build
pub const MAX_LIST_LEN: usize = 1 << 22;

/// Resource limits applied to one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Statements executed plus calls made
    pub max_steps: u64,
    pub max_call_depth: usize,
    /// Strings past this many bytes throw `RangeError: Invalid string length`
    pub max_string_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_steps: 1_000_000,
            max_call_depth: 64,
            max_string_len: DEFAULT_MAX_STRING_LEN,
        }
    }
}

/* ===================== VM ===================== */

pub struct VM {
    pub(crate) globals: Env,
    limits: Limits,
    steps: u64,
    depth: usize,
    cancel: CancellationToken,
    console: Console,
    pub(crate) db: PropertyMap,
}

impl VM {
    /// Create a VM with the language built-ins injected
    pub fn new(limits: Limits, console: Console, cancel: CancellationToken) -> Self {
        let globals = Scope::root();
        stdlib::inject_stdlib(&globals);

        VM {
            globals,
            limits,
            steps: 0,
            depth: 0,
            cancel,
            console,
            db: sdk::seed_db(),
        }
    }

    /// Install the capability SDK for the given trigger
    pub fn install_sdk(&mut self, integration: &str, event: &str) {
        self.log(
            ConsoleLevel::Log,
            format!("[SDK] Loading integration: {}/{}", integration, event),
        );
        sdk::inject_sdk(&self.globals, integration);
    }

    pub fn steps(&self) -> u64 {
        self.steps
    }

    /* ===================== Budget ===================== */

    /// Count one unit of work and stop the run when a limit is hit
    pub(crate) fn tick(&mut self) -> Result<(), Control> {
        self.steps += 1;
        if self.cancel.is_cancelled() {
            return Err(Control::Halt(HaltReason::Cancelled));
        }
        if self.steps > self.limits.max_steps {
            return Err(Control::Halt(HaltReason::StepLimit));
        }
        Ok(())
    }

    /// Fail before a string of `len` bytes is built past the limit
    pub(crate) fn check_string_len(&self, len: usize) -> Result<(), Control> {
        if len > self.limits.max_string_len {
            return Err(throw(ErrorInfo::range_error("Invalid string length")));
        }
        Ok(())
    }

    /// `a + b` for strings, checked against the length limit
    pub(crate) fn concat_strings(&self, left: &str, right: &str) -> Result<String, Control> {
        self.check_string_len(left.len().saturating_add(right.len()))?;
        let mut out = String::with_capacity(left.len() + right.len());
        out.push_str(left);
        out.push_str(right);
        Ok(out)
    }

    /* ===================== Console ===================== */

    pub(crate) fn log(&self, level: ConsoleLevel, message: impl Into<String>) {
        self.console.write(level, &message.into());
    }

    /// `console.log`-style formatting: objects as JSON, joined by spaces
    pub(crate) fn log_values(&self, level: ConsoleLevel, values: &[Val]) {
        let message = values
            .iter()
            .map(Val::to_console)
            .collect::<Vec<_>>()
            .join(" ");
        self.log(level, message);
    }

    /* ===================== Program ===================== */

    /// Run the top-level statements and return the workflow handler
    ///
    /// The handler statement (see `locate_handler`) is evaluated for its value
    /// instead of being executed; every other statement runs in order.
    pub fn load_program(&mut self, program: &Program) -> EvalResult {
        let handler_idx = super::locate_handler(program);
        let globals = Rc::clone(&self.globals);

        self.hoist_functions(&program.body, &globals);

        let mut handler = Val::Undefined;
        for (idx, stmt) in program.body.iter().enumerate() {
            if Some(idx) == handler_idx {
                let expr = match stmt {
                    Stmt::ExportDefault { expr, .. } | Stmt::Expr { expr, .. } => expr,
                    _ => continue,
                };
                self.tick()?;
                handler = self.eval(expr, &globals)?;
                continue;
            }
            match self.exec_stmt(stmt, &globals) {
                Ok(()) => {}
                Err(Control::Return(_)) => {
                    return Err(throw(ErrorInfo::new(
                        errors::SYNTAX_ERROR,
                        "Illegal return statement",
                    )))
                }
                Err(Control::Break) | Err(Control::Continue) => {
                    return Err(throw(ErrorInfo::new(
                        errors::SYNTAX_ERROR,
                        "Illegal break or continue statement",
                    )))
                }
                Err(other) => return Err(other),
            }
        }

        if !handler.is_callable() {
            return Err(throw(ErrorInfo::new(
                errors::ERROR,
                "Could not extract handler function",
            )));
        }
        Ok(handler)
    }

    /// Call the handler with the trigger context and settle the result
    pub fn invoke_handler(&mut self, handler: &Val, context: Val) -> EvalResult {
        let result = self.call_function(handler, None, vec![context])?;
        await_value(result)
    }

    /* ===================== Calls ===================== */

    /// Call any callable value
    pub(crate) fn call_function(
        &mut self,
        callee: &Val,
        this: Option<Val>,
        args: Vec<Val>,
    ) -> EvalResult {
        self.tick()?;
        match callee {
            Val::Func(closure) => self.call_closure(closure, args),
            Val::Native(native) => {
                let this = this.or_else(|| native.this.clone());
                stdlib::call_stdlib_func(self, &native.func, this, args)
            }
            other => Err(throw(ErrorInfo::type_error(format!(
                "{} is not a function",
                other.to_display()
            )))),
        }
    }

    fn call_closure(&mut self, closure: &Rc<Closure>, args: Vec<Val>) -> EvalResult {
        if self.depth >= self.limits.max_call_depth {
            return Err(throw(ErrorInfo::range_error(
                "Maximum call stack size exceeded",
            )));
        }

        let scope = Scope::child(&closure.env);
        let mut args = args.into_iter();
        for param in &closure.params {
            scope.declare(param.clone(), args.next().unwrap_or(Val::Undefined), false);
        }

        self.depth += 1;
        let outcome = match &closure.body {
            FunctionBody::Expr { expr } => self.eval(expr, &scope),
            FunctionBody::Block { stmt } => match stmt.as_ref() {
                Stmt::Block { body, .. } => match self.exec_statements(body, &scope) {
                    Ok(()) => Ok(Val::Undefined),
                    Err(Control::Return(v)) => Ok(v),
                    Err(Control::Break) | Err(Control::Continue) => Err(throw(ErrorInfo::new(
                        errors::SYNTAX_ERROR,
                        "Illegal break or continue statement",
                    ))),
                    Err(other) => Err(other),
                },
                other => self.exec_stmt(other, &scope).map(|_| Val::Undefined),
            },
        };
        self.depth -= 1;

        if !closure.is_async {
            return outcome;
        }
        match outcome {
            Ok(v @ Val::Promise(_)) => Ok(v),
            Ok(v) => Ok(Val::fulfilled(v)),
            Err(Control::Throw(e)) => Ok(Val::rejected(e)),
            Err(other) => Err(other),
        }
    }

    /// Declare every `function name() {}` in `stmts` before the block runs
    pub(crate) fn hoist_functions(&mut self, stmts: &[Stmt], env: &Env) {
        for stmt in stmts {
            if let Stmt::FunctionDecl { name, func, .. } = stmt {
                let value = make_closure(func, env);
                env.declare(name.clone(), value, false);
            }
        }
    }
}

/* ===================== Helpers ===================== */

/// Fail before an array grows past [`MAX_LIST_LEN`]
pub(crate) fn check_list_len(len: usize) -> Result<(), Control> {
    if len > MAX_LIST_LEN {
        return Err(throw(ErrorInfo::range_error("Invalid array length")));
    }
    Ok(())
}

/// Wrap an error value as a thrown control signal
pub(crate) fn throw(info: ErrorInfo) -> Control {
    Control::Throw(Val::Error(info))
}

/// `await`: unwrap a fulfilled promise, rethrow a rejected one
pub(crate) fn await_value(value: Val) -> EvalResult {
    match value {
        Val::Promise(state) => match state.as_ref() {
            PromiseState::Fulfilled(v) => Ok(v.clone()),
            PromiseState::Rejected(e) => Err(Control::Throw(e.clone())),
        },
        other => Ok(other),
    }
}

/// Build a closure value from a function expression
pub(crate) fn make_closure(func: &Expr, env: &Env) -> Val {
    match func {
        Expr::Function {
            name,
            params,
            is_async,
            body,
            ..
        } => Val::Func(Rc::new(Closure {
            name: name.clone(),
            params: params.clone(),
            body: body.clone(),
            is_async: *is_async,
            env: Rc::clone(env),
        })),
        _ => Val::Undefined,
    }
}

/// Message carried by a thrown value
pub fn thrown_message(value: &Val) -> String {
    match value {
        Val::Error(info) => info.message.clone(),
        Val::Obj(map) => match map.borrow().get("message") {
            Some(msg) => msg.to_display(),
            None => value.to_console(),
        },
        other => other.to_display(),
    }
}
