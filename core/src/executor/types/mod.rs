//! Core type definitions for the interpreter

pub mod ast;
pub mod control;
pub mod values;

pub use ast::{
    AssignOp, BinaryOp, DeclareTarget, Expr, ForLoopKind, FunctionBody, MemberAccess, Span, Stmt,
    TemplatePart, UnaryOp, VarKind,
};
pub use control::{Control, EvalResult, ExecResult, HaltReason};
pub use values::{Closure, JsonConvertError, NativeFn, PromiseState, PropertyMap, Val, MAX_VALUE_DEPTH};
