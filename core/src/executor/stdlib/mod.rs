//! Standard library function implementations
//!
//! This module contains all native functions reachable from scripts,
//! organized by category:
//!
//! - `builtins` - console, JSON, Math, Object, conversions, Error, Date, Promise
//! - `methods` - methods bound to a receiver (`"a".trim()`, `[1].map(f)`)
//! - `sdk` - the capability SDK (ai, db, email, slack, ...)
//! - `web` - fetch, Response, renderToString and the legacy `trigger`

pub mod builtins;
pub mod methods;
pub mod sdk;
pub mod web;

use super::env::Env;
use super::errors;
use super::types::{EvalResult, PropertyMap, Val};
use super::vm::VM;
use crate::sandbox::console::ConsoleLevel;

pub use methods::{ListMethod, StrMethod};
pub use sdk::SdkCall;

/* ===================== Standard Library Function Types ===================== */

/// Standard library function identifiers
///
/// Each variant represents a specific native function. Methods that need a
/// receiver get it through `NativeFn::this`.
#[derive(Debug, Clone, PartialEq)]
pub enum StdlibFunc {
    // console
    Console(ConsoleLevel),

    // JSON
    JsonStringify,
    JsonParse,

    // Math
    MathFloor,
    MathCeil,
    MathRound,
    MathAbs,
    MathMax,
    MathMin,
    MathPow,
    MathSqrt,

    // Object / Array
    ObjectKeys,
    ObjectValues,
    ObjectEntries,
    ObjectAssign,
    ArrayIsArray,

    // Conversions
    StringCtor,
    NumberCtor,
    BooleanCtor,
    ParseInt,
    ParseFloat,
    IsNaN,

    /// `Error`, `TypeError`, ... keyed by name
    ErrorCtor(String),

    // Date
    DateCtor,
    DateNow,
    DateToIso,
    DateGetTime,

    // Promise
    PromiseCtor,
    PromiseResolve,
    PromiseReject,
    PromiseAll,
    /// `resolve` / `reject` handed to a `new Promise` executor
    PromiseSettle {
        reject: bool,
    },
    PromiseThen,
    PromiseCatch,
    PromiseFinally,

    SetTimeout,

    // Receiver methods
    StrMethod(StrMethod),
    ListMethod(ListMethod),
    NumToFixed,
    ValueToString,

    // Capability SDK
    Sdk(SdkCall),

    // Web stubs
    Fetch,
    ResponseCtor,
    ResponseText,
    ResponseJson,
    RenderToString,
    Trigger,
    TriggerHandler,
}

/* ===================== Stdlib Dispatcher ===================== */

/// Call a standard library function with arguments
///
/// This dispatcher routes to the appropriate function implementation
/// based on the StdlibFunc variant.
pub fn call_stdlib_func(
    vm: &mut VM,
    func: &StdlibFunc,
    this: Option<Val>,
    args: Vec<Val>,
) -> EvalResult {
    let this = this.unwrap_or(Val::Undefined);
    match func {
        StdlibFunc::Console(level) => {
            vm.log_values(*level, &args);
            Ok(Val::Undefined)
        }

        StdlibFunc::JsonStringify => builtins::json_stringify(vm, &args),
        StdlibFunc::JsonParse => builtins::json_parse(&args),

        StdlibFunc::MathFloor => builtins::math_unary(&args, f64::floor),
        StdlibFunc::MathCeil => builtins::math_unary(&args, f64::ceil),
        StdlibFunc::MathRound => builtins::math_unary(&args, |n| (n + 0.5).floor()),
        StdlibFunc::MathAbs => builtins::math_unary(&args, f64::abs),
        StdlibFunc::MathSqrt => builtins::math_unary(&args, f64::sqrt),
        StdlibFunc::MathMax => builtins::math_fold(&args, f64::NEG_INFINITY, f64::max),
        StdlibFunc::MathMin => builtins::math_fold(&args, f64::INFINITY, f64::min),
        StdlibFunc::MathPow => builtins::math_pow(&args),

        StdlibFunc::ObjectKeys => builtins::object_keys(&args),
        StdlibFunc::ObjectValues => builtins::object_values(&args),
        StdlibFunc::ObjectEntries => builtins::object_entries(&args),
        StdlibFunc::ObjectAssign => builtins::object_assign(&args),
        StdlibFunc::ArrayIsArray => Ok(Val::Bool(matches!(arg(&args, 0), Val::List(_)))),

        StdlibFunc::StringCtor => Ok(Val::Str(match args.first() {
            Some(v) => v.to_display(),
            None => String::new(),
        })),
        StdlibFunc::NumberCtor => Ok(Val::Num(match args.first() {
            Some(v) => v.to_number(),
            None => 0.0,
        })),
        StdlibFunc::BooleanCtor => Ok(Val::Bool(arg(&args, 0).is_truthy())),
        StdlibFunc::ParseInt => builtins::parse_int(&args),
        StdlibFunc::ParseFloat => builtins::parse_float(&args),
        StdlibFunc::IsNaN => Ok(Val::Bool(arg(&args, 0).to_number().is_nan())),

        StdlibFunc::ErrorCtor(code) => builtins::make_error(code, &args),

        StdlibFunc::DateCtor => builtins::make_date(&args),
        StdlibFunc::DateNow => Ok(Val::Num(builtins::now_millis() as f64)),
        StdlibFunc::DateToIso => builtins::date_to_iso(&this),
        StdlibFunc::DateGetTime => Ok(Val::Num(this.to_number())),

        StdlibFunc::PromiseCtor => builtins::promise_new(vm, &args),
        StdlibFunc::PromiseResolve => Ok(builtins::promise_resolve(arg(&args, 0))),
        StdlibFunc::PromiseReject => Ok(Val::rejected(arg(&args, 0))),
        StdlibFunc::PromiseAll => builtins::promise_all(&args),
        StdlibFunc::PromiseSettle { reject } => builtins::promise_settle(&this, *reject, &args),
        StdlibFunc::PromiseThen => {
            builtins::promise_then(vm, &this, arg(&args, 0), arg(&args, 1))
        }
        StdlibFunc::PromiseCatch => {
            builtins::promise_then(vm, &this, Val::Undefined, arg(&args, 0))
        }
        StdlibFunc::PromiseFinally => builtins::promise_finally(vm, &this, arg(&args, 0)),

        StdlibFunc::SetTimeout => builtins::set_timeout(vm, args),

        StdlibFunc::StrMethod(method) => methods::call_str_method(vm, method, &this, &args),
        StdlibFunc::ListMethod(method) => methods::call_list_method(vm, method, &this, &args),
        StdlibFunc::NumToFixed => methods::to_fixed(&this, &args),
        StdlibFunc::ValueToString => Ok(Val::Str(this.to_display())),

        StdlibFunc::Sdk(call) => sdk::call_sdk(vm, call, &args),

        StdlibFunc::Fetch => web::fetch(vm, &args),
        StdlibFunc::ResponseCtor => Ok(web::make_response(vm, arg(&args, 0), arg(&args, 1))),
        StdlibFunc::ResponseText => Ok(Val::fulfilled(Val::Str(this.to_display()))),
        StdlibFunc::ResponseJson => web::response_json(&this),
        StdlibFunc::RenderToString => Ok(web::render_to_string(vm, &arg(&args, 0))),
        StdlibFunc::Trigger => Ok(Val::native(StdlibFunc::TriggerHandler)),
        StdlibFunc::TriggerHandler => Ok(arg(&args, 0)),
    }
}

/// Functions that may be used with `new`
pub fn is_constructor(func: &StdlibFunc) -> bool {
    matches!(
        func,
        StdlibFunc::ErrorCtor(_)
            | StdlibFunc::DateCtor
            | StdlibFunc::PromiseCtor
            | StdlibFunc::ResponseCtor
    )
}

/// Static members hanging off native constructors (`Date.now`, `Promise.all`)
pub fn native_static(func: &StdlibFunc, name: &str) -> Option<Val> {
    let member = match (func, name) {
        (StdlibFunc::DateCtor, "now") => StdlibFunc::DateNow,
        (StdlibFunc::PromiseCtor, "resolve") => StdlibFunc::PromiseResolve,
        (StdlibFunc::PromiseCtor, "reject") => StdlibFunc::PromiseReject,
        (StdlibFunc::PromiseCtor, "all") => StdlibFunc::PromiseAll,
        _ => return None,
    };
    Some(Val::native(member))
}

/// Argument `idx`, or `undefined` when missing
pub(crate) fn arg(args: &[Val], idx: usize) -> Val {
    args.get(idx).cloned().unwrap_or(Val::Undefined)
}

/// Build an object whose members are all native functions
pub(crate) fn namespace(members: &[(&str, StdlibFunc)]) -> Val {
    Val::obj(
        members
            .iter()
            .map(|(name, func)| (name.to_string(), Val::native(func.clone())))
            .collect::<PropertyMap>(),
    )
}

/* ===================== Environment Injection ===================== */

/// Inject standard library objects into the environment
///
/// Called automatically by VM::new().
pub fn inject_stdlib(env: &Env) {
    env.declare(
        "console",
        namespace(&[
            ("log", StdlibFunc::Console(ConsoleLevel::Log)),
            ("info", StdlibFunc::Console(ConsoleLevel::Info)),
            ("debug", StdlibFunc::Console(ConsoleLevel::Log)),
            ("warn", StdlibFunc::Console(ConsoleLevel::Warn)),
            ("error", StdlibFunc::Console(ConsoleLevel::Error)),
        ]),
        true,
    );

    env.declare(
        "JSON",
        namespace(&[
            ("stringify", StdlibFunc::JsonStringify),
            ("parse", StdlibFunc::JsonParse),
        ]),
        true,
    );

    let math = namespace(&[
        ("floor", StdlibFunc::MathFloor),
        ("ceil", StdlibFunc::MathCeil),
        ("round", StdlibFunc::MathRound),
        ("abs", StdlibFunc::MathAbs),
        ("max", StdlibFunc::MathMax),
        ("min", StdlibFunc::MathMin),
        ("pow", StdlibFunc::MathPow),
        ("sqrt", StdlibFunc::MathSqrt),
    ]);
    if let Val::Obj(map) = &math {
        map.borrow_mut().insert("PI", Val::Num(std::f64::consts::PI));
        map.borrow_mut().insert("E", Val::Num(std::f64::consts::E));
    }
    env.declare("Math", math, true);

    env.declare(
        "Object",
        namespace(&[
            ("keys", StdlibFunc::ObjectKeys),
            ("values", StdlibFunc::ObjectValues),
            ("entries", StdlibFunc::ObjectEntries),
            ("assign", StdlibFunc::ObjectAssign),
        ]),
        true,
    );
    env.declare("Array", namespace(&[("isArray", StdlibFunc::ArrayIsArray)]), true);

    let globals = [
        ("String", StdlibFunc::StringCtor),
        ("Number", StdlibFunc::NumberCtor),
        ("Boolean", StdlibFunc::BooleanCtor),
        ("parseInt", StdlibFunc::ParseInt),
        ("parseFloat", StdlibFunc::ParseFloat),
        ("isNaN", StdlibFunc::IsNaN),
        ("Date", StdlibFunc::DateCtor),
        ("Promise", StdlibFunc::PromiseCtor),
        ("setTimeout", StdlibFunc::SetTimeout),
    ];
    for (name, func) in globals {
        env.declare(name, Val::native(func), true);
    }

    for code in [
        errors::ERROR,
        errors::TYPE_ERROR,
        errors::REFERENCE_ERROR,
        errors::RANGE_ERROR,
        errors::SYNTAX_ERROR,
    ] {
        env.declare(code, Val::native(StdlibFunc::ErrorCtor(code.to_string())), true);
    }

    env.declare("NaN", Val::Num(f64::NAN), true);
    env.declare("Infinity", Val::Num(f64::INFINITY), true);
}
