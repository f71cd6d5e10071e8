//! Language built-ins: JSON, Math, Object, conversions, Error, Date, Promise

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use super::super::errors::{self, ErrorInfo};
use super::super::types::{Control, EvalResult, PromiseState, Val};
use super::super::vm::{throw, VM};
use super::{arg, StdlibFunc};

/* ===================== JSON ===================== */

/// `JSON.stringify(value, replacer, indent)`; the replacer is ignored
pub fn json_stringify(vm: &VM, args: &[Val]) -> EvalResult {
    let value = arg(args, 0);
    let json = match value.to_json() {
        Ok(Some(json)) => json,
        Ok(None) => return Ok(Val::Undefined),
        Err(e) => return Err(throw(e.to_error())),
    };

    let indent = match args.get(2) {
        Some(Val::Num(n)) if *n >= 1.0 => " ".repeat((*n as usize).min(10)),
        Some(Val::Str(s)) => s.chars().take(10).collect(),
        _ => String::new(),
    };
    let text = if indent.is_empty() {
        json.to_string()
    } else {
        let mut out = Vec::new();
        let formatter = PrettyFormatter::with_indent(indent.as_bytes());
        let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
        json.serialize(&mut ser)
            .map_err(|e| throw(ErrorInfo::type_error(e.to_string())))?;
        String::from_utf8_lossy(&out).into_owned()
    };
    vm.check_string_len(text.len())?;
    Ok(Val::Str(text))
}

pub fn json_parse(args: &[Val]) -> EvalResult {
    let text = arg(args, 0).to_display();
    serde_json::from_str::<serde_json::Value>(&text)
        .map(|json| Val::from_json(&json))
        .map_err(|e| {
            throw(ErrorInfo::new(
                errors::SYNTAX_ERROR,
                format!("\"{}\" is not valid JSON ({})", text, e),
            ))
        })
}

/* ===================== Math ===================== */

pub fn math_unary(args: &[Val], f: impl Fn(f64) -> f64) -> EvalResult {
    Ok(Val::Num(f(arg(args, 0).to_number())))
}

pub fn math_fold(args: &[Val], init: f64, f: impl Fn(f64, f64) -> f64) -> EvalResult {
    let mut acc = init;
    for value in args {
        let n = value.to_number();
        if n.is_nan() {
            return Ok(Val::Num(f64::NAN));
        }
        acc = f(acc, n);
    }
    Ok(Val::Num(acc))
}

pub fn math_pow(args: &[Val]) -> EvalResult {
    Ok(Val::Num(
        arg(args, 0).to_number().powf(arg(args, 1).to_number()),
    ))
}

/* ===================== Object ===================== */

fn entries_of(value: &Val) -> Vec<(String, Val)> {
    match value {
        Val::Obj(map) => map.borrow().iter().cloned().collect(),
        Val::List(items) => items
            .borrow()
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.clone()))
            .collect(),
        Val::Str(s) => s
            .chars()
            .enumerate()
            .map(|(i, c)| (i.to_string(), Val::str(c.to_string())))
            .collect(),
        _ => Vec::new(),
    }
}

fn require_object(value: &Val) -> Result<(), Control> {
    if value.is_nullish() {
        return Err(throw(ErrorInfo::type_error(
            "Cannot convert undefined or null to object",
        )));
    }
    Ok(())
}

pub fn object_keys(args: &[Val]) -> EvalResult {
    let value = arg(args, 0);
    require_object(&value)?;
    Ok(Val::list(
        entries_of(&value).into_iter().map(|(k, _)| Val::Str(k)).collect(),
    ))
}

pub fn object_values(args: &[Val]) -> EvalResult {
    let value = arg(args, 0);
    require_object(&value)?;
    Ok(Val::list(
        entries_of(&value).into_iter().map(|(_, v)| v).collect(),
    ))
}

pub fn object_entries(args: &[Val]) -> EvalResult {
    let value = arg(args, 0);
    require_object(&value)?;
    Ok(Val::list(
        entries_of(&value)
            .into_iter()
            .map(|(k, v)| Val::list(vec![Val::Str(k), v]))
            .collect(),
    ))
}

/// `Object.assign(target, ...sources)` mutates and returns `target`
pub fn object_assign(args: &[Val]) -> EvalResult {
    let target = arg(args, 0);
    let Val::Obj(map) = &target else {
        require_object(&target)?;
        return Ok(target);
    };
    for source in args.iter().skip(1) {
        for (k, v) in entries_of(source) {
            map.borrow_mut().insert(k, v);
        }
    }
    Ok(target)
}

/* ===================== Conversions ===================== */

pub fn parse_int(args: &[Val]) -> EvalResult {
    let text = arg(args, 0).to_display();
    let mut s = text.trim();

    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }

    let mut radix = match arg(args, 1) {
        Val::Undefined => 10,
        other => other.to_number() as u32,
    };
    if radix == 0 {
        radix = 10;
    }
    if (radix == 16 || args.len() < 2) && (s.starts_with("0x") || s.starts_with("0X")) {
        s = &s[2..];
        radix = 16;
    }
    if !(2..=36).contains(&radix) {
        return Ok(Val::Num(f64::NAN));
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return Ok(Val::Num(f64::NAN));
    }
    let mut n = 0f64;
    for c in digits.chars() {
        n = n * radix as f64 + c.to_digit(radix).unwrap_or(0) as f64;
    }
    Ok(Val::Num(if negative { -n } else { n }))
}

/// Longest numeric prefix, like `parseFloat("3.5px")`
pub fn parse_float(args: &[Val]) -> EvalResult {
    let text = arg(args, 0).to_display();
    let s = text.trim_start();
    if s.starts_with("Infinity") || s.starts_with("+Infinity") {
        return Ok(Val::Num(f64::INFINITY));
    }
    if s.starts_with("-Infinity") {
        return Ok(Val::Num(f64::NEG_INFINITY));
    }

    let candidates = s
        .char_indices()
        .map(|(i, c)| i + c.len_utf8())
        .collect::<Vec<_>>();
    for end in candidates.into_iter().rev() {
        let prefix = &s[..end];
        if prefix.ends_with(|c: char| c == 'e' || c == 'E' || c == '+' || c == '-') {
            continue;
        }
        if let Ok(n) = prefix.parse::<f64>() {
            if prefix.chars().all(|c| c.is_ascii_digit() || ".+-eE".contains(c)) {
                return Ok(Val::Num(n));
            }
        }
    }
    Ok(Val::Num(f64::NAN))
}

/* ===================== Error ===================== */

pub fn make_error(code: &str, args: &[Val]) -> EvalResult {
    let message = match arg(args, 0) {
        Val::Undefined => String::new(),
        other => other.to_display(),
    };
    Ok(Val::Error(ErrorInfo::new(code, message)))
}

/* ===================== Date ===================== */

pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// `new Date()`, `new Date(millis)` or `new Date("2024-01-01T00:00:00Z")`
pub fn make_date(args: &[Val]) -> EvalResult {
    let millis = match arg(args, 0) {
        Val::Undefined => now_millis() as f64,
        Val::Num(n) => n,
        Val::Str(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.timestamp_millis() as f64)
            .unwrap_or(f64::NAN),
        other => other.to_number(),
    };
    let stamp = Val::Num(millis);
    Ok(Val::obj_from([
        ("toISOString", Val::bound(StdlibFunc::DateToIso, stamp.clone())),
        ("toJSON", Val::bound(StdlibFunc::DateToIso, stamp.clone())),
        ("getTime", Val::bound(StdlibFunc::DateGetTime, stamp.clone())),
        ("valueOf", Val::bound(StdlibFunc::DateGetTime, stamp)),
    ]))
}

pub fn date_to_iso(stamp: &Val) -> EvalResult {
    let millis = stamp.to_number();
    let datetime = if millis.is_finite() {
        DateTime::<Utc>::from_timestamp_millis(millis as i64)
    } else {
        None
    };
    datetime
        .map(|dt| Val::Str(dt.to_rfc3339_opts(SecondsFormat::Millis, true)))
        .ok_or_else(|| throw(ErrorInfo::range_error("Invalid time value")))
}

/* ===================== Promise ===================== */

/// `Promise.resolve(v)`: promises pass through unchanged
pub fn promise_resolve(value: Val) -> Val {
    match value {
        Val::Promise(_) => value,
        other => Val::fulfilled(other),
    }
}

/// `new Promise((resolve, reject) => ...)`
///
/// The executor runs synchronously. Whatever it settles first wins; a promise
/// left unsettled resolves to `undefined`.
pub fn promise_new(vm: &mut VM, args: &[Val]) -> EvalResult {
    let executor = arg(args, 0);
    if !executor.is_callable() {
        return Err(throw(ErrorInfo::type_error(format!(
            "Promise resolver {} is not a function",
            executor.to_display()
        ))));
    }

    let slot = Val::list(Vec::new());
    let resolve = Val::bound(StdlibFunc::PromiseSettle { reject: false }, slot.clone());
    let reject = Val::bound(StdlibFunc::PromiseSettle { reject: true }, slot.clone());

    match vm.call_function(&executor, None, vec![resolve, reject]) {
        Ok(_) => {}
        Err(Control::Throw(e)) => {
            promise_settle(&slot, true, &[e])?;
        }
        Err(other) => return Err(other),
    }

    let Val::List(settled) = slot else {
        return Ok(Val::fulfilled(Val::Undefined));
    };
    let settled = settled.borrow();
    Ok(match settled.as_slice() {
        [Val::Bool(true), reason] => Val::rejected(reason.clone()),
        [Val::Bool(false), value] => promise_resolve(value.clone()),
        _ => Val::fulfilled(Val::Undefined),
    })
}

pub fn promise_settle(slot: &Val, reject: bool, args: &[Val]) -> EvalResult {
    if let Val::List(items) = slot {
        let mut items = items.borrow_mut();
        if items.is_empty() {
            items.push(Val::Bool(reject));
            items.push(arg(args, 0));
        }
    }
    Ok(Val::Undefined)
}

/// `Promise.all(list)`: every element is already settled
pub fn promise_all(args: &[Val]) -> EvalResult {
    let Val::List(items) = arg(args, 0) else {
        return Ok(Val::rejected(Val::Error(ErrorInfo::type_error(
            "Promise.all expects an array",
        ))));
    };
    let mut values = Vec::new();
    for item in items.borrow().iter() {
        match item {
            Val::Promise(state) => match state.as_ref() {
                PromiseState::Fulfilled(v) => values.push(v.clone()),
                PromiseState::Rejected(e) => return Ok(Val::rejected(e.clone())),
            },
            other => values.push(other.clone()),
        }
    }
    Ok(Val::fulfilled(Val::list(values)))
}

/// Run a reaction callback and turn its outcome into a promise
fn react(vm: &mut VM, callback: &Val, value: Val) -> EvalResult {
    match vm.call_function(callback, None, vec![value]) {
        Ok(result) => Ok(promise_resolve(result)),
        Err(Control::Throw(e)) => Ok(Val::rejected(e)),
        Err(other) => Err(other),
    }
}

pub fn promise_then(vm: &mut VM, promise: &Val, on_fulfilled: Val, on_rejected: Val) -> EvalResult {
    let Val::Promise(state) = promise else {
        return Ok(promise.clone());
    };
    match state.as_ref() {
        PromiseState::Fulfilled(v) if on_fulfilled.is_callable() => {
            react(vm, &on_fulfilled, v.clone())
        }
        PromiseState::Rejected(e) if on_rejected.is_callable() => {
            react(vm, &on_rejected, e.clone())
        }
        _ => Ok(promise.clone()),
    }
}

pub fn promise_finally(vm: &mut VM, promise: &Val, callback: Val) -> EvalResult {
    if callback.is_callable() {
        match vm.call_function(&callback, None, Vec::new()) {
            Ok(_) => {}
            Err(Control::Throw(e)) => return Ok(Val::rejected(e)),
            Err(other) => return Err(other),
        }
    }
    Ok(promise.clone())
}

/* ===================== Timers ===================== */

/// `setTimeout(fn, ms, ...args)` runs `fn` immediately; mock runs never sleep
pub fn set_timeout(vm: &mut VM, args: Vec<Val>) -> EvalResult {
    let mut args = args.into_iter();
    let callback = args.next().unwrap_or(Val::Undefined);
    let _delay = args.next();
    if callback.is_callable() {
        vm.call_function(&callback, None, args.collect())?;
    }
    Ok(Val::Num(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::types::PropertyMap;
    use crate::executor::Limits;
    use crate::sandbox::console::Console;
    use tokio_util::sync::CancellationToken;

    fn vm() -> VM {
        VM::new(Limits::default(), Console::default(), CancellationToken::new())
    }

    fn num(v: EvalResult) -> f64 {
        match v {
            Ok(Val::Num(n)) => n,
            other => panic!("expected number, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_int_prefixes() {
        assert_eq!(num(parse_int(&[Val::str("42px")])), 42.0);
        assert_eq!(num(parse_int(&[Val::str("  -7")])), -7.0);
        assert_eq!(num(parse_int(&[Val::str("0x1f")])), 31.0);
        assert_eq!(num(parse_int(&[Val::str("ff"), Val::Num(16.0)])), 255.0);
        assert!(num(parse_int(&[Val::str("abc")])).is_nan());
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(num(parse_float(&[Val::str("3.25rem")])), 3.25);
        assert_eq!(num(parse_float(&[Val::str("1e3")])), 1000.0);
        assert!(num(parse_float(&[Val::str("x1")])).is_nan());
    }

    #[test]
    fn test_stringify_with_indent() {
        let value = Val::obj_from([("a", Val::Num(1.0))]);
        let out = json_stringify(&vm(), &[value, Val::Null, Val::Num(2.0)]);
        assert!(matches!(out, Ok(Val::Str(s)) if s == "{\n  \"a\": 1\n}"));
    }

    #[test]
    fn test_stringify_rejects_cycles() {
        let list = Val::list(vec![Val::Num(1.0)]);
        if let Val::List(items) = &list {
            items.borrow_mut().push(list.clone());
        }
        let out = json_stringify(&vm(), &[list]);
        assert!(matches!(
            out,
            Err(Control::Throw(Val::Error(info)))
                if info.code == errors::TYPE_ERROR
                    && info.message == "Converting circular structure to JSON"
        ));
    }

    #[test]
    fn test_date_iso_format() {
        let iso = date_to_iso(&Val::Num(0.0));
        assert!(matches!(iso, Ok(Val::Str(s)) if s == "1970-01-01T00:00:00.000Z"));
        assert!(date_to_iso(&Val::Num(f64::NAN)).is_err());
    }

    #[test]
    fn test_promise_all_short_circuits_on_rejection() {
        let list = Val::list(vec![
            Val::fulfilled(Val::Num(1.0)),
            Val::rejected(Val::str("nope")),
        ]);
        let out = promise_all(&[list]);
        assert!(matches!(out, Ok(Val::Promise(p)) if matches!(p.as_ref(), PromiseState::Rejected(_))));
    }

    #[test]
    fn test_object_helpers_reject_null() {
        assert!(object_keys(&[Val::Null]).is_err());
        let keys = object_keys(&[Val::obj(PropertyMap::new())]);
        assert!(matches!(keys, Ok(Val::List(items)) if items.borrow().is_empty()));
    }
}
