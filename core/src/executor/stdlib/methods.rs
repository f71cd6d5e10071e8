//! Methods bound to a receiver value
//!
//! Property lookup on a string or array returns a `NativeFn` carrying the
//! receiver in `this`; the call lands here.

use super::super::errors::ErrorInfo;
use super::super::types::{Control, EvalResult, Val};
use super::super::vm::{check_list_len, throw, VM};
use super::arg;

/* ===================== String Methods ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrMethod {
    ToLowerCase,
    ToUpperCase,
    Trim,
    TrimStart,
    TrimEnd,
    Includes,
    StartsWith,
    EndsWith,
    IndexOf,
    Split,
    Replace,
    ReplaceAll,
    Slice,
    Substring,
    CharAt,
    Repeat,
    PadStart,
    PadEnd,
    Concat,
}

pub fn str_method(name: &str) -> Option<StrMethod> {
    Some(match name {
        "toLowerCase" => StrMethod::ToLowerCase,
        "toUpperCase" => StrMethod::ToUpperCase,
        "trim" => StrMethod::Trim,
        "trimStart" => StrMethod::TrimStart,
        "trimEnd" => StrMethod::TrimEnd,
        "includes" => StrMethod::Includes,
        "startsWith" => StrMethod::StartsWith,
        "endsWith" => StrMethod::EndsWith,
        "indexOf" => StrMethod::IndexOf,
        "split" => StrMethod::Split,
        "replace" => StrMethod::Replace,
        "replaceAll" => StrMethod::ReplaceAll,
        "slice" => StrMethod::Slice,
        "substring" => StrMethod::Substring,
        "charAt" => StrMethod::CharAt,
        "repeat" => StrMethod::Repeat,
        "padStart" => StrMethod::PadStart,
        "padEnd" => StrMethod::PadEnd,
        "concat" => StrMethod::Concat,
        _ => return None,
    })
}

pub fn call_str_method(vm: &mut VM, method: &StrMethod, this: &Val, args: &[Val]) -> EvalResult {
    let s = this.to_display();
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();

    let value = match method {
        StrMethod::ToLowerCase => Val::Str(s.to_lowercase()),
        StrMethod::ToUpperCase => Val::Str(s.to_uppercase()),
        StrMethod::Trim => Val::str(s.trim()),
        StrMethod::TrimStart => Val::str(s.trim_start()),
        StrMethod::TrimEnd => Val::str(s.trim_end()),
        StrMethod::Includes => Val::Bool(s.contains(&arg(args, 0).to_display())),
        StrMethod::StartsWith => Val::Bool(s.starts_with(&arg(args, 0).to_display())),
        StrMethod::EndsWith => Val::Bool(s.ends_with(&arg(args, 0).to_display())),
        StrMethod::IndexOf => {
            let needle = arg(args, 0).to_display();
            Val::Num(match s.find(&needle) {
                Some(byte_idx) => s[..byte_idx].chars().count() as f64,
                None => -1.0,
            })
        }
        StrMethod::Split => match arg(args, 0) {
            Val::Undefined => Val::list(vec![Val::Str(s.clone())]),
            sep => {
                let sep = sep.to_display();
                let parts: Vec<Val> = if sep.is_empty() {
                    check_list_len(len)?;
                    chars.iter().map(|c| Val::str(c.to_string())).collect()
                } else {
                    check_list_len(s.matches(sep.as_str()).count() + 1)?;
                    s.split(sep.as_str()).map(Val::str).collect()
                };
                Val::list(parts)
            }
        },
        StrMethod::Replace => replace(vm, &s, args, false)?,
        StrMethod::ReplaceAll => replace(vm, &s, args, true)?,
        StrMethod::Slice => {
            let start = relative_index(arg(args, 0), len, 0);
            let end = relative_index(arg(args, 1), len, len);
            Val::Str(if start < end {
                chars[start..end].iter().collect()
            } else {
                String::new()
            })
        }
        StrMethod::Substring => {
            let clamp = |v: Val, default: usize| match v {
                Val::Undefined => default,
                other => {
                    let n = other.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len)
                    }
                }
            };
            let a = clamp(arg(args, 0), 0);
            let b = clamp(arg(args, 1), len);
            let (start, end) = if a <= b { (a, b) } else { (b, a) };
            Val::Str(chars[start..end].iter().collect())
        }
        StrMethod::CharAt => {
            let idx = arg(args, 0).to_number();
            let idx = if idx.is_nan() { 0.0 } else { idx };
            Val::Str(if idx >= 0.0 {
                chars
                    .get(idx as usize)
                    .map(|c| c.to_string())
                    .unwrap_or_default()
            } else {
                String::new()
            })
        }
        StrMethod::Repeat => {
            let count = arg(args, 0).to_number();
            if count < 0.0 || count.is_infinite() {
                return Err(throw(ErrorInfo::range_error(format!(
                    "Invalid count value: {}",
                    arg(args, 0).to_display()
                ))));
            }
            let count = if count.is_nan() { 0 } else { count as usize };
            vm.check_string_len(s.len().saturating_mul(count))?;
            Val::Str(s.repeat(count))
        }
        StrMethod::PadStart | StrMethod::PadEnd => {
            let target = arg(args, 0).to_number();
            let target = if target.is_nan() { 0 } else { target.max(0.0) as usize };
            let filler = match arg(args, 1) {
                Val::Undefined => " ".to_string(),
                other => other.to_display(),
            };
            if target <= len || filler.is_empty() {
                Val::Str(s.clone())
            } else {
                let widest = filler.chars().map(char::len_utf8).max().unwrap_or(1);
                vm.check_string_len(
                    (target - len)
                        .saturating_mul(widest)
                        .saturating_add(s.len()),
                )?;
                let pad: String = filler.chars().cycle().take(target - len).collect();
                Val::Str(match method {
                    StrMethod::PadStart => format!("{}{}", pad, s),
                    _ => format!("{}{}", s, pad),
                })
            }
        }
        StrMethod::Concat => {
            let mut out = s.clone();
            for a in args {
                let piece = a.to_display();
                vm.check_string_len(out.len().saturating_add(piece.len()))?;
                out.push_str(&piece);
            }
            Val::Str(out)
        }
    };
    Ok(value)
}

/// String `replace` with a literal pattern; a function replacement receives the match
fn replace(vm: &mut VM, s: &str, args: &[Val], all: bool) -> EvalResult {
    let pattern = arg(args, 0).to_display();
    let replacement = arg(args, 1);

    let mut out = String::new();
    let mut rest = s;
    loop {
        let Some(idx) = rest.find(&pattern) else {
            out.push_str(rest);
            break;
        };
        out.push_str(&rest[..idx]);
        let with = if replacement.is_callable() {
            vm.call_function(&replacement, None, vec![Val::str(pattern.clone())])?
                .to_display()
        } else {
            replacement.to_display()
        };
        vm.check_string_len(
            out.len()
                .saturating_add(with.len())
                .saturating_add(rest.len() - idx),
        )?;
        out.push_str(&with);

        let skip = idx + pattern.len();
        if pattern.is_empty() {
            // Empty pattern inserts before the next char
            match rest[skip..].chars().next() {
                Some(c) if all => {
                    out.push(c);
                    rest = &rest[skip + c.len_utf8()..];
                    continue;
                }
                _ => {
                    out.push_str(&rest[skip..]);
                    break;
                }
            }
        }
        rest = &rest[skip..];
        if !all {
            out.push_str(rest);
            break;
        }
    }
    Ok(Val::Str(out))
}

/// Resolve a possibly negative `slice` index against `len`
fn relative_index(v: Val, len: usize, default: usize) -> usize {
    match v {
        Val::Undefined => default,
        other => {
            let n = other.to_number();
            if n.is_nan() {
                0
            } else if n < 0.0 {
                len.saturating_sub((-n) as usize)
            } else {
                (n as usize).min(len)
            }
        }
    }
}

/* ===================== Array Methods ===================== */

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMethod {
    Push,
    Pop,
    Shift,
    Join,
    Includes,
    IndexOf,
    Slice,
    Concat,
    Reverse,
    Map,
    Filter,
    Find,
    FindIndex,
    ForEach,
    Some,
    Every,
    Reduce,
}

pub fn list_method(name: &str) -> Option<ListMethod> {
    Some(match name {
        "push" => ListMethod::Push,
        "pop" => ListMethod::Pop,
        "shift" => ListMethod::Shift,
        "join" => ListMethod::Join,
        "includes" => ListMethod::Includes,
        "indexOf" => ListMethod::IndexOf,
        "slice" => ListMethod::Slice,
        "concat" => ListMethod::Concat,
        "reverse" => ListMethod::Reverse,
        "map" => ListMethod::Map,
        "filter" => ListMethod::Filter,
        "find" => ListMethod::Find,
        "findIndex" => ListMethod::FindIndex,
        "forEach" => ListMethod::ForEach,
        "some" => ListMethod::Some,
        "every" => ListMethod::Every,
        "reduce" => ListMethod::Reduce,
        _ => return None,
    })
}

pub fn call_list_method(
    vm: &mut VM,
    method: &ListMethod,
    this: &Val,
    args: &[Val],
) -> EvalResult {
    let Val::List(list) = this else {
        return Ok(Val::Undefined);
    };
    // Callbacks may mutate the list; iterate over a snapshot
    let items = list.borrow().clone();
    let len = items.len();

    let value = match method {
        ListMethod::Push => {
            let mut list = list.borrow_mut();
            check_list_len(list.len().saturating_add(args.len()))?;
            list.extend(args.iter().cloned());
            Val::Num(list.len() as f64)
        }
        ListMethod::Pop => list.borrow_mut().pop().unwrap_or(Val::Undefined),
        ListMethod::Shift => {
            let mut list = list.borrow_mut();
            if list.is_empty() {
                Val::Undefined
            } else {
                list.remove(0)
            }
        }
        ListMethod::Join => {
            let sep = match arg(args, 0) {
                Val::Undefined => ",".to_string(),
                other => other.to_display(),
            };
            let parts = this.list_parts();
            let total = parts
                .iter()
                .fold(0usize, |acc, p| acc.saturating_add(p.len()))
                .saturating_add(sep.len().saturating_mul(parts.len().saturating_sub(1)));
            vm.check_string_len(total)?;
            Val::Str(parts.join(&sep))
        }
        ListMethod::Includes => {
            let needle = arg(args, 0);
            Val::Bool(items.iter().any(|v| same_value_zero(v, &needle)))
        }
        ListMethod::IndexOf => {
            let needle = arg(args, 0);
            Val::Num(
                items
                    .iter()
                    .position(|v| v.strict_equals(&needle))
                    .map(|i| i as f64)
                    .unwrap_or(-1.0),
            )
        }
        ListMethod::Slice => {
            let start = relative_index(arg(args, 0), len, 0);
            let end = relative_index(arg(args, 1), len, len);
            Val::list(if start < end {
                items[start..end].to_vec()
            } else {
                Vec::new()
            })
        }
        ListMethod::Concat => {
            let mut out = items;
            for a in args {
                match a {
                    Val::List(other) => {
                        let other = other.borrow();
                        check_list_len(out.len().saturating_add(other.len()))?;
                        out.extend(other.iter().cloned());
                    }
                    other => {
                        check_list_len(out.len() + 1)?;
                        out.push(other.clone());
                    }
                }
            }
            Val::list(out)
        }
        ListMethod::Reverse => {
            list.borrow_mut().reverse();
            this.clone()
        }
        ListMethod::Map => {
            let callback = callback_arg(args)?;
            let mut out = Vec::with_capacity(len);
            for (i, item) in items.into_iter().enumerate() {
                out.push(invoke(vm, &callback, item, i, this)?);
            }
            Val::list(out)
        }
        ListMethod::Filter => {
            let callback = callback_arg(args)?;
            let mut out = Vec::new();
            for (i, item) in items.into_iter().enumerate() {
                if invoke(vm, &callback, item.clone(), i, this)?.is_truthy() {
                    out.push(item);
                }
            }
            Val::list(out)
        }
        ListMethod::Find | ListMethod::FindIndex => {
            let callback = callback_arg(args)?;
            let mut found = None;
            for (i, item) in items.into_iter().enumerate() {
                if invoke(vm, &callback, item.clone(), i, this)?.is_truthy() {
                    found = Some((i, item));
                    break;
                }
            }
            match (method, found) {
                (ListMethod::Find, Some((_, item))) => item,
                (ListMethod::Find, None) => Val::Undefined,
                (_, Some((i, _))) => Val::Num(i as f64),
                (_, None) => Val::Num(-1.0),
            }
        }
        ListMethod::ForEach => {
            let callback = callback_arg(args)?;
            for (i, item) in items.into_iter().enumerate() {
                invoke(vm, &callback, item, i, this)?;
            }
            Val::Undefined
        }
        ListMethod::Some | ListMethod::Every => {
            let callback = callback_arg(args)?;
            let want = *method == ListMethod::Some;
            let mut result = !want;
            for (i, item) in items.into_iter().enumerate() {
                if invoke(vm, &callback, item, i, this)?.is_truthy() == want {
                    result = want;
                    break;
                }
            }
            Val::Bool(result)
        }
        ListMethod::Reduce => {
            let callback = callback_arg(args)?;
            let mut iter = items.into_iter().enumerate();
            let mut acc = match args.get(1) {
                Some(init) => init.clone(),
                None => match iter.next() {
                    Some((_, first)) => first,
                    None => {
                        return Err(throw(ErrorInfo::type_error(
                            "Reduce of empty array with no initial value",
                        )))
                    }
                },
            };
            for (i, item) in iter {
                acc = vm.call_function(
                    &callback,
                    None,
                    vec![acc, item, Val::Num(i as f64), this.clone()],
                )?;
            }
            acc
        }
    };
    Ok(value)
}

fn callback_arg(args: &[Val]) -> Result<Val, Control> {
    let callback = arg(args, 0);
    if !callback.is_callable() {
        return Err(throw(ErrorInfo::type_error(format!(
            "{} is not a function",
            callback.to_display()
        ))));
    }
    Ok(callback)
}

fn invoke(vm: &mut VM, callback: &Val, item: Val, idx: usize, list: &Val) -> EvalResult {
    vm.call_function(callback, None, vec![item, Val::Num(idx as f64), list.clone()])
}

fn same_value_zero(a: &Val, b: &Val) -> bool {
    match (a, b) {
        (Val::Num(x), Val::Num(y)) if x.is_nan() && y.is_nan() => true,
        _ => a.strict_equals(b),
    }
}

/* ===================== Number Methods ===================== */

pub fn to_fixed(this: &Val, args: &[Val]) -> EvalResult {
    let digits = match arg(args, 0) {
        Val::Undefined => 0.0,
        other => other.to_number(),
    };
    if !(0.0..=100.0).contains(&digits) {
        return Err(throw(ErrorInfo::range_error(
            "toFixed() digits argument must be between 0 and 100",
        )));
    }
    let n = this.to_number();
    if !n.is_finite() {
        return Ok(Val::Str(this.to_display()));
    }
    Ok(Val::Str(format!("{:.*}", digits as usize, n)))
}
