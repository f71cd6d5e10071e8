//! Runtime value types

use super::super::errors::ErrorInfo;
use super::super::stdlib::StdlibFunc;
use super::super::env::Env;
use super::ast::FunctionBody;
use serde_json::{Map, Number, Value as JsonValue};
use std::cell::RefCell;
use std::rc::Rc;

/// Insertion-ordered property map backing script objects
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, Val)>,
}

impl PropertyMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Val> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    /// Insert or overwrite, keeping the original position of existing keys
    pub fn insert(&mut self, key: impl Into<String>, value: Val) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Val> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(String, Val)> {
        self.entries.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().map(|(k, _)| k)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Val)> for PropertyMap {
    fn from_iter<I: IntoIterator<Item = (String, Val)>>(iter: I) -> Self {
        let mut map = PropertyMap::new();
        for (k, v) in iter {
            map.insert(k, v);
        }
        map
    }
}

/* ===================== Nested Values ===================== */

/// Deepest array/object nesting the converters descend into
pub const MAX_VALUE_DEPTH: usize = 512;

/// Why a value has no JSON form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonConvertError {
    /// The value contains itself
    Circular,
    /// Arrays/objects nest deeper than [`MAX_VALUE_DEPTH`]
    TooDeep,
}

impl JsonConvertError {
    /// The error `JSON.stringify` throws for this failure
    pub fn to_error(self) -> ErrorInfo {
        match self {
            JsonConvertError::Circular => {
                ErrorInfo::type_error("Converting circular structure to JSON")
            }
            JsonConvertError::TooDeep => {
                ErrorInfo::range_error("Maximum call stack size exceeded")
            }
        }
    }
}

/// What JSON conversion does when it meets a value it cannot descend into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnRepeat {
    Reject,
    /// Substitute a marker string (console output)
    Mark,
}

/// Push a container onto the conversion path
///
/// `Ok(Some(marker))` means the container was not entered and the marker
/// stands in for it.
fn enter(
    path: &mut Vec<*const ()>,
    ptr: *const (),
    on_repeat: OnRepeat,
) -> Result<Option<JsonValue>, JsonConvertError> {
    let problem = if path.contains(&ptr) {
        JsonConvertError::Circular
    } else if path.len() >= MAX_VALUE_DEPTH {
        JsonConvertError::TooDeep
    } else {
        path.push(ptr);
        return Ok(None);
    };

    match (on_repeat, problem) {
        (OnRepeat::Reject, problem) => Err(problem),
        (OnRepeat::Mark, JsonConvertError::Circular) => {
            Ok(Some(JsonValue::String("[Circular]".to_string())))
        }
        (OnRepeat::Mark, JsonConvertError::TooDeep) => {
            Ok(Some(JsonValue::String("[Nested]".to_string())))
        }
    }
}

/// User-defined function together with its captured scope
pub struct Closure {
    pub name: Option<String>,
    pub params: Vec<String>,
    pub body: FunctionBody,
    pub is_async: bool,
    pub env: Env,
}

// The captured scope usually contains the closure itself.
impl std::fmt::Debug for Closure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Closure")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("is_async", &self.is_async)
            .finish_non_exhaustive()
    }
}

/// Host function, optionally bound to a receiver (`"abc".toUpperCase`)
#[derive(Debug, Clone)]
pub struct NativeFn {
    pub func: StdlibFunc,
    pub this: Option<Val>,
}

/// Promises are always settled: async calls run to completion before returning
#[derive(Debug, Clone)]
pub enum PromiseState {
    Fulfilled(Val),
    Rejected(Val),
}

/// Runtime value type
#[derive(Debug, Clone)]
pub enum Val {
    Undefined,
    Null,
    Bool(bool),
    Num(f64),
    Str(String),
    List(Rc<RefCell<Vec<Val>>>),
    Obj(Rc<RefCell<PropertyMap>>),
    Func(Rc<Closure>),
    Native(Rc<NativeFn>),
    Promise(Rc<PromiseState>),
    /// Error value with name and message
    Error(ErrorInfo),
}

impl Val {
    pub fn str(s: impl Into<String>) -> Val {
        Val::Str(s.into())
    }

    pub fn list(items: Vec<Val>) -> Val {
        Val::List(Rc::new(RefCell::new(items)))
    }

    pub fn obj(map: PropertyMap) -> Val {
        Val::Obj(Rc::new(RefCell::new(map)))
    }

    /// Build an object from `(key, value)` pairs, preserving their order
    pub fn obj_from<K: Into<String>>(pairs: impl IntoIterator<Item = (K, Val)>) -> Val {
        Val::obj(pairs.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    pub fn native(func: StdlibFunc) -> Val {
        Val::Native(Rc::new(NativeFn { func, this: None }))
    }

    pub fn bound(func: StdlibFunc, this: Val) -> Val {
        Val::Native(Rc::new(NativeFn {
            func,
            this: Some(this),
        }))
    }

    pub fn fulfilled(v: Val) -> Val {
        Val::Promise(Rc::new(PromiseState::Fulfilled(v)))
    }

    pub fn rejected(v: Val) -> Val {
        Val::Promise(Rc::new(PromiseState::Rejected(v)))
    }

    /// Check if value is truthy (for conditionals)
    pub fn is_truthy(&self) -> bool {
        match self {
            Val::Undefined | Val::Null => false,
            Val::Bool(b) => *b,
            Val::Num(n) => *n != 0.0 && !n.is_nan(),
            Val::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Val::Undefined | Val::Null)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Val::Func(_) | Val::Native(_))
    }

    pub fn type_of(&self) -> &'static str {
        match self {
            Val::Undefined => "undefined",
            Val::Bool(_) => "boolean",
            Val::Num(_) => "number",
            Val::Str(_) => "string",
            Val::Func(_) | Val::Native(_) => "function",
            Val::Null | Val::List(_) | Val::Obj(_) | Val::Promise(_) | Val::Error(_) => "object",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            Val::Undefined => f64::NAN,
            Val::Null => 0.0,
            Val::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Val::Num(n) => *n,
            Val::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Val::List(items) => {
                let items = items.borrow();
                match items.as_slice() {
                    [] => 0.0,
                    [only] => Val::Str(only.to_display()).to_number(),
                    _ => f64::NAN,
                }
            }
            _ => f64::NAN,
        }
    }

    /// String conversion as performed by `String(x)` and template literals
    ///
    /// An array nested inside itself renders as an empty string at the point
    /// where it repeats, like `Array.prototype.join`.
    pub fn to_display(&self) -> String {
        self.display_with(&mut Vec::new())
    }

    fn display_with(&self, path: &mut Vec<*const ()>) -> String {
        match self {
            Val::Undefined => "undefined".to_string(),
            Val::Null => "null".to_string(),
            Val::Bool(b) => b.to_string(),
            Val::Num(n) => format_number(*n),
            Val::Str(s) => s.clone(),
            Val::List(_) => self.parts_with(path).join(","),
            Val::Obj(_) => "[object Object]".to_string(),
            Val::Func(closure) => match &closure.name {
                Some(name) => format!("function {}() {{ [code] }}", name),
                None => "function () { [code] }".to_string(),
            },
            Val::Native(_) => "function () { [native code] }".to_string(),
            Val::Promise(_) => "[object Promise]".to_string(),
            Val::Error(info) => info.to_string(),
        }
    }

    /// Elements of a list as `join` renders them
    ///
    /// Nullish elements and elements that repeat an enclosing list are empty.
    pub fn list_parts(&self) -> Vec<String> {
        self.parts_with(&mut Vec::new())
    }

    fn parts_with(&self, path: &mut Vec<*const ()>) -> Vec<String> {
        let Val::List(items) = self else {
            return Vec::new();
        };
        let ptr = Rc::as_ptr(items) as *const ();
        if path.contains(&ptr) || path.len() >= MAX_VALUE_DEPTH {
            return Vec::new();
        }
        path.push(ptr);
        let parts = items
            .borrow()
            .iter()
            .map(|v| if v.is_nullish() { String::new() } else { v.display_with(path) })
            .collect();
        path.pop();
        parts
    }

    /// Convert into JSON; `Ok(None)` for values `JSON.stringify` drops
    pub fn to_json(&self) -> Result<Option<JsonValue>, JsonConvertError> {
        self.json_with(&mut Vec::new(), OnRepeat::Reject)
    }

    fn json_with(
        &self,
        path: &mut Vec<*const ()>,
        on_repeat: OnRepeat,
    ) -> Result<Option<JsonValue>, JsonConvertError> {
        let json = match self {
            Val::Undefined | Val::Func(_) | Val::Native(_) => return Ok(None),
            Val::Null => JsonValue::Null,
            Val::Bool(b) => JsonValue::Bool(*b),
            Val::Num(n) => number_to_json(*n),
            Val::Str(s) => JsonValue::String(s.clone()),
            Val::List(items) => {
                if let Some(marker) = enter(path, Rc::as_ptr(items) as *const (), on_repeat)? {
                    return Ok(Some(marker));
                }
                let mut out = Vec::new();
                for v in items.borrow().iter() {
                    out.push(v.json_with(path, on_repeat)?.unwrap_or(JsonValue::Null));
                }
                path.pop();
                JsonValue::Array(out)
            }
            Val::Obj(map) => {
                if let Some(marker) = enter(path, Rc::as_ptr(map) as *const (), on_repeat)? {
                    return Ok(Some(marker));
                }
                let mut out = Map::new();
                for (k, v) in map.borrow().iter() {
                    if let Some(json) = v.json_with(path, on_repeat)? {
                        out.insert(k.clone(), json);
                    }
                }
                path.pop();
                JsonValue::Object(out)
            }
            Val::Promise(_) | Val::Error(_) => JsonValue::Object(Map::new()),
        };
        Ok(Some(json))
    }

    pub fn from_json(json: &JsonValue) -> Val {
        match json {
            JsonValue::Null => Val::Null,
            JsonValue::Bool(b) => Val::Bool(*b),
            JsonValue::Number(n) => Val::Num(n.as_f64().unwrap_or(f64::NAN)),
            JsonValue::String(s) => Val::Str(s.clone()),
            JsonValue::Array(items) => Val::list(items.iter().map(Val::from_json).collect()),
            JsonValue::Object(map) => Val::obj(
                map.iter()
                    .map(|(k, v)| (k.clone(), Val::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// `JSON.stringify(value)`; `Ok(None)` mirrors the `undefined` result
    pub fn stringify(&self) -> Result<Option<String>, JsonConvertError> {
        Ok(self.to_json()?.map(|json| json.to_string()))
    }

    /// Formatting used for console arguments: objects as JSON, the rest as strings
    ///
    /// Never fails: a value met again inside itself prints as `"[Circular]"`.
    pub fn to_console(&self) -> String {
        match self {
            Val::Null | Val::List(_) | Val::Obj(_) | Val::Promise(_) => self
                .json_with(&mut Vec::new(), OnRepeat::Mark)
                .ok()
                .flatten()
                .map(|json| json.to_string())
                .unwrap_or_else(|| "undefined".to_string()),
            _ => self.to_display(),
        }
    }

    /// `===`
    pub fn strict_equals(&self, other: &Val) -> bool {
        match (self, other) {
            (Val::Undefined, Val::Undefined) | (Val::Null, Val::Null) => true,
            (Val::Bool(a), Val::Bool(b)) => a == b,
            (Val::Num(a), Val::Num(b)) => a == b,
            (Val::Str(a), Val::Str(b)) => a == b,
            (Val::List(a), Val::List(b)) => Rc::ptr_eq(a, b),
            (Val::Obj(a), Val::Obj(b)) => Rc::ptr_eq(a, b),
            (Val::Func(a), Val::Func(b)) => Rc::ptr_eq(a, b),
            (Val::Native(a), Val::Native(b)) => Rc::ptr_eq(a, b),
            (Val::Promise(a), Val::Promise(b)) => Rc::ptr_eq(a, b),
            (Val::Error(a), Val::Error(b)) => a == b,
            _ => false,
        }
    }

    /// `==`
    pub fn loose_equals(&self, other: &Val) -> bool {
        match (self, other) {
            (a, b) if a.is_nullish() && b.is_nullish() => true,
            (a, b) if a.is_nullish() || b.is_nullish() => false,
            (Val::Num(_), Val::Str(_))
            | (Val::Str(_), Val::Num(_))
            | (Val::Bool(_), _)
            | (_, Val::Bool(_)) => self.to_number() == other.to_number(),
            _ => self.strict_equals(other),
        }
    }
}

/// Number formatting following the usual script conventions (`3`, `0.5`, `NaN`, `1e+21`)
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        "0".to_string()
    } else if n.abs() >= 1e21 || n.abs() < 1e-6 {
        let exp = format!("{:e}", n);
        match exp.split_once('e') {
            Some((mantissa, power)) if !power.starts_with('-') => {
                format!("{}e+{}", mantissa, power)
            }
            _ => exp,
        }
    } else if n == n.trunc() && n.abs() < 9.0e15 {
        format!("{}", n as i64)
    } else {
        // Shortest round-trip digits, never in exponent form
        format!("{}", n)
    }
}

fn number_to_json(n: f64) -> JsonValue {
    if !n.is_finite() {
        return JsonValue::Null;
    }
    if n == n.trunc() && n.abs() < 9.0e15 {
        return JsonValue::Number(Number::from(n as i64));
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .unwrap_or(JsonValue::Null)
}
