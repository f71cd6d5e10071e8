//! Expression evaluation

use super::env::Env;
use super::errors::ErrorInfo;
use super::stdlib::{self, methods, StdlibFunc};
use super::types::{BinaryOp, Control, EvalResult, Expr, TemplatePart, UnaryOp, Val};
use super::vm::{await_value, make_closure, throw, VM};

/// Result of evaluating one link of a member/call chain.
///
/// `None` means an optional link (`a?.b`) hit a nullish value and the rest of
/// the chain evaluates to `undefined`.
type ChainResult = Result<Option<Val>, Control>;

impl VM {
    pub(crate) fn eval(&mut self, expr: &Expr, env: &Env) -> EvalResult {
        match expr {
            Expr::LitBool { v, .. } => Ok(Val::Bool(*v)),
            Expr::LitNum { v, .. } => Ok(Val::Num(*v)),
            Expr::LitStr { v, .. } => Ok(Val::Str(v.clone())),
            Expr::LitNull { .. } => Ok(Val::Null),
            Expr::LitUndefined { .. } => Ok(Val::Undefined),

            Expr::LitList { elements, .. } => {
                let mut items = Vec::with_capacity(elements.len());
                for element in elements {
                    items.push(self.eval(element, env)?);
                }
                Ok(Val::list(items))
            }

            Expr::LitObj { properties, .. } => {
                let mut map = super::types::PropertyMap::new();
                for (key, value) in properties {
                    let value = self.eval(value, env)?;
                    map.insert(key.clone(), value);
                }
                Ok(Val::obj(map))
            }

            Expr::Template { parts, .. } => {
                let mut out = String::new();
                for part in parts {
                    match part {
                        TemplatePart::Text { v } => out.push_str(v),
                        TemplatePart::Subst { expr } => {
                            let piece = self.eval(expr, env)?.to_display();
                            self.check_string_len(out.len().saturating_add(piece.len()))?;
                            out.push_str(&piece)
                        }
                    }
                }
                Ok(Val::Str(out))
            }

            Expr::Ident { name, .. } => env.lookup(name).ok_or_else(|| {
                throw(ErrorInfo::reference_error(format!("{} is not defined", name)))
            }),

            Expr::Member { .. } | Expr::Index { .. } | Expr::Call { .. } => {
                Ok(self.eval_chain(expr, env)?.unwrap_or(Val::Undefined))
            }

            Expr::New {
                constructor, args, ..
            } => {
                let args = self.eval_args(args, env)?;
                self.construct(constructor, args, env)
            }

            Expr::Await { inner, .. } => {
                let value = self.eval(inner, env)?;
                await_value(value)
            }

            Expr::Unary { op, operand, .. } => match op {
                UnaryOp::Not => Ok(Val::Bool(!self.eval(operand, env)?.is_truthy())),
                UnaryOp::Neg => Ok(Val::Num(-self.eval(operand, env)?.to_number())),
                UnaryOp::TypeOf => {
                    // `typeof undeclared` is not an error
                    if let Expr::Ident { name, .. } = operand.as_ref() {
                        if env.lookup(name).is_none() {
                            return Ok(Val::str("undefined"));
                        }
                    }
                    Ok(Val::str(self.eval(operand, env)?.type_of()))
                }
            },

            Expr::BinaryOp {
                op, left, right, ..
            } => {
                let left = self.eval(left, env)?;
                match op {
                    BinaryOp::And if !left.is_truthy() => Ok(left),
                    BinaryOp::Or if left.is_truthy() => Ok(left),
                    BinaryOp::Nullish if !left.is_nullish() => Ok(left),
                    BinaryOp::And | BinaryOp::Or | BinaryOp::Nullish => self.eval(right, env),
                    _ => {
                        let right = self.eval(right, env)?;
                        self.binary_values(*op, left, right)
                    }
                }
            }

            Expr::Ternary {
                condition,
                consequent,
                alternate,
                ..
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.eval(consequent, env)
                } else {
                    self.eval(alternate, env)
                }
            }

            Expr::Function { .. } => Ok(make_closure(expr, env)),
        }
    }

    fn eval_args(&mut self, args: &[Expr], env: &Env) -> Result<Vec<Val>, Control> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            values.push(self.eval(arg, env)?);
        }
        Ok(values)
    }

    /* ===================== Member / Call Chains ===================== */

    fn eval_chain(&mut self, expr: &Expr, env: &Env) -> ChainResult {
        match expr {
            Expr::Member {
                object,
                property,
                optional,
                ..
            } => {
                let Some(target) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                if *optional && target.is_nullish() {
                    return Ok(None);
                }
                self.get_property(&target, &Val::str(property.clone()))
                    .map(Some)
            }

            Expr::Index { object, index, .. } => {
                let Some(target) = self.eval_chain(object, env)? else {
                    return Ok(None);
                };
                let key = self.eval(index, env)?;
                self.get_property(&target, &key).map(Some)
            }

            Expr::Call { callee, args, .. } => {
                // Method calls keep their receiver
                let (func, this) = match callee.as_ref() {
                    Expr::Member {
                        object,
                        property,
                        optional,
                        ..
                    } => {
                        let Some(target) = self.eval_chain(object, env)? else {
                            return Ok(None);
                        };
                        if *optional && target.is_nullish() {
                            return Ok(None);
                        }
                        let func = self.get_property(&target, &Val::str(property.clone()))?;
                        (func, Some(target))
                    }
                    Expr::Index { object, index, .. } => {
                        let Some(target) = self.eval_chain(object, env)? else {
                            return Ok(None);
                        };
                        let key = self.eval(index, env)?;
                        let func = self.get_property(&target, &key)?;
                        (func, Some(target))
                    }
                    other => match self.eval_chain(other, env)? {
                        Some(func) => (func, None),
                        None => return Ok(None),
                    },
                };

                if !func.is_callable() {
                    return Err(throw(ErrorInfo::type_error(format!(
                        "{} is not a function",
                        describe(callee)
                    ))));
                }
                let args = self.eval_args(args, env)?;
                self.call_function(&func, this, args).map(Some)
            }

            other => self.eval(other, env).map(Some),
        }
    }

    /* ===================== Properties ===================== */

    /// `target[key]` for every value type
    pub(crate) fn get_property(&mut self, target: &Val, key: &Val) -> EvalResult {
        let name = key.to_display();
        match target {
            Val::Undefined | Val::Null => Err(throw(ErrorInfo::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                target.to_display(),
                name
            )))),

            Val::Obj(map) => Ok(map.borrow().get(&name).cloned().unwrap_or(Val::Undefined)),

            Val::List(items) => {
                if name == "length" {
                    return Ok(Val::Num(items.borrow().len() as f64));
                }
                if let Some(idx) = as_index(key) {
                    return Ok(items.borrow().get(idx).cloned().unwrap_or(Val::Undefined));
                }
                Ok(methods::list_method(&name)
                    .map(|m| Val::bound(StdlibFunc::ListMethod(m), target.clone()))
                    .unwrap_or(Val::Undefined))
            }

            Val::Str(s) => {
                if name == "length" {
                    return Ok(Val::Num(s.chars().count() as f64));
                }
                if let Some(idx) = as_index(key) {
                    return Ok(s
                        .chars()
                        .nth(idx)
                        .map(|c| Val::str(c.to_string()))
                        .unwrap_or(Val::Undefined));
                }
                Ok(methods::str_method(&name)
                    .map(|m| Val::bound(StdlibFunc::StrMethod(m), target.clone()))
                    .unwrap_or(Val::Undefined))
            }

            Val::Num(_) => Ok(match name.as_str() {
                "toFixed" => Val::bound(StdlibFunc::NumToFixed, target.clone()),
                "toString" => Val::bound(StdlibFunc::ValueToString, target.clone()),
                _ => Val::Undefined,
            }),

            Val::Bool(_) => Ok(match name.as_str() {
                "toString" => Val::bound(StdlibFunc::ValueToString, target.clone()),
                _ => Val::Undefined,
            }),

            Val::Promise(_) => Ok(match name.as_str() {
                "then" => Val::bound(StdlibFunc::PromiseThen, target.clone()),
                "catch" => Val::bound(StdlibFunc::PromiseCatch, target.clone()),
                "finally" => Val::bound(StdlibFunc::PromiseFinally, target.clone()),
                _ => Val::Undefined,
            }),

            Val::Error(info) => Ok(match name.as_str() {
                "name" => Val::str(info.code.clone()),
                "message" => Val::str(info.message.clone()),
                "stack" => Val::str(format!("{}\n    at <workflow>", info)),
                "toString" => Val::bound(StdlibFunc::ValueToString, target.clone()),
                _ => Val::Undefined,
            }),

            Val::Native(native) => {
                Ok(stdlib::native_static(&native.func, &name).unwrap_or(Val::Undefined))
            }

            Val::Func(closure) => Ok(match name.as_str() {
                "name" => Val::str(closure.name.clone().unwrap_or_default()),
                "length" => Val::Num(closure.params.len() as f64),
                _ => Val::Undefined,
            }),
        }
    }

    /* ===================== Operators ===================== */

    pub(crate) fn binary_values(&mut self, op: BinaryOp, left: Val, right: Val) -> EvalResult {
        let value = match op {
            BinaryOp::Add => {
                if is_string_like(&left) || is_string_like(&right) {
                    Val::Str(self.concat_strings(&left.to_display(), &right.to_display())?)
                } else {
                    Val::Num(left.to_number() + right.to_number())
                }
            }
            BinaryOp::Sub => Val::Num(left.to_number() - right.to_number()),
            BinaryOp::Mul => Val::Num(left.to_number() * right.to_number()),
            BinaryOp::Div => Val::Num(left.to_number() / right.to_number()),
            BinaryOp::Mod => Val::Num(left.to_number() % right.to_number()),

            BinaryOp::Eq => Val::Bool(left.loose_equals(&right)),
            BinaryOp::Ne => Val::Bool(!left.loose_equals(&right)),
            BinaryOp::StrictEq => Val::Bool(left.strict_equals(&right)),
            BinaryOp::StrictNe => Val::Bool(!left.strict_equals(&right)),

            BinaryOp::Lt | BinaryOp::Lte | BinaryOp::Gt | BinaryOp::Gte => {
                Val::Bool(compare(op, &left, &right))
            }

            BinaryOp::And => {
                if left.is_truthy() {
                    right
                } else {
                    left
                }
            }
            BinaryOp::Or => {
                if left.is_truthy() {
                    left
                } else {
                    right
                }
            }
            BinaryOp::Nullish => {
                if left.is_nullish() {
                    right
                } else {
                    left
                }
            }
        };
        Ok(value)
    }

    /* ===================== Construction ===================== */

    /// `new Name(args)`
    fn construct(&mut self, name: &str, args: Vec<Val>, env: &Env) -> EvalResult {
        let ctor = env
            .lookup(name)
            .ok_or_else(|| throw(ErrorInfo::reference_error(format!("{} is not defined", name))))?;

        match &ctor {
            Val::Native(native) if stdlib::is_constructor(&native.func) => {
                self.call_function(&ctor, None, args)
            }
            Val::Func(closure) if !closure.is_async => {
                let result = self.call_function(&ctor, None, args)?;
                Ok(match result {
                    Val::Obj(_) | Val::List(_) | Val::Error(_) => result,
                    _ => Val::obj(Default::default()),
                })
            }
            Val::Obj(_) if name == "Object" => Ok(Val::obj(Default::default())),
            Val::Obj(_) if name == "Array" => Ok(Val::list(args)),
            _ => Err(throw(ErrorInfo::type_error(format!(
                "{} is not a constructor",
                name
            )))),
        }
    }
}

/* ===================== Helpers ===================== */

fn as_index(key: &Val) -> Option<usize> {
    let n = match key {
        Val::Num(n) => *n,
        Val::Str(s) => s.parse::<f64>().ok()?,
        _ => return None,
    };
    (n >= 0.0 && n == n.trunc()).then_some(n as usize)
}

fn is_string_like(v: &Val) -> bool {
    matches!(v, Val::Str(_) | Val::List(_) | Val::Obj(_) | Val::Error(_))
}

fn compare(op: BinaryOp, left: &Val, right: &Val) -> bool {
    if let (Val::Str(a), Val::Str(b)) = (left, right) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Lte => a <= b,
            BinaryOp::Gt => a > b,
            _ => a >= b,
        };
    }
    let (a, b) = (left.to_number(), right.to_number());
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Lte => a <= b,
        BinaryOp::Gt => a > b,
        _ => a >= b,
    }
}

/// Source-like rendering of a callee for "is not a function" messages
pub(crate) fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Ident { name, .. } => name.clone(),
        Expr::Member {
            object,
            property,
            optional,
            ..
        } => {
            let dot = if *optional { "?." } else { "." };
            format!("{}{}{}", describe(object), dot, property)
        }
        Expr::Index { object, .. } => format!("{}[...]", describe(object)),
        Expr::Call { callee, .. } => format!("{}(...)", describe(callee)),
        _ => "expression".to_string(),
    }
}
