//! Statement execution
//!
//! Statements run for effect. Non-local exits (`return`, `break`, `throw`,
//! budget halts) travel up as `Err(Control)`.

use std::rc::Rc;

use super::env::{AssignError, Env, Scope};
use super::errors::ErrorInfo;
use super::types::{
    AssignOp, BinaryOp, Control, DeclareTarget, ExecResult, Expr, ForLoopKind, MemberAccess, Stmt,
    Val, VarKind,
};
use super::vm::{throw, MAX_LIST_LEN, VM};

impl VM {
    /// Execute a statement list in `env`, hoisting function declarations first
    pub(crate) fn exec_statements(&mut self, stmts: &[Stmt], env: &Env) -> ExecResult {
        self.hoist_functions(stmts, env);
        for stmt in stmts {
            self.exec_stmt(stmt, env)?;
        }
        Ok(())
    }

    pub(crate) fn exec_stmt(&mut self, stmt: &Stmt, env: &Env) -> ExecResult {
        self.tick()?;

        match stmt {
            Stmt::Block { body, .. } => {
                let scope = Scope::child(env);
                self.exec_statements(body, &scope)
            }

            Stmt::Declare {
                var_kind,
                target,
                init,
                ..
            } => {
                let value = match init {
                    Some(expr) => self.eval(expr, env)?,
                    None => Val::Undefined,
                };
                bind_target(target, value, *var_kind, env)
            }

            // Already bound by `hoist_functions`
            Stmt::FunctionDecl { .. } => Ok(()),

            Stmt::Assign {
                var,
                path,
                op,
                value,
                ..
            } => self.exec_assign(var, path, *op, value, env),

            Stmt::If {
                test,
                then_s,
                else_s,
                ..
            } => {
                if self.eval(test, env)?.is_truthy() {
                    self.exec_stmt(then_s, env)
                } else if let Some(else_s) = else_s {
                    self.exec_stmt(else_s, env)
                } else {
                    Ok(())
                }
            }

            Stmt::While { test, body, .. } => {
                while self.eval(test, env)?.is_truthy() {
                    match self.exec_stmt(body, env) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }

            Stmt::ForLoop {
                kind,
                var_kind,
                binding,
                iterable,
                body,
                ..
            } => {
                let iterable = self.eval(iterable, env)?;
                let items = match kind {
                    ForLoopKind::Of => iterate_values(&iterable)?,
                    ForLoopKind::In => iterate_keys(&iterable),
                };
                for item in items {
                    self.tick()?;
                    let scope = Scope::child(env);
                    bind_target(binding, item, *var_kind, &scope)?;
                    match self.exec_stmt(body, &scope) {
                        Ok(()) | Err(Control::Continue) => {}
                        Err(Control::Break) => break,
                        Err(other) => return Err(other),
                    }
                }
                Ok(())
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Val::Undefined,
                };
                Err(Control::Return(value))
            }

            Stmt::Throw { value, .. } => {
                let value = self.eval(value, env)?;
                Err(Control::Throw(value))
            }

            Stmt::Try {
                body,
                catch_var,
                catch_body,
                finally_body,
                ..
            } => {
                let mut outcome = self.exec_stmt(body, env);

                if let (Err(Control::Throw(error)), Some(catch_body)) = (&outcome, catch_body) {
                    let scope = Scope::child(env);
                    if let Some(name) = catch_var {
                        scope.declare(name.clone(), error.clone(), false);
                    }
                    outcome = self.exec_stmt(catch_body, &scope);
                }

                // A halted run skips `finally`
                if matches!(outcome, Err(Control::Halt(_))) {
                    return outcome;
                }
                if let Some(finally_body) = finally_body {
                    self.exec_stmt(finally_body, env)?;
                }
                outcome
            }

            Stmt::ExportDefault { expr, .. } | Stmt::Expr { expr, .. } => {
                self.eval(expr, env)?;
                Ok(())
            }

            Stmt::Break { .. } => Err(Control::Break),
            Stmt::Continue { .. } => Err(Control::Continue),
        }
    }

    fn exec_assign(
        &mut self,
        var: &str,
        path: &[MemberAccess],
        op: AssignOp,
        value: &Expr,
        env: &Env,
    ) -> ExecResult {
        let rhs = self.eval(value, env)?;

        // Plain variable
        let Some((last, parents)) = path.split_last() else {
            let new_value = match op {
                AssignOp::Set => rhs,
                _ => {
                    let current = lookup_var(var, env)?;
                    self.apply_compound(op, current, rhs)?
                }
            };
            return env.assign(var, new_value).map_err(|err| match err {
                AssignError::Constant => {
                    throw(ErrorInfo::type_error("Assignment to constant variable."))
                }
                AssignError::Undeclared => {
                    throw(ErrorInfo::reference_error(format!("{} is not defined", var)))
                }
            });
        };

        // Walk to the container that owns the final segment
        let mut target = lookup_var(var, env)?;
        for segment in parents {
            let key = self.segment_key(segment, env)?;
            target = self.get_property(&target, &key)?;
        }
        let key = self.segment_key(last, env)?;

        let new_value = match op {
            AssignOp::Set => rhs,
            _ => {
                let current = self.get_property(&target, &key)?;
                self.apply_compound(op, current, rhs)?
            }
        };
        set_property(&target, &key, new_value)
    }

    fn segment_key(&mut self, segment: &MemberAccess, env: &Env) -> Result<Val, Control> {
        match segment {
            MemberAccess::Prop { property, .. } => Ok(Val::str(property.clone())),
            MemberAccess::Index { expr, .. } => self.eval(expr, env),
        }
    }

    fn apply_compound(&mut self, op: AssignOp, current: Val, rhs: Val) -> Result<Val, Control> {
        let bin = match op {
            AssignOp::Add => BinaryOp::Add,
            AssignOp::Sub => BinaryOp::Sub,
            AssignOp::Set => return Ok(rhs),
        };
        self.binary_values(bin, current, rhs)
    }
}

/* ===================== Bindings ===================== */

fn lookup_var(name: &str, env: &Env) -> Result<Val, Control> {
    env.lookup(name)
        .ok_or_else(|| throw(ErrorInfo::reference_error(format!("{} is not defined", name))))
}

/// Bind a declaration target (`x`, `{ a, b }`, `[a, b]`) in `env`
pub(crate) fn bind_target(
    target: &DeclareTarget,
    value: Val,
    var_kind: VarKind,
    env: &Env,
) -> ExecResult {
    let constant = var_kind == VarKind::Const;
    match target {
        DeclareTarget::Simple { name, .. } => {
            env.declare(name.clone(), value, constant);
        }
        DeclareTarget::Destructure { names, .. } => {
            let map = match &value {
                Val::Obj(map) => Some(Rc::clone(map)),
                Val::Undefined | Val::Null => {
                    let first = names.first().map(String::as_str).unwrap_or_default();
                    return Err(throw(ErrorInfo::type_error(format!(
                        "Cannot destructure property '{}' of '{}' as it is {}.",
                        first,
                        value.to_display(),
                        value.to_display()
                    ))));
                }
                _ => None,
            };
            for name in names {
                let v = map
                    .as_ref()
                    .and_then(|m| m.borrow().get(name).cloned())
                    .unwrap_or(Val::Undefined);
                env.declare(name.clone(), v, constant);
            }
        }
        DeclareTarget::ArrayDestructure { names, .. } => {
            let items = iterate_values(&value)?;
            let mut items = items.into_iter();
            for name in names {
                env.declare(name.clone(), items.next().unwrap_or(Val::Undefined), constant);
            }
        }
    }
    Ok(())
}

/// Values produced by `for...of`
fn iterate_values(value: &Val) -> Result<Vec<Val>, Control> {
    match value {
        Val::List(items) => Ok(items.borrow().clone()),
        Val::Str(s) => Ok(s.chars().map(|c| Val::str(c.to_string())).collect()),
        other => Err(throw(ErrorInfo::type_error(format!(
            "{} is not iterable",
            other.to_display()
        )))),
    }
}

/// Keys produced by `for...in`
fn iterate_keys(value: &Val) -> Vec<Val> {
    match value {
        Val::Obj(map) => map.borrow().keys().map(|k| Val::str(k.clone())).collect(),
        Val::List(items) => (0..items.borrow().len())
            .map(|i| Val::str(i.to_string()))
            .collect(),
        Val::Str(s) => (0..s.chars().count()).map(|i| Val::str(i.to_string())).collect(),
        _ => Vec::new(),
    }
}

/// `target[key] = value`
pub(crate) fn set_property(target: &Val, key: &Val, value: Val) -> ExecResult {
    match target {
        Val::Obj(map) => {
            map.borrow_mut().insert(key.to_display(), value);
            Ok(())
        }
        Val::List(items) => {
            let idx = key.to_number();
            if idx >= 0.0 && idx == idx.trunc() {
                if idx >= MAX_LIST_LEN as f64 {
                    return Err(throw(ErrorInfo::range_error("Invalid array length")));
                }
                let idx = idx as usize;
                let mut items = items.borrow_mut();
                if idx >= items.len() {
                    items.resize(idx + 1, Val::Undefined);
                }
                items[idx] = value;
            }
            Ok(())
        }
        Val::Undefined | Val::Null => Err(throw(ErrorInfo::type_error(format!(
            "Cannot set properties of {} (setting '{}')",
            target.to_display(),
            key.to_display()
        )))),
        // Writes to primitives are silently dropped
        _ => Ok(()),
    }
}
