//! Lexical scopes
//!
//! Scopes form a parent chain. Blocks and function calls push a child scope;
//! closures keep a reference to the scope they were created in.

use super::types::Val;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub type Env = Rc<Scope>;

#[derive(Debug)]
struct Binding {
    value: Val,
    constant: bool,
}

#[derive(Debug, Default)]
pub struct Scope {
    vars: RefCell<HashMap<String, Binding>>,
    parent: Option<Env>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignError {
    Undeclared,
    Constant,
}

impl Scope {
    pub fn root() -> Env {
        Rc::new(Scope::default())
    }

    pub fn child(parent: &Env) -> Env {
        Rc::new(Scope {
            vars: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
        })
    }

    /// Declare in this scope, shadowing any outer binding
    pub fn declare(&self, name: impl Into<String>, value: Val, constant: bool) {
        self.vars
            .borrow_mut()
            .insert(name.into(), Binding { value, constant });
    }

    pub fn lookup(&self, name: &str) -> Option<Val> {
        if let Some(binding) = self.vars.borrow().get(name) {
            return Some(binding.value.clone());
        }
        self.parent.as_ref().and_then(|p| p.lookup(name))
    }

    pub fn assign(&self, name: &str, value: Val) -> Result<(), AssignError> {
        if let Some(binding) = self.vars.borrow_mut().get_mut(name) {
            if binding.constant {
                return Err(AssignError::Constant);
            }
            binding.value = value;
            return Ok(());
        }
        match &self.parent {
            Some(parent) => parent.assign(name, value),
            None => Err(AssignError::Undeclared),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shadowing_and_assignment() {
        let root = Scope::root();
        root.declare("x", Val::Num(1.0), false);
        let inner = Scope::child(&root);
        inner.declare("x", Val::Num(2.0), true);

        assert!(matches!(inner.lookup("x"), Some(Val::Num(n)) if n == 2.0));
        assert_eq!(inner.assign("x", Val::Null), Err(AssignError::Constant));
        assert_eq!(inner.assign("y", Val::Null), Err(AssignError::Undeclared));

        let sibling = Scope::child(&root);
        sibling.assign("x", Val::Num(5.0)).unwrap();
        assert!(matches!(root.lookup("x"), Some(Val::Num(n)) if n == 5.0));
    }
}
