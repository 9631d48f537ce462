use crate::error::{LoxError, Result};
use crate::value::Value;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// One lexical scope at run time.
///
/// Environments are shared (`Rc<RefCell<_>>`): every closure created while a
/// scope was active keeps it alive, so it lives as long as the longest-lived
/// closure or nested scope that still points to it.
#[derive(Debug, Default)]
pub struct Environment {
    values: HashMap<String, Value>,
    enclosing: Option<Rc<RefCell<Environment>>>,
}

impl Environment {
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: Rc<RefCell<Environment>>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wraps a new scope chained to `enclosing`, ready to be shared.
    pub fn child_of(enclosing: &Rc<RefCell<Environment>>) -> Rc<RefCell<Environment>> {
        Rc::new(RefCell::new(Environment::with_enclosing(Rc::clone(
            enclosing,
        ))))
    }

    /// Binds `name` in this scope, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_string(), value);
    }

    /// Dynamic lookup: this scope, then each enclosing one.
    pub fn get(&self, name: &str, line: usize) -> Result<Value> {
        if let Some(value) = self.values.get(name) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// Writes to the nearest scope that currently holds `name`.
    pub fn assign(&mut self, name: &str, value: Value, line: usize) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value, line)
        } else {
            Err(undefined(name, line))
        }
    }

    /// The scope `distance` links up the chain from `env` (0 = `env` itself).
    pub fn ancestor(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
    ) -> Option<Rc<RefCell<Environment>>> {
        let mut current = Rc::clone(env);

        for _ in 0..distance {
            let next = current.borrow().enclosing.clone()?;
            current = next;
        }

        Some(current)
    }

    /// Resolved lookup: reads `name` exactly `distance` scopes up.
    pub fn get_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        line: usize,
    ) -> Result<Value> {
        debug!("Reading '{}' at distance {}", name, distance);

        let scope = Environment::ancestor(env, distance).ok_or_else(|| undefined(name, line))?;
        let value = scope.borrow().values.get(name).cloned();

        value.ok_or_else(|| undefined(name, line))
    }

    /// Resolved assignment: writes `name` exactly `distance` scopes up.
    pub fn assign_at(
        env: &Rc<RefCell<Environment>>,
        distance: usize,
        name: &str,
        value: Value,
        line: usize,
    ) -> Result<()> {
        debug!("Writing '{}' at distance {}", name, distance);

        let scope = Environment::ancestor(env, distance).ok_or_else(|| undefined(name, line))?;
        let mut scope = scope.borrow_mut();

        match scope.values.get_mut(name) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(undefined(name, line)),
        }
    }
}

fn undefined(name: &str, line: usize) -> LoxError {
    LoxError::runtime(line, format!("Undefined variable '{}'.", name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_walk_outwards() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Int(1));

        let inner = Environment::child_of(&globals);
        inner.borrow_mut().define("b", Value::Int(2));

        assert_eq!(inner.borrow().get("a", 1).unwrap(), Value::Int(1));
        assert_eq!(Environment::get_at(&inner, 0, "b", 1).unwrap(), Value::Int(2));
        assert_eq!(Environment::get_at(&inner, 1, "a", 1).unwrap(), Value::Int(1));
        assert!(Environment::get_at(&inner, 0, "a", 1).is_err());
    }

    #[test]
    fn assign_targets_the_holding_scope() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        globals.borrow_mut().define("a", Value::Int(1));
        let inner = Environment::child_of(&globals);

        inner.borrow_mut().assign("a", Value::Int(5), 1).unwrap();

        assert_eq!(globals.borrow().get("a", 1).unwrap(), Value::Int(5));
        assert!(inner.borrow().values.is_empty());
    }

    #[test]
    fn assign_to_unknown_name_fails() {
        let mut env = Environment::new();
        let err = env.assign("missing", Value::Nil, 4).unwrap_err();

        assert_eq!(
            err.to_string(),
            "[line 4] Runtime error: Undefined variable 'missing'."
        );
    }

    #[test]
    fn assign_at_writes_exact_distance() {
        let globals = Rc::new(RefCell::new(Environment::new()));
        let outer = Environment::child_of(&globals);
        outer.borrow_mut().define("x", Value::Int(1));
        let inner = Environment::child_of(&outer);
        inner.borrow_mut().define("x", Value::Int(2));

        Environment::assign_at(&inner, 1, "x", Value::Int(10), 1).unwrap();

        assert_eq!(Environment::get_at(&inner, 0, "x", 1).unwrap(), Value::Int(2));
        assert_eq!(Environment::get_at(&inner, 1, "x", 1).unwrap(), Value::Int(10));
    }
}
