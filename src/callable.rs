//! Everything that can appear on the left of `(...)`.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::FunctionDecl;
use crate::class::{Instance, LoxClass};
use crate::environment::Environment;
use crate::error::Result;
use crate::interpreter::{Interpreter, Signal};
use crate::value::Value;

/// How many arguments a callable takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Fixed(usize),
    Variadic,
}

impl Arity {
    pub fn accepts(self, count: usize) -> bool {
        match self {
            Arity::Fixed(n) => n == count,
            Arity::Variadic => true,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arity::Fixed(n) => write!(f, "{}", n),
            Arity::Variadic => write!(f, "any number of"),
        }
    }
}

/// Host function signature. `line` is the call site, for diagnostics.
pub type NativeFn = fn(&[Value], usize) -> Result<Value>;

pub struct NativeFunction {
    pub name: &'static str,
    pub arity: Arity,
    pub func: NativeFn,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<builtin-fn {}>", self.name)
    }
}

/// A user function or method together with the scope it closes over.
pub struct LoxFunction {
    pub declaration: Rc<FunctionDecl>,
    pub closure: Rc<RefCell<Environment>>,
    pub is_initializer: bool,
}

impl LoxFunction {
    pub fn new(
        declaration: Rc<FunctionDecl>,
        closure: Rc<RefCell<Environment>>,
        is_initializer: bool,
    ) -> Self {
        LoxFunction {
            declaration,
            closure,
            is_initializer,
        }
    }

    pub fn name(&self) -> &str {
        self.declaration.display_name()
    }

    pub fn arity(&self) -> Arity {
        Arity::Fixed(self.declaration.params.len())
    }

    /// Returns a copy of this method whose closure binds `this` to `instance`.
    pub fn bind(&self, instance: Rc<RefCell<Instance>>) -> LoxFunction {
        debug!("Binding method '{}'", self.name());

        let env = Environment::child_of(&self.closure);
        env.borrow_mut().define("this", Value::Instance(instance));

        LoxFunction::new(Rc::clone(&self.declaration), env, self.is_initializer)
    }

    /// Runs the body in a parameter scope chained to the closure, with the
    /// body block one scope further in.
    pub fn call(&self, interpreter: &mut Interpreter, arguments: Vec<Value>) -> Result<Value> {
        let params = Environment::child_of(&self.closure);
        for (param, argument) in self.declaration.params.iter().zip(arguments) {
            params.borrow_mut().define(&param.lexeme, argument);
        }

        let body = Environment::child_of(&params);
        let signal = interpreter.execute_block(&self.declaration.body, body)?;

        if self.is_initializer {
            return self.this_value();
        }

        let value = match signal {
            Signal::Return(value) => value,
            _ => Value::Nil,
        };
        info!("Function '{}' returned: {}", self.name(), value);

        Ok(value)
    }

    fn this_value(&self) -> Result<Value> {
        Environment::get_at(&self.closure, 0, "this", self.declaration.keyword.line)
    }
}

impl fmt::Debug for LoxFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<fn {}>", self.name())
    }
}

/// Callable capability shared by host functions, user functions and classes.
#[derive(Debug, Clone)]
pub enum Callable {
    Native(Rc<NativeFunction>),
    Function(Rc<LoxFunction>),
    Class(Rc<LoxClass>),
}

impl Callable {
    pub fn name(&self) -> &str {
        match self {
            Callable::Native(native) => native.name,
            Callable::Function(function) => function.name(),
            Callable::Class(class) => &class.name,
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            Callable::Native(native) => native.arity,
            Callable::Function(function) => function.arity(),
            Callable::Class(class) => class.arity(),
        }
    }

    /// Invokes the callable. Arity has already been checked by the caller.
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
        line: usize,
    ) -> Result<Value> {
        match self {
            Callable::Native(native) => (native.func)(&arguments, line),
            Callable::Function(function) => function.call(interpreter, arguments),
            Callable::Class(class) => LoxClass::instantiate(class, interpreter, arguments),
        }
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Callable::Native(a), Callable::Native(b)) => Rc::ptr_eq(a, b),
            (Callable::Function(a), Callable::Function(b)) => Rc::ptr_eq(a, b),
            (Callable::Class(a), Callable::Class(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Display for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(native) => write!(f, "<builtin-fn {}>", native.name),
            Callable::Function(function) => write!(f, "<fn {}>", function.name()),
            Callable::Class(class) => write!(f, "{}", class.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variadic_accepts_any_count() {
        assert!(Arity::Variadic.accepts(0));
        assert!(Arity::Variadic.accepts(12));
        assert!(Arity::Fixed(2).accepts(2));
        assert!(!Arity::Fixed(2).accepts(3));
    }

    #[test]
    fn natives_render_with_builtin_prefix() {
        fn nothing(_: &[Value], _: usize) -> Result<Value> {
            Ok(Value::Nil)
        }

        let native = Callable::Native(Rc::new(NativeFunction {
            name: "noop",
            arity: Arity::Fixed(0),
            func: nothing,
        }));

        assert_eq!(native.to_string(), "<builtin-fn noop>");
        assert_eq!(native.clone(), native);
    }
}
