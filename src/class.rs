use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use log::debug;

use crate::callable::{Arity, Callable, LoxFunction};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::token::Token;
use crate::value::Value;

/// A class: a name plus its method table. Calling it builds an [`Instance`].
pub struct LoxClass {
    pub name: String,
    methods: HashMap<String, Rc<LoxFunction>>,
}

impl LoxClass {
    pub fn new(name: impl Into<String>, methods: HashMap<String, Rc<LoxFunction>>) -> Self {
        LoxClass {
            name: name.into(),
            methods,
        }
    }

    pub fn find_method(&self, name: &str) -> Option<&Rc<LoxFunction>> {
        self.methods.get(name)
    }

    /// Same as `init`'s, or zero when the class has no initializer.
    pub fn arity(&self) -> Arity {
        self.find_method("init")
            .map_or(Arity::Fixed(0), |init| init.arity())
    }

    pub fn instantiate(
        class: &Rc<LoxClass>,
        interpreter: &mut Interpreter,
        arguments: Vec<Value>,
    ) -> Result<Value> {
        debug!("Instantiating '{}'", class.name);

        let instance = Rc::new(RefCell::new(Instance::new(Rc::clone(class))));

        if let Some(init) = class.find_method("init") {
            init.bind(Rc::clone(&instance)).call(interpreter, arguments)?;
        }

        Ok(Value::Instance(instance))
    }
}

impl fmt::Debug for LoxClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<class {}>", self.name)
    }
}

/// Per-object field storage. Fields shadow methods of the same name.
pub struct Instance {
    class: Rc<LoxClass>,
    fields: HashMap<String, Value>,
}

impl Instance {
    pub fn new(class: Rc<LoxClass>) -> Self {
        Instance {
            class,
            fields: HashMap::new(),
        }
    }

    /// Property read: a field if present, otherwise a method bound to
    /// `instance`.
    pub fn get(instance: &Rc<RefCell<Instance>>, name: &Token) -> Result<Value> {
        let this = instance.borrow();

        if let Some(value) = this.fields.get(&name.lexeme) {
            return Ok(value.clone());
        }

        match this.class.find_method(&name.lexeme) {
            Some(method) => {
                let bound = method.bind(Rc::clone(instance));
                Ok(Value::Callable(Callable::Function(Rc::new(bound))))
            }
            None => Err(LoxError::runtime(
                name.line,
                format!("Undefined property '{}'.", name.lexeme),
            )),
        }
    }

    pub fn set(&mut self, name: &Token, value: Value) {
        self.fields.insert(name.lexeme.clone(), value);
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} instance", self.class.name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{} instance>", self.class.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn fields_are_per_instance() {
        let class = Rc::new(LoxClass::new("Point", HashMap::new()));
        let a = Rc::new(RefCell::new(Instance::new(Rc::clone(&class))));
        let b = Rc::new(RefCell::new(Instance::new(Rc::clone(&class))));
        let x = Token::new(TokenType::IDENTIFIER, "x", 1);

        a.borrow_mut().set(&x, Value::Int(1));

        assert_eq!(Instance::get(&a, &x).unwrap(), Value::Int(1));
        assert!(Instance::get(&b, &x).is_err());
        assert_eq!(a.borrow().to_string(), "Point instance");
    }

    #[test]
    fn missing_property_is_a_runtime_error() {
        let class = Rc::new(LoxClass::new("Empty", HashMap::new()));
        let instance = Rc::new(RefCell::new(Instance::new(class)));
        let name = Token::new(TokenType::IDENTIFIER, "nope", 9);

        let err = Instance::get(&instance, &name).unwrap_err();

        assert_eq!(
            err.to_string(),
            "[line 9] Runtime error: Undefined property 'nope'."
        );
    }

    #[test]
    fn class_without_init_takes_no_arguments() {
        let class = LoxClass::new("Empty", HashMap::new());
        assert_eq!(class.arity(), Arity::Fixed(0));
    }
}
