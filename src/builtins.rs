//! Host functions installed into every fresh global environment.

use std::rc::Rc;

use chrono::Utc;
use log::debug;

use crate::callable::{Arity, Callable, NativeFn, NativeFunction};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::value::Value;

const BUILTINS: &[(&str, Arity, NativeFn)] = &[
    ("clock", Arity::Fixed(0), clock),
    ("type", Arity::Fixed(1), type_of),
    ("int", Arity::Fixed(1), int),
    ("float", Arity::Fixed(1), float),
    ("bool", Arity::Fixed(1), boolean),
    ("string", Arity::Fixed(1), stringify),
    ("array", Arity::Variadic, array),
    ("len", Arity::Fixed(1), len),
];

/// Defines every builtin in `globals`. User declarations may shadow them.
pub fn install(globals: &mut Environment) {
    for &(name, arity, func) in BUILTINS {
        debug!("Defining native function '{}'", name);

        let native = NativeFunction { name, arity, func };
        globals.define(name, Value::Callable(Callable::Native(Rc::new(native))));
    }
}

fn clock(_: &[Value], _: usize) -> Result<Value> {
    let micros = Utc::now().timestamp_micros();
    Ok(Value::Float(micros as f64 / 1_000_000.0))
}

fn type_of(args: &[Value], _: usize) -> Result<Value> {
    Ok(Value::String(args[0].type_name().to_string()))
}

fn int(args: &[Value], _: usize) -> Result<Value> {
    let value = &args[0];
    let fail = || LoxError::convert(value.describe(), "int");

    match value {
        Value::Int(n) => Ok(Value::Int(*n)),
        Value::Float(n) => truncate(*n).ok_or_else(fail),
        Value::Bool(b) => Ok(Value::Int(i64::from(*b))),
        Value::String(s) => {
            let s = s.trim();
            if let Ok(n) = s.parse::<i64>() {
                Ok(Value::Int(n))
            } else {
                s.parse::<f64>().ok().and_then(truncate).ok_or_else(fail)
            }
        }
        _ => Err(fail()),
    }
}

fn truncate(n: f64) -> Option<Value> {
    match Value::number(n.trunc()) {
        int @ Value::Int(_) => Some(int),
        _ => None,
    }
}

fn float(args: &[Value], _: usize) -> Result<Value> {
    let value = &args[0];

    match value {
        Value::Int(n) => Ok(Value::Float(*n as f64)),
        Value::Float(n) => Ok(Value::Float(*n)),
        Value::Bool(b) => Ok(Value::Float(if *b { 1.0 } else { 0.0 })),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| LoxError::convert(value.describe(), "float")),
        _ => Err(LoxError::convert(value.describe(), "float")),
    }
}

fn boolean(args: &[Value], _: usize) -> Result<Value> {
    Ok(Value::Bool(args[0].is_truthy()))
}

fn stringify(args: &[Value], _: usize) -> Result<Value> {
    Ok(Value::String(args[0].to_string()))
}

fn array(args: &[Value], _: usize) -> Result<Value> {
    Ok(Value::Array(Rc::new(args.to_vec())))
}

fn len(args: &[Value], line: usize) -> Result<Value> {
    let count = match &args[0] {
        Value::Array(elements) => elements.len(),
        Value::String(s) => s.chars().count(),
        other => {
            return Err(LoxError::runtime(
                line,
                format!("Can't take the length of a {}.", other.type_name()),
            ))
        }
    };

    i64::try_from(count)
        .map(Value::Int)
        .map_err(|_| LoxError::runtime(line, "Length does not fit in an int."))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(text: &str) -> Value {
        Value::String(text.to_string())
    }

    #[test]
    fn int_truncates_and_parses() {
        assert_eq!(int(&[Value::Float(2.9)], 1).unwrap(), Value::Int(2));
        assert_eq!(int(&[s(" 42 ")], 1).unwrap(), Value::Int(42));
        assert_eq!(int(&[s("3.7")], 1).unwrap(), Value::Int(3));
        assert_eq!(int(&[Value::Bool(true)], 1).unwrap(), Value::Int(1));
    }

    #[test]
    fn failed_conversion_names_value_and_target() {
        let err = int(&[s("abc")], 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Convert error: can't convert abc [string] to int."
        );

        let err = float(&[Value::Nil], 1).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Convert error: can't convert nil [nil] to float."
        );
    }

    #[test]
    fn float_keeps_float_representation() {
        assert!(matches!(float(&[Value::Int(3)], 1).unwrap(), Value::Float(n) if n == 3.0));
        assert_eq!(type_of(&[Value::Float(3.0)], 1).unwrap(), s("float"));
    }

    #[test]
    fn len_counts_arrays_and_strings() {
        let arr = array(&[Value::Int(1), Value::Int(2)], 1).unwrap();
        assert_eq!(len(&[arr], 1).unwrap(), Value::Int(2));
        assert_eq!(len(&[s("héllo")], 1).unwrap(), Value::Int(5));
        assert!(len(&[Value::Int(3)], 1).is_err());
    }

    #[test]
    fn install_defines_every_builtin() {
        let mut globals = Environment::new();
        install(&mut globals);

        for (name, _, _) in BUILTINS {
            assert!(globals.get(name, 0).is_ok(), "missing {}", name);
        }
        assert_eq!(globals.get("clock", 0).unwrap().to_string(), "<builtin-fn clock>");
    }
}
