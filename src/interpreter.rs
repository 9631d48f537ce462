use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::{debug, info};

use crate::ast::{Expr, ExprId, Fixity, LiteralValue, Stmt};
use crate::builtins;
use crate::callable::{Callable, LoxFunction};
use crate::class::{Instance, LoxClass};
use crate::environment::Environment;
use crate::error::{LoxError, Result};
use crate::print_handler::PrintHandler;
use crate::stack::{ensure_sufficient_stack, StackFrame, MAX_CALL_DEPTH};
use crate::token::{Token, TokenType};
use crate::value::Value;

/// Name of the outermost entry in a call trace.
const SCRIPT_FRAME: &str = "<script>";

/// How a statement finished. Blocks stop at the first non-`Normal` signal
/// and hand it outwards; loops consume `Break`/`Continue`, calls consume
/// `Return`.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Normal,
    Break,
    Continue,
    Return(Value),
}

pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    environment: Rc<RefCell<Environment>>,
    /// Lexical distances recorded by the resolver. Absent ids are globals.
    locals: HashMap<ExprId, usize>,
    frame: Option<Rc<StackFrame>>,
    depth: usize,
    output: PrintHandler,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    /// Creates an interpreter printing to stdout, with builtins installed.
    pub fn new() -> Self {
        Self::with_output(PrintHandler::Stdout)
    }

    pub fn with_output(output: PrintHandler) -> Self {
        info!("Initializing Interpreter");

        let mut globals = Environment::new();
        builtins::install(&mut globals);
        let globals = Rc::new(RefCell::new(globals));

        Interpreter {
            environment: Rc::clone(&globals),
            globals,
            locals: HashMap::new(),
            frame: None,
            depth: 0,
            output,
        }
    }

    /// Output captured by a buffered print handler.
    pub fn output(&self) -> String {
        self.output.output()
    }

    /// Called by the resolver for every reference bound in a local scope.
    pub fn note_local(&mut self, id: ExprId, depth: usize) {
        self.locals.insert(id, depth);
    }

    /// Runs a resolved program. Expression statements yield their value so a
    /// REPL can echo it; every other statement yields `None`.
    pub fn interpret(&mut self, statements: &[Stmt]) -> Result<Vec<Option<Value>>> {
        debug!("Interpreting {} statements", statements.len());

        let mut results = Vec::with_capacity(statements.len());

        for stmt in statements {
            let result = match stmt {
                Stmt::Expression(expr) => Some(self.evaluate(expr)?),
                _ => match self.execute(stmt)? {
                    Signal::Normal => None,
                    Signal::Return(_) => {
                        return Err(LoxError::runtime(
                            stmt.line(),
                            "Can't return from top-level code.",
                        ))
                    }
                    Signal::Break | Signal::Continue => {
                        return Err(LoxError::runtime(
                            stmt.line(),
                            "Can't use 'break' or 'continue' outside of a loop.",
                        ))
                    }
                },
            };
            results.push(result);
        }

        info!("Interpretation completed successfully");
        Ok(results)
    }

    /// Executes a single statement.
    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal> {
        ensure_sufficient_stack(|| self.execute_stmt(stmt))
    }

    fn execute_stmt(&mut self, stmt: &Stmt) -> Result<Signal> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
                Ok(Signal::Normal)
            }

            Stmt::Print(expr) => {
                let value = self.evaluate(expr)?;
                self.output.println(&value.to_string())?;
                debug!("Printed value: {}", value);
                Ok(Signal::Normal)
            }

            Stmt::Var {
                names,
                initializers,
            } => {
                for (name, initializer) in names.iter().zip(initializers) {
                    let value = match initializer {
                        Some(expr) => self.evaluate(expr)?,
                        None => Value::Nil,
                    };
                    debug!("Defining variable '{}' = {}", name.lexeme, value);
                    self.environment.borrow_mut().define(&name.lexeme, value);
                }
                Ok(Signal::Normal)
            }

            Stmt::Function(decl) => {
                let function =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                let value = Value::Callable(Callable::Function(Rc::new(function)));

                self.environment
                    .borrow_mut()
                    .define(decl.display_name(), value);
                info!(
                    "Function '{}' defined with {} parameters",
                    decl.display_name(),
                    decl.params.len()
                );
                Ok(Signal::Normal)
            }

            Stmt::Class { name, methods } => {
                let table = methods
                    .iter()
                    .map(|decl| {
                        let method_name = decl.display_name().to_string();
                        let is_initializer = method_name == "init";
                        let method = LoxFunction::new(
                            Rc::clone(decl),
                            Rc::clone(&self.environment),
                            is_initializer,
                        );
                        (method_name, Rc::new(method))
                    })
                    .collect();

                let class = LoxClass::new(name.lexeme.clone(), table);
                self.environment.borrow_mut().define(
                    &name.lexeme,
                    Value::Callable(Callable::Class(Rc::new(class))),
                );
                info!("Class '{}' defined", name.lexeme);
                Ok(Signal::Normal)
            }

            Stmt::Block(statements) => {
                let env = Environment::child_of(&self.environment);
                self.execute_block(statements, env)
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.execute(then_branch)
                } else if let Some(else_branch) = else_branch {
                    self.execute(else_branch)
                } else {
                    Ok(Signal::Normal)
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                while self.evaluate(condition)?.is_truthy() {
                    match self.execute(body)? {
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                        Signal::Normal | Signal::Continue => {}
                    }
                    if let Some(increment) = increment {
                        self.evaluate(increment)?;
                    }
                }
                Ok(Signal::Normal)
            }

            Stmt::Return { value, .. } => {
                let value = match value {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                debug!("Returning value: {}", value);
                Ok(Signal::Return(value))
            }

            Stmt::Break(_) => Ok(Signal::Break),

            Stmt::Continue(_) => Ok(Signal::Continue),
        }
    }

    /// Runs `statements` with `env` as the current scope, restoring the
    /// previous scope whatever the outcome.
    pub(crate) fn execute_block(
        &mut self,
        statements: &[Stmt],
        env: Rc<RefCell<Environment>>,
    ) -> Result<Signal> {
        let previous = std::mem::replace(&mut self.environment, env);
        let result = self.run_statements(statements);
        self.environment = previous;
        result
    }

    fn run_statements(&mut self, statements: &[Stmt]) -> Result<Signal> {
        for stmt in statements {
            let signal = self.execute(stmt)?;
            if signal != Signal::Normal {
                return Ok(signal);
            }
        }
        Ok(Signal::Normal)
    }

    /// Evaluates an expression and returns a Value.
    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value> {
        ensure_sufficient_stack(|| self.evaluate_expr(expr))
    }

    fn evaluate_expr(&mut self, expr: &Expr) -> Result<Value> {
        match expr {
            Expr::Literal(literal) => Ok(match literal {
                LiteralValue::Int(n) => Value::Int(*n),
                LiteralValue::Float(n) => Value::Float(*n),
                LiteralValue::Str(s) => Value::String(s.clone()),
                LiteralValue::Bool(b) => Value::Bool(*b),
                LiteralValue::Nil => Value::Nil,
            }),

            Expr::Grouping(inner) => self.evaluate(inner),

            Expr::Unary {
                operator,
                operand,
                fixity,
            } => self.evaluate_unary(operator, operand, *fixity),

            Expr::Binary {
                left,
                operator,
                right,
            } => self.evaluate_binary(left, operator, right),

            Expr::Logical {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let decided = match operator.token_type {
                    TokenType::OR => left.is_truthy(),
                    _ => !left.is_truthy(),
                };
                if decided {
                    Ok(left)
                } else {
                    self.evaluate(right)
                }
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.evaluate(condition)?.is_truthy() {
                    self.evaluate(then_branch)
                } else {
                    self.evaluate(else_branch)
                }
            }

            Expr::Variable { id, name } => self.look_up_variable(*id, name),

            Expr::This { id, keyword } => self.look_up_variable(*id, keyword),

            Expr::Assign { id, name, value } => {
                let value = self.evaluate(value)?;

                match self.locals.get(id) {
                    Some(&distance) => Environment::assign_at(
                        &self.environment,
                        distance,
                        &name.lexeme,
                        value.clone(),
                        name.line,
                    )?,
                    None => self
                        .globals
                        .borrow_mut()
                        .assign(&name.lexeme, value.clone(), name.line)?,
                }

                debug!("Assigned value {} to '{}'", value, name.lexeme);
                Ok(value)
            }

            Expr::Call {
                callee,
                paren,
                arguments,
            } => {
                let callable = match self.evaluate(callee)? {
                    Value::Callable(callable) => callable,
                    other => {
                        return Err(LoxError::runtime(
                            paren.line,
                            format!("Can only call functions and classes, not {}.", other.type_name()),
                        ))
                    }
                };

                let mut values = Vec::with_capacity(arguments.len());
                for argument in arguments {
                    values.push(self.evaluate(argument)?);
                }

                self.call(&callable, values, paren.line)
            }

            Expr::Array { elements, .. } => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.evaluate(element)?);
                }
                Ok(Value::Array(Rc::new(values)))
            }

            Expr::Index {
                collection,
                bracket,
                index,
            } => {
                let collection = self.evaluate(collection)?;
                let index = self.evaluate(index)?;
                index_array(&collection, &index, bracket)
            }

            Expr::Get { object, name } => match self.evaluate(object)? {
                Value::Instance(instance) => Instance::get(&instance, name),
                _ => Err(LoxError::runtime(
                    name.line,
                    "Only instances have properties.",
                )),
            },

            Expr::Set {
                object,
                name,
                value,
            } => {
                let Value::Instance(instance) = self.evaluate(object)? else {
                    return Err(LoxError::runtime(name.line, "Only instances have fields."));
                };

                let value = self.evaluate(value)?;
                instance.borrow_mut().set(name, value.clone());
                Ok(value)
            }

            Expr::Lambda(decl) => {
                let function =
                    LoxFunction::new(Rc::clone(decl), Rc::clone(&self.environment), false);
                Ok(Value::Callable(Callable::Function(Rc::new(function))))
            }
        }
    }

    fn evaluate_unary(&mut self, operator: &Token, operand: &Expr, fixity: Fixity) -> Result<Value> {
        let steps = matches!(
            operator.token_type,
            TokenType::PLUS_PLUS | TokenType::MINUS_MINUS
        );

        // `++`/`--` on a bare name read and write the nearest scope holding it.
        let value = match operand {
            Expr::Variable { name, .. } if steps => {
                self.environment.borrow().get(&name.lexeme, name.line)?
            }
            _ => self.evaluate(operand)?,
        };

        match operator.token_type {
            TokenType::BANG => Ok(Value::Bool(!value.is_truthy())),

            TokenType::MINUS => Ok(Value::number(-number(&value)?)),

            TokenType::PLUS_PLUS | TokenType::MINUS_MINUS => {
                let old = number(&value)?;
                let step = if operator.token_type == TokenType::PLUS_PLUS {
                    1.0
                } else {
                    -1.0
                };
                let new = Value::number(old + step);

                if let Expr::Variable { name, .. } = operand {
                    self.environment
                        .borrow_mut()
                        .assign(&name.lexeme, new.clone(), name.line)?;
                }

                Ok(match fixity {
                    Fixity::Prefix => new,
                    Fixity::Postfix => Value::number(old),
                })
            }

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid unary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn evaluate_binary(&mut self, left: &Expr, operator: &Token, right: &Expr) -> Result<Value> {
        let left = self.evaluate(left)?;
        let right = self.evaluate(right)?;
        debug!("Left operand: {}, Right operand: {}", left, right);

        match operator.token_type {
            TokenType::EQUAL_EQUAL => Ok(Value::Bool(left == right)),
            TokenType::BANG_EQUAL => Ok(Value::Bool(left != right)),

            TokenType::PLUS => match (&left, &right) {
                (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
                (Value::String(_), other) => Err(LoxError::convert(other.describe(), "string")),
                _ => {
                    let (a, b) = numbers(&left, &right)?;
                    Ok(Value::number(a + b))
                }
            },

            TokenType::MINUS => numbers(&left, &right).map(|(a, b)| Value::number(a - b)),
            TokenType::STAR => numbers(&left, &right).map(|(a, b)| Value::number(a * b)),
            TokenType::SLASH => numbers(&left, &right).map(|(a, b)| Value::number(a / b)),

            TokenType::GREATER => numbers(&left, &right).map(|(a, b)| Value::Bool(a > b)),
            TokenType::GREATER_EQUAL => numbers(&left, &right).map(|(a, b)| Value::Bool(a >= b)),
            TokenType::LESS => numbers(&left, &right).map(|(a, b)| Value::Bool(a < b)),
            TokenType::LESS_EQUAL => numbers(&left, &right).map(|(a, b)| Value::Bool(a <= b)),

            _ => Err(LoxError::runtime(
                operator.line,
                format!("Invalid binary operator '{}'.", operator.lexeme),
            )),
        }
    }

    fn look_up_variable(&self, id: ExprId, name: &Token) -> Result<Value> {
        match self.locals.get(&id) {
            Some(&distance) => {
                Environment::get_at(&self.environment, distance, &name.lexeme, name.line)
            }
            None => self.globals.borrow().get(&name.lexeme, name.line),
        }
    }

    /// Invokes `callable` inside a new stack frame. The frame is popped on
    /// every exit path; runtime errors leaving their innermost call pick up
    /// the trace of active calls.
    pub fn call(&mut self, callable: &Callable, arguments: Vec<Value>, line: usize) -> Result<Value> {
        let arity = callable.arity();
        if !arity.accepts(arguments.len()) {
            return Err(LoxError::runtime(
                line,
                format!("Expected {} arguments but got {}.", arity, arguments.len()),
            ));
        }

        if self.depth >= MAX_CALL_DEPTH {
            let err = LoxError::runtime(
                line,
                format!("Stack overflow: more than {} nested calls.", MAX_CALL_DEPTH),
            );
            return Err(self.with_trace(err));
        }

        debug!(
            "Calling '{}' with {} argument(s)",
            callable.name(),
            arguments.len()
        );

        let parent = self.frame.take();
        self.frame = Some(Rc::new(StackFrame::new(callable.name(), line, parent)));
        self.depth += 1;

        let result = callable
            .call(self, arguments, line)
            .map_err(|err| self.with_trace(err));

        self.depth -= 1;
        self.frame = self.frame.as_ref().and_then(|frame| frame.parent.clone());

        result
    }

    fn with_trace(&self, err: LoxError) -> LoxError {
        match (err, &self.frame) {
            (
                LoxError::Runtime {
                    message,
                    line,
                    trace,
                },
                Some(frame),
            ) if trace.is_empty() => {
                let mut trace = frame.trace();
                trace.push(SCRIPT_FRAME.to_string());
                LoxError::Runtime {
                    message,
                    line,
                    trace,
                }
            }
            (err, _) => err,
        }
    }
}

fn number(value: &Value) -> Result<f64> {
    value
        .as_f64()
        .ok_or_else(|| LoxError::convert(value.describe(), "float"))
}

fn numbers(left: &Value, right: &Value) -> Result<(f64, f64)> {
    Ok((number(left)?, number(right)?))
}

fn index_array(collection: &Value, index: &Value, bracket: &Token) -> Result<Value> {
    let Value::Array(elements) = collection else {
        return Err(LoxError::runtime(
            bracket.line,
            format!("Can only index arrays, not {}.", collection.type_name()),
        ));
    };

    let position = match index {
        Value::Int(i) => Some(*i),
        Value::Float(f) => match Value::number(*f) {
            Value::Int(i) => Some(i),
            _ => None,
        },
        _ => None,
    };

    let Some(position) = position else {
        return Err(LoxError::runtime(
            bracket.line,
            format!("Array index must be an integer, not {}.", index.describe()),
        ));
    };

    usize::try_from(position)
        .ok()
        .and_then(|i| elements.get(i))
        .cloned()
        .ok_or_else(|| {
            LoxError::runtime(
                bracket.line,
                format!(
                    "Array index {} out of range for length {}.",
                    position,
                    elements.len()
                ),
            )
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str) -> (Result<Vec<Option<Value>>>, String) {
        let mut interpreter = Interpreter::with_output(PrintHandler::buffer());
        let result = crate::run_source(source, &mut interpreter);
        (result, interpreter.output())
    }

    #[test]
    fn expression_statements_yield_values() {
        let (result, _) = run("1 + 2; print 3; 6 / 2;");
        let values = result.unwrap();

        assert_eq!(values.len(), 3);
        assert!(matches!(values[0], Some(Value::Int(3))));
        assert!(values[1].is_none());
        assert!(matches!(values[2], Some(Value::Int(3))));
    }

    #[test]
    fn non_integral_division_stays_float() {
        let (result, _) = run("1 / 3;");
        let values = result.unwrap();

        assert!(matches!(values[0], Some(Value::Float(n)) if (n - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn division_by_zero_is_infinite() {
        let (result, output) = run("print 1 / 0; print -1 / 0;");
        result.unwrap();

        assert_eq!(output, "inf\n-inf\n");
    }

    #[test]
    fn environment_restored_after_error_in_block() {
        let mut interpreter = Interpreter::with_output(PrintHandler::buffer());
        let before = Rc::clone(&interpreter.environment);

        let err = crate::run_source("{ var a = 1; a + nil; }", &mut interpreter);

        assert!(err.is_err());
        assert!(Rc::ptr_eq(&before, &interpreter.environment));
        assert_eq!(interpreter.depth, 0);
    }

    #[test]
    fn frames_popped_after_error_in_call() {
        let mut interpreter = Interpreter::with_output(PrintHandler::buffer());

        let err = crate::run_source("fun f() { return nil + 1; } f();", &mut interpreter);

        assert!(err.is_err());
        assert!(interpreter.frame.is_none());
        assert_eq!(interpreter.depth, 0);
    }

    #[test]
    fn indexing_rejects_fractional_positions() {
        let bracket = Token::new(TokenType::LEFT_BRACKET, "[", 1);
        let array = Value::Array(Rc::new(vec![Value::Int(7)]));

        assert_eq!(
            index_array(&array, &Value::Float(0.0), &bracket).unwrap(),
            Value::Int(7)
        );
        assert!(index_array(&array, &Value::Float(0.5), &bracket).is_err());
        assert!(index_array(&array, &Value::Int(-1), &bracket).is_err());
    }
}
