//! Static resolver pass.
//!
//! This resolver does three things in one AST walk:
//! 1. Build lexical scopes (stack of `HashMap<String, bool>` tracking declared/defined).
//! 2. Report static errors (redeclaration, read in own initializer, misplaced
//!    `return` or `this`).
//! 3. Tell the interpreter, for *each* variable occurrence, whether it's a local
//!    (and at what depth) or a global, so the interpreter never falls back to
//!    dynamic lookup that would see a later shadowing local.
//!
//! Scopes are opened exactly where the interpreter creates environments:
//! blocks, a function's parameters, its body, and the `this` binding that
//! wraps every method.

use crate::ast::{Expr, ExprId, FunctionDecl, Stmt};
use crate::error::{LoxError, Result};
use crate::interpreter::Interpreter;
use crate::stack::ensure_sufficient_stack;
use crate::token::Token;
use log::{debug, info};
use std::collections::HashMap;

/// What kind of function body are we in?  Used to validate `return`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum FunctionType {
    None,
    Function,
    Method,
    Initializer,
}

/// Are we inside a class body?  Used to validate `this`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ClassType {
    None,
    Class,
}

/// Resolver: tracks scopes, enforces static rules, and *records* binding
/// distances (locals vs. globals) by calling back into the interpreter.
pub struct Resolver<'interp> {
    interpreter: &'interp mut Interpreter,
    scopes: Vec<HashMap<String, bool>>, // false=declared, true=defined
    current_function: FunctionType,
    current_class: ClassType,
}

impl<'interp> Resolver<'interp> {
    /// Create a new resolver bound to the given interpreter.
    pub fn new(interpreter: &'interp mut Interpreter) -> Self {
        info!("Resolver instantiated");
        Resolver {
            interpreter,
            scopes: Vec::new(),
            current_function: FunctionType::None,
            current_class: ClassType::None,
        }
    }

    /// Walk all top‑level statements, stopping at the first static error.
    pub fn resolve(&mut self, statements: &[Stmt]) -> Result<()> {
        info!(
            "Beginning resolve pass over {} statement(s)",
            statements.len()
        );
        for stmt in statements {
            self.resolve_stmt(stmt)?;
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Statement resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_stmt(&mut self, stmt: &Stmt) -> Result<()> {
        ensure_sufficient_stack(|| self.resolve_stmt_inner(stmt))
    }

    fn resolve_stmt_inner(&mut self, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Class { name, methods } => {
                self.declare(name)?;
                self.define(name);

                let enclosing = self.current_class;
                self.current_class = ClassType::Class;

                self.begin_scope();
                if let Some(scope) = self.scopes.last_mut() {
                    scope.insert("this".to_string(), true);
                }

                for method in methods {
                    let kind = if method.display_name() == "init" {
                        FunctionType::Initializer
                    } else {
                        FunctionType::Method
                    };
                    self.resolve_function(method, kind)?;
                }

                self.end_scope();
                self.current_class = enclosing;
            }

            Stmt::Block(statements) => {
                self.begin_scope();
                for s in statements {
                    self.resolve_stmt(s)?;
                }
                self.end_scope();
            }

            Stmt::Var {
                names,
                initializers,
            } => {
                // Every name is in its own initializer's "being declared"
                // window, so `var a = 1, b = a;` reads an unfinished sibling.
                for name in names {
                    self.declare(name)?;
                }
                for expr in initializers.iter().flatten() {
                    self.resolve_expr(expr)?;
                }
                for name in names {
                    self.define(name);
                }
            }

            Stmt::Function(decl) => {
                // the name is visible *inside* its own body
                if let Some(name) = &decl.name {
                    self.declare(name)?;
                    self.define(name);
                }
                self.resolve_function(decl, FunctionType::Function)?;
            }

            Stmt::Expression(expr) | Stmt::Print(expr) => {
                self.resolve_expr(expr)?;
            }

            Stmt::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(then_branch)?;
                if let Some(eb) = else_branch.as_deref() {
                    self.resolve_stmt(eb)?;
                }
            }

            Stmt::While {
                condition,
                body,
                increment,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_stmt(body)?;
                if let Some(inc) = increment {
                    self.resolve_expr(inc)?;
                }
            }

            Stmt::Return { keyword, value } => {
                if self.current_function == FunctionType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't return from top-level code.",
                    ));
                }
                if let Some(expr) = value {
                    if self.current_function == FunctionType::Initializer {
                        return Err(LoxError::resolve(
                            keyword,
                            "Can't return a value from an initializer.",
                        ));
                    }
                    self.resolve_expr(expr)?;
                }
            }

            // loop placement is checked by the parser
            Stmt::Break(_) | Stmt::Continue(_) => {}
        }
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Expression resolution
    // ─────────────────────────────────────────────────────────────────────────

    fn resolve_expr(&mut self, expr: &Expr) -> Result<()> {
        ensure_sufficient_stack(|| self.resolve_expr_inner(expr))
    }

    fn resolve_expr_inner(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Literal(_) => {}

            Expr::Grouping(inner) => {
                self.resolve_expr(inner)?;
            }

            Expr::Unary { operand, .. } => {
                self.resolve_expr(operand)?;
            }

            Expr::Binary { left, right, .. } | Expr::Logical { left, right, .. } => {
                self.resolve_expr(left)?;
                self.resolve_expr(right)?;
            }

            Expr::Ternary {
                condition,
                then_branch,
                else_branch,
            } => {
                self.resolve_expr(condition)?;
                self.resolve_expr(then_branch)?;
                self.resolve_expr(else_branch)?;
            }

            Expr::Variable { id, name } => {
                if let Some(scope) = self.scopes.last() {
                    if scope.get(&name.lexeme) == Some(&false) {
                        return Err(LoxError::resolve(
                            name,
                            "Can't read local variable in its own initializer.",
                        ));
                    }
                }
                self.resolve_local(*id, name);
            }

            Expr::Assign { id, name, value } => {
                // First resolve RHS, then bind LHS
                self.resolve_expr(value)?;
                self.resolve_local(*id, name);
            }

            Expr::Call {
                callee, arguments, ..
            } => {
                self.resolve_expr(callee)?;
                for arg in arguments {
                    self.resolve_expr(arg)?;
                }
            }

            Expr::Array { elements, .. } => {
                for element in elements {
                    self.resolve_expr(element)?;
                }
            }

            Expr::Index {
                collection, index, ..
            } => {
                self.resolve_expr(collection)?;
                self.resolve_expr(index)?;
            }

            Expr::Get { object, .. } => self.resolve_expr(object)?,

            Expr::Set { object, value, .. } => {
                self.resolve_expr(object)?;
                self.resolve_expr(value)?;
            }

            Expr::This { id, keyword } => {
                if self.current_class == ClassType::None {
                    return Err(LoxError::resolve(
                        keyword,
                        "Can't use 'this' outside of a class.",
                    ));
                }
                self.resolve_local(*id, keyword);
            }

            Expr::Lambda(decl) => self.resolve_function(decl, FunctionType::Function)?,
        }

        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Function helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Parameters get one scope and the body block another, matching the
    /// two environments a call creates.
    fn resolve_function(&mut self, decl: &FunctionDecl, kind: FunctionType) -> Result<()> {
        debug!("Resolving function '{}'", decl.display_name());

        let enclosing = self.current_function;
        self.current_function = kind;

        self.begin_scope();
        for param in &decl.params {
            self.declare(param)?;
            self.define(param);
        }

        self.begin_scope();
        for stmt in &decl.body {
            self.resolve_stmt(stmt)?;
        }
        self.end_scope();

        self.end_scope();

        self.current_function = enclosing;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Scope management
    // ─────────────────────────────────────────────────────────────────────────

    #[inline]
    fn begin_scope(&mut self) {
        self.scopes.push(HashMap::new());
    }

    #[inline]
    fn end_scope(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &Token) -> Result<()> {
        if let Some(scope) = self.scopes.last_mut() {
            if scope.contains_key(&name.lexeme) {
                return Err(LoxError::resolve(
                    name,
                    "Already a variable with this name in this scope.",
                ));
            }
            scope.insert(name.lexeme.clone(), false);
        }
        Ok(())
    }

    fn define(&mut self, name: &Token) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.lexeme.clone(), true);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Binding‑distance helper
    // ─────────────────────────────────────────────────────────────────────────

    /// Record this occurrence as a local at depth `d`, or leave it out of
    /// the table (global) if no scope holds the name.
    fn resolve_local(&mut self, id: ExprId, name: &Token) {
        for (depth, scope) in self.scopes.iter().rev().enumerate() {
            if scope.contains_key(&name.lexeme) {
                debug!("Resolved '{}' at depth {}", name.lexeme, depth);
                self.interpreter.note_local(id, depth);
                return;
            }
        }

        debug!("Resolved '{}' as global", name.lexeme);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;
    use crate::print_handler::PrintHandler;
    use crate::scanner::scan_tokens;

    fn resolve(source: &str) -> Result<()> {
        let tokens = scan_tokens(source.as_bytes())?;
        let statements = Parser::new(&tokens).parse()?;
        let mut interpreter = Interpreter::with_output(PrintHandler::buffer());
        Resolver::new(&mut interpreter).resolve(&statements)
    }

    fn message(source: &str) -> String {
        resolve(source).unwrap_err().to_string()
    }

    #[test]
    fn self_initializer_is_rejected() {
        assert_eq!(
            message("{ var a = a; }"),
            "[line 1] Error at 'a': Can't read local variable in its own initializer."
        );
    }

    #[test]
    fn sibling_in_same_var_statement_is_rejected() {
        assert!(resolve("{ var a = 1, b = a; }").is_err());
        assert!(resolve("{ var a = 1; var b = a; }").is_ok());
    }

    #[test]
    fn globals_may_reference_themselves() {
        assert!(resolve("var a = 1; var a = a;").is_ok());
    }

    #[test]
    fn redeclaration_in_local_scope() {
        assert_eq!(
            message("{ var a; var a; }"),
            "[line 1] Error at 'a': Already a variable with this name in this scope."
        );
    }

    #[test]
    fn body_may_shadow_parameters() {
        assert!(resolve("fun f(a) { var a = 2; return a; }").is_ok());
        assert!(resolve("fun f(a, a) {}").is_err());
    }

    #[test]
    fn misplaced_return() {
        assert_eq!(
            message("return 1;"),
            "[line 1] Error at 'return': Can't return from top-level code."
        );
        assert_eq!(
            message("class A { init() { return 1; } }"),
            "[line 1] Error at 'return': Can't return a value from an initializer."
        );
        assert!(resolve("class A { init() { return; } }").is_ok());
    }

    #[test]
    fn this_outside_class() {
        assert_eq!(
            message("print this;"),
            "[line 1] Error at 'this': Can't use 'this' outside of a class."
        );
        assert!(resolve("fun f() { return this; }").is_err());
        assert!(resolve("class A { m() { return fun () { return this; }; } }").is_ok());
    }
}
