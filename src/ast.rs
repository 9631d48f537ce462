//! Abstract syntax tree produced by the [`crate::parser::Parser`].
//!
//! Both node families are closed sum types; the resolver and interpreter
//! dispatch on them with `match`. Nodes are immutable once built. Nodes that
//! refer to a binding (`Variable`, `Assign`, `This`) carry an [`ExprId`] that
//! the resolver uses as the key of the interpreter's distance table.

use std::rc::Rc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::token::Token;

/// Identity of a binding reference in the tree.
///
/// Ids are unique for the whole process, so distance tables stay valid when
/// a REPL session parses many units against one interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(usize);

static NEXT_EXPR_ID: AtomicUsize = AtomicUsize::new(0);

impl ExprId {
    pub fn fresh() -> Self {
        ExprId(NEXT_EXPR_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A **literal constant** that appears directly in the source code.
///
/// The parser copies (or converts) the value at parse‑time so the AST
/// can outlive the scanner's token buffer.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Numeric literal written without a fractional part.
    Int(i64),

    /// Numeric literal written with a fractional part.
    Float(f64),

    /// String literal without surrounding quotes.
    Str(String),

    Bool(bool),

    Nil,
}

/// Whether `++`/`--` was written before or after its operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fixity {
    Prefix,
    Postfix,
}

/// A function body shared between the declaration statement and every
/// closure created from it.
#[derive(Debug, PartialEq)]
pub struct FunctionDecl {
    /// `None` for anonymous functions (`fun (a) { ... }`).
    pub name: Option<Token>,

    /// Parameter name tokens (arity ≤ 255).
    pub params: Vec<Token>,

    /// Statements of the body block.
    pub body: Vec<Stmt>,

    /// The `fun` keyword or the name token; used for diagnostics.
    pub keyword: Token,
}

impl FunctionDecl {
    /// Name used in call traces and value rendering.
    pub fn display_name(&self) -> &str {
        self.name
            .as_ref()
            .map_or("lambda", |name| name.lexeme.as_str())
    }
}

/// **Abstract‑Syntax‑Tree node** representing every kind of *expression*.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// A literal constant: number, string, `true`, `false`, or `nil`.
    Literal(LiteralValue),

    /// Parenthesised sub‑expression: `"(" expression ")"`.
    Grouping(Box<Expr>),

    /// Prefix (`!x`, `-x`, `++x`, `--x`) or postfix (`x++`, `x--`) operator.
    Unary {
        operator: Token,
        operand: Box<Expr>,
        fixity: Fixity,
    },

    /// Infix binary operator expression: `a + b`, `x <= y`.
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// Short‑circuiting logical operators `and` / `or`.
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    },

    /// `condition ? then_branch : else_branch`
    Ternary {
        condition: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },

    /// Variable access.
    Variable { id: ExprId, name: Token },

    /// Assignment expression: `identifier "=" expression`
    Assign {
        id: ExprId,
        name: Token,
        value: Box<Expr>,
    },

    /// Function‑, method‑ or constructor‑call.
    Call {
        callee: Box<Expr>,
        /// The closing `)` token, retained for error reporting.
        paren: Token,
        arguments: Vec<Expr>,
    },

    /// Array literal: `[a, b, c]`.
    Array {
        bracket: Token,
        elements: Vec<Expr>,
    },

    /// `collection[index]`
    Index {
        collection: Box<Expr>,
        bracket: Token,
        index: Box<Expr>,
    },

    /// object.property
    Get { object: Box<Expr>, name: Token },

    /// object.property = value
    Set {
        object: Box<Expr>,
        name: Token,
        value: Box<Expr>,
    },

    /// The 'this' keyword inside a method.
    This { id: ExprId, keyword: Token },

    /// Anonymous function.
    Lambda(Rc<FunctionDecl>),
}

impl Expr {
    /// Best source line for diagnostics about this expression.
    pub fn line(&self) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Grouping(inner) => inner.line(),
            Expr::Unary { operator, .. }
            | Expr::Binary { operator, .. }
            | Expr::Logical { operator, .. } => operator.line,
            Expr::Ternary { condition, .. } => condition.line(),
            Expr::Variable { name, .. } | Expr::Assign { name, .. } => name.line,
            Expr::Call { paren, .. } => paren.line,
            Expr::Array { bracket, .. } | Expr::Index { bracket, .. } => bracket.line,
            Expr::Get { name, .. } | Expr::Set { name, .. } => name.line,
            Expr::This { keyword, .. } => keyword.line,
            Expr::Lambda(decl) => decl.keyword.line,
        }
    }
}

/// **Abstract‑Syntax‑Tree node** for *statements*. A program is a sequence
/// of these nodes returned by [`crate::parser::Parser::parse`].
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Braced scope containing zero or more declarations/statements.
    Block(Vec<Stmt>),

    /// Stand‑alone expression terminated by a semicolon.
    Expression(Expr),

    /// `print` statement used for output.
    Print(Expr),

    /// `var a = 1, b, c = a;`. `names` and `initializers` are parallel.
    Var {
        names: Vec<Token>,
        initializers: Vec<Option<Expr>>,
    },

    /// Named function declaration.
    Function(Rc<FunctionDecl>),

    /// Class declaration; a method named `init` is the constructor.
    Class {
        name: Token,
        methods: Vec<Rc<FunctionDecl>>,
    },

    /// `if` / `else` conditional.
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// `while` loop. `increment` is set for desugared `for` loops and runs
    /// after every iteration, including ones cut short by `continue`.
    While {
        condition: Expr,
        body: Box<Stmt>,
        increment: Option<Expr>,
    },

    /// `return` statement inside a function body.
    Return {
        keyword: Token,
        /// Absent ⇒ `nil` is returned.
        value: Option<Expr>,
    },

    Break(Token),

    Continue(Token),
}

impl Stmt {
    /// Best source line for diagnostics about this statement.
    pub fn line(&self) -> usize {
        match self {
            Stmt::Block(statements) => statements.first().map_or(0, Stmt::line),
            Stmt::Expression(expr) | Stmt::Print(expr) => expr.line(),
            Stmt::Var { names, .. } => names.first().map_or(0, |name| name.line),
            Stmt::Function(decl) => decl.keyword.line,
            Stmt::Class { name, .. } => name.line,
            Stmt::If { condition, .. } | Stmt::While { condition, .. } => condition.line(),
            Stmt::Return { keyword, .. } => keyword.line,
            Stmt::Break(token) | Stmt::Continue(token) => token.line,
        }
    }
}
