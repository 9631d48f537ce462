/*!
Recursive‑descent parser: token slice → statement list.

Time & Space Complexity
-----------------------
* **n** = number of tokens (including the sole EOF).

| Phase / function              | Cost | Rationale                                               |
|-------------------------------|-----:|---------------------------------------------------------|
| `Parser::parse` main loop     | Θ(n) | Each token is consumed once via `advance()`.            |
| Individual productions        | O(1) per token | One token of lookahead, no backtracking.      |
| Error recovery `synchronize()`| O(k) | Discards tokens ≤ next statement boundary (`k ≤ n`).   |

### Logging Policy

| Location                     | Level  | Purpose                                   |
|------------------------------|--------|-------------------------------------------|
| `Parser::new`, `parse`       | `info` | Lifecycle milestones.                     |
| `declaration`, `statement`   | `debug`| High‑level descent into grammar branches. |
| Error recovery               | `debug`| Context before resynchronising.           |

Grammar (EBNF, lowest to highest precedence)
---------------------------------------------

```text
program     → declaration* EOF ;
declaration → classDecl | funDecl | varDecl | statement ;
classDecl   → "class" IDENT "{" function* "}" ;
funDecl     → "fun" function ;
function    → IDENT "(" parameters? ")" block ;
varDecl     → "var" IDENT ( "=" expression )? ( "," IDENT ( "=" expression )? )* ";" ;
statement   → exprStmt | forStmt | ifStmt | printStmt | returnStmt
            | whileStmt | breakStmt | continueStmt | block ;
forStmt     → "for" "(" ( varDecl | exprStmt | ";" ) expression? ";" expression? ")" statement ;
block       → "{" declaration* "}" ;
expression  → assignment ;
assignment  → ( call "." )? IDENT "=" assignment | ternary ;
ternary     → logic_or ( "?" ternary ":" ternary )? ;
logic_or    → logic_and ( "or" logic_and )* ;
logic_and   → equality ( "and" equality )* ;
equality    → comparison ( ( "!=" | "==" ) comparison )* ;
comparison  → term ( ( ">" | ">=" | "<" | "<=" ) term )* ;
term        → factor ( ( "-" | "+" ) factor )* ;
factor      → unary ( ( "/" | "*" ) unary )* ;
unary       → ( "!" | "-" | "++" | "--" ) unary | postfix ;
postfix     → call ( "++" | "--" )? ;
call        → primary ( "(" arguments? ")" | "[" expression "]" | "." IDENT )* ;
primary     → NUMBER | STRING | "true" | "false" | "nil" | "this" | IDENT
            | "(" expression ")" | "[" arguments? "]" | "fun" "(" parameters? ")" block ;
```
*/

use std::rc::Rc;

use crate::ast::{Expr, ExprId, Fixity, FunctionDecl, LiteralValue, Stmt};
use crate::error::{LoxError, Result};
use crate::stack::ensure_sufficient_stack;
use crate::token::{Token, TokenType};

use log::{debug, info};

/// Upper bound on parameters and call arguments.
const MAX_ARITY: usize = 255;

/// Top‑level parser over an immutable slice of tokens.
///
/// The slice must end with an `EOF` token, as produced by the scanner.
pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    /// Number of loops enclosing the current position inside the current
    /// function body. `break`/`continue` are only legal when non-zero.
    loop_depth: usize,
    /// Errors recovered from inside nested blocks, not yet reported.
    errors: Vec<LoxError>,
}

impl<'a> Parser<'a> {
    /// Construct a new parser.
    pub fn new(tokens: &'a [Token]) -> Self {
        info!("Parser created with {} tokens", tokens.len());

        Self {
            tokens,
            current: 0,
            loop_depth: 0,
            errors: Vec::new(),
        }
    }

    // ───────────────────────── public API ─────────────────────────

    /// Parse an entire program and return its statement list.
    ///
    /// Parsing continues past errors so that every independent syntax error
    /// is reported: one error is returned as is, several as
    /// [`LoxError::Syntax`].
    pub fn parse(&mut self) -> Result<Vec<Stmt>> {
        info!("Beginning parse phase");

        let mut statements: Vec<Stmt> = Vec::new();
        let mut errors: Vec<LoxError> = Vec::new();

        for result in self.by_ref() {
            match result {
                Ok(stmt) => statements.push(stmt),
                Err(LoxError::Syntax(mut nested)) => errors.append(&mut nested),
                Err(e) => errors.push(e),
            }
        }

        info!(
            "Parse finished: {} statement(s), {} error(s)",
            statements.len(),
            errors.len()
        );

        match errors.len() {
            0 => Ok(statements),
            1 => Err(errors.remove(0)),
            _ => Err(LoxError::Syntax(errors)),
        }
    }

    /// Parse a single expression followed by EOF (used by the `parse`
    /// subcommand and the REPL for bare expressions).
    pub fn parse_expression(&mut self) -> Result<Expr> {
        if self.tokens.is_empty() {
            return Err(LoxError::Parse {
                message: "Expect expression.".to_string(),
                line: 1,
                location: " at end".to_string(),
            });
        }

        let expr = self.expression()?;

        if !self.is_at_end() {
            return Err(LoxError::parse(self.peek(), "Expect end of expression."));
        }

        Ok(expr)
    }

    // ──────────────────────── declaration rules ───────────────────

    /// Parse one declaration; on failure record the error, resynchronise and
    /// return `None` so the caller can carry on with the next declaration.
    fn recovering_declaration(&mut self) -> Option<Stmt> {
        match self.declaration() {
            Ok(stmt) => Some(stmt),
            Err(e) => {
                debug!("Recovering from parse error: {}", e);

                self.errors.push(e);
                self.synchronize();

                None
            }
        }
    }

    fn declaration(&mut self) -> Result<Stmt> {
        ensure_sufficient_stack(|| self.declaration_inner())
    }

    fn declaration_inner(&mut self) -> Result<Stmt> {
        debug!("Entering declaration at line {}", self.peek().line);

        if self.matches(TokenType::CLASS) {
            self.class_declaration()
        } else if self.check(TokenType::FUN) && self.check_next(TokenType::IDENTIFIER) {
            self.advance();
            Ok(Stmt::Function(self.function("function")?))
        } else if self.matches(TokenType::VAR) {
            self.var_declaration()
        } else {
            self.statement()
        }
    }

    fn class_declaration(&mut self) -> Result<Stmt> {
        let name: Token = self
            .consume(TokenType::IDENTIFIER, "Expect class name.")?
            .clone();

        self.consume(TokenType::LEFT_BRACE, "Expect '{' before class body.")?;

        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after class body.")?;

        debug!(
            "Parsed class '{}' with {} method(s)",
            name.lexeme,
            methods.len()
        );

        Ok(Stmt::Class { name, methods })
    }

    /// `IDENT "(" parameters? ")" block`. The `fun` keyword (if any) has
    /// already been consumed.
    fn function(&mut self, kind: &str) -> Result<Rc<FunctionDecl>> {
        let name: Token = self
            .consume(TokenType::IDENTIFIER, &format!("Expect {} name.", kind))?
            .clone();

        self.consume(
            TokenType::LEFT_PAREN,
            &format!("Expect '(' after {} name.", kind),
        )?;

        let keyword = name.clone();
        self.function_tail(Some(name), keyword, kind)
    }

    /// Parameters and body shared by named functions, methods and lambdas.
    /// Expects the opening `(` to be consumed.
    fn function_tail(
        &mut self,
        name: Option<Token>,
        keyword: Token,
        kind: &str,
    ) -> Result<Rc<FunctionDecl>> {
        let mut params: Vec<Token> = Vec::new();

        if !self.check(TokenType::RIGHT_PAREN) {
            loop {
                if params.len() >= MAX_ARITY {
                    return Err(LoxError::parse(
                        self.peek(),
                        "Can't have more than 255 parameters.",
                    ));
                }

                params.push(
                    self.consume(TokenType::IDENTIFIER, "Expect parameter name.")?
                        .clone(),
                );

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after parameters.")?;
        self.consume(
            TokenType::LEFT_BRACE,
            &format!("Expect '{{' before {} body.", kind),
        )?;

        // A function body starts a fresh loop context: `break` inside a
        // function nested in a loop does not refer to that loop.
        let enclosing_loops = std::mem::replace(&mut self.loop_depth, 0);
        let body = self.block();
        self.loop_depth = enclosing_loops;

        Ok(Rc::new(FunctionDecl {
            name,
            params,
            body: body?,
            keyword,
        }))
    }

    fn var_declaration(&mut self) -> Result<Stmt> {
        let mut names: Vec<Token> = Vec::new();
        let mut initializers: Vec<Option<Expr>> = Vec::new();

        loop {
            names.push(
                self.consume(TokenType::IDENTIFIER, "Expect variable name.")?
                    .clone(),
            );

            initializers.push(if self.matches(TokenType::EQUAL) {
                Some(self.expression()?)
            } else {
                None
            });

            if !self.matches(TokenType::COMMA) {
                break;
            }
        }

        self.consume(
            TokenType::SEMICOLON,
            "Expect ';' after variable declaration.",
        )?;

        Ok(Stmt::Var {
            names,
            initializers,
        })
    }

    // ───────────────────────── statement rules ────────────────────

    fn statement(&mut self) -> Result<Stmt> {
        ensure_sufficient_stack(|| self.statement_inner())
    }

    fn statement_inner(&mut self) -> Result<Stmt> {
        debug!("Entering statement at line {}", self.peek().line);

        if self.matches(TokenType::FOR) {
            self.for_statement()
        } else if self.matches(TokenType::IF) {
            self.if_statement()
        } else if self.matches(TokenType::WHILE) {
            self.while_statement()
        } else if self.matches(TokenType::RETURN) {
            self.return_statement()
        } else if self.matches(TokenType::BREAK) {
            self.break_statement()
        } else if self.matches(TokenType::CONTINUE) {
            self.continue_statement()
        } else if self.matches(TokenType::LEFT_BRACE) {
            Ok(Stmt::Block(self.block()?))
        } else if self.matches(TokenType::PRINT) {
            self.print_statement()
        } else {
            self.expression_statement()
        }
    }

    /// `for (init; cond; incr) body` becomes
    /// `{ init; while (cond) body [incr] }`.
    fn for_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'for'.")?;

        let initializer: Option<Stmt> = if self.matches(TokenType::SEMICOLON) {
            None
        } else if self.matches(TokenType::VAR) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition: Expr = if !self.check(TokenType::SEMICOLON) {
            self.expression()?
        } else {
            Expr::Literal(LiteralValue::Bool(true))
        };
        self.consume(TokenType::SEMICOLON, "Expect ';' after loop condition.")?;

        let increment: Option<Expr> = if !self.check(TokenType::RIGHT_PAREN) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after for clauses.")?;

        let body = self.loop_body()?;

        let looped = Stmt::While {
            condition,
            body: Box::new(body),
            increment,
        };

        Ok(match initializer {
            Some(init) => Stmt::Block(vec![init, looped]),
            None => looped,
        })
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'if'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after if condition.")?;

        let then_branch: Box<Stmt> = Box::new(self.statement()?);
        let else_branch: Option<Box<Stmt>> = if self.matches(TokenType::ELSE) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
        })
    }

    fn while_statement(&mut self) -> Result<Stmt> {
        self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'while'.")?;
        let condition: Expr = self.expression()?;
        self.consume(TokenType::RIGHT_PAREN, "Expect ')' after condition.")?;

        let body = self.loop_body()?;

        Ok(Stmt::While {
            condition,
            body: Box::new(body),
            increment: None,
        })
    }

    fn loop_body(&mut self) -> Result<Stmt> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;

        body
    }

    fn break_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            return Err(LoxError::parse(
                &keyword,
                "Can't use 'break' outside of a loop.",
            ));
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after 'break'.")?;

        Ok(Stmt::Break(keyword))
    }

    fn continue_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();

        if self.loop_depth == 0 {
            return Err(LoxError::parse(
                &keyword,
                "Can't use 'continue' outside of a loop.",
            ));
        }

        self.consume(TokenType::SEMICOLON, "Expect ';' after 'continue'.")?;

        Ok(Stmt::Continue(keyword))
    }

    fn print_statement(&mut self) -> Result<Stmt> {
        let value: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after value.")?;

        Ok(Stmt::Print(value))
    }

    fn return_statement(&mut self) -> Result<Stmt> {
        let keyword: Token = self.previous().clone();
        let value: Option<Expr> = if !self.check(TokenType::SEMICOLON) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(TokenType::SEMICOLON, "Expect ';' after return value.")?;

        Ok(Stmt::Return { keyword, value })
    }

    fn expression_statement(&mut self) -> Result<Stmt> {
        let expr: Expr = self.expression()?;

        self.consume(TokenType::SEMICOLON, "Expect ';' after expression.")?;

        Ok(Stmt::Expression(expr))
    }

    /// Declarations up to the closing `}`; the `{` is already consumed.
    fn block(&mut self) -> Result<Vec<Stmt>> {
        let mut statements: Vec<Stmt> = Vec::new();

        while !self.check(TokenType::RIGHT_BRACE) && !self.is_at_end() {
            if let Some(stmt) = self.recovering_declaration() {
                statements.push(stmt);
            }
        }

        self.consume(TokenType::RIGHT_BRACE, "Expect '}' after block.")?;

        Ok(statements)
    }

    // ─────────────────────── expression rules ─────────────────────

    fn expression(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.assignment())
    }

    fn assignment(&mut self) -> Result<Expr> {
        let expr: Expr = self.ternary()?;

        if self.matches(TokenType::EQUAL) {
            let equals: Token = self.previous().clone();
            let value: Expr = self.assignment()?;

            return match expr {
                Expr::Variable { name, .. } => Ok(Expr::Assign {
                    id: ExprId::fresh(),
                    name,
                    value: Box::new(value),
                }),

                Expr::Get { object, name } => Ok(Expr::Set {
                    object,
                    name,
                    value: Box::new(value),
                }),

                _ => Err(LoxError::parse(&equals, "Invalid assignment target.")),
            };
        }

        Ok(expr)
    }

    fn ternary(&mut self) -> Result<Expr> {
        let expr: Expr = self.logical_or()?;

        if self.matches(TokenType::QUESTION) {
            let then_branch: Expr = self.ternary()?;
            self.consume(TokenType::COLON, "Expect ':' after ternary '?'.")?;
            let else_branch: Expr = self.ternary()?;

            return Ok(Expr::Ternary {
                condition: Box::new(expr),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            });
        }

        Ok(expr)
    }

    fn logical_or(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.logical_and()?;

        while self.matches(TokenType::OR) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.logical_and()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.equality()?;

        while self.matches(TokenType::AND) {
            let operator: Token = self.previous().clone();
            let right: Expr = self.equality()?;

            expr = Expr::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    /// Left-associative binary level: `next ( op next )*`.
    fn binary_level(
        &mut self,
        operators: &[TokenType],
        next: fn(&mut Self) -> Result<Expr>,
    ) -> Result<Expr> {
        let mut expr: Expr = next(self)?;

        while operators.iter().any(|op| self.check(op.clone())) {
            let operator: Token = self.advance().clone();
            let right: Expr = next(self)?;

            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr> {
        self.binary_level(
            &[TokenType::BANG_EQUAL, TokenType::EQUAL_EQUAL],
            Self::comparison,
        )
    }

    fn comparison(&mut self) -> Result<Expr> {
        self.binary_level(
            &[
                TokenType::GREATER,
                TokenType::GREATER_EQUAL,
                TokenType::LESS,
                TokenType::LESS_EQUAL,
            ],
            Self::term,
        )
    }

    fn term(&mut self) -> Result<Expr> {
        self.binary_level(&[TokenType::MINUS, TokenType::PLUS], Self::factor)
    }

    fn factor(&mut self) -> Result<Expr> {
        self.binary_level(&[TokenType::SLASH, TokenType::STAR], Self::unary)
    }

    fn unary(&mut self) -> Result<Expr> {
        ensure_sufficient_stack(|| self.unary_inner())
    }

    fn unary_inner(&mut self) -> Result<Expr> {
        if self.matches(TokenType::BANG)
            || self.matches(TokenType::MINUS)
            || self.matches(TokenType::PLUS_PLUS)
            || self.matches(TokenType::MINUS_MINUS)
        {
            let operator: Token = self.previous().clone();
            let operand: Expr = self.unary()?;

            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
                fixity: Fixity::Prefix,
            });
        }

        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr> {
        let expr: Expr = self.call()?;

        if self.matches(TokenType::PLUS_PLUS) || self.matches(TokenType::MINUS_MINUS) {
            return Ok(Expr::Unary {
                operator: self.previous().clone(),
                operand: Box::new(expr),
                fixity: Fixity::Postfix,
            });
        }

        Ok(expr)
    }

    fn call(&mut self) -> Result<Expr> {
        let mut expr: Expr = self.primary()?;

        loop {
            if self.matches(TokenType::LEFT_PAREN) {
                expr = self.finish_call(expr)?;
            } else if self.matches(TokenType::LEFT_BRACKET) {
                let bracket: Token = self.previous().clone();
                let index: Expr = self.expression()?;

                self.consume(TokenType::RIGHT_BRACKET, "Expect ']' after index.")?;

                expr = Expr::Index {
                    collection: Box::new(expr),
                    bracket,
                    index: Box::new(index),
                };
            } else if self.matches(TokenType::DOT) {
                let name: Token = self
                    .consume(TokenType::IDENTIFIER, "Expect property name after '.'.")?
                    .clone();

                expr = Expr::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Comma-separated expressions up to `closing`, which is consumed.
    fn arguments(&mut self, closing: TokenType, message: &str) -> Result<(Vec<Expr>, Token)> {
        let mut arguments: Vec<Expr> = Vec::new();

        if !self.check(closing.clone()) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    return Err(LoxError::parse(
                        self.peek(),
                        "Can't have more than 255 arguments.",
                    ));
                }

                arguments.push(self.expression()?);

                if !self.matches(TokenType::COMMA) {
                    break;
                }
            }
        }

        let close: Token = self.consume(closing, message)?.clone();

        Ok((arguments, close))
    }

    fn finish_call(&mut self, callee: Expr) -> Result<Expr> {
        let (arguments, paren) =
            self.arguments(TokenType::RIGHT_PAREN, "Expect ')' after arguments.")?;

        Ok(Expr::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }

    fn primary(&mut self) -> Result<Expr> {
        if self.matches(TokenType::FALSE) {
            return Ok(Expr::Literal(LiteralValue::Bool(false)));
        }
        if self.matches(TokenType::TRUE) {
            return Ok(Expr::Literal(LiteralValue::Bool(true)));
        }
        if self.matches(TokenType::NIL) {
            return Ok(Expr::Literal(LiteralValue::Nil));
        }

        if let TokenType::NUMBER(n) = self.peek().token_type {
            let token = self.advance();
            return Ok(Expr::Literal(number_literal(&token.lexeme, n)));
        }

        if let TokenType::STRING(ref s) = self.peek().token_type {
            let s = s.clone();
            self.advance();
            return Ok(Expr::Literal(LiteralValue::Str(s)));
        }

        if self.matches(TokenType::THIS) {
            return Ok(Expr::This {
                id: ExprId::fresh(),
                keyword: self.previous().clone(),
            });
        }

        if self.matches(TokenType::IDENTIFIER) {
            return Ok(Expr::Variable {
                id: ExprId::fresh(),
                name: self.previous().clone(),
            });
        }

        if self.matches(TokenType::LEFT_PAREN) {
            let expr: Expr = self.expression()?;

            self.consume(TokenType::RIGHT_PAREN, "Expect ')' after expression.")?;

            return Ok(Expr::Grouping(Box::new(expr)));
        }

        if self.matches(TokenType::LEFT_BRACKET) {
            let bracket: Token = self.previous().clone();
            let (elements, _) =
                self.arguments(TokenType::RIGHT_BRACKET, "Expect ']' after array elements.")?;

            return Ok(Expr::Array { bracket, elements });
        }

        if self.matches(TokenType::FUN) {
            let keyword: Token = self.previous().clone();

            self.consume(TokenType::LEFT_PAREN, "Expect '(' after 'fun'.")?;

            return Ok(Expr::Lambda(self.function_tail(None, keyword, "function")?));
        }

        Err(LoxError::parse(self.peek(), "Expect expression."))
    }

    // ────────────────────── utility helpers ───────────────────────

    #[inline(always)]
    fn matches(&mut self, ttype: TokenType) -> bool {
        if self.check(ttype) {
            self.advance();

            return true;
        }

        false
    }

    #[inline(always)]
    fn consume(&mut self, ttype: TokenType, message: &str) -> Result<&'a Token> {
        if self.check(ttype) {
            return Ok(self.advance());
        }

        Err(LoxError::parse(self.peek(), message))
    }

    #[inline(always)]
    fn check(&self, ttype: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }

        self.peek().token_type == ttype
    }

    /// One token beyond [`Self::check`].
    #[inline(always)]
    fn check_next(&self, ttype: TokenType) -> bool {
        self.tokens
            .get(self.current + 1)
            .is_some_and(|token| token.token_type == ttype)
    }

    #[inline(always)]
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }

        self.previous()
    }

    #[inline(always)]
    fn is_at_end(&self) -> bool {
        matches!(self.peek().token_type, TokenType::EOF)
    }

    #[inline(always)]
    fn peek(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;

        // A stream missing its EOF sentinel is treated as ending at the last token.
        &tokens[self.current.min(tokens.len().saturating_sub(1))]
    }

    #[inline(always)]
    fn previous(&self) -> &'a Token {
        let tokens: &'a [Token] = self.tokens;

        &tokens[self.current.saturating_sub(1)]
    }

    /// Discards tokens until it thinks it is at a statement boundary.
    fn synchronize(&mut self) {
        self.advance(); // skip the token that caused the error

        while !self.is_at_end() {
            if matches!(self.previous().token_type, TokenType::SEMICOLON) {
                return;
            }

            match self.peek().token_type {
                TokenType::CLASS
                | TokenType::FUN
                | TokenType::VAR
                | TokenType::FOR
                | TokenType::IF
                | TokenType::WHILE
                | TokenType::PRINT
                | TokenType::RETURN
                | TokenType::BREAK
                | TokenType::CONTINUE => return,
                _ => {}
            }

            self.advance();
        }

        debug!("Synchronised at line {}", self.peek().line);
    }
}

/// One declaration at a time; errors found while parsing the declaration
/// (including ones recovered inside nested blocks) are reported together.
impl<'a> Iterator for Parser<'a> {
    type Item = Result<Stmt>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.tokens.is_empty() || self.is_at_end() {
            return None;
        }

        let stmt = self.recovering_declaration();

        let mut errors = std::mem::take(&mut self.errors);

        Some(match (stmt, errors.len()) {
            (Some(stmt), 0) => Ok(stmt),
            (_, 1) => Err(errors.remove(0)),
            _ => Err(LoxError::Syntax(errors)),
        })
    }
}

/// Lexemes without a fractional part are integers; everything else (and
/// integers too large for `i64`) stays floating point.
fn number_literal(lexeme: &str, value: f64) -> LiteralValue {
    if lexeme.contains('.') {
        return LiteralValue::Float(value);
    }

    lexeme
        .parse::<i64>()
        .map_or(LiteralValue::Float(value), LiteralValue::Int)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast_printer::AstPrinter;
    use crate::scanner::scan_tokens;

    fn parse(source: &str) -> Result<Vec<Stmt>> {
        let tokens = scan_tokens(source.as_bytes())?;
        Parser::new(&tokens).parse()
    }

    fn print_expr(source: &str) -> String {
        let tokens = scan_tokens(source.as_bytes()).unwrap();
        let expr = Parser::new(&tokens).parse_expression().unwrap();
        AstPrinter::print(&expr)
    }

    #[test]
    fn precedence_climbs_from_assignment_to_primary() {
        assert_eq!(print_expr("1 + 2 * 3"), "(+ 1 (* 2 3))");
        assert_eq!(print_expr("a = b = 1"), "(= a (= b 1))");
        assert_eq!(print_expr("a or b and c"), "(or a (and b c))");
        assert_eq!(print_expr("x ? 1 : y ? 2 : 3"), "(? x 1 (? y 2 3))");
        assert_eq!(print_expr("-a++"), "(- (post++ a))");
        assert_eq!(print_expr("++a[0]"), "(++ (index a 0))");
        assert_eq!(print_expr("f(1)(2).g"), "(. (call (call f 1) 2) g)");
    }

    #[test]
    fn number_literals_keep_their_written_shape() {
        assert_eq!(number_literal("4", 4.0), LiteralValue::Int(4));
        assert_eq!(number_literal("4.0", 4.0), LiteralValue::Float(4.0));
    }

    #[test]
    fn var_declares_several_names() {
        let stmts = parse("var a = 1, b, c = a;").unwrap();

        match &stmts[..] {
            [Stmt::Var {
                names,
                initializers,
            }] => {
                let names: Vec<&str> = names.iter().map(|n| n.lexeme.as_str()).collect();
                assert_eq!(names, ["a", "b", "c"]);
                assert!(initializers[0].is_some());
                assert!(initializers[1].is_none());
                assert!(initializers[2].is_some());
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn for_loop_desugars_into_block_and_while() {
        let stmts = parse("for (var i = 0; i < 3; i = i + 1) print i;").unwrap();

        match &stmts[..] {
            [Stmt::Block(inner)] => match &inner[..] {
                [Stmt::Var { .. }, Stmt::While { increment, .. }] => {
                    assert!(increment.is_some())
                }
                other => panic!("unexpected block body: {:?}", other),
            },
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn break_outside_loop_is_rejected() {
        let err = parse("break;").unwrap_err();

        assert!(
            err.to_string().contains("Can't use 'break' outside of a loop."),
            "{}",
            err
        );
    }

    #[test]
    fn break_inside_function_inside_loop_is_rejected() {
        let err = parse("while (true) { fun f() { break; } }").unwrap_err();

        assert!(err.to_string().contains("'break'"), "{}", err);
    }

    #[test]
    fn continue_inside_loop_is_accepted() {
        assert!(parse("while (true) { if (true) { continue; } break; }").is_ok());
    }

    #[test]
    fn reports_every_independent_error() {
        let err = parse("var = 1;\nprint 1;\nprint ;\n").unwrap_err();

        match err {
            LoxError::Syntax(errors) => assert_eq!(errors.len(), 2),
            other => panic!("expected several errors, got {:?}", other),
        }
    }

    #[test]
    fn invalid_assignment_target_reports_equals() {
        let err = parse("1 = 2;").unwrap_err();

        assert_eq!(
            err.to_string(),
            "[line 1] Error at '=': Invalid assignment target."
        );
    }

    #[test]
    fn class_bodies_hold_methods() {
        let stmts = parse("class C { init(n) { this.n = n; } get() { return this.n; } }").unwrap();

        match &stmts[..] {
            [Stmt::Class { name, methods }] => {
                assert_eq!(name.lexeme, "C");
                assert_eq!(methods.len(), 2);
                assert_eq!(methods[0].params.len(), 1);
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn lambda_is_an_expression() {
        let stmts = parse("var f = fun (a, b) { return a + b; };").unwrap();

        match &stmts[..] {
            [Stmt::Var { initializers, .. }] => {
                assert!(matches!(initializers[0], Some(Expr::Lambda(_))))
            }
            other => panic!("unexpected statements: {:?}", other),
        }
    }

    #[test]
    fn parser_iterates_declarations() {
        let tokens = scan_tokens(b"print 1; print 2;").unwrap();
        let parsed: Vec<Result<Stmt>> = Parser::new(&tokens).collect();

        assert_eq!(parsed.len(), 2);
        assert!(parsed.iter().all(|r| r.is_ok()));
    }

    #[test]
    fn expression_from_empty_token_slice_is_an_error() {
        let err = Parser::new(&[]).parse_expression().unwrap_err();

        assert_eq!(err.to_string(), "[line 1] Error at end: Expect expression.");
    }

    #[test]
    fn deeply_nested_unary_parses() {
        let parsed = std::thread::Builder::new()
            .stack_size(8 * 1024 * 1024)
            .spawn(|| {
                let source = format!("{}1;", "!".repeat(20_000));
                parse(&source).map(|stmts| stmts.len())
            })
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(parsed.unwrap(), 1);
    }
}
