//! Centralised error hierarchy for the interpreter.
//!
//! All subsystems (scanner, parser, resolver, runtime, CLI) convert their
//! internal failure modes into one of the variants defined here. This enables a
//! uniform `Result<T>` alias throughout the crate and ergonomic inter‑operation
//! with `anyhow`, while still preserving rich diagnostic detail.
//!
//! The module **does not** print diagnostics itself.

use std::io;
use thiserror::Error;

use log::info;

use crate::token::Token;

/// Canonical error type used throughout the interpreter.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum LoxError {
    /// Lexical (scanner) error with source line information.
    #[error("[line {line}] Error: {message}")]
    Lex {
        /// Human‑readable description.
        message: String,

        /// 1‑based line where the error occurred.
        line: usize,
    },

    /// Syntactic (parser) error tied to the offending token.
    #[error("[line {line}] Error{location}: {message}")]
    Parse {
        message: String,
        line: usize,
        /// ` at end` or ` at 'lexeme'`.
        location: String,
    },

    /// Every parse error collected from one unit, in source order.
    #[error("{}", join_lines(.0))]
    Syntax(Vec<LoxError>),

    /// Static‑analysis failure reported by the resolver.
    #[error("[line {line}] Error{location}: {message}")]
    Resolve {
        message: String,
        line: usize,
        location: String,
    },

    /// Runtime evaluation error. `trace` lists the active calls, innermost
    /// first, when the error was raised inside a function.
    #[error("[line {line}] Runtime error: {message}{}", render_trace(.trace))]
    Runtime {
        message: String,
        line: usize,
        trace: Vec<String>,
    },

    /// A value could not be coerced to the type an operator or builtin needs.
    #[error("Convert error: can't convert {value} to {target}.")]
    Convert {
        /// Rendering of the offending value, with its runtime type.
        value: String,
        /// Name of the requested type.
        target: String,
    },

    /// Wrapper around `std::io::Error` (transparent).  Enables `?` on I/O ops.
    #[error(transparent)]
    Io(#[from] io::Error),

    /// UTF‑8 decoding failure when ingesting external text.
    #[error(transparent)]
    Utf8(#[from] std::string::FromUtf8Error),
}

fn join_lines(errors: &[LoxError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_trace(trace: &[String]) -> String {
    if trace.is_empty() {
        String::new()
    } else {
        format!("\n  in {}", trace.join(" -> "))
    }
}

impl LoxError {
    /// Helper constructor for the **scanner**.
    pub fn lex<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Lex error: line={}, msg={}", line, message);

        LoxError::Lex { message, line }
    }

    /// Helper constructor for the **parser**.
    pub fn parse<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Parse error: line={}, msg={}", token.line, message);

        LoxError::Parse {
            message,
            line: token.line,
            location: token.location(),
        }
    }

    /// Helper constructor for the **resolver**.
    pub fn resolve<S: Into<String>>(token: &Token, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Resolve error: line={}, msg={}", token.line, message);

        LoxError::Resolve {
            message,
            line: token.line,
            location: token.location(),
        }
    }

    /// Helper constructor for the **interpreter**. The call trace is attached
    /// later by the interpreter, once the error reaches a call boundary.
    pub fn runtime<S: Into<String>>(line: usize, msg: S) -> Self {
        let message: String = msg.into();

        info!("Creating Runtime error: line={}, msg={}", line, message);

        LoxError::Runtime {
            message,
            line,
            trace: Vec::new(),
        }
    }

    /// Helper constructor for failed coercions.
    pub fn convert<V: Into<String>, T: Into<String>>(value: V, target: T) -> Self {
        let value: String = value.into();
        let target: String = target.into();

        info!("Creating Convert error: value={}, target={}", value, target);

        LoxError::Convert { value, target }
    }

    /// `true` for errors raised before execution starts (lex, parse, resolve).
    pub fn is_static(&self) -> bool {
        matches!(
            self,
            LoxError::Lex { .. }
                | LoxError::Parse { .. }
                | LoxError::Syntax(_)
                | LoxError::Resolve { .. }
        )
    }

    /// Process exit code conventionally used for this error kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Runtime { .. } | LoxError::Convert { .. } => 70,
            LoxError::Io(_) | LoxError::Utf8(_) => 74,
            _ => 65,
        }
    }
}

/// Crate‑wide `Result` alias.
pub type Result<T> = std::result::Result<T, LoxError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    #[test]
    fn parse_error_names_the_offending_token() {
        let token = Token::new(TokenType::IDENTIFIER, "foo", 3);
        let err = LoxError::parse(&token, "Expect ';' after value.");

        assert_eq!(
            err.to_string(),
            "[line 3] Error at 'foo': Expect ';' after value."
        );
    }

    #[test]
    fn parse_error_at_eof_says_at_end() {
        let token = Token::new(TokenType::EOF, "", 7);
        let err = LoxError::parse(&token, "Expect expression.");

        assert_eq!(err.to_string(), "[line 7] Error at end: Expect expression.");
    }

    #[test]
    fn runtime_error_renders_trace() {
        let err = LoxError::Runtime {
            message: "Undefined variable 'x'.".into(),
            line: 2,
            trace: vec!["inner".into(), "outer".into()],
        };

        assert_eq!(
            err.to_string(),
            "[line 2] Runtime error: Undefined variable 'x'.\n  in inner -> outer"
        );
        assert_eq!(err.exit_code(), 70);
        assert!(!err.is_static());
    }

    #[test]
    fn syntax_error_joins_every_message() {
        let a = Token::new(TokenType::SEMICOLON, ";", 1);
        let b = Token::new(TokenType::EOF, "", 2);
        let err = LoxError::Syntax(vec![
            LoxError::parse(&a, "Expect expression."),
            LoxError::parse(&b, "Expect ';' after value."),
        ]);

        assert_eq!(
            err.to_string(),
            "[line 1] Error at ';': Expect expression.\n[line 2] Error at end: Expect ';' after value."
        );
        assert_eq!(err.exit_code(), 65);
    }
}
