pub mod ast;
pub mod ast_printer;
pub mod builtins;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod interpreter;
pub mod parser;
pub mod print_handler;
pub mod resolver;
pub mod scanner;
pub mod stack;
pub mod token;
pub mod value;

use log::info;

use crate::error::Result;
use crate::interpreter::Interpreter;
use crate::parser::Parser;
use crate::resolver::Resolver;
use crate::value::Value;

/// Scans, parses, resolves and runs one unit of source (a file or a REPL
/// line) against `interpreter`, returning one optional value per top-level
/// statement.
pub fn run_source(source: &str, interpreter: &mut Interpreter) -> Result<Vec<Option<Value>>> {
    let tokens = scanner::scan_tokens(source.as_bytes())?;
    let statements = Parser::new(&tokens).parse()?;
    info!("Parsed {} statements", statements.len());

    Resolver::new(interpreter).resolve(&statements)?;
    interpreter.interpret(&statements)
}
