//! Destination of `print` statements.
//!
//! The CLI writes to stdout; tests and embedders capture output into a
//! shared buffer they can read back after a run.

use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;

use crate::error::Result;

#[derive(Debug, Clone)]
pub enum PrintHandler {
    /// Writes each line to stdout.
    Stdout,
    /// Appends each line to a buffer shared by every clone of the handler.
    Buffer(Rc<RefCell<String>>),
}

impl PrintHandler {
    pub fn buffer() -> Self {
        PrintHandler::Buffer(Rc::new(RefCell::new(String::new())))
    }

    /// Print a line (with newline).
    pub fn println(&self, msg: &str) -> Result<()> {
        match self {
            PrintHandler::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{}", msg)?;
            }
            PrintHandler::Buffer(buf) => {
                let mut buf = buf.borrow_mut();
                buf.push_str(msg);
                buf.push('\n');
            }
        }
        Ok(())
    }

    /// Everything captured so far; empty for stdout.
    pub fn output(&self) -> String {
        match self {
            PrintHandler::Stdout => String::new(),
            PrintHandler::Buffer(buf) => buf.borrow().clone(),
        }
    }
}

impl Default for PrintHandler {
    fn default() -> Self {
        PrintHandler::Stdout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_one_buffer() {
        let handler = PrintHandler::buffer();
        let clone = handler.clone();

        clone.println("a").unwrap();
        handler.println("b").unwrap();

        assert_eq!(handler.output(), "a\nb\n");
    }
}
