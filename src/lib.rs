pub mod ast;
pub mod callable;
pub mod class;
pub mod environment;
pub mod error;
pub mod instance;
pub mod interpreter;
pub mod lox;
pub mod parser;
pub mod resolver;
pub mod scanner;
pub mod token;
pub mod value;

#[cfg(test)]
mod test_output;

pub use crate::error::{Diagnostic, Phase};
pub use crate::interpreter::{Interpreter, RuntimeError};
pub use crate::lox::{Lox, LoxError};
pub use crate::resolver::Bindings;
pub use crate::value::Value;

use crate::ast::Statement;
use crate::token::Token;

pub fn scan(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    scanner::scan_tokens(source)
}

pub fn parse(tokens: &[Token]) -> (Vec<Statement>, Vec<Diagnostic>) {
    parser::parse(tokens)
}

pub fn resolve(statements: &[Statement]) -> (Bindings, Vec<Diagnostic>) {
    resolver::resolve(statements)
}

/// Runs a resolved program against a fresh interpreter writing to stdout.
pub fn interpret(statements: &[Statement], bindings: &Bindings) -> Result<(), RuntimeError> {
    Interpreter::new().interpret(statements, bindings)
}
