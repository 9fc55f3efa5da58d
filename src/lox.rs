use crate::ast::Statement;
use crate::error::Diagnostic;
use crate::interpreter::{Interpreter, RuntimeError};
use crate::parser::Parser;
use crate::resolver::{self, Bindings};
use crate::scanner;
use crate::value::Value;
use std::io::Write;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LoxError {
    #[error("{}", render(.0))]
    Static(Vec<Diagnostic>),
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<String>>()
        .join("\n")
}

impl LoxError {
    pub fn exit_code(&self) -> i32 {
        match self {
            LoxError::Static(_) => 65,
            LoxError::Runtime(_) => 70,
        }
    }
}

/// One interpreter session. Globals and closures survive between calls to
/// `run` and `run_line`.
pub struct Lox {
    interpreter: Interpreter,
    next_id: usize,
}

impl Lox {
    pub fn new() -> Lox {
        Lox::with_interpreter(Interpreter::new())
    }
    pub fn with_output(out: Box<dyn Write>) -> Lox {
        Lox::with_interpreter(Interpreter::with_output(out))
    }
    fn with_interpreter(interpreter: Interpreter) -> Lox {
        Lox {
            interpreter,
            next_id: 0,
        }
    }
    pub fn run(&mut self, source: &str) -> Result<(), LoxError> {
        let (statements, bindings) = self.compile(source)?;
        self.interpreter.interpret(&statements, &bindings)?;
        Ok(())
    }
    /// Like `run`, but a line holding a single expression statement yields
    /// its value instead of discarding it.
    pub fn run_line(&mut self, source: &str) -> Result<Option<Value>, LoxError> {
        let (statements, bindings) = self.compile(source)?;
        match statements.as_slice() {
            [Statement::Expression(expr)] => Ok(Some(
                self.interpreter.evaluate_expression(expr, &bindings)?,
            )),
            _ => {
                self.interpreter.interpret(&statements, &bindings)?;
                Ok(None)
            }
        }
    }
    fn compile(&mut self, source: &str) -> Result<(Vec<Statement>, Bindings), LoxError> {
        let (tokens, mut errors) = scanner::scan_tokens(source);
        let mut parser = Parser::with_id_base(&tokens, self.next_id);
        let statements = parser.parse();
        errors.extend(parser.take_errors());
        self.next_id = parser.next_id();
        if !errors.is_empty() {
            debug!(errors = errors.len(), "skipping resolution");
            return Err(LoxError::Static(errors));
        }
        let (bindings, errors) = resolver::resolve(&statements);
        if !errors.is_empty() {
            return Err(LoxError::Static(errors));
        }
        Ok((statements, bindings))
    }
}

impl Default for Lox {
    fn default() -> Self {
        Lox::new()
    }
}

#[cfg(test)]
mod lox_tests {
    use crate::lox::{Lox, LoxError};
    use crate::test_output::Output;
    use crate::value::Value;
    use pretty_assertions::assert_eq;

    #[test]
    fn static_errors_block_execution() {
        let output = Output::default();
        let mut lox = Lox::with_output(Box::new(output.clone()));
        let err = lox.run("print 1;\nprint ;\nvar = 2;").unwrap_err();
        assert_eq!(err.exit_code(), 65);
        match err {
            LoxError::Static(errors) => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {:?}", other),
        }
        assert!(output.is_empty());
    }

    #[test]
    fn resolution_errors_are_static() {
        let mut lox = Lox::with_output(Box::new(Output::default()));
        let err = lox.run("return 1;").unwrap_err();
        assert_eq!(
            err.to_string(),
            "[line 1] Error at 'return': Cannot return from top-level code."
        );
        assert_eq!(err.exit_code(), 65);
    }

    #[test]
    fn runtime_error_exit_code() {
        let mut lox = Lox::with_output(Box::new(Output::default()));
        let err = lox.run("nil();").unwrap_err();
        assert_eq!(err.exit_code(), 70);
        assert_eq!(
            err.to_string(),
            "Can only call functions and classes.\n[line 1]"
        );
    }

    #[test]
    fn repl_lines_share_state() {
        let output = Output::default();
        let mut lox = Lox::with_output(Box::new(output.clone()));
        assert_eq!(lox.run_line("var a = 1;").unwrap(), None);
        assert_eq!(
            lox.run_line("fun add(b) { var c = a; return c + b; }").unwrap(),
            None
        );
        assert_eq!(lox.run_line("add(2)").unwrap_err().exit_code(), 65);
        assert_eq!(lox.run_line("add(2);").unwrap(), Some(Value::Number(3.0)));
        assert_eq!(lox.run_line("a = 10;").unwrap(), Some(Value::Number(10.0)));
        lox.run_line("print add(1);").unwrap();
        assert_eq!(output.text(), "11\n");
    }

    #[test]
    fn closures_survive_across_lines() {
        let mut lox = Lox::with_output(Box::new(Output::default()));
        lox.run_line("fun make() { var n = 0; fun inc() { n = n + 1; return n; } return inc; }")
            .unwrap();
        lox.run_line("var f = make();").unwrap();
        lox.run_line("{ var x = 1; var y = x; }").unwrap();
        assert_eq!(lox.run_line("f();").unwrap(), Some(Value::Number(1.0)));
        assert_eq!(lox.run_line("f();").unwrap(), Some(Value::Number(2.0)));
    }
}
