use crate::token::Token;
use strum_macros::Display;
use thiserror::Error;

/// The static phase a diagnostic was reported from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Phase {
    Lexical,
    Syntax,
    Resolution,
}

/// A problem found before execution. The driver decides how to print these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[line {line}] Error{location}: {message}")]
pub struct Diagnostic {
    pub phase: Phase,
    pub line: i32,
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn at_line(phase: Phase, line: i32, message: &str) -> Diagnostic {
        Diagnostic {
            phase,
            line,
            location: String::new(),
            message: message.to_string(),
        }
    }
    pub fn at_token(phase: Phase, token: &Token, message: &str) -> Diagnostic {
        let location = if token.is_eof() {
            " at end".to_string()
        } else {
            format!(" at '{}'", token.lexeme)
        };
        Diagnostic {
            phase,
            line: token.line,
            location,
            message: message.to_string(),
        }
    }
}
