use std::fmt;
use strum_macros::Display;

#[rustfmt::skip]
#[derive(Debug, Clone, PartialEq, Display)]
pub enum TokenType {
    // Single-character tokens.
    LeftParen, RightParen, LeftBrace, RightBrace,
    Comma, Dot, Minus, Plus, Semicolon, Slash, Star,

    // One or two character tokens.
    Bang, BangEqual,
    Equal, EqualEqual,
    Greater, GreaterEqual,
    Less, LessEqual,

    // Literals.
    Identifier(String), String(String), Number(f64),

    // Keywords.
    And, Break, Class, Else, False, Fun, For, If, Nil, Or,
    Print, Return, Super, This, True, Var, While,

    EOF
}

impl TokenType {
    /// True when both kinds are the same variant, ignoring any payload.
    pub fn same_kind(&self, other: &TokenType) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

/// A value that can be written directly in source.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Nil,
    Boolean(bool),
    Number(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tokentype: TokenType,
    pub lexeme: String,
    pub line: i32,
}

impl Token {
    pub fn new(tokentype: TokenType, lexeme: &str, line: i32) -> Token {
        Token {
            tokentype,
            lexeme: lexeme.to_string(),
            line,
        }
    }
    pub fn literal(&self) -> Option<Literal> {
        match &self.tokentype {
            TokenType::String(x) => Some(Literal::String(x.clone())),
            TokenType::Number(x) => Some(Literal::Number(*x)),
            _ => None,
        }
    }
    pub fn is_eof(&self) -> bool {
        matches!(self.tokentype, TokenType::EOF)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.literal() {
            Some(Literal::String(x)) => write!(f, "{} {} {}", self.tokentype, self.lexeme, x),
            Some(Literal::Number(x)) => write!(f, "{} {} {}", self.tokentype, self.lexeme, x),
            _ => write!(f, "{} {}", self.tokentype, self.lexeme),
        }
    }
}
