use crate::error::{Diagnostic, Phase};
use crate::token::{Token, TokenType};
use phf::phf_map;
use std::iter::Peekable;
use std::str::CharIndices;
use tracing::debug;

// Note: current becomes self.iter.peek()?.0
struct Scanner<'a> {
    source: &'a str,
    iter: Peekable<CharIndices<'a>>,
    start: usize,
    line: i32,
}

pub fn scan_tokens(source: &str) -> (Vec<Token>, Vec<Diagnostic>) {
    let mut scanner = Scanner {
        source,
        iter: source.char_indices().peekable(),
        start: 0,
        line: 1,
    };
    let mut tokens: Vec<Token> = Vec::new();
    let mut errors: Vec<Diagnostic> = Vec::new();

    while let Some((idx, _)) = scanner.iter.peek() {
        scanner.start = *idx;
        match scanner.scan_token() {
            Ok(Some(token)) => tokens.push(token),
            Ok(None) => (),
            Err(e) => errors.push(e),
        }
    }
    tokens.push(Token::new(TokenType::EOF, "", scanner.line));
    debug!(tokens = tokens.len(), errors = errors.len(), "scanned source");
    (tokens, errors)
}

impl<'a> Scanner<'a> {
    fn scan_token(&mut self) -> Result<Option<Token>, Diagnostic> {
        let c = match self.iter.next() {
            Some((_, c)) => c,
            None => return Ok(None),
        };
        match c {
            '(' => Ok(Some(self.token(TokenType::LeftParen))),
            ')' => Ok(Some(self.token(TokenType::RightParen))),
            '{' => Ok(Some(self.token(TokenType::LeftBrace))),
            '}' => Ok(Some(self.token(TokenType::RightBrace))),
            ',' => Ok(Some(self.token(TokenType::Comma))),
            '.' => Ok(Some(self.token(TokenType::Dot))),
            '-' => Ok(Some(self.token(TokenType::Minus))),
            '+' => Ok(Some(self.token(TokenType::Plus))),
            ';' => Ok(Some(self.token(TokenType::Semicolon))),
            '*' => Ok(Some(self.token(TokenType::Star))),
            '!' => Ok(Some(self.either('=', TokenType::BangEqual, TokenType::Bang))),
            '=' => Ok(Some(self.either('=', TokenType::EqualEqual, TokenType::Equal))),
            '<' => Ok(Some(self.either('=', TokenType::LessEqual, TokenType::Less))),
            '>' => Ok(Some(self.either('=', TokenType::GreaterEqual, TokenType::Greater))),
            '/' => {
                if self.next_if('/') {
                    while let Some((_, c)) = self.iter.peek() {
                        if *c == '\n' {
                            break;
                        }
                        self.iter.next();
                    }
                    Ok(None)
                } else {
                    Ok(Some(self.token(TokenType::Slash)))
                }
            }
            ' ' | '\r' | '\t' => Ok(None),
            '\n' => {
                self.line += 1;
                Ok(None)
            }
            '"' => self.string().map(Some),
            '0'..='9' => self.number().map(Some),
            'a'..='z' | 'A'..='Z' | '_' => Ok(Some(self.identifier())),
            _ => Err(self.error("Unexpected character.")),
        }
    }
    fn current(&mut self) -> usize {
        match self.iter.peek() {
            None => self.source.len(),
            Some((idx, _)) => *idx,
        }
    }
    fn token(&mut self, token_type: TokenType) -> Token {
        let current = self.current();
        Token::new(token_type, &self.source[self.start..current], self.line)
    }
    fn either(&mut self, expected: char, matched: TokenType, otherwise: TokenType) -> Token {
        if self.next_if(expected) {
            self.token(matched)
        } else {
            self.token(otherwise)
        }
    }
    fn next_if(&mut self, expected: char) -> bool {
        self.iter.next_if(|(_, c)| *c == expected).is_some()
    }
    fn error(&self, message: &str) -> Diagnostic {
        Diagnostic::at_line(Phase::Lexical, self.line, message)
    }
    fn string(&mut self) -> Result<Token, Diagnostic> {
        loop {
            match self.iter.next() {
                None => return Err(self.error("Unterminated string.")),
                Some((_, '"')) => break,
                Some((_, '\n')) => self.line += 1,
                Some(_) => (),
            }
        }
        let current = self.current();
        let value = self.source[self.start + 1..current - 1].to_string();
        Ok(self.token(TokenType::String(value)))
    }
    fn digits(&mut self) {
        while self.iter.next_if(|(_, c)| c.is_ascii_digit()).is_some() {}
    }
    fn number(&mut self) -> Result<Token, Diagnostic> {
        self.digits();

        // A fraction needs at least one digit after the dot.
        if let Some((_, '.')) = self.iter.peek() {
            let mut lookahead = self.iter.clone();
            lookahead.next();
            if let Some((_, '0'..='9')) = lookahead.peek() {
                self.iter.next();
                self.digits();
            }
        }

        let current = self.current();
        let value = self.source[self.start..current]
            .parse()
            .map_err(|_| self.error("Invalid number literal."))?;
        Ok(self.token(TokenType::Number(value)))
    }
    fn identifier(&mut self) -> Token {
        while self
            .iter
            .next_if(|(_, c)| c.is_ascii_alphanumeric() || *c == '_')
            .is_some()
        {}
        let current = self.current();
        match KEYWORDS.get(&self.source[self.start..current]) {
            None => self.token(TokenType::Identifier(
                self.source[self.start..current].to_string(),
            )),
            Some(x) => self.token(x.clone()),
        }
    }
}

static KEYWORDS: phf::Map<&'static str, TokenType> = phf_map! {
    "and" => TokenType::And,
    "break" => TokenType::Break,
    "class" => TokenType::Class,
    "else" => TokenType::Else,
    "false" => TokenType::False,
    "for" => TokenType::For,
    "fun" => TokenType::Fun,
    "if" => TokenType::If,
    "nil" => TokenType::Nil,
    "or" => TokenType::Or,
    "print" => TokenType::Print,
    "return" => TokenType::Return,
    "super" => TokenType::Super,
    "this" => TokenType::This,
    "true" => TokenType::True,
    "var" => TokenType::Var,
    "while" => TokenType::While,
};

#[cfg(test)]
mod scanner_tests {
    use crate::scanner;
    use crate::token::TokenType;
    use pretty_assertions::assert_eq;

    fn kinds(source: &str) -> Vec<TokenType> {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty(), "{:?}", errors);
        tokens.into_iter().map(|t| t.tokentype).collect()
    }

    #[test]
    fn basic_scanner_test() {
        assert_eq!(
            kinds("x = 2"),
            vec![
                TokenType::Identifier("x".to_string()),
                TokenType::Equal,
                TokenType::Number(2.0),
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn number_parsing() {
        assert_eq!(
            kinds("1+2.5"),
            vec![
                TokenType::Number(1.0),
                TokenType::Plus,
                TokenType::Number(2.5),
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn trailing_dot_is_separate_token() {
        assert_eq!(
            kinds("1."),
            vec![TokenType::Number(1.0), TokenType::Dot, TokenType::EOF]
        );
        assert_eq!(
            kinds("1.foo"),
            vec![
                TokenType::Number(1.0),
                TokenType::Dot,
                TokenType::Identifier("foo".to_string()),
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn maximal_munch_operators() {
        assert_eq!(
            kinds("!= ! == = <= < >= >"),
            vec![
                TokenType::BangEqual,
                TokenType::Bang,
                TokenType::EqualEqual,
                TokenType::Equal,
                TokenType::LessEqual,
                TokenType::Less,
                TokenType::GreaterEqual,
                TokenType::Greater,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(
            kinds("class Class break"),
            vec![
                TokenType::Class,
                TokenType::Identifier("Class".to_string()),
                TokenType::Break,
                TokenType::EOF
            ]
        );
    }

    #[test]
    fn comments_and_lines() {
        let (tokens, errors) = scanner::scan_tokens("// nothing here\nvar\n\n\"a\nb\" x");
        assert!(errors.is_empty());
        assert_eq!(tokens[0].tokentype, TokenType::Var);
        assert_eq!(tokens[0].line, 2);
        assert_eq!(tokens[1].tokentype, TokenType::String("a\nb".to_string()));
        assert_eq!(tokens[1].line, 5);
        assert_eq!(tokens[2].line, 5);
        assert!(tokens[3].is_eof());
    }

    #[test]
    fn errors_do_not_stop_scanning() {
        let (tokens, errors) = scanner::scan_tokens("var @ x;\n# y;");
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].message, "Unexpected character.");
        assert_eq!(errors[0].line, 1);
        assert_eq!(errors[1].line, 2);
        assert_eq!(tokens.len(), 6);
    }

    #[test]
    fn unterminated_string() {
        let (tokens, errors) = scanner::scan_tokens("print \"abc\n\ndef");
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "Unterminated string.");
        assert_eq!(errors[0].line, 3);
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].tokentype, TokenType::Print);
        assert!(tokens[1].is_eof());
    }

    #[test]
    fn lexemes_reproduce_source() {
        let source = "fun add(a, b) { return a + b; } // sum\nprint add(1, 2.5) >= \"x\";";
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty());
        let rebuilt: String = tokens.iter().map(|t| t.lexeme.as_str()).collect();
        let expected: String = "fun add(a, b) { return a + b; }\nprint add(1, 2.5) >= \"x\";"
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        assert_eq!(rebuilt, expected);
    }
}
