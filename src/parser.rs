use crate::ast::{ExprId, Expression, FunctionDecl, Statement};
use crate::error::{Diagnostic, Phase};
use crate::token::{Literal, Token, TokenType};
use std::mem;
use std::rc::Rc;
use tracing::debug;

/// Upper bound on parameters and call arguments.
pub const MAX_ARITY: usize = 255;

type ParseResult<T> = Result<T, Diagnostic>;

static EOF: Token = Token {
    tokentype: TokenType::EOF,
    lexeme: String::new(),
    line: 0,
};

pub struct Parser<'a> {
    tokens: &'a [Token],
    current: usize,
    next_id: usize,
    errors: Vec<Diagnostic>,
}

pub fn parse(tokens: &[Token]) -> (Vec<Statement>, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let statements = parser.parse();
    (statements, parser.take_errors())
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token]) -> Parser<'a> {
        Parser::with_id_base(tokens, 0)
    }
    /// Starts numbering expression ids at `base`, so several parses fed to
    /// one interpreter never hand out the same id twice.
    pub fn with_id_base(tokens: &'a [Token], base: usize) -> Parser<'a> {
        Parser {
            tokens,
            current: 0,
            next_id: base,
            errors: Vec::new(),
        }
    }
    pub fn next_id(&self) -> usize {
        self.next_id
    }
    pub fn take_errors(&mut self) -> Vec<Diagnostic> {
        mem::take(&mut self.errors)
    }
    pub fn parse(&mut self) -> Vec<Statement> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        debug!(
            statements = statements.len(),
            errors = self.errors.len(),
            "parsed tokens"
        );
        statements
    }
    fn declaration(&mut self) -> Option<Statement> {
        let result = match self.peek().tokentype {
            TokenType::Class => {
                self.advance();
                self.class_declaration()
            }
            TokenType::Fun if self.next_is_identifier() => {
                self.advance();
                self.function("function").map(Statement::Function)
            }
            TokenType::Var => {
                self.advance();
                self.var_declaration()
            }
            _ => self.statement(),
        };
        match result {
            Ok(statement) => Some(statement),
            Err(e) => {
                self.errors.push(e);
                self.synchronize();
                None
            }
        }
    }
    fn class_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume_identifier("Expect class name.")?;
        let superclass = if self.matches(&TokenType::Less) {
            let name = self.consume_identifier("Expect superclass name.")?;
            Some(Expression::Variable {
                id: self.new_id(),
                name,
            })
        } else {
            None
        };
        self.consume(&TokenType::LeftBrace, "Expect '{' before class body.")?;
        let mut methods: Vec<Rc<FunctionDecl>> = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            methods.push(self.function("method")?);
        }
        self.consume(&TokenType::RightBrace, "Expect '}' after class body.")?;
        Ok(Statement::Class {
            name,
            superclass,
            methods,
        })
    }
    fn function(&mut self, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        let name = self.consume_identifier(&format!("Expect {} name.", kind))?;
        self.consume(
            &TokenType::LeftParen,
            &format!("Expect '(' after {} name.", kind),
        )?;
        self.function_body(name, kind)
    }
    fn function_body(&mut self, name: Token, kind: &str) -> ParseResult<Rc<FunctionDecl>> {
        let params = self.parameters()?;
        self.consume(
            &TokenType::LeftBrace,
            &format!("Expect '{{' before {} body.", kind),
        )?;
        let body = self.block()?;
        Ok(Rc::new(FunctionDecl { name, params, body }))
    }
    fn parameters(&mut self) -> ParseResult<Vec<Token>> {
        let mut params: Vec<Token> = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if params.len() >= MAX_ARITY {
                    let e = self.error("Cannot have more than 255 parameters.");
                    self.errors.push(e);
                }
                params.push(self.consume_identifier("Expect parameter name.")?);
                if !self.matches(&TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(&TokenType::RightParen, "Expect ')' after parameters.")?;
        Ok(params)
    }
    fn var_declaration(&mut self) -> ParseResult<Statement> {
        let name = self.consume_identifier("Expect variable name.")?;
        let initializer = if self.matches(&TokenType::Equal) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(
            &TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        )?;
        Ok(Statement::Var { name, initializer })
    }
    fn statement(&mut self) -> ParseResult<Statement> {
        match self.peek().tokentype {
            TokenType::Break => {
                let keyword = self.advance().clone();
                self.consume(&TokenType::Semicolon, "Expect ';' after 'break'.")?;
                Ok(Statement::Break(keyword))
            }
            TokenType::For => {
                self.advance();
                self.for_statement()
            }
            TokenType::If => {
                self.advance();
                self.if_statement()
            }
            TokenType::Print => {
                let keyword = self.advance().clone();
                self.print_statement(keyword)
            }
            TokenType::Return => {
                self.advance();
                self.return_statement()
            }
            TokenType::While => {
                self.advance();
                self.while_statement()
            }
            TokenType::LeftBrace => {
                self.advance();
                Ok(Statement::Block(self.block()?))
            }
            _ => self.expression_statement(),
        }
    }
    fn for_statement(&mut self) -> ParseResult<Statement> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'for'.")?;
        let initializer: Option<Statement> = match self.peek().tokentype {
            TokenType::Semicolon => {
                self.advance();
                None
            }
            TokenType::Var => {
                self.advance();
                Some(self.var_declaration()?)
            }
            _ => Some(self.expression_statement()?),
        };

        let condition = if self.check(&TokenType::Semicolon) {
            Expression::Literal(Literal::Boolean(true))
        } else {
            self.expression()?
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment: Option<Expression> = if self.check(&TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.statement()?;

        if let Some(x) = increment {
            body = Statement::Block(vec![body, Statement::Expression(x)])
        }
        body = Statement::While {
            condition,
            body: Box::new(body),
        };
        match initializer {
            None => Ok(body),
            Some(x) => Ok(Statement::Block(vec![x, body])),
        }
    }
    fn while_statement(&mut self) -> ParseResult<Statement> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'while'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after condition.")?;
        let body = self.statement()?;
        Ok(Statement::While {
            condition,
            body: Box::new(body),
        })
    }
    fn if_statement(&mut self) -> ParseResult<Statement> {
        self.consume(&TokenType::LeftParen, "Expect '(' after 'if'.")?;
        let condition = self.expression()?;
        self.consume(&TokenType::RightParen, "Expect ')' after if condition.")?;
        let then_branch = Box::new(self.statement()?);
        let else_branch = if self.matches(&TokenType::Else) {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Statement::If {
            condition,
            then_branch,
            else_branch,
        })
    }
    // The opening brace has already been consumed.
    fn block(&mut self) -> ParseResult<Vec<Statement>> {
        let mut statements: Vec<Statement> = Vec::new();
        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            if let Some(statement) = self.declaration() {
                statements.push(statement);
            }
        }
        self.consume(&TokenType::RightBrace, "Expect '}' after block.")?;
        Ok(statements)
    }
    fn print_statement(&mut self, keyword: Token) -> ParseResult<Statement> {
        let value = self.expression()?;
        self.consume(&TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Statement::Print { keyword, value })
    }
    fn return_statement(&mut self) -> ParseResult<Statement> {
        let keyword = self.previous().clone();
        let value = if self.check(&TokenType::Semicolon) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(&TokenType::Semicolon, "Expect ';' after return value.")?;
        Ok(Statement::Return { keyword, value })
    }
    fn expression_statement(&mut self) -> ParseResult<Statement> {
        let expr = self.expression()?;
        self.consume(&TokenType::Semicolon, "Expect ';' after expression.")?;
        Ok(Statement::Expression(expr))
    }
    fn expression(&mut self) -> ParseResult<Expression> {
        self.assignment()
    }
    fn assignment(&mut self) -> ParseResult<Expression> {
        let expr = self.or()?;
        if !self.matches(&TokenType::Equal) {
            return Ok(expr);
        }
        let equals = self.previous();
        let value = Box::new(self.assignment()?);
        match expr {
            Expression::Variable { id, name } => Ok(Expression::Assign { id, name, value }),
            Expression::Get { object, name } => Ok(Expression::Set {
                object,
                name,
                value,
            }),
            _ => {
                // Reported, but the statement still parses.
                self.errors.push(Diagnostic::at_token(
                    Phase::Syntax,
                    equals,
                    "Invalid assignment target.",
                ));
                Ok(expr)
            }
        }
    }
    fn or(&mut self) -> ParseResult<Expression> {
        self.logical(Self::and, &TokenType::Or)
    }
    fn and(&mut self) -> ParseResult<Expression> {
        self.logical(Self::equality, &TokenType::And)
    }
    fn logical(
        &mut self,
        operand: fn(&mut Parser<'a>) -> ParseResult<Expression>,
        kind: &TokenType,
    ) -> ParseResult<Expression> {
        let mut expr = operand(self)?;
        while self.matches(kind) {
            let operator = self.previous().clone();
            let right = operand(self)?;
            expr = Expression::Logical {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn equality(&mut self) -> ParseResult<Expression> {
        self.binary(
            Self::comparison,
            &[TokenType::BangEqual, TokenType::EqualEqual],
        )
    }
    fn comparison(&mut self) -> ParseResult<Expression> {
        self.binary(
            Self::addition,
            &[
                TokenType::Greater,
                TokenType::GreaterEqual,
                TokenType::Less,
                TokenType::LessEqual,
            ],
        )
    }
    fn addition(&mut self) -> ParseResult<Expression> {
        self.binary(Self::multiplication, &[TokenType::Minus, TokenType::Plus])
    }
    fn multiplication(&mut self) -> ParseResult<Expression> {
        self.binary(Self::unary, &[TokenType::Slash, TokenType::Star])
    }
    fn binary(
        &mut self,
        operand: fn(&mut Parser<'a>) -> ParseResult<Expression>,
        kinds: &[TokenType],
    ) -> ParseResult<Expression> {
        let mut expr = operand(self)?;
        while kinds.iter().any(|kind| self.check(kind)) {
            let operator = self.advance().clone();
            let right = operand(self)?;
            expr = Expression::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
            };
        }
        Ok(expr)
    }
    fn unary(&mut self) -> ParseResult<Expression> {
        match self.peek().tokentype {
            TokenType::Bang | TokenType::Minus => {
                let operator = self.advance().clone();
                let right = self.unary()?;
                Ok(Expression::Unary {
                    operator,
                    right: Box::new(right),
                })
            }
            _ => self.call(),
        }
    }
    fn call(&mut self) -> ParseResult<Expression> {
        let mut expr = self.primary()?;
        loop {
            if self.matches(&TokenType::LeftParen) {
                expr = self.finish_call(expr)?;
            } else if self.matches(&TokenType::Dot) {
                let name = self.consume_identifier("Expect property name after '.'.")?;
                expr = Expression::Get {
                    object: Box::new(expr),
                    name,
                };
            } else {
                break;
            }
        }
        Ok(expr)
    }
    fn finish_call(&mut self, callee: Expression) -> ParseResult<Expression> {
        let mut arguments: Vec<Expression> = Vec::new();
        if !self.check(&TokenType::RightParen) {
            loop {
                if arguments.len() >= MAX_ARITY {
                    let e = self.error("Cannot have more than 255 arguments.");
                    self.errors.push(e);
                }
                arguments.push(self.expression()?);
                if !self.matches(&TokenType::Comma) {
                    break;
                }
            }
        }
        let paren = self
            .consume(&TokenType::RightParen, "Expect ')' after arguments.")?
            .clone();
        Ok(Expression::Call {
            callee: Box::new(callee),
            paren,
            arguments,
        })
    }
    fn primary(&mut self) -> ParseResult<Expression> {
        let token = self.peek();
        let literal = match &token.tokentype {
            TokenType::False => Some(Literal::Boolean(false)),
            TokenType::True => Some(Literal::Boolean(true)),
            TokenType::Nil => Some(Literal::Nil),
            TokenType::Number(_) | TokenType::String(_) => token.literal(),
            _ => None,
        };
        if let Some(literal) = literal {
            self.advance();
            return Ok(Expression::Literal(literal));
        }
        match token.tokentype {
            TokenType::Super => {
                self.advance();
                self.consume(&TokenType::Dot, "Expect '.' after 'super'.")?;
                let method = self.consume_identifier("Expect superclass method name.")?;
                Ok(Expression::Super {
                    id: self.new_id(),
                    keyword: token.clone(),
                    method,
                })
            }
            TokenType::This => {
                self.advance();
                Ok(Expression::This {
                    id: self.new_id(),
                    keyword: token.clone(),
                })
            }
            TokenType::Identifier(_) => {
                self.advance();
                Ok(Expression::Variable {
                    id: self.new_id(),
                    name: token.clone(),
                })
            }
            TokenType::LeftParen => {
                self.advance();
                let expr = self.expression()?;
                self.consume(&TokenType::RightParen, "Expect ')' after expression.")?;
                Ok(Expression::Grouping(Box::new(expr)))
            }
            TokenType::Fun => {
                self.advance();
                self.consume(&TokenType::LeftParen, "Expect '(' after 'fun'.")?;
                self.function_body(token.clone(), "function")
                    .map(Expression::Function)
            }
            _ => Err(self.error("Expect expression.")),
        }
    }
    fn synchronize(&mut self) {
        self.advance();
        while !self.is_at_end() {
            if let TokenType::Semicolon = self.previous().tokentype {
                return;
            }
            match self.peek().tokentype {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }
            self.advance();
        }
    }
    fn new_id(&mut self) -> ExprId {
        let id = ExprId(self.next_id);
        self.next_id += 1;
        id
    }
    fn matches(&mut self, kind: &TokenType) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }
    fn check(&self, kind: &TokenType) -> bool {
        !self.is_at_end() && self.peek().tokentype.same_kind(kind)
    }
    fn next_is_identifier(&self) -> bool {
        matches!(
            self.tokens.get(self.current + 1).map(|t| &t.tokentype),
            Some(TokenType::Identifier(_))
        )
    }
    fn consume(&mut self, kind: &TokenType, message: &str) -> ParseResult<&'a Token> {
        if self.check(kind) {
            Ok(self.advance())
        } else {
            Err(self.error(message))
        }
    }
    fn consume_identifier(&mut self, message: &str) -> ParseResult<Token> {
        match self.peek().tokentype {
            TokenType::Identifier(_) => Ok(self.advance().clone()),
            _ => Err(self.error(message)),
        }
    }
    fn advance(&mut self) -> &'a Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }
    fn is_at_end(&self) -> bool {
        self.peek().is_eof()
    }
    fn peek(&self) -> &'a Token {
        self.tokens.get(self.current).unwrap_or(&EOF)
    }
    fn previous(&self) -> &'a Token {
        self.current
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .unwrap_or(&EOF)
    }
    fn error(&self, message: &str) -> Diagnostic {
        Diagnostic::at_token(Phase::Syntax, self.peek(), message)
    }
}

#[cfg(test)]
mod parser_tests {
    use crate::ast::{Expression, Statement};
    use crate::parser;
    use crate::scanner;
    use crate::token::{Literal, TokenType};
    use pretty_assertions::assert_eq;

    fn parse_ok(source: &str) -> Vec<Statement> {
        let (tokens, errors) = scanner::scan_tokens(source);
        assert!(errors.is_empty(), "{:?}", errors);
        let (statements, errors) = parser::parse(&tokens);
        assert!(errors.is_empty(), "{:?}", errors);
        statements
    }

    fn parse_errors(source: &str) -> Vec<String> {
        let (tokens, _) = scanner::scan_tokens(source);
        let (_, errors) = parser::parse(&tokens);
        errors.into_iter().map(|e| e.to_string()).collect()
    }

    // Renders an expression as a fully parenthesized string.
    fn sexpr(expr: &Expression) -> String {
        match expr {
            Expression::Binary {
                left,
                operator,
                right,
            }
            | Expression::Logical {
                left,
                operator,
                right,
            } => format!("({} {} {})", operator.lexeme, sexpr(left), sexpr(right)),
            Expression::Unary { operator, right } => {
                format!("({} {})", operator.lexeme, sexpr(right))
            }
            Expression::Grouping(x) => format!("(group {})", sexpr(x)),
            Expression::Literal(Literal::Number(x)) => x.to_string(),
            Expression::Literal(x) => format!("{:?}", x),
            Expression::Variable { name, .. } => name.lexeme.clone(),
            Expression::Assign { name, value, .. } => {
                format!("(= {} {})", name.lexeme, sexpr(value))
            }
            Expression::Get { object, name } => format!("(. {} {})", sexpr(object), name.lexeme),
            Expression::Set {
                object,
                name,
                value,
            } => format!("(=. {} {} {})", sexpr(object), name.lexeme, sexpr(value)),
            Expression::Call {
                callee, arguments, ..
            } => {
                let args: Vec<String> = arguments.iter().map(sexpr).collect();
                format!("(call {} {})", sexpr(callee), args.join(" "))
            }
            Expression::This { .. } => "this".to_string(),
            Expression::Super { method, .. } => format!("(super {})", method.lexeme),
            Expression::Function(decl) => format!("(fun {})", decl.params.len()),
        }
    }

    fn expression(source: &str) -> String {
        match parse_ok(source).as_slice() {
            [Statement::Expression(expr)] => sexpr(expr),
            other => panic!("expected one expression statement, got {:?}", other),
        }
    }

    #[test]
    fn precedence_and_associativity() {
        assert_eq!(expression("1 + 2 * 3;"), "(+ 1 (* 2 3))");
        assert_eq!(expression("2 - 3 - 1;"), "(- (- 2 3) 1)");
        assert_eq!(expression("-a.b(1)(2);"), "(- (call (call (. a b) 1) 2))");
        assert_eq!(
            expression("a or b and c == !d;"),
            "(or a (and b (== c (! d))))"
        );
        assert_eq!(expression("1 < 2 == (3 >= 4);"), "(== (< 1 2) (group (>= 3 4)))");
    }

    #[test]
    fn assignment_targets() {
        assert_eq!(expression("a = b = 1;"), "(= a (= b 1))");
        assert_eq!(expression("a.b.c = 2;"), "(=. (. a b) c 2)");
        assert_eq!(
            parse_errors("a + b = 1; print 2;"),
            vec!["[line 1] Error at '=': Invalid assignment target."]
        );
    }

    #[test]
    fn for_desugars_to_while() {
        let statements = parse_ok("for (var i = 0; i < 3; i = i + 1) print i;");
        match statements.as_slice() {
            [Statement::Block(inner)] => match inner.as_slice() {
                [Statement::Var { .. }, Statement::While { body, .. }] => match &**body {
                    Statement::Block(parts) => assert_eq!(parts.len(), 2),
                    other => panic!("unexpected body {:?}", other),
                },
                other => panic!("unexpected block {:?}", other),
            },
            other => panic!("unexpected statements {:?}", other),
        }
    }

    #[test]
    fn class_with_superclass() {
        let statements = parse_ok("class B < A { init(x) { this.x = x; } get() { return super.get(); } }");
        match statements.as_slice() {
            [Statement::Class {
                name,
                superclass: Some(Expression::Variable { name: parent, .. }),
                methods,
            }] => {
                assert_eq!(name.lexeme, "B");
                assert_eq!(parent.lexeme, "A");
                let names: Vec<&str> = methods.iter().map(|m| m.name.lexeme.as_str()).collect();
                assert_eq!(names, vec!["init", "get"]);
                assert_eq!(methods[0].params.len(), 1);
            }
            other => panic!("unexpected statements {:?}", other),
        }
    }

    #[test]
    fn anonymous_function_expression() {
        assert_eq!(expression("fun (a, b) { return a; };"), "(fun 2)");
        match parse_ok("fun named() {}").as_slice() {
            [Statement::Function(decl)] => {
                assert_eq!(decl.name.tokentype, TokenType::Identifier("named".to_string()))
            }
            other => panic!("unexpected statements {:?}", other),
        }
    }

    #[test]
    fn reports_every_broken_statement() {
        assert_eq!(
            parse_errors("var = 1;\nprint ;\nx = ;\nprint 1;"),
            vec![
                "[line 1] Error at '=': Expect variable name.",
                "[line 2] Error at ';': Expect expression.",
                "[line 3] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn missing_semicolon_at_end() {
        assert_eq!(
            parse_errors("print 1"),
            vec!["[line 1] Error at end: Expect ';' after value."]
        );
    }

    #[test]
    fn too_many_arguments_is_not_fatal() {
        let args: Vec<String> = (0..256).map(|i| i.to_string()).collect();
        let source = format!("f({});\nprint ;", args.join(", "));
        let errors = parse_errors(&source);
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at '255': Cannot have more than 255 arguments.",
                "[line 2] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn too_many_parameters_is_not_fatal() {
        let params: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
        let source = format!("fun f({}) {{}}\nprint ;", params.join(", "));
        let errors = parse_errors(&source);
        assert_eq!(
            errors,
            vec![
                "[line 1] Error at 'p255': Cannot have more than 255 parameters.",
                "[line 2] Error at ';': Expect expression.",
            ]
        );
    }

    #[test]
    fn ids_are_unique_and_offset() {
        let (tokens, _) = scanner::scan_tokens("a; b; a = c;");
        let mut parser = parser::Parser::with_id_base(&tokens, 10);
        let statements = parser.parse();
        assert_eq!(statements.len(), 3);
        assert_eq!(parser.next_id(), 14);
    }
}
