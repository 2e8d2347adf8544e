use crate::ast::{BinaryOp, Expr, Parameter, Program, Stmt, TypeName, UnaryOp};
use crate::error::{LangError, Span};
use crate::lexer::{Token, TokenType};

pub struct Parser {
    tokens: Vec<Token>,
    current: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, current: 0 }
    }

    /// Parse the whole token stream. On a malformed statement the parser
    /// synchronizes to the next statement boundary and keeps going, so
    /// cascades are bounded to one error per statement; the first error
    /// recorded is the one returned.
    pub fn parse(&mut self) -> Result<Program, LangError> {
        let mut statements = Vec::new();
        let mut first_error: Option<LangError> = None;

        while !self.is_at_end() {
            match self.declaration() {
                Ok(stmt) => statements.push(stmt),
                Err(error) => {
                    first_error.get_or_insert(error);
                    self.synchronize();
                }
            }
        }

        match first_error {
            Some(error) => Err(error),
            None => Ok(Program { statements }),
        }
    }

    fn declaration(&mut self) -> Result<Stmt, LangError> {
        if self.match_types(&[TokenType::Fn]) {
            return self.function_declaration();
        }
        if self.peek().token_type.is_type_keyword() {
            return self.variable_declaration();
        }
        self.statement()
    }

    /// `fn <return-type> <name> '(' [<type> <name> {',' <type> <name>}] ')' '{' body '}'`
    fn function_declaration(&mut self) -> Result<Stmt, LangError> {
        let start = self.previous().span.start;
        let return_type = self.type_name("Expected return type after 'fn'")?;
        let name = self
            .consume(TokenType::Identifier, "Expected function name")?
            .lexeme
            .clone();

        self.consume(TokenType::LeftParen, "Expected '(' after function name")?;
        let mut parameters = Vec::new();

        if !self.check(&TokenType::RightParen) {
            loop {
                let type_name = self.type_name("Expected parameter type")?;
                let param_name = self
                    .consume(TokenType::Identifier, "Expected parameter name")?
                    .lexeme
                    .clone();
                parameters.push(Parameter {
                    type_name,
                    name: param_name,
                });
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expected ')' after parameters")?;
        self.consume_with_help(
            TokenType::LeftBrace,
            "Expected '{' before function body",
            "Function bodies are brace-delimited: fn int32 add(int32 a, int32 b) { ... }"
                .to_string(),
        )?;
        let body = self.block()?;

        Ok(Stmt::FunctionDeclaration {
            return_type,
            name,
            parameters,
            body,
            span: Span::new(start, self.previous().span.end),
        })
    }

    /// `<type> <name> ['=' <expr>] ';'`
    fn variable_declaration(&mut self) -> Result<Stmt, LangError> {
        let start = self.peek().span.start;
        let type_name = self.type_name("Expected type name")?;
        let name = self
            .consume(TokenType::Identifier, "Expected variable name")?
            .lexeme
            .clone();

        let initializer = if self.match_types(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };

        self.consume(
            TokenType::Semicolon,
            "Expected ';' after variable declaration",
        )?;

        Ok(Stmt::VariableDeclaration {
            type_name,
            name,
            initializer,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn type_name(&mut self, message: &str) -> Result<TypeName, LangError> {
        if !self.peek().token_type.is_type_keyword() {
            return Err(LangError::parse_error(
                self.peek().span.clone(),
                message.to_string(),
            ));
        }

        let token_type = self.advance().token_type.clone();
        Ok(match token_type {
            TokenType::Int32 => TypeName::Int32,
            TokenType::Int64 => TypeName::Int64,
            TokenType::Int128 => TypeName::Int128,
            TokenType::Long => TypeName::Long,
            TokenType::Double => TypeName::Double,
            TokenType::Float => TypeName::Float,
            TokenType::StringType => TypeName::String,
            TokenType::BoolType => TypeName::Bool,
            TokenType::Void => TypeName::Void,
            _ => unreachable!(),
        })
    }

    fn statement(&mut self) -> Result<Stmt, LangError> {
        if self.match_types(&[TokenType::If]) {
            self.if_statement()
        } else if self.match_types(&[TokenType::While]) {
            self.while_statement()
        } else if self.match_types(&[TokenType::For]) {
            self.for_statement()
        } else if self.match_types(&[TokenType::Return]) {
            self.return_statement()
        } else if self.match_types(&[TokenType::LeftBrace]) {
            let start = self.previous().span.start;
            let statements = self.block()?;
            Ok(Stmt::Block {
                statements,
                span: Span::new(start, self.previous().span.end),
            })
        } else {
            self.expression_statement()
        }
    }

    fn if_statement(&mut self) -> Result<Stmt, LangError> {
        let start = self.previous().span.start;

        self.consume(TokenType::LeftParen, "Expected '(' after 'if'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expected ')' after condition")?;

        self.consume(TokenType::LeftBrace, "Expected '{' before if body")?;
        let then_branch = self.block()?;

        if self.check(&TokenType::ElseIf) {
            return Err(LangError::parse_error(
                self.peek().span.clone(),
                "'elseif' is reserved but not supported".to_string(),
            )
            .with_help("Chain conditions with 'else { if (...) { ... } }'.".to_string()));
        }

        let else_branch = if self.match_types(&[TokenType::Else]) {
            self.consume(TokenType::LeftBrace, "Expected '{' before else body")?;
            Some(self.block()?)
        } else {
            None
        };

        Ok(Stmt::If {
            condition,
            then_branch,
            else_branch,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn while_statement(&mut self) -> Result<Stmt, LangError> {
        let start = self.previous().span.start;

        self.consume(TokenType::LeftParen, "Expected '(' after 'while'")?;
        let condition = self.expression()?;
        self.consume(TokenType::RightParen, "Expected ')' after condition")?;

        self.consume(TokenType::LeftBrace, "Expected '{' before while body")?;
        let body = self.block()?;

        Ok(Stmt::While {
            condition,
            body,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn for_statement(&mut self) -> Result<Stmt, LangError> {
        let start = self.previous().span.start;

        self.consume(TokenType::LeftParen, "Expected '(' after 'for'")?;

        let initializer = if self.check(&TokenType::Semicolon) {
            self.advance();
            None
        } else if self.peek().token_type.is_type_keyword() {
            Some(Box::new(self.variable_declaration()?))
        } else {
            Some(Box::new(self.expression_statement()?))
        };

        let condition = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expected ';' after loop condition")?;

        let increment = if !self.check(&TokenType::RightParen) {
            Some(Box::new(self.for_increment()?))
        } else {
            None
        };
        self.consume(TokenType::RightParen, "Expected ')' after for clauses")?;

        self.consume(TokenType::LeftBrace, "Expected '{' before for body")?;
        let body = self.block()?;

        Ok(Stmt::For {
            initializer,
            condition,
            increment,
            body,
            span: Span::new(start, self.previous().span.end),
        })
    }

    /// The third for-clause: an assignment or a bare expression, without
    /// the trailing semicolon a full statement would carry.
    fn for_increment(&mut self) -> Result<Stmt, LangError> {
        let start = self.peek().span.start;
        let expr = self.expression()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals_span = self.previous().span.clone();
            if let Expr::Identifier { name, .. } = expr {
                let value = self.expression()?;
                return Ok(Stmt::Assignment {
                    name,
                    value,
                    span: Span::new(start, self.previous().span.end),
                });
            }
            return Err(LangError::parse_error(
                equals_span,
                "Invalid assignment target".to_string(),
            )
            .with_help("Only a variable can be assigned to: i = i + 1".to_string()));
        }

        Ok(Stmt::Expression {
            expr,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn return_statement(&mut self) -> Result<Stmt, LangError> {
        let start = self.previous().span.start;

        let value = if !self.check(&TokenType::Semicolon) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expected ';' after return value")?;

        Ok(Stmt::Return {
            value,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn block(&mut self) -> Result<Vec<Stmt>, LangError> {
        let mut statements = Vec::new();

        while !self.check(&TokenType::RightBrace) && !self.is_at_end() {
            statements.push(self.declaration()?);
        }

        self.consume_with_help(
            TokenType::RightBrace,
            "Expected '}' after block",
            "Every opening '{' must have a matching closing '}'.".to_string(),
        )?;
        Ok(statements)
    }

    /// An expression statement, reinterpreted as an assignment when an
    /// identifier expression is followed by '='. Any other left-hand side
    /// before '=' is rejected.
    fn expression_statement(&mut self) -> Result<Stmt, LangError> {
        let start = self.peek().span.start;
        let expr = self.expression()?;

        if self.match_types(&[TokenType::Equal]) {
            let equals_span = self.previous().span.clone();
            if let Expr::Identifier { name, .. } = expr {
                let value = self.expression()?;
                self.consume(TokenType::Semicolon, "Expected ';' after assignment")?;
                return Ok(Stmt::Assignment {
                    name,
                    value,
                    span: Span::new(start, self.previous().span.end),
                });
            }
            return Err(LangError::parse_error(
                equals_span,
                "Invalid assignment target".to_string(),
            )
            .with_help("Only a variable can be assigned to. Example: x = 10;".to_string()));
        }

        self.consume(TokenType::Semicolon, "Expected ';' after expression")?;

        Ok(Stmt::Expression {
            expr,
            span: Span::new(start, self.previous().span.end),
        })
    }

    fn expression(&mut self) -> Result<Expr, LangError> {
        self.logical_or()
    }

    fn logical_or(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.logical_and()?;

        while self.match_types(&[TokenType::Or]) {
            let right = self.logical_and()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator: BinaryOp::Or,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn logical_and(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.equality()?;

        while self.match_types(&[TokenType::And]) {
            let right = self.equality()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator: BinaryOp::And,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn equality(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.comparison()?;

        while self.match_types(&[TokenType::EqualEqual, TokenType::BangEqual]) {
            let operator = match self.previous().token_type {
                TokenType::EqualEqual => BinaryOp::Equal,
                TokenType::BangEqual => BinaryOp::NotEqual,
                _ => unreachable!(),
            };
            let right = self.comparison()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn comparison(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.term()?;

        while self.match_types(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = match self.previous().token_type {
                TokenType::Greater => BinaryOp::Greater,
                TokenType::GreaterEqual => BinaryOp::GreaterEqual,
                TokenType::Less => BinaryOp::Less,
                TokenType::LessEqual => BinaryOp::LessEqual,
                _ => unreachable!(),
            };
            let right = self.term()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn term(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.factor()?;

        while self.match_types(&[TokenType::Plus, TokenType::Minus]) {
            let operator = match self.previous().token_type {
                TokenType::Plus => BinaryOp::Add,
                TokenType::Minus => BinaryOp::Subtract,
                _ => unreachable!(),
            };
            let right = self.factor()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn factor(&mut self) -> Result<Expr, LangError> {
        let mut expr = self.unary()?;

        while self.match_types(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let operator = match self.previous().token_type {
                TokenType::Star => BinaryOp::Multiply,
                TokenType::Slash => BinaryOp::Divide,
                TokenType::Percent => BinaryOp::Modulo,
                _ => unreachable!(),
            };
            let right = self.unary()?;
            let span = expr.span().to(right.span());
            expr = Expr::Binary {
                left: Box::new(expr),
                operator,
                right: Box::new(right),
                span,
            };
        }

        Ok(expr)
    }

    fn unary(&mut self) -> Result<Expr, LangError> {
        if self.match_types(&[TokenType::Bang, TokenType::Minus]) {
            let operator = match self.previous().token_type {
                TokenType::Bang => UnaryOp::Not,
                TokenType::Minus => UnaryOp::Negate,
                _ => unreachable!(),
            };
            let start = self.previous().span.start;
            let operand = self.unary()?;
            let span = Span::new(start, operand.span().end);
            return Ok(Expr::Unary {
                operator,
                operand: Box::new(operand),
                span,
            });
        }

        self.call()
    }

    /// A call is recognized only as `identifier '(' args ')'` — a single
    /// postfix on an identifier primary, not a general call chain.
    fn call(&mut self) -> Result<Expr, LangError> {
        let expr = self.primary()?;

        if let Expr::Identifier { ref name, ref span } = expr {
            if self.check(&TokenType::LeftParen) {
                let name = name.clone();
                let start = span.start;
                self.advance();
                return self.finish_call(name, start);
            }
        }

        Ok(expr)
    }

    fn finish_call(&mut self, name: String, start: usize) -> Result<Expr, LangError> {
        let mut arguments = Vec::new();

        if !self.check(&TokenType::RightParen) {
            loop {
                arguments.push(self.expression()?);
                if !self.match_types(&[TokenType::Comma]) {
                    break;
                }
            }
        }

        let paren = self.consume_with_help(
            TokenType::RightParen,
            "Expected ')' after arguments",
            "Function calls are closed with ')'. Example: add(2, 3)".to_string(),
        )?;

        let span = Span::new(start, paren.span.end);
        Ok(Expr::Call {
            name,
            arguments,
            span,
        })
    }

    fn primary(&mut self) -> Result<Expr, LangError> {
        if self.is_at_end() {
            return Err(LangError::parse_error(
                self.error_span(),
                "Expected expression, found end of input".to_string(),
            )
            .with_help(
                "Check for unmatched parentheses or an incomplete statement.".to_string(),
            ));
        }

        let token = self.advance().clone();

        match token.token_type {
            TokenType::True => Ok(Expr::BooleanLiteral {
                value: true,
                span: token.span,
            }),
            TokenType::False => Ok(Expr::BooleanLiteral {
                value: false,
                span: token.span,
            }),
            TokenType::Number => Ok(Expr::NumberLiteral {
                text: token.lexeme,
                span: token.span,
            }),
            TokenType::String => Ok(Expr::StringLiteral {
                value: token.lexeme,
                span: token.span,
            }),
            TokenType::Identifier => Ok(Expr::Identifier {
                name: token.lexeme,
                span: token.span,
            }),
            TokenType::LeftParen => {
                // Parenthesized expressions yield the inner node directly
                let expr = self.expression()?;
                self.consume_with_help(
                    TokenType::RightParen,
                    "Expected ')' after expression",
                    "Every opening '(' must have a matching closing ')'.".to_string(),
                )?;
                Ok(expr)
            }
            _ => {
                let help = match token.token_type {
                    TokenType::RightParen => "Found ')' without a matching '('.",
                    TokenType::RightBrace => "Found '}' without a matching '{'.",
                    _ => "Expected a literal, variable, call, or parenthesized expression here.",
                };

                Err(LangError::parse_error(
                    token.span,
                    format!("Expected expression, found '{}'", token.lexeme),
                )
                .with_help(help.to_string()))
            }
        }
    }

    /// Skip tokens to the next statement boundary: past a ';' or up to a
    /// keyword that starts a statement.
    fn synchronize(&mut self) {
        self.advance();

        while !self.is_at_end() {
            if self.previous().token_type == TokenType::Semicolon {
                return;
            }

            match self.peek().token_type {
                TokenType::Class
                | TokenType::Fn
                | TokenType::If
                | TokenType::While
                | TokenType::For
                | TokenType::Return => return,
                _ => {}
            }

            self.advance();
        }
    }

    fn match_types(&mut self, types: &[TokenType]) -> bool {
        for token_type in types {
            if self.check(token_type) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, token_type: &TokenType) -> bool {
        if self.is_at_end() {
            false
        } else {
            &self.peek().token_type == token_type
        }
    }

    fn advance(&mut self) -> &Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous()
    }

    fn is_at_end(&self) -> bool {
        self.peek().token_type == TokenType::Eof
    }

    fn peek(&self) -> &Token {
        &self.tokens[self.current]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current - 1]
    }

    fn consume(&mut self, token_type: TokenType, message: &str) -> Result<&Token, LangError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(LangError::parse_error(self.error_span(), message.to_string()))
        }
    }

    fn consume_with_help(
        &mut self,
        token_type: TokenType,
        message: &str,
        help: String,
    ) -> Result<&Token, LangError> {
        if self.check(&token_type) {
            Ok(self.advance())
        } else {
            Err(LangError::parse_error(self.error_span(), message.to_string()).with_help(help))
        }
    }

    /// Where to point a missing-token error: the unexpected token, or just
    /// past the last real token when the stream ran out.
    fn error_span(&self) -> Span {
        if self.is_at_end() && self.current > 0 {
            Span::single(self.tokens[self.current - 1].span.end)
        } else {
            self.peek().span.clone()
        }
    }
}
