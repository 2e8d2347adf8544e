use crate::error::{LangError, Span};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenType {
    // Single-character tokens
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Semicolon,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,

    // One or two character tokens
    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    And,
    Or,

    // Literals
    Identifier,
    Number,
    String,

    // Keywords
    If,
    Else,
    ElseIf,
    While,
    For,
    Return,
    Class,
    Fn,
    True,
    False,

    // Type keywords
    Int32,
    Int64,
    Int128,
    Long,
    Double,
    Float,
    StringType,
    BoolType,
    Void,

    // Special
    Eof,
}

impl TokenType {
    /// Type keywords open a variable declaration and name function
    /// return/parameter types.
    pub fn is_type_keyword(&self) -> bool {
        matches!(
            self,
            TokenType::Int32
                | TokenType::Int64
                | TokenType::Int128
                | TokenType::Long
                | TokenType::Double
                | TokenType::Float
                | TokenType::StringType
                | TokenType::BoolType
                | TokenType::Void
        )
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub token_type: TokenType,
    pub lexeme: String,
    pub span: Span,
}

impl Token {
    pub fn new(token_type: TokenType, lexeme: String, span: Span) -> Self {
        Self {
            token_type,
            lexeme,
            span,
        }
    }
}

/// Character-stream scanner. Multi-character operators (`==`, `!=`, `>=`,
/// `<=`, `&&`, `||`) are recognized with one character of lookahead, so
/// tokens do not depend on surrounding whitespace.
pub struct Lexer {
    source: String,
    tokens: Vec<Token>,
    start: usize,
    current: usize,
    keywords: HashMap<&'static str, TokenType>,
}

impl Lexer {
    pub fn new(source: String) -> Self {
        let mut keywords = HashMap::new();
        keywords.insert("if", TokenType::If);
        keywords.insert("else", TokenType::Else);
        keywords.insert("elseif", TokenType::ElseIf);
        keywords.insert("while", TokenType::While);
        keywords.insert("for", TokenType::For);
        keywords.insert("return", TokenType::Return);
        keywords.insert("class", TokenType::Class);
        keywords.insert("fn", TokenType::Fn);
        keywords.insert("true", TokenType::True);
        keywords.insert("false", TokenType::False);
        keywords.insert("int32", TokenType::Int32);
        keywords.insert("int64", TokenType::Int64);
        keywords.insert("int128", TokenType::Int128);
        keywords.insert("long", TokenType::Long);
        keywords.insert("double", TokenType::Double);
        keywords.insert("float", TokenType::Float);
        keywords.insert("string", TokenType::StringType);
        keywords.insert("bool", TokenType::BoolType);
        keywords.insert("void", TokenType::Void);

        Self {
            source,
            tokens: Vec::new(),
            start: 0,
            current: 0,
            keywords,
        }
    }

    pub fn scan_tokens(&mut self) -> Result<Vec<Token>, LangError> {
        while !self.is_at_end() {
            self.start = self.current;
            self.scan_token()?;
        }

        self.tokens.push(Token::new(
            TokenType::Eof,
            "".to_string(),
            Span::single(self.current),
        ));

        Ok(self.tokens.clone())
    }

    fn is_at_end(&self) -> bool {
        self.current >= self.source.len()
    }

    fn scan_token(&mut self) -> Result<(), LangError> {
        let c = self.advance();

        match c {
            '(' => self.add_token(TokenType::LeftParen),
            ')' => self.add_token(TokenType::RightParen),
            '{' => self.add_token(TokenType::LeftBrace),
            '}' => self.add_token(TokenType::RightBrace),
            '[' => self.add_token(TokenType::LeftBracket),
            ']' => self.add_token(TokenType::RightBracket),
            ',' => self.add_token(TokenType::Comma),
            '.' => self.add_token(TokenType::Dot),
            ';' => self.add_token(TokenType::Semicolon),
            ':' => self.add_token(TokenType::Colon),
            '+' => self.add_token(TokenType::Plus),
            '-' => self.add_token(TokenType::Minus),
            '*' => self.add_token(TokenType::Star),
            '%' => self.add_token(TokenType::Percent),
            '!' => {
                let token_type = if self.match_char('=') {
                    TokenType::BangEqual
                } else {
                    TokenType::Bang
                };
                self.add_token(token_type);
            }
            '=' => {
                let token_type = if self.match_char('=') {
                    TokenType::EqualEqual
                } else {
                    TokenType::Equal
                };
                self.add_token(token_type);
            }
            '<' => {
                let token_type = if self.match_char('=') {
                    TokenType::LessEqual
                } else {
                    TokenType::Less
                };
                self.add_token(token_type);
            }
            '>' => {
                let token_type = if self.match_char('=') {
                    TokenType::GreaterEqual
                } else {
                    TokenType::Greater
                };
                self.add_token(token_type);
            }
            '&' => {
                if self.match_char('&') {
                    self.add_token(TokenType::And);
                } else {
                    return Err(LangError::lex_error(
                        Span::single(self.start),
                        "Unexpected character: '&'".to_string(),
                    )
                    .with_help("Logical AND is written '&&'.".to_string()));
                }
            }
            '|' => {
                if self.match_char('|') {
                    self.add_token(TokenType::Or);
                } else {
                    return Err(LangError::lex_error(
                        Span::single(self.start),
                        "Unexpected character: '|'".to_string(),
                    )
                    .with_help("Logical OR is written '||'.".to_string()));
                }
            }
            '/' => {
                if self.match_char('/') {
                    // Comment goes until end of line
                    while self.peek() != '\n' && !self.is_at_end() {
                        self.advance();
                    }
                } else {
                    self.add_token(TokenType::Slash);
                }
            }
            ' ' | '\r' | '\t' | '\n' => {
                // Whitespace separates tokens but produces none
            }
            '"' => self.string()?,
            c if c.is_ascii_digit() => self.number(),
            c if c.is_alphabetic() || c == '_' => self.identifier(),
            _ => {
                return Err(LangError::lex_error(
                    Span::single(self.start),
                    format!("Unexpected character: '{}'", c),
                ));
            }
        }

        Ok(())
    }

    fn advance(&mut self) -> char {
        let c = self.source[self.current..].chars().next().unwrap_or('\0');
        self.current += c.len_utf8();
        c
    }

    fn match_char(&mut self, expected: char) -> bool {
        if self.is_at_end() || self.peek() != expected {
            false
        } else {
            self.advance();
            true
        }
    }

    fn peek(&self) -> char {
        self.source[self.current..].chars().next().unwrap_or('\0')
    }

    fn peek_next(&self) -> char {
        let mut chars = self.source[self.current..].chars();
        chars.next();
        chars.next().unwrap_or('\0')
    }

    fn string(&mut self) -> Result<(), LangError> {
        while self.peek() != '"' && !self.is_at_end() {
            self.advance();
        }

        if self.is_at_end() {
            return Err(LangError::lex_error(
                Span::new(self.start, self.current),
                "Unterminated string".to_string(),
            ));
        }

        // Consume the closing "
        self.advance();

        // The token keeps the content between the quotes; no escape
        // sequences are processed.
        let content = self.source[self.start + 1..self.current - 1].to_string();
        self.add_token_with_content(TokenType::String, content);
        Ok(())
    }

    fn number(&mut self) {
        while self.peek().is_ascii_digit() {
            self.advance();
        }

        // Fractional part only if a digit follows the dot, so `1.` stays
        // a number and a dot token.
        if self.peek() == '.' && self.peek_next().is_ascii_digit() {
            self.advance();
            while self.peek().is_ascii_digit() {
                self.advance();
            }
        }

        // The raw text is kept; range checking happens at evaluation time.
        self.add_token(TokenType::Number);
    }

    fn identifier(&mut self) {
        while self.peek().is_alphanumeric() || self.peek() == '_' {
            self.advance();
        }

        let text = &self.source[self.start..self.current];
        let token_type = self
            .keywords
            .get(text)
            .cloned()
            .unwrap_or(TokenType::Identifier);

        self.add_token(token_type);
    }

    fn add_token(&mut self, token_type: TokenType) {
        let text = &self.source[self.start..self.current];
        self.add_token_with_content(token_type, text.to_string());
    }

    fn add_token_with_content(&mut self, token_type: TokenType, lexeme: String) {
        self.tokens.push(Token::new(
            token_type,
            lexeme,
            Span::new(self.start, self.current),
        ));
    }
}
