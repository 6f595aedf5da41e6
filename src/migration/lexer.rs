//! Lexer for the schema-builder statements inside a migration closure.
//!
//! Tokenizing never fails: unknown characters are skipped and an unterminated
//! string runs to end of input.

use std::iter::Peekable;
use std::str::Chars;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Variable(String), // $table
    Ident(String),
    Str(String),
    Num(String),

    Arrow,       // ->
    DoubleColon, // ::
    FatArrow,    // =>
    LParen,      // (
    RParen,      // )
    LBracket,    // [
    RBracket,    // ]
    LBrace,      // {
    RBrace,      // }
    Comma,       // ,
    Semicolon,   // ;

    Eof,
}

pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            chars,
            current_char,
        }
    }

    fn advance(&mut self) {
        self.current_char = self.chars.next();
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char {
            if c.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(c) = self.current_char {
            self.advance();
            if c == '\n' {
                break;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        self.advance(); // /
        self.advance(); // *
        while let Some(c) = self.current_char {
            self.advance();
            if c == '*' && self.current_char == Some('/') {
                self.advance();
                break;
            }
        }
    }

    fn read_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.current_char {
            if c.is_alphanumeric() || c == '_' || c == '\\' {
                ident.push(c);
                self.advance();
            } else {
                break;
            }
        }
        ident
    }

    fn read_string(&mut self, quote: char) -> String {
        self.advance(); // opening quote
        let mut s = String::new();
        while let Some(c) = self.current_char {
            if c == quote {
                self.advance();
                break;
            } else if c == '\\' {
                self.advance();
                if let Some(escaped) = self.current_char {
                    match escaped {
                        'n' if quote == '"' => s.push('\n'),
                        't' if quote == '"' => s.push('\t'),
                        '\\' | '\'' | '"' => s.push(escaped),
                        _ => {
                            s.push('\\');
                            s.push(escaped);
                        }
                    }
                    self.advance();
                }
            } else {
                s.push(c);
                self.advance();
            }
        }
        s
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        let mut has_dot = false;

        if self.current_char == Some('-') {
            num.push('-');
            self.advance();
        }

        while let Some(c) = self.current_char {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else if c == '.' && !has_dot && self.peek().is_some_and(|n| n.is_ascii_digit()) {
                has_dot = true;
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num
    }

    pub fn next_token(&mut self) -> Token {
        loop {
            self.skip_whitespace();

            let c = match self.current_char {
                Some(c) => c,
                None => return Token::Eof,
            };

            let tok = match c {
                '/' if self.peek() == Some(&'/') => {
                    self.skip_line_comment();
                    continue;
                }
                '/' if self.peek() == Some(&'*') => {
                    self.skip_block_comment();
                    continue;
                }
                '#' => {
                    self.skip_line_comment();
                    continue;
                }
                '-' if self.peek() == Some(&'>') => {
                    self.advance();
                    Token::Arrow
                }
                '-' if self.peek().is_some_and(|n| n.is_ascii_digit()) => {
                    return Token::Num(self.read_number());
                }
                ':' if self.peek() == Some(&':') => {
                    self.advance();
                    Token::DoubleColon
                }
                '=' if self.peek() == Some(&'>') => {
                    self.advance();
                    Token::FatArrow
                }
                '$' => {
                    self.advance();
                    return Token::Variable(self.read_identifier());
                }
                '\'' | '"' => return Token::Str(self.read_string(c)),
                '(' => Token::LParen,
                ')' => Token::RParen,
                '[' => Token::LBracket,
                ']' => Token::RBracket,
                '{' => Token::LBrace,
                '}' => Token::RBrace,
                ',' => Token::Comma,
                ';' => Token::Semicolon,
                c if c.is_ascii_digit() => return Token::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' || c == '\\' => {
                    return Token::Ident(self.read_identifier());
                }
                _ => {
                    // Skip unknown characters
                    self.advance();
                    continue;
                }
            };
            self.advance();
            return tok;
        }
    }

    pub fn tokenize(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            if token == Token::Eof {
                tokens.push(token);
                break;
            }
            tokens.push(token);
        }
        tokens
    }
}
