//! Lexer for the supported C declaration subset.
//!
//! Preprocessor lines are handled here: `#pragma` payloads surface as
//! dedicated tokens, everything else behind a `#` (linemarkers from
//! `cpp -E`, `#define`, ...) is skipped wholesale.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    Number,
    StrLit,
    CharLit,
    /// Payload of a `#pragma` line, verbatim after the `pragma` keyword.
    Pragma,
    Punct,
    Eof,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub line: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }

    pub fn is_ident(&self, word: &str) -> bool {
        self.kind == TokenKind::Ident && self.text == word
    }
}

pub struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Lexer {
            src: src.as_bytes(),
            pos: 0,
            line: 1,
        }
    }

    /// Lex the whole input up front.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        let mut toks = Vec::new();
        loop {
            let tok = self.next_token()?;
            let done = tok.kind == TokenKind::Eof;
            toks.push(tok);
            if done {
                return Ok(toks);
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn peek2(&self) -> Option<u8> {
        self.src.get(self.pos + 1).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let c = self.peek()?;
        self.pos += 1;
        if c == b'\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn err(&self, msg: impl Into<String>) -> Error {
        Error::Syntax {
            line: self.line,
            msg: msg.into(),
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(c) if c.is_ascii_whitespace() => {
                    self.bump();
                }
                Some(b'/') if self.peek2() == Some(b'/') => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                Some(b'/') if self.peek2() == Some(b'*') => {
                    self.bump();
                    self.bump();
                    loop {
                        match self.peek() {
                            None => return Err(self.err("unterminated comment")),
                            Some(b'*') if self.peek2() == Some(b'/') => {
                                self.bump();
                                self.bump();
                                break;
                            }
                            _ => {
                                self.bump();
                            }
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Consume the rest of the current line (minus the trailing newline),
    /// honoring backslash continuations.
    fn rest_of_line(&mut self) -> String {
        let mut out = String::new();
        while let Some(c) = self.peek() {
            if c == b'\n' {
                break;
            }
            if c == b'\\' && self.peek2() == Some(b'\n') {
                self.bump();
                self.bump();
                out.push(' ');
                continue;
            }
            self.bump();
            out.push(c as char);
        }
        out
    }

    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia()?;
        let line = self.line;
        let Some(c) = self.peek() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
            });
        };

        // Preprocessor line
        if c == b'#' {
            self.bump();
            let rest = self.rest_of_line();
            let rest = rest.trim();
            if let Some(payload) = rest.strip_prefix("pragma") {
                return Ok(Token {
                    kind: TokenKind::Pragma,
                    text: payload.trim().to_string(),
                    line,
                });
            }
            // Linemarker, #define, #include: not for us.
            return self.next_token();
        }

        if c == b'_' || c.is_ascii_alphabetic() {
            let mut text = String::new();
            while let Some(c) = self.peek() {
                if c == b'_' || c.is_ascii_alphanumeric() {
                    text.push(c as char);
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(Token {
                kind: TokenKind::Ident,
                text,
                line,
            });
        }

        if c.is_ascii_digit() {
            // Raw numeric text, suffixes and hex digits included; array
            // extents are carried textually so no value parsing happens.
            let mut text = String::new();
            while let Some(c) = self.peek() {
                if c.is_ascii_alphanumeric() || c == b'.' {
                    text.push(c as char);
                    self.bump();
                } else {
                    break;
                }
            }
            return Ok(Token {
                kind: TokenKind::Number,
                text,
                line,
            });
        }

        if c == b'"' || c == b'\'' {
            let quote = c;
            self.bump();
            let mut text = String::new();
            loop {
                match self.bump() {
                    None => return Err(self.err("unterminated literal")),
                    Some(b'\\') => {
                        if let Some(escaped) = self.bump() {
                            text.push('\\');
                            text.push(escaped as char);
                        }
                    }
                    Some(c) if c == quote => break,
                    Some(c) => text.push(c as char),
                }
            }
            return Ok(Token {
                kind: if quote == b'"' {
                    TokenKind::StrLit
                } else {
                    TokenKind::CharLit
                },
                text,
                line,
            });
        }

        self.bump();
        Ok(Token {
            kind: TokenKind::Punct,
            text: (c as char).to_string(),
            line,
        })
    }
}
