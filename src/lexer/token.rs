//! Token types produced by the [`Lexer`](super::Lexer).

use std::fmt;

/// Kind of a lexical token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TokenKind {
    LCurly,
    RCurly,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Slash,
    Comma,
    Semicolon,
    Equals,
    Number,
    String,
    Literal,
    Eof,
    Error,
}

impl TokenKind {
    /// Human readable name used in parse error messages.
    pub fn describe(self) -> &'static str {
        match self {
            Self::LCurly => "'{'",
            Self::RCurly => "'}'",
            Self::LParen => "'('",
            Self::RParen => "')'",
            Self::LBracket => "'['",
            Self::RBracket => "']'",
            Self::Slash => "'/'",
            Self::Comma => "','",
            Self::Semicolon => "';'",
            Self::Equals => "'='",
            Self::Number => "number",
            Self::String => "string",
            Self::Literal => "literal",
            Self::Eof => "end of file",
            Self::Error => "invalid token",
        }
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A single token. String lexemes have their escapes resolved; error
/// lexemes hold a description of the problem.
#[derive(Clone, Debug, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
    pub line: u32,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: impl Into<String>, line: u32) -> Self {
        Self {
            kind,
            lexeme: lexeme.into(),
            line,
        }
    }

    /// End-of-file token at `line`.
    pub fn eof(line: u32) -> Self {
        Self::new(TokenKind::Eof, "", line)
    }

    #[inline]
    pub fn is(&self, kind: TokenKind) -> bool {
        self.kind == kind
    }

    /// True if this is a literal with exactly the given text.
    #[inline]
    pub fn is_literal(&self, text: &str) -> bool {
        self.kind == TokenKind::Literal && self.lexeme == text
    }
}
