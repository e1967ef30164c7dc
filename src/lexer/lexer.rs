//! Character level tokenizer with one token of lookahead.

use std::path::Path;

use super::token::{Token, TokenKind};
use crate::util::{Error, ParseError, ParseErrorKind, Result};

/// Tokenizer over an in-memory source buffer.
///
/// The lexer always holds the current (not yet consumed) token and the
/// previously consumed one. `expect*` helpers turn mismatches into
/// [`ParseError`]s carrying the file name and the line of the offending token.
pub struct Lexer {
    source: Vec<u8>,
    pos: usize,
    line: u32,
    file: String,
    current: Token,
    current_start: usize,
    previous: Token,
}

impl Lexer {
    /// Create a lexer over `source`; `file` is only used in error messages.
    pub fn new(file: impl Into<String>, source: impl Into<Vec<u8>>) -> Self {
        let mut lexer = Self {
            source: source.into(),
            pos: 0,
            line: 1,
            file: file.into(),
            current: Token::eof(1),
            current_start: 0,
            previous: Token::eof(1),
        };
        lexer.advance();
        lexer
    }

    /// Read a whole file and create a lexer over it.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read(path).map_err(|e| Error::open(path, e))?;
        Ok(Self::new(path.display().to_string(), source))
    }

    /// File name used in diagnostics.
    #[inline]
    pub fn file(&self) -> &str {
        &self.file
    }

    /// The token that has not been consumed yet.
    #[inline]
    pub fn current(&self) -> &Token {
        &self.current
    }

    /// The most recently consumed token.
    #[inline]
    pub fn previous(&self) -> &Token {
        &self.previous
    }

    /// True once the current token is end-of-file.
    #[inline]
    pub fn at_end(&self) -> bool {
        self.current.is(TokenKind::Eof)
    }

    /// True if the current token has the given kind.
    #[inline]
    pub fn check(&self, kind: TokenKind) -> bool {
        self.current.is(kind)
    }

    /// Consume the current token and lex the next one.
    pub fn advance(&mut self) -> &Token {
        let (start, next) = self.next_token();
        self.current_start = start;
        self.previous = std::mem::replace(&mut self.current, next);
        &self.previous
    }

    /// Consume the current token if it has the given kind.
    pub fn matches(&mut self, kind: TokenKind) -> bool {
        if self.current.is(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume the current token if it is the literal `text`.
    pub fn matches_literal(&mut self, text: &str) -> bool {
        if self.current.is_literal(text) {
            self.advance();
            true
        } else {
            false
        }
    }

    /// Consume a token of the given kind or fail with `message`.
    pub fn expect(&mut self, kind: TokenKind, message: &str) -> Result<&Token> {
        if self.current.is(kind) {
            return Ok(self.advance());
        }
        Err(self.unexpected(message))
    }

    /// Consume the literal `text` or fail.
    pub fn expect_literal(&mut self, text: &str) -> Result<()> {
        if self.matches_literal(text) {
            return Ok(());
        }
        Err(self.unexpected(&format!("Expected '{}'", text)))
    }

    /// Consume any literal and return its text.
    pub fn expect_identifier(&mut self, message: &str) -> Result<String> {
        Ok(self.expect(TokenKind::Literal, message)?.lexeme.clone())
    }

    /// Consume a string token and return its (unescaped) contents.
    pub fn expect_string(&mut self, message: &str) -> Result<String> {
        Ok(self.expect(TokenKind::String, message)?.lexeme.clone())
    }

    /// Consume a number token and parse it as `f32`.
    pub fn expect_number(&mut self, message: &str) -> Result<f32> {
        let token = self.expect(TokenKind::Number, message)?.clone();
        token.lexeme.parse::<f32>().map_err(|_| {
            self.error_at(
                ParseErrorKind::Lexer,
                token.line,
                format!("Malformed number '{}'", token.lexeme),
            )
        })
    }

    /// Consume a number token and parse it as an integer.
    pub fn expect_integer(&mut self, message: &str) -> Result<i64> {
        let token = self.expect(TokenKind::Number, message)?.clone();
        token.lexeme.parse::<i64>().map_err(|_| {
            self.error_at(
                ParseErrorKind::UnexpectedToken,
                token.line,
                format!("Expected an integer but found '{}'", token.lexeme),
            )
        })
    }

    /// Raw text from the current token to the end of the line the previous
    /// token sits on, trimmed. The lexer resumes at the next line.
    ///
    /// Returns an empty string (consuming nothing) when the current token
    /// already starts on a later line.
    pub fn rest_of_line(&mut self) -> String {
        if self.at_end() || self.current.line != self.previous.line {
            return String::new();
        }
        let start = self.current_start;
        let end = self.source[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(self.source.len(), |n| start + n);
        let text = String::from_utf8_lossy(&self.source[start..end]).trim().to_string();
        // Tokens after the current one may already have advanced the line
        // counter (multi-line strings); resynchronize from the raw buffer.
        self.line = self.current.line;
        self.pos = end;
        self.advance();
        text
    }

    /// Discard everything up to the end of the current line.
    pub fn skip_line(&mut self) {
        self.rest_of_line();
    }

    /// Build a parse error at the current token.
    pub fn error(&self, kind: ParseErrorKind, message: impl Into<String>) -> Error {
        self.error_at(kind, self.current.line, message)
    }

    /// Build a parse error at an explicit line.
    pub fn error_at(&self, kind: ParseErrorKind, line: u32, message: impl Into<String>) -> Error {
        ParseError::new(kind, self.file.clone(), line, message).into()
    }

    /// Error for an unexpected current token.
    pub fn unexpected(&self, message: &str) -> Error {
        if self.current.is(TokenKind::Error) {
            return self.error(ParseErrorKind::Lexer, self.current.lexeme.clone());
        }
        let found = if self.current.is(TokenKind::Eof) {
            "end of file".to_string()
        } else {
            format!("'{}'", self.current.lexeme)
        };
        self.error(
            ParseErrorKind::UnexpectedToken,
            format!("{} but found {}", message, found),
        )
    }

    // ------------------------------------------------------------------
    // Character level scanning
    // ------------------------------------------------------------------

    #[inline]
    fn peek(&self) -> Option<u8> {
        self.source.get(self.pos).copied()
    }

    fn skip_whitespace_and_comments(&mut self) {
        while let Some(c) = self.peek() {
            match c {
                b'\n' => {
                    self.line += 1;
                    self.pos += 1;
                }
                b' ' | b'\t' | b'\r' | 0x0B | 0x0C => self.pos += 1,
                b'#' => {
                    while let Some(c) = self.peek() {
                        if c == b'\n' {
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    /// Lex exactly one token, returning it with its byte offset.
    fn next_token(&mut self) -> (usize, Token) {
        self.skip_whitespace_and_comments();
        let start = self.pos;
        let line = self.line;

        let Some(c) = self.peek() else {
            return (start, Token::eof(line));
        };

        let single = |kind| Token::new(kind, (c as char).to_string(), line);
        let token = match c {
            b'{' => single(TokenKind::LCurly),
            b'}' => single(TokenKind::RCurly),
            b'(' => single(TokenKind::LParen),
            b')' => single(TokenKind::RParen),
            b'[' => single(TokenKind::LBracket),
            b']' => single(TokenKind::RBracket),
            b'/' => single(TokenKind::Slash),
            b',' => single(TokenKind::Comma),
            b';' => single(TokenKind::Semicolon),
            b'=' => single(TokenKind::Equals),
            b'"' => return (start, self.lex_string(line)),
            b'-' | b'.' | b'0'..=b'9' => return (start, self.lex_number(line)),
            c if c.is_ascii_alphabetic() || c == b'_' => return (start, self.lex_literal(line)),
            other => {
                self.pos += 1;
                return (
                    start,
                    Token::new(
                        TokenKind::Error,
                        format!("Unexpected character '{}'", other as char),
                        line,
                    ),
                );
            }
        };
        self.pos += 1;
        (start, token)
    }

    fn eat_digits(&mut self) -> usize {
        let begin = self.pos;
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        self.pos - begin
    }

    /// `-?[0-9]*(\.[0-9]*)?([eE][+-]?[0-9]*)?`, greedy.
    fn lex_number(&mut self, line: u32) -> Token {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let mut digits = self.eat_digits();
        // A '.' after the integer part (or on its own) continues the number.
        if self.peek() == Some(b'.') {
            self.pos += 1;
            digits += self.eat_digits();
        }
        if digits > 0 && matches!(self.peek(), Some(b'e' | b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            self.eat_digits();
        }

        let lexeme = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        if digits == 0 {
            return Token::new(
                TokenKind::Error,
                format!("Malformed number '{}'", lexeme),
                line,
            );
        }
        Token::new(TokenKind::Number, lexeme, line)
    }

    fn lex_literal(&mut self, line: u32) -> Token {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let lexeme = String::from_utf8_lossy(&self.source[start..self.pos]).into_owned();
        Token::new(TokenKind::Literal, lexeme, line)
    }

    fn lex_string(&mut self, line: u32) -> Token {
        self.pos += 1; // opening quote
        let mut bytes = Vec::new();
        loop {
            let Some(c) = self.peek() else {
                return Token::new(TokenKind::Error, "Unterminated string literal", line);
            };
            self.pos += 1;
            match c {
                b'"' => break,
                b'\\' => {
                    let Some(escaped) = self.peek() else {
                        return Token::new(TokenKind::Error, "Unterminated string literal", line);
                    };
                    self.pos += 1;
                    bytes.push(match escaped {
                        b'"' => b'"',
                        b't' => b'\t',
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b'b' => 0x08,
                        b'v' => 0x0B,
                        b'f' => 0x0C,
                        b'\\' => b'\\',
                        other => other,
                    });
                }
                b'\n' => {
                    self.line += 1;
                    bytes.push(c);
                }
                _ => bytes.push(c),
            }
        }
        Token::new(
            TokenKind::String,
            String::from_utf8_lossy(&bytes).into_owned(),
            line,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new("test", source);
        let mut out = Vec::new();
        while !lexer.at_end() {
            out.push(lexer.advance().kind);
        }
        out
    }

    #[test]
    fn test_punctuation_and_literals() {
        use TokenKind::*;
        assert_eq!(
            kinds("new MATERIAL as \"m\" { diffuse = (1, 2, 3, 4); };"),
            vec![
                Literal, Literal, Literal, String, LCurly, Literal, Equals, LParen, Number,
                Comma, Number, Comma, Number, Comma, Number, RParen, Semicolon, RCurly,
                Semicolon
            ]
        );
    }

    #[test]
    fn test_numbers() {
        let mut lexer = Lexer::new("test", "12 -3.5 .25 1e-3 7. 2E+2");
        let mut values = Vec::new();
        while !lexer.at_end() {
            values.push(lexer.expect_number("number").unwrap());
        }
        assert_eq!(values, vec![12.0, -3.5, 0.25, 1e-3, 7.0, 200.0]);
    }

    #[test]
    fn test_bare_minus_is_error() {
        let mut lexer = Lexer::new("test", "- x");
        assert!(lexer.check(TokenKind::Error));
        let err = lexer.expect(TokenKind::Number, "Expected number").unwrap_err();
        assert_eq!(err.parse_kind(), Some(ParseErrorKind::Lexer));
    }

    #[test]
    fn test_string_escapes() {
        let mut lexer = Lexer::new("test", r#""a\"b\t\n\\c""#);
        let s = lexer.expect_string("string").unwrap();
        assert_eq!(s, "a\"b\t\n\\c");
    }

    #[test]
    fn test_unterminated_string() {
        let lexer = Lexer::new("test", "\"abc");
        assert!(lexer.check(TokenKind::Error));
        assert!(lexer.current().lexeme.contains("Unterminated"));
    }

    #[test]
    fn test_comments_and_lines() {
        let mut lexer = Lexer::new("test", "# header\nfoo # trailing\n\nbar");
        assert_eq!(lexer.current().line, 2);
        lexer.advance();
        assert_eq!(lexer.current().lexeme, "bar");
        assert_eq!(lexer.current().line, 4);
    }

    #[test]
    fn test_literal_with_dots() {
        let mut lexer = Lexer::new("test", "map_Kd brick_01.png");
        assert_eq!(lexer.expect_identifier("id").unwrap(), "map_Kd");
        assert_eq!(lexer.expect_identifier("id").unwrap(), "brick_01.png");
    }

    #[test]
    fn test_rest_of_line() {
        let mut lexer = Lexer::new("test", "map_Kd textures/my brick.png\nKd 1 1 1");
        lexer.expect_literal("map_Kd").unwrap();
        assert_eq!(lexer.rest_of_line(), "textures/my brick.png");
        assert!(lexer.current().is_literal("Kd"));
        assert_eq!(lexer.current().line, 2);
    }

    #[test]
    fn test_rest_of_line_empty() {
        let mut lexer = Lexer::new("test", "map_Kd\nKd 1 1 1");
        lexer.expect_literal("map_Kd").unwrap();
        assert_eq!(lexer.rest_of_line(), "");
        assert!(lexer.current().is_literal("Kd"));
    }

    #[test]
    fn test_expect_error_format() {
        let mut lexer = Lexer::new("scene.raw", "\n\nfoo");
        let err = lexer.expect(TokenKind::LCurly, "Expected '{'").unwrap_err();
        assert_eq!(err.to_string(), "Error at scene.raw@3: Expected '{' but found 'foo'");
    }
}
