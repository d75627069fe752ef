//! Lexical analysis: raw source text to a finite sequence of positioned
//! tokens, terminated by a single `Eof` token. Char-by-char scan over a
//! `Peekable<Chars>` with explicit line/column counters, producing a
//! category-tagged `Token` for each lexeme.

use std::iter::Peekable;
use std::str::Chars;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{CompileError, Location};

pub const KEYWORDS: &[&str] = &[
    "class",
    "extends",
    "constructor",
    "let",
    "new",
    "return",
    "super",
    "this",
    "true",
    "false",
    "if",
    "else",
    "import",
    "as",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenCategory {
    Number,
    Identifier,
    String,
    Keyword,
    Symbol,
    Eof,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub category: TokenCategory,
    pub lexeme: String,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn location(&self) -> Location {
        Location::spanning(self.line, self.column, self.lexeme.chars().count().max(1))
    }

    pub fn is_symbol(&self, symbol: &str) -> bool {
        self.category == TokenCategory::Symbol && self.lexeme == symbol
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.category == TokenCategory::Keyword && self.lexeme == keyword
    }

    /// Human-readable name for diagnostics, naming EOF as `EOF`.
    pub fn describe(&self) -> String {
        match self.category {
            TokenCategory::Eof => "EOF".to_owned(),
            TokenCategory::String => format!("string {:?}", self.lexeme),
            _ => format!("'{}'", self.lexeme),
        }
    }
}

/// Two-character symbols are preferred over one-character symbols at
/// the same position.
const TWO_CHAR_SYMBOLS: &[&str] = &["==", "!=", "<=", ">=", "&&", "||", "->"];

pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<Chars<'a>>,
    line: usize,
    column: usize,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().peekable(),
            line: 1,
            column: 1,
            tokens: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>, line: usize, column: usize) -> CompileError {
        CompileError::at(message, self.source, Location::new(line, column))
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().copied()
    }

    fn peek_second(&self) -> Option<char> {
        let mut clone = self.chars.clone();
        clone.next();
        clone.next()
    }

    fn bump(&mut self) -> Option<char> {
        let next = self.chars.next()?;
        if next == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(next)
    }

    fn push(&mut self, category: TokenCategory, lexeme: String, line: usize, column: usize) {
        self.tokens.push(Token {
            category,
            lexeme,
            line,
            column,
        });
    }

    pub fn lex(mut self) -> Result<Vec<Token>, CompileError> {
        loop {
            self.skip_whitespace_and_comments();

            let (line, column) = (self.line, self.column);
            let Some(next) = self.peek() else {
                self.push(TokenCategory::Eof, String::new(), line, column);
                return Ok(self.tokens);
            };

            match next {
                c if c.is_ascii_digit() => self.lex_number(),
                c if is_ident_start(c) => self.lex_identifier(),
                '"' | '\'' => self.lex_string()?,
                _ => self.lex_symbol()?,
            }
        }
    }

    fn skip_whitespace_and_comments(&mut self) {
        loop {
            while self.peek().map(char::is_whitespace).unwrap_or(false) {
                self.bump();
            }

            if self.peek() == Some('/') && self.peek_second() == Some('/') {
                while let Some(c) = self.peek() {
                    if c == '\n' {
                        break;
                    }
                    self.bump();
                }
                continue;
            }

            break;
        }
    }

    fn lex_number(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            lexeme.push(c);
            self.bump();
        }
        self.push(TokenCategory::Number, lexeme, line, column);
    }

    fn lex_identifier(&mut self) {
        let (line, column) = (self.line, self.column);
        let mut lexeme = String::new();
        while let Some(c) = self.peek() {
            if !is_ident_continue(c) {
                break;
            }
            lexeme.push(c);
            self.bump();
        }

        let category = if KEYWORDS.contains(&lexeme.as_str()) {
            TokenCategory::Keyword
        } else {
            TokenCategory::Identifier
        };
        self.push(category, lexeme, line, column);
    }

    fn lex_string(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        let quote = self.bump().expect("caller checked a quote is present");

        let mut lexeme = String::new();
        loop {
            match self.peek() {
                None => {
                    return Err(self.error("unterminated string literal", line, column));
                }
                Some(c) if c == quote => {
                    self.bump();
                    break;
                }
                Some('\\') => {
                    self.bump();
                    match self.bump() {
                        Some(escaped) => lexeme.push(escaped),
                        None => {
                            return Err(self.error("unterminated string literal", line, column));
                        }
                    }
                }
                Some(c) => {
                    lexeme.push(c);
                    self.bump();
                }
            }
        }

        self.push(TokenCategory::String, lexeme, line, column);
        Ok(())
    }

    fn lex_symbol(&mut self) -> Result<(), CompileError> {
        let (line, column) = (self.line, self.column);
        let first = self.peek().expect("caller checked a character is present");

        if let Some(second) = self.peek_second() {
            let candidate: String = [first, second].into_iter().collect();
            if TWO_CHAR_SYMBOLS.contains(&candidate.as_str()) {
                self.bump();
                self.bump();
                self.push(TokenCategory::Symbol, candidate, line, column);
                return Ok(());
            }
        }

        self.bump();
        self.push(TokenCategory::Symbol, first.to_string(), line, column);
        Ok(())
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Convenience entry point over `Lexer::new(src).lex()`.
pub fn lex(source: &str) -> Result<Vec<Token>, CompileError> {
    Lexer::new(source).lex()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex_ok(src: &str) -> Vec<Token> {
        lex(src).expect("expected lexing to succeed")
    }

    #[test]
    fn lexes_identifier_and_eof() {
        let tokens = lex_ok("hello");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[0].category, TokenCategory::Identifier);
        assert_eq!(tokens[0].lexeme, "hello");
        assert_eq!(tokens[1].category, TokenCategory::Eof);
    }

    #[test]
    fn lexes_number() {
        let tokens = lex_ok("1337");
        assert_eq!(tokens[0].category, TokenCategory::Number);
        assert_eq!(tokens[0].lexeme, "1337");
    }

    #[test]
    fn lexes_keyword_vs_identifier() {
        let tokens = lex_ok("class Dog extends Animal");
        assert_eq!(tokens[0].category, TokenCategory::Keyword);
        assert_eq!(tokens[1].category, TokenCategory::Identifier);
        assert_eq!(tokens[2].category, TokenCategory::Keyword);
    }

    #[test]
    fn lexes_string_with_escape() {
        let tokens = lex_ok(r#""say \"hi\"""#);
        assert_eq!(tokens[0].category, TokenCategory::String);
        assert_eq!(tokens[0].lexeme, "say \"hi\"");
    }

    #[test]
    fn unterminated_string_is_lex_error() {
        let err = lex("let s: String = \"hi").unwrap_err();
        let location = err.location.expect("expected a location");
        assert_eq!(location.line, 1);
        assert_eq!(location.column, 17);
    }

    #[test]
    fn prefers_two_char_symbols() {
        let tokens = lex_ok("a == b != c -> d");
        let symbols: Vec<&str> = tokens
            .iter()
            .filter(|t| t.category == TokenCategory::Symbol)
            .map(|t| t.lexeme.as_str())
            .collect();
        assert_eq!(symbols, vec!["==", "!=", "->"]);
    }

    #[test]
    fn skips_line_comments() {
        let tokens = lex_ok("let x = 1; // trailing comment\nlet y = 2;");
        assert!(tokens.iter().all(|t| !t.lexeme.contains("comment")));
    }

    #[test]
    fn tracks_line_and_column() {
        let tokens = lex_ok("a\nb");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 1));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 1));
    }

    #[test]
    fn token_stream_ends_with_exactly_one_eof() {
        let tokens = lex_ok("let a: int = 1;");
        assert_eq!(
            tokens.iter().filter(|t| t.category == TokenCategory::Eof).count(),
            1
        );
        assert_eq!(tokens.last().unwrap().category, TokenCategory::Eof);
    }
}
