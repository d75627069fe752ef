//! Shared diagnostic type for the lexer, parser and type checker.
//!
//! Renders a source line plus a caret pointing at the offending
//! column, colored when the terminal supports it, so all three stages
//! report errors through the one `CompileError` type.

use std::fmt::{self, Display};

use colored::Colorize;
use serde::{Deserialize, Serialize};

/// A 1-based line/column pair, optionally extended with an end column
/// on the same line (used to widen the caret under multi-character
/// lexemes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
    pub end_column: Option<usize>,
}

impl Location {
    pub fn new(line: usize, column: usize) -> Self {
        Self {
            line,
            column,
            end_column: None,
        }
    }

    pub fn spanning(line: usize, column: usize, width: usize) -> Self {
        Self {
            line,
            column,
            end_column: Some(column + width),
        }
    }

    fn caret_width(&self) -> usize {
        self.end_column
            .map(|end| end.saturating_sub(self.column).max(1))
            .unwrap_or(1)
    }
}

/// One diagnostic produced by the lexer, parser or type checker.
///
/// Carries the full original source so `Display` can recover and
/// print the offending line without threading a `&str` through every
/// call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileError {
    pub message: String,
    pub location: Option<Location>,
    pub source: String,
    pub hint: Option<String>,
}

impl CompileError {
    pub fn new(message: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            source: source.into(),
            hint: None,
        }
    }

    pub fn at(message: impl Into<String>, source: impl Into<String>, location: Location) -> Self {
        Self {
            message: message.into(),
            location: Some(location),
            source: source.into(),
            hint: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(location) = &self.location else {
            writeln!(f, "{}", "error:".red().bold())?;
            write!(f, "  {}", self.message)?;
            if let Some(hint) = &self.hint {
                write!(f, "\n  {} {hint}", "hint:".cyan())?;
            }
            return Ok(());
        };

        let lines: Vec<&str> = self.source.lines().collect();
        let line_str = lines.get(location.line.saturating_sub(1)).unwrap_or(&"");

        writeln!(
            f,
            "{} line {}, column {}:",
            "error at".red().bold(),
            location.line,
            location.column
        )?;
        writeln!(f, "  {} | {line_str}", location.line)?;

        let margin = location.line.to_string().len();
        let margin_fill = " ".repeat(margin);
        let pad = " ".repeat(location.column.saturating_sub(1));
        let caret = "^".repeat(location.caret_width());
        writeln!(f, "  {margin_fill} | {pad}{}", caret.red())?;

        write!(f, "  {}", self.message)?;
        if let Some(hint) = &self.hint {
            write!(f, "\n  {} {hint}", "hint:".cyan())?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}

/// Aggregates diagnostics produced by a pass that does not stop at the
/// first error (the type checker).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorCollector {
    errors: Vec<CompileError>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: CompileError) {
        self.errors.push(error);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompileError> {
        self.errors.iter()
    }

    pub fn into_vec(self) -> Vec<CompileError> {
        self.errors
    }
}

impl Display for ErrorCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.errors.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join("\n\n"))
    }
}

impl std::error::Error for ErrorCollector {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_error_without_location() {
        let err = CompileError::new("something went wrong", "let x: int = 0;");
        let rendered = err.to_string();
        assert!(rendered.contains("error:"));
        assert!(rendered.contains("something went wrong"));
    }

    #[test]
    fn formats_error_with_location_and_hint() {
        let src = "let s: String = \"hi";
        let err = CompileError::at("unterminated string literal", src, Location::new(1, 17))
            .with_hint("close the string with a matching quote");
        let rendered = err.to_string();
        assert!(rendered.contains("line 1, column 17"));
        assert!(rendered.contains(src));
        assert!(rendered.contains("hint:"));
    }

    #[test]
    fn collector_joins_with_blank_lines() {
        let mut collector = ErrorCollector::new();
        collector.push(CompileError::new("first", ""));
        collector.push(CompileError::new("second", ""));
        let rendered = collector.to_string();
        assert!(rendered.contains("first\n\n"));
        assert_eq!(collector.len(), 2);
    }
}
