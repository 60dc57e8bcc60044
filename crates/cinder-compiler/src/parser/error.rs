//! Parse error types and error reporting

use crate::lexer::LexError;
use crate::token::{Span, Token};
use std::fmt;

/// A parse error with location and contextual information.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    /// The kind of error that occurred
    pub kind: ParseErrorKind,

    /// Source location of the error
    pub span: Span,

    /// Human-readable error message
    pub message: String,

    /// Optional suggestion for fixing the error
    pub suggestion: Option<String>,
}

/// The kind of parse error.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token found
    UnexpectedToken { expected: String, found: String },

    /// Unexpected end of file
    UnexpectedEof { expected: String },

    /// Invalid syntax
    InvalidSyntax { reason: String },

    /// Invalid number literal
    InvalidNumber { value: String },

    /// Nesting depth limit exceeded
    NestingTooDeep,

    /// Error reported by the lexer
    Lex(LexError),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Parse error at {}:{}: {}",
            self.span.line, self.span.column, self.message
        )?;

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl std::error::Error for ParseError {}

impl ParseError {
    /// Create an "unexpected token" error, or "unexpected EOF" when `found`
    /// is the end of input.
    pub fn unexpected_token(expected: &str, found: &Token) -> Self {
        if found.is_eof() {
            return Self {
                kind: ParseErrorKind::UnexpectedEof {
                    expected: expected.to_string(),
                },
                span: found.span,
                message: format!("Unexpected end of file, expected {}", expected),
                suggestion: None,
            };
        }
        Self {
            kind: ParseErrorKind::UnexpectedToken {
                expected: expected.to_string(),
                found: found.to_string(),
            },
            span: found.span,
            message: format!("Expected {}, found {}", expected, found),
            suggestion: None,
        }
    }

    /// Create an "invalid syntax" error.
    pub fn invalid_syntax(reason: impl Into<String>, span: Span) -> Self {
        let reason = reason.into();
        Self {
            kind: ParseErrorKind::InvalidSyntax {
                reason: reason.clone(),
            },
            span,
            message: format!("Invalid syntax: {}", reason),
            suggestion: None,
        }
    }

    /// Create an "invalid number" error.
    pub fn invalid_number(value: impl Into<String>, span: Span) -> Self {
        let value = value.into();
        Self {
            message: format!("Invalid number literal `{}`", value),
            kind: ParseErrorKind::InvalidNumber { value },
            span,
            suggestion: None,
        }
    }

    /// Create a nesting-limit error.
    pub fn nesting_too_deep(limit: usize, span: Span) -> Self {
        Self {
            kind: ParseErrorKind::NestingTooDeep,
            span,
            message: format!("Maximum nesting depth ({}) exceeded", limit),
            suggestion: Some("split deeply nested expressions into separate statements".to_string()),
        }
    }

    /// Wrap a lexer error.
    pub fn lex(error: LexError) -> Self {
        Self {
            span: error.span(),
            message: error.to_string(),
            kind: ParseErrorKind::Lex(error),
            suggestion: None,
        }
    }

    /// Add a suggestion to this error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}
