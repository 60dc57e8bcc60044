//! Token definitions for the Cinder scripting language.
//!
//! Tokens are produced by an external lexer (or the bundled
//! [`lexer`](crate::lexer) adapter) and consumed by the parser through a
//! [`TokenStream`](crate::stream::TokenStream). Keywords and operators are
//! distinguished by their class and matched by text.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source location information for a token or node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start byte offset
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
    /// 1-based line
    pub line: u32,
    /// 1-based column
    pub column: u32,
}

impl Span {
    pub fn new(start: usize, end: usize, line: u32, column: u32) -> Self {
        Self {
            start,
            end,
            line,
            column,
        }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Span covering both, positioned at whichever starts first
    pub fn merge(&self, other: &Span) -> Span {
        let (line, column) = if self.start <= other.start {
            (self.line, self.column)
        } else {
            (other.line, other.column)
        };
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
            line,
            column,
        }
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// Coarse token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenClass {
    /// Reserved word (`let`, `function`, `new`, ...)
    Keyword,
    /// Identifier
    Identifier,
    /// Integer literal
    Int,
    /// Floating-point literal
    Float,
    /// String literal; `text` holds the unescaped contents
    String,
    /// Operator (`+`, `=>`, `?`, ...)
    Operator,
    /// Delimiter (`(`, `}`, `;`, `,`, `.`, ...)
    Delimiter,
    /// End of input
    Eof,
}

impl fmt::Display for TokenClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TokenClass::Keyword => "keyword",
            TokenClass::Identifier => "identifier",
            TokenClass::Int => "integer",
            TokenClass::Float => "number",
            TokenClass::String => "string",
            TokenClass::Operator => "operator",
            TokenClass::Delimiter => "delimiter",
            TokenClass::Eof => "end of file",
        };
        f.write_str(name)
    }
}

/// Reserved words of the language.
pub const KEYWORDS: &[&str] = &[
    "as", "break", "catch", "const", "continue", "do", "else", "enum", "export", "false",
    "for", "from", "function", "has", "if", "import", "let", "new", "null", "return", "this",
    "throw", "true", "try", "type", "typeof", "while",
];

/// Whether `text` is a reserved word.
pub fn is_keyword(text: &str) -> bool {
    KEYWORDS.contains(&text)
}

/// A token in the Cinder scripting language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub class: TokenClass,
    pub text: String,
    pub span: Span,
}

impl Token {
    pub fn new(class: TokenClass, text: impl Into<String>, span: Span) -> Self {
        Self {
            class,
            text: text.into(),
            span,
        }
    }

    /// End-of-input marker at `span`
    pub fn eof(span: Span) -> Self {
        Self::new(TokenClass::Eof, "", span)
    }

    pub fn is_keyword(&self, keyword: &str) -> bool {
        self.class == TokenClass::Keyword && self.text == keyword
    }

    /// Operator or delimiter with the given text
    pub fn is_operator(&self, op: &str) -> bool {
        matches!(self.class, TokenClass::Operator | TokenClass::Delimiter) && self.text == op
    }

    pub fn is_eof(&self) -> bool {
        self.class == TokenClass::Eof
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.class {
            TokenClass::Eof => f.write_str("end of file"),
            TokenClass::String => write!(f, "string {:?}", self.text),
            TokenClass::Identifier => write!(f, "identifier `{}`", self.text),
            _ => write!(f, "`{}`", self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_matching_requires_class() {
        let kw = Token::new(TokenClass::Keyword, "let", Span::default());
        let string = Token::new(TokenClass::String, "let", Span::default());
        assert!(kw.is_keyword("let"));
        assert!(!string.is_keyword("let"));
        assert!(!string.is_operator("let"));
    }

    #[test]
    fn test_span_merge_keeps_first_position() {
        let a = Span::new(10, 12, 2, 5);
        let b = Span::new(3, 4, 1, 4);
        let merged = a.merge(&b);
        assert_eq!(merged, Span::new(3, 12, 1, 4));
    }

    #[test]
    fn test_reserved_words() {
        assert!(is_keyword("has"));
        assert!(is_keyword("typeof"));
        assert!(!is_keyword("number"));
    }
}
