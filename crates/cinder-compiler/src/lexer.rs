//! Lexer adapter built on `logos`.
//!
//! Produces the `Vec<Token>` a [`TokenStream`](crate::stream::TokenStream)
//! is built from. Lexing never stops at the first bad character: errors are
//! collected and the offending input is skipped.

use crate::token::{is_keyword, Span, Token, TokenClass};
use logos::Logos;
use thiserror::Error;

/// Raw token produced by logos.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"/\*([^*]|\*+[^*/])*\*+/")]
enum RawToken {
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*")]
    Word,

    #[regex(r"[0-9]+")]
    Int,

    #[regex(r"[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?")]
    #[regex(r"[0-9]+[eE][+-]?[0-9]+")]
    Float,

    #[regex(r#""([^"\\\n]|\\.)*""#, parse_string)]
    #[regex(r"'([^'\\\n]|\\.)*'", parse_string)]
    Str(String),

    #[token("**=")]
    #[token("<<=")]
    #[token(">>=")]
    #[token("&&")]
    #[token("||")]
    #[token("==")]
    #[token("!=")]
    #[token("<=")]
    #[token(">=")]
    #[token("<<")]
    #[token(">>")]
    #[token("**")]
    #[token("++")]
    #[token("--")]
    #[token("+=")]
    #[token("-=")]
    #[token("*=")]
    #[token("/=")]
    #[token("%=")]
    #[token("&=")]
    #[token("|=")]
    #[token("^=")]
    #[token("=>")]
    #[token("+")]
    #[token("-")]
    #[token("*")]
    #[token("/")]
    #[token("%")]
    #[token("!")]
    #[token("~")]
    #[token("<")]
    #[token(">")]
    #[token("&")]
    #[token("|")]
    #[token("^")]
    #[token("=")]
    #[token("?")]
    #[token(":")]
    Operator,

    #[token("(")]
    #[token(")")]
    #[token("{")]
    #[token("}")]
    #[token("[")]
    #[token("]")]
    #[token(";")]
    #[token(",")]
    #[token(".")]
    Delimiter,
}

fn parse_string(lex: &mut logos::Lexer<'_, RawToken>) -> Option<String> {
    let s = lex.slice();
    unescape_string(&s[1..s.len() - 1])
}

fn unescape_string(s: &str) -> Option<String> {
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            result.push(c);
            continue;
        }
        match chars.next()? {
            'n' => result.push('\n'),
            'r' => result.push('\r'),
            't' => result.push('\t'),
            '0' => result.push('\0'),
            '\\' => result.push('\\'),
            '"' => result.push('"'),
            '\'' => result.push('\''),
            'u' => {
                let hex: String = chars.by_ref().take(4).collect();
                let code = u32::from_str_radix(&hex, 16).ok()?;
                result.push(char::from_u32(code)?);
            }
            _ => return None,
        }
    }
    Some(result)
}

/// Lexical errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LexError {
    #[error("unexpected character {ch:?} at {span}")]
    UnexpectedCharacter { ch: char, span: Span },

    #[error("invalid string literal at {span}")]
    InvalidString { span: Span },
}

impl LexError {
    pub fn span(&self) -> Span {
        match self {
            LexError::UnexpectedCharacter { span, .. } | LexError::InvalidString { span } => *span,
        }
    }
}

/// Maps byte offsets to 1-based line/column.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    fn span(&self, start: usize, end: usize) -> Span {
        let line = self.starts.partition_point(|&s| s <= start);
        let column = start - self.starts[line - 1] + 1;
        Span::new(start, end, line as u32, column as u32)
    }
}

/// Tokenize `source`, always ending with an `Eof` token.
pub fn tokenize(source: &str) -> (Vec<Token>, Vec<LexError>) {
    let index = LineIndex::new(source);
    let mut tokens = Vec::new();
    let mut errors = Vec::new();

    let mut lexer = RawToken::lexer(source);
    while let Some(result) = lexer.next() {
        let range = lexer.span();
        let span = index.span(range.start, range.end);
        let text = lexer.slice();
        match result {
            Ok(RawToken::Word) => {
                let class = if is_keyword(text) {
                    TokenClass::Keyword
                } else {
                    TokenClass::Identifier
                };
                tokens.push(Token::new(class, text, span));
            }
            Ok(RawToken::Int) => tokens.push(Token::new(TokenClass::Int, text, span)),
            Ok(RawToken::Float) => tokens.push(Token::new(TokenClass::Float, text, span)),
            Ok(RawToken::Str(value)) => tokens.push(Token::new(TokenClass::String, value, span)),
            Ok(RawToken::Operator) => tokens.push(Token::new(TokenClass::Operator, text, span)),
            Ok(RawToken::Delimiter) => tokens.push(Token::new(TokenClass::Delimiter, text, span)),
            Err(()) => {
                if text.starts_with('"') || text.starts_with('\'') {
                    errors.push(LexError::InvalidString { span });
                } else {
                    let ch = text.chars().next().unwrap_or('\0');
                    errors.push(LexError::UnexpectedCharacter { ch, span });
                }
            }
        }
    }

    tracing::trace!(tokens = tokens.len(), errors = errors.len(), "tokenized");
    tokens.push(Token::eof(index.span(source.len(), source.len())));
    (tokens, errors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classes(source: &str) -> Vec<(TokenClass, String)> {
        let (tokens, errors) = tokenize(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        tokens.into_iter().map(|t| (t.class, t.text)).collect()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        let toks = classes("let x = new Foo;");
        assert_eq!(toks[0], (TokenClass::Keyword, "let".to_string()));
        assert_eq!(toks[1], (TokenClass::Identifier, "x".to_string()));
        assert_eq!(toks[3], (TokenClass::Keyword, "new".to_string()));
        assert_eq!(toks.last().unwrap().0, TokenClass::Eof);
    }

    #[test]
    fn test_numbers() {
        let toks = classes("42 3.5 1e3");
        assert_eq!(toks[0].0, TokenClass::Int);
        assert_eq!(toks[1].0, TokenClass::Float);
        assert_eq!(toks[2].0, TokenClass::Float);
    }

    #[test]
    fn test_longest_operator_wins() {
        let toks = classes("a >>= b => c ** d");
        assert_eq!(toks[1].1, ">>=");
        assert_eq!(toks[3].1, "=>");
        assert_eq!(toks[5].1, "**");
    }

    #[test]
    fn test_string_escapes() {
        let toks = classes(r#""a\n\"b\"" 'c'"#);
        assert_eq!(toks[0], (TokenClass::String, "a\n\"b\"".to_string()));
        assert_eq!(toks[1], (TokenClass::String, "c".to_string()));
    }

    #[test]
    fn test_comments_skipped() {
        let toks = classes("a // line\n/* block\n */ b");
        assert_eq!(toks.len(), 3);
        assert_eq!(toks[1].1, "b");
    }

    #[test]
    fn test_line_and_column() {
        let (tokens, _) = tokenize("let a;\n  b;");
        let b = &tokens[3];
        assert_eq!(b.text, "b");
        assert_eq!((b.span.line, b.span.column), (2, 3));
    }

    #[test]
    fn test_unexpected_character_is_collected() {
        let (tokens, errors) = tokenize("a # b");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            errors[0],
            LexError::UnexpectedCharacter { ch: '#', .. }
        ));
        assert_eq!(tokens.len(), 3);
    }
}
