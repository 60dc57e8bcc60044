//! Token stream consumed by the parser.
//!
//! A cursor over a `Vec<Token>` with bounded lookahead. Peeking past the end
//! always yields the trailing `Eof` token.

use crate::parser::error::ParseError;
use crate::token::{Span, Token, TokenClass};

#[derive(Debug, Clone)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
}

impl TokenStream {
    /// Wrap `tokens`, appending an `Eof` token when missing.
    pub fn new(mut tokens: Vec<Token>) -> Self {
        if !tokens.last().is_some_and(Token::is_eof) {
            let end = tokens
                .last()
                .map(|t| Span::new(t.span.end, t.span.end, t.span.line, t.span.column))
                .unwrap_or_default();
            tokens.push(Token::eof(end));
        }
        Self { tokens, pos: 0 }
    }

    /// Current token.
    #[inline]
    pub fn peek(&self) -> &Token {
        self.peek_at(0)
    }

    /// Token `n` positions ahead of the current one.
    pub fn peek_at(&self, n: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + n).min(last)]
    }

    /// Previously consumed token (or the current one at the start).
    pub fn previous(&self) -> &Token {
        &self.tokens[self.pos.saturating_sub(1)]
    }

    /// Consume and return the current token. `Eof` is never consumed.
    pub fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if !token.is_eof() {
            self.pos += 1;
        }
        token
    }

    #[inline]
    pub fn position(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn at_eof(&self) -> bool {
        self.peek().is_eof()
    }

    /// Location of the current token.
    pub fn span(&self) -> Span {
        self.peek().span
    }

    // ===== Matching (no consumption) =====

    pub fn match_class(&self, class: TokenClass) -> bool {
        self.peek().class == class
    }

    pub fn match_ahead(&self, class: TokenClass, n: usize) -> bool {
        self.peek_at(n).class == class
    }

    pub fn match_keyword(&self, keyword: &str) -> bool {
        self.peek().is_keyword(keyword)
    }

    pub fn match_keyword_ahead(&self, keyword: &str, n: usize) -> bool {
        self.peek_at(n).is_keyword(keyword)
    }

    /// Operator or delimiter with the given text.
    pub fn match_operator(&self, op: &str) -> bool {
        self.peek().is_operator(op)
    }

    pub fn match_operator_ahead(&self, op: &str, n: usize) -> bool {
        self.peek_at(n).is_operator(op)
    }

    // ===== Conditional consumption =====

    pub fn eat_keyword(&mut self, keyword: &str) -> bool {
        if self.match_keyword(keyword) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn eat_operator(&mut self, op: &str) -> bool {
        if self.match_operator(op) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    // ===== Expectation =====

    pub fn expect(&mut self, class: TokenClass) -> Result<Token, ParseError> {
        if self.match_class(class) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected_token(&class.to_string(), self.peek()))
        }
    }

    pub fn expect_keyword(&mut self, keyword: &str) -> Result<Token, ParseError> {
        if self.match_keyword(keyword) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected_token(&format!("`{}`", keyword), self.peek()))
        }
    }

    pub fn expect_operator(&mut self, op: &str) -> Result<Token, ParseError> {
        if self.match_operator(op) {
            Ok(self.advance())
        } else {
            Err(ParseError::unexpected_token(&format!("`{}`", op), self.peek()))
        }
    }

    /// Consume an identifier and return its text.
    pub fn expect_identifier(&mut self) -> Result<(String, Span), ParseError> {
        let token = self.expect(TokenClass::Identifier)?;
        Ok((token.text, token.span))
    }

    /// Split a `>>` or `>=` token so the leading `>` can close a generic
    /// argument list.
    pub fn split_angle(&mut self) -> bool {
        let token = self.peek().clone();
        if !(token.is_operator(">>") || token.is_operator(">=") || token.is_operator(">>=")) {
            return false;
        }
        let first = Span::new(
            token.span.start,
            token.span.start + 1,
            token.span.line,
            token.span.column,
        );
        let rest = Span::new(
            token.span.start + 1,
            token.span.end,
            token.span.line,
            token.span.column + 1,
        );
        self.tokens[self.pos] = Token::new(TokenClass::Operator, ">", first);
        self.tokens
            .insert(self.pos + 1, Token::new(TokenClass::Operator, &token.text[1..], rest));
        true
    }
}
