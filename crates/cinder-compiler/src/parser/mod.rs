//! Recursive-descent parser for Cinder.
//!
//! Statements dispatch on keyword lookahead; expressions use precedence
//! climbing over the table in [`precedence`]. Errors never abort the parse:
//! each one is recorded, the parser resynchronizes at the next statement
//! boundary, and parsing continues.

pub mod error;
mod expr;
pub mod precedence;
mod recovery;
mod stmt;
mod types;

pub use error::{ParseError, ParseErrorKind};

use crate::ast::Stmt;
use crate::lexer::tokenize;
use crate::stream::TokenStream;
use crate::token::Token;

/// Maximum nesting depth before rejecting parse
pub const MAX_PARSE_DEPTH: usize = 64;

/// Maximum depth of an expression tree, counting the left-nested links
/// that operator and suffix chains build without recursing.
pub const MAX_EXPRESSION_DEPTH: usize = 128;

/// Context flags for the shared expression entry point.
///
/// Each flag suppresses one construct so the same parser can be reused for
/// argument lists, generic argument lists, index contexts and `new`
/// prototype expressions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExprFlags {
    /// `a, b` sequences
    pub no_comma: bool,
    /// `x => ...` arrow functions
    pub no_fat_arrow: bool,
    /// `<` / `>` as relational operators
    pub no_angle: bool,
    /// `a[i]` index suffixes
    pub no_square: bool,
    /// `f(x)` call suffixes
    pub no_paren: bool,
    /// `c ? a : b`
    pub no_ternary: bool,
}

impl ExprFlags {
    pub const NONE: ExprFlags = ExprFlags {
        no_comma: false,
        no_fat_arrow: false,
        no_angle: false,
        no_square: false,
        no_paren: false,
        no_ternary: false,
    };

    /// Context for a single list element: arguments, array items, property
    /// values, initializers.
    pub const ELEMENT: ExprFlags = ExprFlags {
        no_comma: true,
        ..ExprFlags::NONE
    };

    /// Context for the prototype operand of `new`: the first `(` starts the
    /// constructor arguments and `<` always opens type arguments.
    pub const PROTOTYPE: ExprFlags = ExprFlags {
        no_comma: true,
        no_fat_arrow: true,
        no_angle: true,
        no_square: true,
        no_paren: true,
        no_ternary: true,
    };

    /// Flags that stay in effect for nested operands. Only `no_comma`
    /// carries over; the others apply to the outermost level only.
    fn operand(self) -> ExprFlags {
        ExprFlags {
            no_comma: true,
            ..self
        }
    }
}

/// Parser state.
pub struct Parser {
    pub(crate) stream: TokenStream,
    errors: Vec<ParseError>,
    depth: usize,
    /// Links added by the innermost open operator or suffix chains.
    links: usize,
    /// Open `{ ... }` statement blocks, used by recovery.
    pub(crate) block_depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            stream: TokenStream::new(tokens),
            errors: Vec::new(),
            depth: 0,
            links: 0,
            block_depth: 0,
        }
    }

    /// Parse a whole program. Always returns every statement that parsed
    /// plus every error encountered.
    pub fn parse_program(mut self) -> (Vec<Stmt>, Vec<ParseError>) {
        let mut stmts = Vec::new();
        while !self.stream.at_eof() {
            if let Some(stmt) = self.parse_statement_recovering() {
                stmts.push(stmt);
            }
        }
        tracing::debug!(
            statements = stmts.len(),
            errors = self.errors.len(),
            "parsed program"
        );
        (stmts, self.errors)
    }

    /// Parse one statement; on failure record the error and resynchronize.
    pub(crate) fn parse_statement_recovering(&mut self) -> Option<Stmt> {
        let start = self.stream.position();
        match self.parse_statement() {
            Ok(stmt) => Some(stmt),
            Err(error) => {
                self.errors.push(error);
                recovery::sync_to_statement_boundary(self, start);
                None
            }
        }
    }

    /// Run `f` one nesting level deeper, failing instead of overflowing the
    /// native stack on pathological input.
    pub(crate) fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        if self.depth >= MAX_PARSE_DEPTH {
            return Err(ParseError::nesting_too_deep(
                MAX_PARSE_DEPTH,
                self.stream.span(),
            ));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Run a chain-building loop. Each [`Parser::link`] inside it counts
    /// as one level of tree depth until the loop returns.
    pub(crate) fn chain<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ParseError>,
    ) -> Result<T, ParseError> {
        let links = self.links;
        let result = f(self);
        self.links = links;
        result
    }

    /// Account for one more left-nested node in the current chain.
    pub(crate) fn link(&mut self) -> Result<(), ParseError> {
        if self.depth + self.links >= MAX_EXPRESSION_DEPTH {
            return Err(ParseError::nesting_too_deep(
                MAX_EXPRESSION_DEPTH,
                self.stream.span(),
            ));
        }
        self.links += 1;
        Ok(())
    }

    /// Record an error without aborting the current construct.
    pub(crate) fn report(&mut self, error: ParseError) {
        self.errors.push(error);
    }
}

/// Tokenize and parse `source`. Lexer errors are reported as parse errors.
pub fn parse_source(source: &str) -> (Vec<Stmt>, Vec<ParseError>) {
    let (tokens, lex_errors) = tokenize(source);
    let (stmts, parse_errors) = Parser::new(tokens).parse_program();
    let mut errors: Vec<ParseError> = lex_errors.into_iter().map(ParseError::lex).collect();
    errors.extend(parse_errors);
    (stmts, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{ExprKind, StmtKind};

    fn parse_ok(source: &str) -> Vec<Stmt> {
        let (stmts, errors) = parse_source(source);
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        stmts
    }

    #[test]
    fn test_empty_program() {
        assert!(parse_ok("").is_empty());
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let source = format!("let x = {}1{};", "(".repeat(200), ")".repeat(200));
        let (_, errors) = parse_source(&source);
        assert!(errors
            .iter()
            .any(|e| e.kind == ParseErrorKind::NestingTooDeep));
    }

    #[test]
    fn test_long_operator_chain_is_rejected() {
        let source = format!("let x = 1; let r = x{}; let ok = 2;", " + x".repeat(10_000));
        let (stmts, errors) = parse_source(&source);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, ParseErrorKind::NestingTooDeep);
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_long_member_chain_is_rejected() {
        let source = format!("let r = o{};", ".a".repeat(10_000));
        let (_, errors) = parse_source(&source);
        assert_eq!(errors[0].kind, ParseErrorKind::NestingTooDeep);

        let source = format!("let r = f{};", "()".repeat(10_000));
        let (_, errors) = parse_source(&source);
        assert_eq!(errors[0].kind, ParseErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_moderate_chain_is_accepted() {
        parse_ok(&format!("let r = x{};", " + x".repeat(100)));
    }

    #[test]
    fn test_lex_errors_are_reported() {
        let (stmts, errors) = parse_source("let a = 1; # let b = 2;");
        assert!(matches!(errors[0].kind, ParseErrorKind::Lex(_)));
        assert_eq!(stmts.len(), 2);
    }

    #[test]
    fn test_expression_statement() {
        let stmts = parse_ok("f(1, 2);");
        match &stmts[0].kind {
            StmtKind::Expression(expr) => {
                assert!(matches!(expr.kind, ExprKind::Call { .. }));
            }
            other => panic!("expected expression statement, got {:?}", other),
        }
    }
}
