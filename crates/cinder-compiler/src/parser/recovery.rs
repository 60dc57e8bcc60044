//! Error recovery strategies for the parser.
//!
//! When the parser encounters an error, it skips tokens until statement
//! parsing can resume, so one pass reports as many errors as possible.

use super::Parser;
use crate::token::TokenClass;

/// Keywords that begin a statement.
const STATEMENT_KEYWORDS: &[&str] = &[
    "let", "const", "function", "type", "enum", "if", "while", "do", "for", "break", "continue",
    "return", "throw", "try", "import", "export",
];

/// Synchronize to the next statement boundary.
///
/// Consumes a terminating `;`. Stops before a statement keyword, or before a
/// `}` that closes an enclosing block. Skips at least one token when the
/// failed statement consumed nothing.
pub fn sync_to_statement_boundary(parser: &mut Parser, statement_start: usize) {
    if parser.stream.position() == statement_start {
        parser.stream.advance();
    }

    while !parser.stream.at_eof() {
        if parser.stream.eat_operator(";") {
            return;
        }
        if parser.stream.match_operator("}") {
            if parser.block_depth == 0 {
                parser.stream.advance();
                continue;
            }
            return;
        }
        if at_statement_keyword(parser) {
            return;
        }
        parser.stream.advance();
    }
}

fn at_statement_keyword(parser: &Parser) -> bool {
    let token = parser.stream.peek();
    token.class == TokenClass::Keyword && STATEMENT_KEYWORDS.contains(&token.text.as_str())
}
