//! Operator precedence table for expression parsing.
//!
//! Binary operators are looked up by their source text. Levels follow
//! JavaScript, with `has` sitting alongside the relational operators.
//! Assignment and `?:` are handled by dedicated parse functions above the
//! precedence-climbing core.

use crate::ast::{BinaryOp, LogicalOp};
use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;

/// Operator precedence level (higher = tighter binding).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
    None = 0,
    LogicalOr = 1,      // ||
    LogicalAnd = 2,     // &&
    BitwiseOr = 3,      // |
    BitwiseXor = 4,     // ^
    BitwiseAnd = 5,     // &
    Equality = 6,       // ==, !=
    Relational = 7,     // <, >, <=, >=, has
    Shift = 8,          // <<, >>
    Additive = 9,       // +, -
    Multiplicative = 10, // *, /, %
    Exponent = 11,      // **
}

impl Precedence {
    /// The next tighter level, used for the right operand of
    /// left-associative operators.
    pub fn next(self) -> Precedence {
        match self {
            Precedence::None => Precedence::LogicalOr,
            Precedence::LogicalOr => Precedence::LogicalAnd,
            Precedence::LogicalAnd => Precedence::BitwiseOr,
            Precedence::BitwiseOr => Precedence::BitwiseXor,
            Precedence::BitwiseXor => Precedence::BitwiseAnd,
            Precedence::BitwiseAnd => Precedence::Equality,
            Precedence::Equality => Precedence::Relational,
            Precedence::Relational => Precedence::Shift,
            Precedence::Shift => Precedence::Additive,
            Precedence::Additive => Precedence::Multiplicative,
            Precedence::Multiplicative | Precedence::Exponent => Precedence::Exponent,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Associativity {
    Left,
    Right,
}

/// What a binary operator token builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatorKind {
    Binary(BinaryOp),
    Logical(LogicalOp),
    /// `object has name`
    Has,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperatorInfo {
    pub precedence: Precedence,
    pub associativity: Associativity,
    pub kind: OperatorKind,
}

static BINARY_OPERATORS: Lazy<FxHashMap<&'static str, OperatorInfo>> = Lazy::new(|| {
    use Associativity::*;
    use OperatorKind::*;
    use Precedence::*;

    let entries: [(&str, Precedence, Associativity, OperatorKind); 20] = [
        ("||", LogicalOr, Left, Logical(LogicalOp::Or)),
        ("&&", LogicalAnd, Left, Logical(LogicalOp::And)),
        ("|", BitwiseOr, Left, Binary(BinaryOp::BitOr)),
        ("^", BitwiseXor, Left, Binary(BinaryOp::BitXor)),
        ("&", BitwiseAnd, Left, Binary(BinaryOp::BitAnd)),
        ("==", Equality, Left, Binary(BinaryOp::Eq)),
        ("!=", Equality, Left, Binary(BinaryOp::Ne)),
        ("<", Relational, Left, Binary(BinaryOp::Lt)),
        ("<=", Relational, Left, Binary(BinaryOp::Le)),
        (">", Relational, Left, Binary(BinaryOp::Gt)),
        (">=", Relational, Left, Binary(BinaryOp::Ge)),
        ("has", Relational, Left, Has),
        ("<<", Shift, Left, Binary(BinaryOp::Shl)),
        (">>", Shift, Left, Binary(BinaryOp::Shr)),
        ("+", Additive, Left, Binary(BinaryOp::Add)),
        ("-", Additive, Left, Binary(BinaryOp::Sub)),
        ("*", Multiplicative, Left, Binary(BinaryOp::Mul)),
        ("/", Multiplicative, Left, Binary(BinaryOp::Div)),
        ("%", Multiplicative, Left, Binary(BinaryOp::Mod)),
        ("**", Exponent, Right, Binary(BinaryOp::Pow)),
    ];

    entries
        .into_iter()
        .map(|(text, precedence, associativity, kind)| {
            (
                text,
                OperatorInfo {
                    precedence,
                    associativity,
                    kind,
                },
            )
        })
        .collect()
});

/// Look up a binary operator by its text.
pub fn binary_operator(text: &str) -> Option<OperatorInfo> {
    BINARY_OPERATORS.get(text).copied()
}

/// Compound assignment operator (`+=` → `Add`); `None` for anything else.
pub fn compound_assignment(text: &str) -> Option<BinaryOp> {
    Some(match text {
        "+=" => BinaryOp::Add,
        "-=" => BinaryOp::Sub,
        "*=" => BinaryOp::Mul,
        "/=" => BinaryOp::Div,
        "%=" => BinaryOp::Mod,
        "**=" => BinaryOp::Pow,
        "&=" => BinaryOp::BitAnd,
        "|=" => BinaryOp::BitOr,
        "^=" => BinaryOp::BitXor,
        "<<=" => BinaryOp::Shl,
        ">>=" => BinaryOp::Shr,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence_ordering() {
        let add = binary_operator("+").unwrap();
        let mul = binary_operator("*").unwrap();
        let and = binary_operator("&&").unwrap();
        assert!(mul.precedence > add.precedence);
        assert!(add.precedence > and.precedence);
    }

    #[test]
    fn test_has_is_relational() {
        let has = binary_operator("has").unwrap();
        assert_eq!(has.precedence, binary_operator("<").unwrap().precedence);
        assert_eq!(has.kind, OperatorKind::Has);
    }

    #[test]
    fn test_exponent_is_right_associative() {
        assert_eq!(
            binary_operator("**").unwrap().associativity,
            Associativity::Right
        );
        assert_eq!(binary_operator("-").unwrap().associativity, Associativity::Left);
    }

    #[test]
    fn test_unknown_and_compound() {
        assert!(binary_operator("=").is_none());
        assert_eq!(compound_assignment("<<="), Some(BinaryOp::Shl));
        assert_eq!(compound_assignment("=="), None);
    }
}
