//! Compile-time constant values and operator evaluation.
//!
//! Numbers are IEEE doubles. Bitwise operators work on the value truncated
//! to a 32-bit integer, shift counts are masked to five bits.

use cinder_bytecode::{BinaryOp, UnaryOp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A value known at compile time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
}

impl ConstValue {
    pub fn truthy(&self) -> bool {
        match self {
            ConstValue::Null => false,
            ConstValue::Bool(b) => *b,
            ConstValue::Number(n) => *n != 0.0 && !n.is_nan(),
            ConstValue::String(s) => !s.is_empty(),
        }
    }

    /// Result of `typeof` on this value.
    pub fn type_name(&self) -> &'static str {
        match self {
            ConstValue::Null => "null",
            ConstValue::Bool(_) => "bool",
            ConstValue::Number(_) => "number",
            ConstValue::String(_) => "string",
        }
    }

    pub fn to_number(&self) -> f64 {
        match self {
            ConstValue::Null => 0.0,
            ConstValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            ConstValue::Number(n) => *n,
            ConstValue::String(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse().unwrap_or(f64::NAN)
                }
            }
        }
    }

    fn to_int32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        (n.trunc() as i64) as i32
    }
}

/// Render a number the way the language prints it (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

impl fmt::Display for ConstValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConstValue::Null => f.write_str("null"),
            ConstValue::Bool(b) => write!(f, "{}", b),
            ConstValue::Number(n) => f.write_str(&format_number(*n)),
            ConstValue::String(s) => f.write_str(s),
        }
    }
}

/// Evaluate a unary operator on a constant.
pub fn eval_unary(op: UnaryOp, value: &ConstValue) -> ConstValue {
    match op {
        UnaryOp::Neg => ConstValue::Number(-value.to_number()),
        UnaryOp::Plus => ConstValue::Number(value.to_number()),
        UnaryOp::Not => ConstValue::Bool(!value.truthy()),
        UnaryOp::BitNot => ConstValue::Number(!value.to_int32() as f64),
        UnaryOp::Typeof => ConstValue::String(value.type_name().to_string()),
    }
}

/// Evaluate a binary operator on two constants.
pub fn eval_binary(op: BinaryOp, lhs: &ConstValue, rhs: &ConstValue) -> ConstValue {
    use ConstValue::*;

    let num = |f: fn(f64, f64) -> f64| Number(f(lhs.to_number(), rhs.to_number()));
    let int = |f: fn(i32, i32) -> i32| Number(f(lhs.to_int32(), rhs.to_int32()) as f64);

    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (String(_), _) | (_, String(_)) => String(format!("{}{}", lhs, rhs)),
            _ => num(|a, b| a + b),
        },
        BinaryOp::Sub => num(|a, b| a - b),
        BinaryOp::Mul => num(|a, b| a * b),
        BinaryOp::Div => num(|a, b| a / b),
        BinaryOp::Mod => num(|a, b| a % b),
        BinaryOp::Pow => num(f64::powf),
        BinaryOp::Eq => Bool(strict_eq(lhs, rhs)),
        BinaryOp::Ne => Bool(!strict_eq(lhs, rhs)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (lhs, rhs) {
                (String(a), String(b)) => a.partial_cmp(b),
                _ => lhs.to_number().partial_cmp(&rhs.to_number()),
            };
            let result = match ordering {
                None => false,
                Some(ord) => match op {
                    BinaryOp::Lt => ord.is_lt(),
                    BinaryOp::Le => ord.is_le(),
                    BinaryOp::Gt => ord.is_gt(),
                    _ => ord.is_ge(),
                },
            };
            Bool(result)
        }
        BinaryOp::BitAnd => int(|a, b| a & b),
        BinaryOp::BitOr => int(|a, b| a | b),
        BinaryOp::BitXor => int(|a, b| a ^ b),
        BinaryOp::Shl => int(|a, b| a.wrapping_shl((b & 31) as u32)),
        BinaryOp::Shr => int(|a, b| a.wrapping_shr((b & 31) as u32)),
    }
}

fn strict_eq(lhs: &ConstValue, rhs: &ConstValue) -> bool {
    match (lhs, rhs) {
        (ConstValue::Number(a), ConstValue::Number(b)) => a == b,
        _ => lhs == rhs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(v: f64) -> ConstValue {
        ConstValue::Number(v)
    }

    #[test]
    fn test_arithmetic() {
        assert_eq!(eval_binary(BinaryOp::Add, &n(1.0), &n(2.0)), n(3.0));
        assert_eq!(eval_binary(BinaryOp::Pow, &n(2.0), &n(10.0)), n(1024.0));
        assert_eq!(eval_binary(BinaryOp::Mod, &n(7.0), &n(4.0)), n(3.0));
    }

    #[test]
    fn test_string_concatenation() {
        let s = ConstValue::String("i=".to_string());
        assert_eq!(
            eval_binary(BinaryOp::Add, &s, &n(3.0)),
            ConstValue::String("i=3".to_string())
        );
    }

    #[test]
    fn test_comparisons() {
        assert_eq!(eval_binary(BinaryOp::Gt, &n(3.0), &n(2.0)), ConstValue::Bool(true));
        assert_eq!(
            eval_binary(BinaryOp::Lt, &n(f64::NAN), &n(2.0)),
            ConstValue::Bool(false)
        );
        assert_eq!(
            eval_binary(BinaryOp::Eq, &ConstValue::Null, &ConstValue::Null),
            ConstValue::Bool(true)
        );
        assert_eq!(
            eval_binary(BinaryOp::Eq, &n(1.0), &ConstValue::Bool(true)),
            ConstValue::Bool(false)
        );
    }

    #[test]
    fn test_bitwise_truncates() {
        assert_eq!(eval_binary(BinaryOp::BitOr, &n(5.7), &n(2.0)), n(7.0));
        assert_eq!(eval_binary(BinaryOp::Shl, &n(1.0), &n(33.0)), n(2.0));
        assert_eq!(eval_unary(UnaryOp::BitNot, &n(0.0)), n(-1.0));
    }

    #[test]
    fn test_truthiness_and_typeof() {
        assert!(!ConstValue::String(String::new()).truthy());
        assert!(n(-1.0).truthy());
        assert_eq!(
            eval_unary(UnaryOp::Typeof, &ConstValue::Bool(true)),
            ConstValue::String("bool".to_string())
        );
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(2.5), "2.5");
        assert_eq!(format_number(-0.0), "0");
    }
}
