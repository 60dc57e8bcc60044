//! Expression parsing.
//!
//! Assignment and `?:` sit above a precedence-climbing core for binary
//! operators. Suffixes (member access, indexing, calls, generic calls) are
//! handled in one loop so `ExprFlags` can switch each of them off.

use super::precedence::{
    binary_operator, compound_assignment, Associativity, OperatorInfo, OperatorKind, Precedence,
};
use super::{ExprFlags, ParseError, Parser};
use crate::ast::*;
use crate::token::{Span, TokenClass};

/// Upper bound on tokens inspected by the arrow and generic-call scans.
const LOOKAHEAD_LIMIT: usize = 64;

impl Parser {
    /// Parse an expression under `flags`.
    pub(crate) fn parse_expression(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        let first = self.parse_assignment(flags)?;
        if flags.no_comma || !self.stream.match_operator(",") {
            return Ok(first);
        }

        let mut span = first.span;
        let mut items = vec![first];
        while self.stream.eat_operator(",") {
            let item = self.parse_assignment(flags.operand())?;
            span = span.merge(&item.span);
            items.push(item);
        }
        Ok(Expr::new(ExprKind::Sequence(items), span))
    }

    fn parse_assignment(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        self.nested(|p| {
            if !flags.no_fat_arrow && p.at_arrow() {
                return p.parse_arrow();
            }

            let target = p.parse_ternary(flags)?;

            let token = p.stream.peek();
            if token.class != TokenClass::Operator {
                return Ok(target);
            }
            let op = if token.text == "=" {
                None
            } else if let Some(op) = compound_assignment(&token.text) {
                Some(op)
            } else {
                return Ok(target);
            };
            p.stream.advance();

            let value = p.parse_assignment(flags.operand())?;
            let span = target.span.merge(&value.span);
            Ok(Expr::new(
                ExprKind::Assign {
                    op,
                    target: Box::new(target),
                    value: Box::new(value),
                },
                span,
            ))
        })
    }

    fn parse_ternary(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        let cond = self.parse_binary(Precedence::LogicalOr, flags)?;
        if flags.no_ternary || !self.stream.eat_operator("?") {
            return Ok(cond);
        }

        let then_expr = self.parse_assignment(ExprFlags::ELEMENT)?;
        self.stream.expect_operator(":")?;
        let else_expr = self.parse_assignment(flags.operand())?;
        let span = cond.span.merge(&else_expr.span);
        Ok(Expr::new(
            ExprKind::Ternary {
                cond: Box::new(cond),
                then_expr: Box::new(then_expr),
                else_expr: Box::new(else_expr),
            },
            span,
        ))
    }

    fn parse_binary(&mut self, min: Precedence, flags: ExprFlags) -> Result<Expr, ParseError> {
        self.chain(|p| p.parse_binary_chain(min, flags))
    }

    fn parse_binary_chain(&mut self, min: Precedence, flags: ExprFlags) -> Result<Expr, ParseError> {
        let mut lhs = self.parse_unary(flags)?;

        loop {
            let token = self.stream.peek();
            let text = match token.class {
                TokenClass::Operator => token.text.as_str(),
                TokenClass::Keyword if token.text == "has" => "has",
                _ => break,
            };
            if flags.no_angle && matches!(text, "<" | ">" | "<=" | ">=") {
                break;
            }
            let Some(info) = binary_operator(text) else {
                break;
            };
            if info.precedence < min {
                break;
            }
            self.link()?;
            self.stream.advance();

            lhs = match info.kind {
                OperatorKind::Has => {
                    let (name, name_span) = self.parse_property_name()?;
                    let span = lhs.span.merge(&name_span);
                    Expr::new(
                        ExprKind::Has {
                            object: Box::new(lhs),
                            name,
                        },
                        span,
                    )
                }
                OperatorKind::Binary(op) => {
                    let rhs = self.parse_right_operand(info, flags)?;
                    let span = lhs.span.merge(&rhs.span);
                    Expr::new(
                        ExprKind::Binary {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    )
                }
                OperatorKind::Logical(op) => {
                    let rhs = self.parse_right_operand(info, flags)?;
                    let span = lhs.span.merge(&rhs.span);
                    Expr::new(
                        ExprKind::Logical {
                            op,
                            lhs: Box::new(lhs),
                            rhs: Box::new(rhs),
                        },
                        span,
                    )
                }
            };
        }

        Ok(lhs)
    }

    fn parse_right_operand(
        &mut self,
        info: OperatorInfo,
        flags: ExprFlags,
    ) -> Result<Expr, ParseError> {
        let min = match info.associativity {
            Associativity::Left => info.precedence.next(),
            Associativity::Right => info.precedence,
        };
        self.nested(|p| p.parse_binary(min, flags.operand()))
    }

    fn parse_unary(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        let token = self.stream.peek().clone();

        if token.is_keyword("typeof") {
            self.stream.advance();
            let operand = self.nested(|p| p.parse_unary(flags.operand()))?;
            let span = token.span.merge(&operand.span);
            return Ok(Expr::new(ExprKind::Typeof(Box::new(operand)), span));
        }

        if token.class == TokenClass::Operator {
            let op = match token.text.as_str() {
                "!" => Some(UnaryOp::Not),
                "-" => Some(UnaryOp::Neg),
                "+" => Some(UnaryOp::Plus),
                "~" => Some(UnaryOp::BitNot),
                _ => None,
            };
            if let Some(op) = op {
                self.stream.advance();
                let operand = self.nested(|p| p.parse_unary(flags.operand()))?;
                let span = token.span.merge(&operand.span);
                return Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    span,
                ));
            }

            let update = match token.text.as_str() {
                "++" => Some(UpdateOp::Increment),
                "--" => Some(UpdateOp::Decrement),
                _ => None,
            };
            if let Some(op) = update {
                self.stream.advance();
                let target = self.nested(|p| p.parse_unary(flags.operand()))?;
                let span = token.span.merge(&target.span);
                return Ok(Expr::new(
                    ExprKind::Update {
                        op,
                        prefix: true,
                        target: Box::new(target),
                    },
                    span,
                ));
            }
        }

        self.parse_postfix(flags)
    }

    fn parse_postfix(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        let expr = self.parse_suffixes(flags)?;

        let op = if self.stream.match_operator("++") {
            UpdateOp::Increment
        } else if self.stream.match_operator("--") {
            UpdateOp::Decrement
        } else {
            return Ok(expr);
        };
        let end = self.stream.advance().span;
        let span = expr.span.merge(&end);
        Ok(Expr::new(
            ExprKind::Update {
                op,
                prefix: false,
                target: Box::new(expr),
            },
            span,
        ))
    }

    /// Primary expression followed by `.name`, `[index]`, `(args)` and
    /// `<types>(args)` suffixes.
    fn parse_suffixes(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        self.chain(|p| p.parse_suffix_chain(flags))
    }

    fn parse_suffix_chain(&mut self, flags: ExprFlags) -> Result<Expr, ParseError> {
        let mut expr = if self.stream.match_keyword("new") {
            self.parse_new()?
        } else {
            self.parse_primary()?
        };

        loop {
            if self.at_suffix(flags) {
                self.link()?;
            }
            if self.stream.eat_operator(".") {
                let (name, name_span) = self.parse_property_name()?;
                let span = expr.span.merge(&name_span);
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else if !flags.no_square && self.stream.eat_operator("[") {
                let index = self.parse_expression(ExprFlags::NONE)?;
                let end = self.stream.expect_operator("]")?.span;
                let span = expr.span.merge(&end);
                expr = Expr::new(
                    ExprKind::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    },
                    span,
                );
            } else if !flags.no_paren && self.stream.match_operator("(") {
                expr = self.finish_call(expr, Vec::new())?;
            } else if !flags.no_angle && self.stream.match_operator("<") && self.at_type_arguments()
            {
                let type_args = self.parse_type_arguments()?;
                if !flags.no_paren && self.stream.match_operator("(") {
                    expr = self.finish_call(expr, type_args)?;
                } else {
                    expr = self.into_type_ref(expr, type_args)?;
                }
            } else {
                break;
            }
        }

        Ok(expr)
    }

    /// Whether the token at the cursor starts a suffix under `flags`.
    fn at_suffix(&self, flags: ExprFlags) -> bool {
        self.stream.match_operator(".")
            || (!flags.no_square && self.stream.match_operator("["))
            || (!flags.no_paren && self.stream.match_operator("("))
            || (!flags.no_angle && self.stream.match_operator("<") && self.at_type_arguments())
    }

    fn finish_call(
        &mut self,
        callee: Expr,
        type_args: Vec<TypeAnnotation>,
    ) -> Result<Expr, ParseError> {
        let args = self.parse_arguments()?;
        let span = callee.span.merge(&self.stream.previous().span);
        Ok(Expr::new(
            ExprKind::Call {
                callee: Box::new(callee),
                type_args,
                args,
                yields_receiver: false,
            },
            span,
        ))
    }

    /// `Name<args>` used as a value.
    fn into_type_ref(
        &mut self,
        expr: Expr,
        args: Vec<TypeAnnotation>,
    ) -> Result<Expr, ParseError> {
        let span = expr.span.merge(&self.stream.previous().span);
        match expr.kind {
            ExprKind::Ident { name, .. } => Ok(Expr::new(
                ExprKind::TypeRef {
                    name,
                    args,
                    binding: None,
                },
                span,
            )),
            _ => Err(ParseError::invalid_syntax(
                "type arguments must follow a type name",
                span,
            )),
        }
    }

    /// `new Proto`, `new Proto(args)`, `new Box<T>(args)`.
    fn parse_new(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.expect_keyword("new")?.span;
        let prototype = self.nested(|p| p.parse_prototype_operand())?;
        let args = if self.stream.match_operator("(") {
            Some(self.parse_arguments()?)
        } else {
            None
        };
        let span = start.merge(&self.stream.previous().span);
        Ok(Expr::new(
            ExprKind::New {
                prototype: Box::new(prototype),
                args,
            },
            span,
        ))
    }

    fn parse_prototype_operand(&mut self) -> Result<Expr, ParseError> {
        self.chain(|p| p.parse_prototype_chain())
    }

    fn parse_prototype_chain(&mut self) -> Result<Expr, ParseError> {
        let mut expr = self.parse_primary()?;
        loop {
            if self.stream.match_operator(".") || self.stream.match_operator("<") {
                self.link()?;
            }
            if self.stream.eat_operator(".") {
                let (name, name_span) = self.parse_property_name()?;
                let span = expr.span.merge(&name_span);
                expr = Expr::new(
                    ExprKind::Member {
                        object: Box::new(expr),
                        name,
                    },
                    span,
                );
            } else if self.stream.match_operator("<") {
                let type_args = self.parse_type_arguments()?;
                expr = self.into_type_ref(expr, type_args)?;
            } else {
                return Ok(expr);
            }
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        let token = self.stream.peek().clone();
        let span = token.span;

        match token.class {
            TokenClass::Int => {
                self.stream.advance();
                let kind = match token.text.parse::<i64>() {
                    Ok(value) => ExprKind::Int(value),
                    Err(_) => match token.text.parse::<f64>() {
                        Ok(value) => ExprKind::Float(value),
                        Err(_) => return Err(ParseError::invalid_number(token.text, span)),
                    },
                };
                Ok(Expr::new(kind, span))
            }
            TokenClass::Float => {
                self.stream.advance();
                let value = token
                    .text
                    .parse::<f64>()
                    .map_err(|_| ParseError::invalid_number(token.text.clone(), span))?;
                Ok(Expr::new(ExprKind::Float(value), span))
            }
            TokenClass::String => {
                self.stream.advance();
                Ok(Expr::new(ExprKind::String(token.text), span))
            }
            TokenClass::Identifier => {
                self.stream.advance();
                Ok(Expr::new(
                    ExprKind::Ident {
                        name: token.text,
                        binding: None,
                    },
                    span,
                ))
            }
            TokenClass::Keyword => {
                let kind = match token.text.as_str() {
                    "true" => ExprKind::Bool(true),
                    "false" => ExprKind::Bool(false),
                    "null" => ExprKind::Null,
                    "this" => ExprKind::This,
                    "function" => {
                        let func = self.parse_function(false, false)?;
                        let span = func.span;
                        return Ok(Expr::new(ExprKind::Function(Box::new(func)), span));
                    }
                    "new" => return self.parse_new(),
                    _ => return Err(ParseError::unexpected_token("expression", &token)),
                };
                self.stream.advance();
                Ok(Expr::new(kind, span))
            }
            _ if token.is_operator("(") => {
                self.stream.advance();
                let inner = self.parse_expression(ExprFlags::NONE)?;
                self.stream.expect_operator(")")?;
                Ok(inner)
            }
            _ if token.is_operator("[") => self.parse_array(),
            _ if token.is_operator("{") => self.parse_object(),
            _ => Err(ParseError::unexpected_token("expression", &token)),
        }
    }

    fn parse_array(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.expect_operator("[")?.span;
        let mut items = Vec::new();
        while !self.stream.match_operator("]") {
            items.push(self.parse_assignment(ExprFlags::ELEMENT)?);
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        let end = self.stream.expect_operator("]")?.span;
        Ok(Expr::new(ExprKind::Array(items), start.merge(&end)))
    }

    fn parse_object(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.expect_operator("{")?.span;
        let mut props = Vec::new();
        while !self.stream.match_operator("}") {
            let token = self.stream.peek().clone();
            let key = match token.class {
                TokenClass::Identifier
                | TokenClass::Keyword
                | TokenClass::String
                | TokenClass::Int => token.text,
                _ => return Err(ParseError::unexpected_token("property name", &token)),
            };
            self.stream.advance();
            self.stream.expect_operator(":")?;
            let value = self.parse_assignment(ExprFlags::ELEMENT)?;
            props.push((key, value));
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        let end = self.stream.expect_operator("}")?.span;
        Ok(Expr::new(ExprKind::Object(props), start.merge(&end)))
    }

    /// `( expr, ... )` with an optional trailing comma.
    pub(crate) fn parse_arguments(&mut self) -> Result<Vec<Expr>, ParseError> {
        self.stream.expect_operator("(")?;
        let mut args = Vec::new();
        while !self.stream.match_operator(")") {
            args.push(self.parse_assignment(ExprFlags::ELEMENT)?);
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        self.stream.expect_operator(")")?;
        Ok(args)
    }

    /// Member name after `.` or `has`: identifiers, reserved words and
    /// string literals are all accepted.
    fn parse_property_name(&mut self) -> Result<(String, Span), ParseError> {
        let token = self.stream.peek().clone();
        match token.class {
            TokenClass::Identifier | TokenClass::Keyword | TokenClass::String => {
                self.stream.advance();
                Ok((token.text, token.span))
            }
            _ => Err(ParseError::unexpected_token("property name", &token)),
        }
    }

    // ========================================================================
    // Arrow functions
    // ========================================================================

    /// `x =>` or `( params ) =>` ahead.
    fn at_arrow(&self) -> bool {
        let s = &self.stream;
        if s.match_class(TokenClass::Identifier) {
            return s.match_operator_ahead("=>", 1);
        }
        if !s.match_operator("(") {
            return false;
        }
        for i in 1..LOOKAHEAD_LIMIT {
            let token = s.peek_at(i);
            if token.is_operator(")") {
                return s.match_operator_ahead("=>", i + 1);
            }
            let allowed = token.class == TokenClass::Identifier
                || token.is_keyword("function")
                || [",", ":", "<", ">", ">>"]
                    .iter()
                    .any(|op| token.is_operator(op));
            if !allowed {
                return false;
            }
        }
        false
    }

    fn parse_arrow(&mut self) -> Result<Expr, ParseError> {
        let start = self.stream.span();
        let params = if self.stream.match_class(TokenClass::Identifier) {
            let (name, span) = self.stream.expect_identifier()?;
            vec![Param {
                name,
                annotation: None,
                span,
                ident: None,
            }]
        } else {
            self.parse_params()?
        };
        self.stream.expect_operator("=>")?;

        let body = if self.stream.match_operator("{") {
            self.parse_block()?
        } else {
            let value = self.parse_assignment(ExprFlags::ELEMENT)?;
            let span = value.span;
            Block::new(vec![Stmt::new(StmtKind::Return(Some(value)), span)], span)
        };

        let span = start.merge(&body.span);
        let func = FunctionDecl {
            name: None,
            generics: Vec::new(),
            params,
            return_type: None,
            body,
            is_arrow: true,
            span,
            ident: None,
            is_method: false,
            ty: None,
        };
        Ok(Expr::new(ExprKind::Function(Box::new(func)), span))
    }

    // ========================================================================
    // Generic call detection
    // ========================================================================

    /// Whether the `<` at the cursor opens a type argument list: a balanced
    /// run of type names closed by `>` and followed by a token that cannot
    /// continue a relational expression.
    fn at_type_arguments(&self) -> bool {
        let s = &self.stream;
        let mut depth: i32 = 0;
        for i in 0..LOOKAHEAD_LIMIT {
            let token = s.peek_at(i);
            if token.is_operator("<") {
                depth += 1;
            } else if token.is_operator(">") {
                depth -= 1;
            } else if token.is_operator(">>") {
                depth -= 2;
            } else if token.class == TokenClass::Identifier
                || token.is_keyword("function")
                || token.is_keyword("null")
                || token.is_operator(",")
            {
                continue;
            } else {
                return false;
            }

            if depth < 0 {
                return false;
            }
            if depth == 0 {
                let next = s.peek_at(i + 1);
                return next.is_eof()
                    || ["(", ")", ";", ",", ".", "]", "}"]
                        .iter()
                        .any(|op| next.is_operator(op));
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::*;
    use crate::parser::parse_source;

    fn expr(source: &str) -> Expr {
        let (mut stmts, errors) = parse_source(&format!("{};", source));
        assert!(errors.is_empty(), "unexpected errors: {:?}", errors);
        match stmts.remove(0).kind {
            StmtKind::Expression(expr) => expr,
            other => panic!("expected expression, got {:?}", other),
        }
    }

    fn printed(source: &str) -> String {
        print_expr(&expr(source))
    }

    #[test]
    fn test_precedence() {
        assert_eq!(printed("1 + 2 * 3"), "(1 + (2 * 3))");
        assert_eq!(printed("a || b && c"), "(a || (b && c))");
        assert_eq!(printed("1 - 2 - 3"), "((1 - 2) - 3)");
        assert_eq!(printed("2 ** 3 ** 2"), "(2 ** (3 ** 2))");
    }

    #[test]
    fn test_has_operator() {
        assert_eq!(printed("o has $construct && x"), "((o has $construct) && x)");
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(printed("a = b += 1"), "(a = (b += 1))");
    }

    #[test]
    fn test_ternary_and_sequence() {
        assert_eq!(printed("a ? b : c ? d : e"), "(a ? b : (c ? d : e))");
        assert_eq!(printed("a, b"), "(a, b)");
    }

    #[test]
    fn test_unary_and_update() {
        assert_eq!(printed("-x++"), "(-(x++))");
        assert_eq!(printed("!typeof x"), "(!(typeof x))");
        assert_eq!(printed("++a.b"), "(++a.b)");
    }

    #[test]
    fn test_generic_call_vs_comparison() {
        match expr("id<number>(1)").kind {
            ExprKind::Call { type_args, .. } => assert_eq!(type_args[0].name, "number"),
            other => panic!("expected call, got {:?}", other),
        }
        assert!(matches!(expr("a < b").kind, ExprKind::Binary { .. }));
        assert!(matches!(expr("a < b > c").kind, ExprKind::Binary { .. }));
    }

    #[test]
    fn test_nested_generic_closes_shift() {
        match expr("make<Box<number>>()").kind {
            ExprKind::Call { type_args, .. } => {
                assert_eq!(type_args[0].name, "Box");
                assert_eq!(type_args[0].args[0].name, "number");
            }
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_type_ref_value() {
        assert!(matches!(
            expr("Box<string>").kind,
            ExprKind::TypeRef { ref name, .. } if name == "Box"
        ));
    }

    #[test]
    fn test_new_forms() {
        match expr("new Foo").kind {
            ExprKind::New { args, .. } => assert!(args.is_none()),
            other => panic!("expected new, got {:?}", other),
        }
        match expr("new Foo(1, 2).x").kind {
            ExprKind::Member { object, name } => {
                assert_eq!(name, "x");
                match object.kind {
                    ExprKind::New { args, .. } => assert_eq!(args.map(|a| a.len()), Some(2)),
                    other => panic!("expected new, got {:?}", other),
                }
            }
            other => panic!("expected member, got {:?}", other),
        }
        match expr("new Box<string>()").kind {
            ExprKind::New { prototype, args } => {
                assert!(matches!(prototype.kind, ExprKind::TypeRef { .. }));
                assert_eq!(args.map(|a| a.len()), Some(0));
            }
            other => panic!("expected new, got {:?}", other),
        }
        assert_eq!(printed("new ns.Point(1)"), "(new (ns.Point)(1))");
    }

    #[test]
    fn test_arrow_functions() {
        match expr("(a, b: number) => a + b").kind {
            ExprKind::Function(func) => {
                assert!(func.is_arrow);
                assert_eq!(func.params.len(), 2);
                assert!(matches!(func.body.stmts[0].kind, StmtKind::Return(Some(_))));
            }
            other => panic!("expected arrow, got {:?}", other),
        }
        assert!(matches!(expr("x => { return x; }").kind, ExprKind::Function(_)));
        assert!(matches!(expr("(a)").kind, ExprKind::Ident { .. }));
    }

    #[test]
    fn test_arrow_in_arguments() {
        match expr("map(xs, x => x * 2, 3)").kind {
            ExprKind::Call { args, .. } => assert_eq!(args.len(), 3),
            other => panic!("expected call, got {:?}", other),
        }
    }

    #[test]
    fn test_literals() {
        assert!(matches!(expr("42").kind, ExprKind::Int(42)));
        assert!(matches!(expr("99999999999999999999").kind, ExprKind::Float(_)));
        assert_eq!(printed("[1, 'a', null,]"), "[1, \"a\", null]");
        assert_eq!(printed("({ a: 1, \"b c\": 2 })"), "({ a: 1, \"b c\": 2 })");
    }

    #[test]
    fn test_index_and_member_chain() {
        assert_eq!(printed("a.b[c](d)"), "a.b[c](d)");
    }
}
