//! Type annotations, generic parameter lists and parameter lists.

use super::{ParseError, Parser};
use crate::ast::{GenericParam, Param, TypeAnnotation};
use crate::token::TokenClass;

impl Parser {
    /// `Name`, `Name<T, U>`, `function` or `null`.
    pub(crate) fn parse_type_annotation(&mut self) -> Result<TypeAnnotation, ParseError> {
        self.nested(|p| {
            let token = p.stream.peek().clone();
            let name = match token.class {
                TokenClass::Identifier => token.text,
                TokenClass::Keyword if token.text == "function" || token.text == "null" => {
                    token.text
                }
                _ => return Err(ParseError::unexpected_token("type", &token)),
            };
            p.stream.advance();

            let args = if p.stream.match_operator("<") {
                p.parse_type_arguments()?
            } else {
                Vec::new()
            };
            let span = token.span.merge(&p.stream.previous().span);
            Ok(TypeAnnotation { name, args, span })
        })
    }

    /// `< type, ... >`. A trailing `>>` is split so nested lists close.
    pub(crate) fn parse_type_arguments(&mut self) -> Result<Vec<TypeAnnotation>, ParseError> {
        self.stream.expect_operator("<")?;
        let mut args = vec![self.parse_type_annotation()?];
        while self.stream.eat_operator(",") {
            args.push(self.parse_type_annotation()?);
        }
        self.close_angle()?;
        Ok(args)
    }

    /// Optional `<T, U>` after a declaration name.
    pub(crate) fn parse_generic_params(&mut self) -> Result<Vec<GenericParam>, ParseError> {
        if !self.stream.eat_operator("<") {
            return Ok(Vec::new());
        }
        let mut params = Vec::new();
        loop {
            let (name, span) = self.stream.expect_identifier()?;
            if params.iter().any(|p: &GenericParam| p.name == name) {
                self.report(ParseError::invalid_syntax(
                    format!("duplicate type parameter `{}`", name),
                    span,
                ));
            }
            params.push(GenericParam { name, span });
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        self.close_angle()?;
        Ok(params)
    }

    fn close_angle(&mut self) -> Result<(), ParseError> {
        self.stream.split_angle();
        self.stream.expect_operator(">")?;
        Ok(())
    }

    /// `( name (: type)?, ... )`
    pub(crate) fn parse_params(&mut self) -> Result<Vec<Param>, ParseError> {
        self.stream.expect_operator("(")?;
        let mut params = Vec::new();
        while !self.stream.match_operator(")") {
            let (name, span) = self.stream.expect_identifier()?;
            let annotation = if self.stream.eat_operator(":") {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            params.push(Param {
                name,
                annotation,
                span,
                ident: None,
            });
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        self.stream.expect_operator(")")?;
        Ok(params)
    }
}
