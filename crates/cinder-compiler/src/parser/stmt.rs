//! Statement and declaration parsing.

use super::{ExprFlags, ParseError, Parser};
use crate::ast::*;
use crate::token::{Span, TokenClass};

impl Parser {
    pub(crate) fn parse_statement(&mut self) -> Result<Stmt, ParseError> {
        self.nested(|p| p.parse_statement_inner())
    }

    fn parse_statement_inner(&mut self) -> Result<Stmt, ParseError> {
        let token = self.stream.peek().clone();
        let start = token.span;

        if token.class == TokenClass::Keyword {
            match token.text.as_str() {
                "let" => return self.parse_let(),
                "const" => return self.parse_const(),
                "function" if self.stream.match_ahead(TokenClass::Identifier, 1) => {
                    let func = self.parse_function(true, false)?;
                    let span = func.span;
                    return Ok(Stmt::new(StmtKind::Function(func), span));
                }
                "type" => return self.parse_type_declaration(),
                "enum" => return self.parse_enum(),
                "if" => return self.parse_if(),
                "while" => return self.parse_while(),
                "do" => return self.parse_do_while(),
                "for" => return self.parse_for(),
                "break" | "continue" => {
                    self.stream.advance();
                    self.stream.expect_operator(";")?;
                    let kind = if token.text == "break" {
                        StmtKind::Break
                    } else {
                        StmtKind::Continue
                    };
                    return Ok(Stmt::new(kind, self.span_from(start)));
                }
                "return" => {
                    self.stream.advance();
                    let value = if self.stream.match_operator(";") {
                        None
                    } else {
                        Some(self.parse_expression(ExprFlags::NONE)?)
                    };
                    self.stream.expect_operator(";")?;
                    return Ok(Stmt::new(StmtKind::Return(value), self.span_from(start)));
                }
                "throw" => {
                    self.stream.advance();
                    let value = self.parse_expression(ExprFlags::NONE)?;
                    self.stream.expect_operator(";")?;
                    return Ok(Stmt::new(StmtKind::Throw(value), self.span_from(start)));
                }
                "try" => return self.parse_try(),
                "import" => return self.parse_import(),
                "export" => return self.parse_export(),
                _ => {}
            }
        }

        if token.is_operator("{") {
            let block = self.parse_block()?;
            let span = block.span;
            return Ok(Stmt::new(StmtKind::Block(block), span));
        }
        if self.stream.eat_operator(";") {
            return Ok(Stmt::new(StmtKind::Empty, start));
        }

        let expr = self.parse_expression(ExprFlags::NONE)?;
        self.stream.expect_operator(";")?;
        Ok(Stmt::new(StmtKind::Expression(expr), self.span_from(start)))
    }

    /// Span from `start` through the last consumed token.
    fn span_from(&self, start: Span) -> Span {
        start.merge(&self.stream.previous().span)
    }

    /// `{ stmt* }`. Statements inside recover individually.
    pub(crate) fn parse_block(&mut self) -> Result<Block, ParseError> {
        self.nested(|p| {
            let start = p.stream.expect_operator("{")?.span;
            p.block_depth += 1;
            let mut stmts = Vec::new();
            while !p.stream.match_operator("}") && !p.stream.at_eof() {
                if let Some(stmt) = p.parse_statement_recovering() {
                    stmts.push(stmt);
                }
            }
            p.block_depth -= 1;
            p.stream.expect_operator("}")?;
            Ok(Block::new(stmts, p.span_from(start)))
        })
    }

    // ========================================================================
    // Variables
    // ========================================================================

    fn parse_let(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("let")?.span;
        let decl = self.parse_var_decl(false)?;
        self.stream.expect_operator(";")?;
        Ok(Stmt::new(StmtKind::Let(decl), self.span_from(start)))
    }

    fn parse_const(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("const")?.span;
        let decl = self.parse_var_decl(true)?;
        self.stream.expect_operator(";")?;
        Ok(Stmt::new(StmtKind::Const(decl), self.span_from(start)))
    }

    /// Declaration body after `let`/`const`, without the terminator.
    fn parse_var_decl(&mut self, is_const: bool) -> Result<VarDecl, ParseError> {
        let (name, name_span) = self.stream.expect_identifier()?;
        let annotation = if self.stream.eat_operator(":") {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let init = if self.stream.eat_operator("=") {
            Some(self.parse_expression(ExprFlags::ELEMENT)?)
        } else if is_const {
            return Err(ParseError::unexpected_token("`=`", self.stream.peek())
                .with_suggestion("constants must be initialized"));
        } else {
            None
        };
        Ok(VarDecl {
            name,
            name_span,
            annotation,
            init,
            ident: None,
        })
    }

    // ========================================================================
    // Functions and types
    // ========================================================================

    /// `function name? <T>? (params) (: type)? block`
    pub(crate) fn parse_function(
        &mut self,
        require_name: bool,
        is_method: bool,
    ) -> Result<FunctionDecl, ParseError> {
        let start = self.stream.expect_keyword("function")?.span;
        let name = if require_name || self.stream.match_class(TokenClass::Identifier) {
            Some(self.stream.expect_identifier()?.0)
        } else {
            None
        };
        let generics = self.parse_generic_params()?;
        let params = self.parse_params()?;
        let return_type = if self.stream.eat_operator(":") {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FunctionDecl {
            name,
            generics,
            params,
            return_type,
            span: start.merge(&body.span),
            body,
            is_arrow: false,
            ident: None,
            is_method,
            ty: None,
        })
    }

    /// `type Name<T> : Proto { ... }` or `type Name<T> = Target;`
    fn parse_type_declaration(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("type")?.span;
        let (name, _) = self.stream.expect_identifier()?;
        let generics = self.parse_generic_params()?;

        if self.stream.eat_operator("=") {
            let target = self.parse_type_annotation()?;
            self.stream.expect_operator(";")?;
            let span = self.span_from(start);
            return Ok(Stmt::new(
                StmtKind::Alias(AliasDecl {
                    name,
                    generics,
                    target,
                    span,
                }),
                span,
            ));
        }

        let prototype = if self.stream.eat_operator(":") {
            Some(self.parse_type_annotation()?)
        } else {
            None
        };

        self.stream.expect_operator("{")?;
        let mut members = Vec::new();
        let mut methods = Vec::new();
        while !self.stream.match_operator("}") && !self.stream.at_eof() {
            if self.stream.match_keyword("function") {
                methods.push(self.parse_function(true, true)?);
                continue;
            }
            let (member, span) = self.stream.expect_identifier()?;
            let annotation = if self.stream.eat_operator(":") {
                Some(self.parse_type_annotation()?)
            } else {
                None
            };
            let default = if self.stream.eat_operator("=") {
                Some(self.parse_expression(ExprFlags::ELEMENT)?)
            } else {
                None
            };
            self.stream.expect_operator(";")?;
            members.push(MemberDecl {
                name: member,
                annotation,
                default,
                span: span.merge(&self.stream.previous().span),
            });
        }
        self.stream.expect_operator("}")?;

        let span = self.span_from(start);
        Ok(Stmt::new(
            StmtKind::TypeDecl(TypeDecl {
                name,
                generics,
                prototype,
                members,
                methods,
                span,
                ty: None,
            }),
            span,
        ))
    }

    /// `enum Name { A, B = 4, }`
    fn parse_enum(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("enum")?.span;
        let (name, _) = self.stream.expect_identifier()?;
        self.stream.expect_operator("{")?;

        let mut members = Vec::new();
        while !self.stream.match_operator("}") {
            let (member, span) = self.stream.expect_identifier()?;
            let value = if self.stream.eat_operator("=") {
                Some(self.parse_expression(ExprFlags::ELEMENT)?)
            } else {
                None
            };
            members.push(EnumMember {
                name: member,
                value,
                span,
            });
            if !self.stream.eat_operator(",") {
                break;
            }
        }
        self.stream.expect_operator("}")?;

        let span = self.span_from(start);
        Ok(Stmt::new(
            StmtKind::Enum(EnumDecl {
                name,
                members,
                span,
                ty: None,
            }),
            span,
        ))
    }

    // ========================================================================
    // Control flow
    // ========================================================================

    fn parse_condition(&mut self) -> Result<Expr, ParseError> {
        self.stream.expect_operator("(")?;
        let cond = self.parse_expression(ExprFlags::NONE)?;
        self.stream.expect_operator(")")?;
        Ok(cond)
    }

    fn parse_if(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("if")?.span;
        let cond = self.parse_condition()?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.stream.eat_keyword("else") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Stmt::new(
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            },
            self.span_from(start),
        ))
    }

    fn parse_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("while")?.span;
        let cond = self.parse_condition()?;
        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(
            StmtKind::While {
                cond,
                body,
                mode: LoopMode::default(),
            },
            self.span_from(start),
        ))
    }

    fn parse_do_while(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("do")?.span;
        let body = Box::new(self.parse_statement()?);
        self.stream.expect_keyword("while")?;
        let cond = self.parse_condition()?;
        self.stream.expect_operator(";")?;
        Ok(Stmt::new(
            StmtKind::DoWhile {
                body,
                cond,
                mode: LoopMode::default(),
            },
            self.span_from(start),
        ))
    }

    fn parse_for(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("for")?.span;
        self.stream.expect_operator("(")?;

        let init = if self.stream.match_operator(";") {
            None
        } else if self.stream.match_keyword("let") {
            let let_span = self.stream.advance().span;
            let decl = self.parse_var_decl(false)?;
            Some(Box::new(Stmt::new(StmtKind::Let(decl), self.span_from(let_span))))
        } else {
            let expr = self.parse_expression(ExprFlags::NONE)?;
            let span = expr.span;
            Some(Box::new(Stmt::new(StmtKind::Expression(expr), span)))
        };
        self.stream.expect_operator(";")?;

        let cond = if self.stream.match_operator(";") {
            None
        } else {
            Some(self.parse_expression(ExprFlags::NONE)?)
        };
        self.stream.expect_operator(";")?;

        let step = if self.stream.match_operator(")") {
            None
        } else {
            Some(self.parse_expression(ExprFlags::NONE)?)
        };
        self.stream.expect_operator(")")?;

        let body = Box::new(self.parse_statement()?);
        Ok(Stmt::new(
            StmtKind::For(ForStmt {
                init,
                cond,
                step,
                body,
                mode: LoopMode::default(),
                scope_locals: Vec::new(),
            }),
            self.span_from(start),
        ))
    }

    fn parse_try(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("try")?.span;
        let body = self.parse_block()?;
        self.stream.expect_keyword("catch")?;
        self.stream.expect_operator("(")?;
        let (param, param_span) = self.stream.expect_identifier()?;
        self.stream.expect_operator(")")?;
        let handler = self.parse_block()?;
        Ok(Stmt::new(
            StmtKind::Try(TryStmt {
                body,
                param,
                param_span,
                param_ident: None,
                handler,
            }),
            self.span_from(start),
        ))
    }

    // ========================================================================
    // Modules
    // ========================================================================

    fn parse_import(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("import")?.span;

        let (clause, module) = if self.stream.eat_operator("{") {
            let mut names = Vec::new();
            while !self.stream.match_operator("}") {
                let (name, span) = self.stream.expect_identifier()?;
                names.push(ImportName {
                    name,
                    span,
                    ident: None,
                });
                if !self.stream.eat_operator(",") {
                    break;
                }
            }
            self.stream.expect_operator("}")?;
            self.stream.expect_keyword("from")?;
            let module = self.stream.expect(TokenClass::String)?.text;
            (ImportClause::Named(names), module)
        } else {
            let module = self.stream.expect(TokenClass::String)?.text;
            self.stream.expect_keyword("as")?;
            let (name, span) = self.stream.expect_identifier()?;
            let ns = ImportName {
                name,
                span,
                ident: None,
            };
            (ImportClause::Namespace(ns), module)
        };
        self.stream.expect_operator(";")?;

        Ok(Stmt::new(
            StmtKind::Import { clause, module },
            self.span_from(start),
        ))
    }

    fn parse_export(&mut self) -> Result<Stmt, ParseError> {
        let start = self.stream.expect_keyword("export")?.span;
        let token = self.stream.peek().clone();
        let inner = match token.text.as_str() {
            "let" if token.class == TokenClass::Keyword => self.parse_let()?,
            "const" if token.class == TokenClass::Keyword => self.parse_const()?,
            "type" if token.class == TokenClass::Keyword => self.parse_type_declaration()?,
            "enum" if token.class == TokenClass::Keyword => self.parse_enum()?,
            "function" if token.class == TokenClass::Keyword => {
                let func = self.parse_function(true, false)?;
                let span = func.span;
                Stmt::new(StmtKind::Function(func), span)
            }
            _ => {
                return Err(ParseError::unexpected_token("declaration", &token)
                    .with_suggestion("only let, const, function, type and enum can be exported"))
            }
        };
        Ok(Stmt::new(
            StmtKind::Export(Box::new(inner)),
            self.span_from(start),
        ))
    }
}
