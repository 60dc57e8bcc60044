//! `new` expressions.
//!
//! `new P` clones the prototype object `P`. When arguments are supplied the
//! instance is also initialized through its `$construct` method, which is
//! expressed by rewriting the node:
//!
//! - `P` statically declares `$construct`: `(new P).$construct(args)`, a
//!   call whose result is the receiver.
//! - `P` is only known at runtime: `bind t = new P in
//!   (t has $construct ? t.$construct(args) : t)`.
//!
//! Anything else is left as a bare `new P` and lowered to `Instantiate`.

use super::{Analyzer, ExprVisit};
use crate::ast::{Binding, Expr, ExprKind};
use crate::diagnostics::MessageCode;
use crate::scope::{IdentId, Identifier};
use crate::token::Span;
use crate::types::{TypeClass, TypeId};

/// Name of the constructor method.
pub const CONSTRUCT: &str = "$construct";

/// How a `new` expression is lowered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Construction {
    /// Plain `Instantiate`
    Bare,
    /// Direct call of a statically known `$construct`
    Static,
    /// Runtime `has` test before calling `$construct`
    Dynamic,
}

impl<'a> Analyzer<'a> {
    pub(crate) fn visit_new(
        &mut self,
        prototype: &mut Expr,
        args: &mut Option<Vec<Expr>>,
        span: Span,
    ) -> ExprVisit {
        let proto_ty = self.visit_expr(prototype);
        let mut arg_types = Vec::new();
        if let Some(args) = args.as_mut() {
            for arg in args.iter_mut() {
                arg_types.push(self.visit_expr(arg));
            }
        }
        if proto_ty.is_error() {
            return ExprVisit::Done(TypeId::ERROR);
        }

        let resolved = self.module.types.resolve_alias(proto_ty);
        let has_args = args.as_ref().is_some_and(|a| !a.is_empty());
        let construction = match self.module.types.class(resolved) {
            _ if self.module.types.is_permissive(resolved) => Construction::Dynamic,
            TypeClass::Object if resolved == TypeId::OBJECT => Construction::Dynamic,
            TypeClass::Object => {
                let declared = self
                    .module
                    .types
                    .find_member(resolved, CONSTRUCT)
                    .is_some_and(|m| m.is_method);
                match (declared, has_args) {
                    (true, _) if args.is_some() => Construction::Static,
                    (false, true) => {
                        let name = self.module.types.display(resolved);
                        self.error(MessageCode::NoConstructor, span, vec![name]);
                        return ExprVisit::Done(TypeId::ERROR);
                    }
                    _ => Construction::Bare,
                }
            }
            _ => {
                let name = self.module.types.display(proto_ty);
                self.error(MessageCode::MissingPrototype, prototype.span, vec![name]);
                return ExprVisit::Done(TypeId::ERROR);
            }
        };

        // Without parentheses there is nothing to pass to a constructor.
        let construction = match (construction, args.is_some()) {
            (Construction::Dynamic, false) => Construction::Bare,
            (c, _) => c,
        };
        let instance_ty = if self.module.types.is_permissive(resolved) {
            TypeId::ANY
        } else {
            resolved
        };

        match construction {
            Construction::Bare => ExprVisit::Done(instance_ty),
            Construction::Static => {
                let constructor_ty = self.member_type(resolved, CONSTRUCT);
                let args = args.take().unwrap_or_default();
                self.call_result(constructor_ty, &arg_types, &args);
                let bare = self.bare_new(prototype, instance_ty, span);
                let callee = Expr::typed(
                    ExprKind::Member {
                        object: Box::new(bare),
                        name: CONSTRUCT.to_string(),
                    },
                    span,
                    constructor_ty,
                );
                ExprVisit::Rewrite(Expr::typed(
                    ExprKind::Call {
                        callee: Box::new(callee),
                        type_args: Vec::new(),
                        args,
                        yields_receiver: true,
                    },
                    span,
                    instance_ty,
                ))
            }
            Construction::Dynamic => {
                let args = args.take().unwrap_or_default();
                let bare = self.bare_new(prototype, instance_ty, span);
                ExprVisit::Rewrite(self.dynamic_construct(bare, args, instance_ty, span))
            }
        }
    }

    /// Analyzed `new P` without arguments, taking over `prototype`.
    fn bare_new(&mut self, prototype: &mut Expr, ty: TypeId, span: Span) -> Expr {
        let prototype = std::mem::replace(prototype, Expr::typed(ExprKind::Null, span, TypeId::NULL));
        Expr::typed(
            ExprKind::New {
                prototype: Box::new(prototype),
                args: None,
            },
            span,
            ty,
        )
    }

    fn dynamic_construct(&mut self, value: Expr, args: Vec<Expr>, ty: TypeId, span: Span) -> Expr {
        let (name, tmp) = self.hidden_temporary(ty, span);
        let read = |span| {
            Expr::typed(
                ExprKind::Ident {
                    name: name.clone(),
                    binding: Some(Binding::Ident(tmp)),
                },
                span,
                ty,
            )
        };

        let test = Expr::typed(
            ExprKind::Has {
                object: Box::new(read(span)),
                name: CONSTRUCT.to_string(),
            },
            span,
            TypeId::BOOL,
        );
        let call = Expr::typed(
            ExprKind::Call {
                callee: Box::new(Expr::typed(
                    ExprKind::Member {
                        object: Box::new(read(span)),
                        name: CONSTRUCT.to_string(),
                    },
                    span,
                    TypeId::ANY,
                )),
                type_args: Vec::new(),
                args,
                yields_receiver: true,
            },
            span,
            ty,
        );
        let body = Expr::typed(
            ExprKind::Ternary {
                cond: Box::new(test),
                then_expr: Box::new(call),
                else_expr: Box::new(read(span)),
            },
            span,
            ty,
        );
        Expr::typed(
            ExprKind::Bind {
                name: name.clone(),
                ident: Some(tmp),
                value: Box::new(value),
                body: Box::new(body),
            },
            span,
            ty,
        )
    }

    /// Allocate an unnamed stack temporary. It is not entered in any scope;
    /// the `Bind` node that owns it pushes and pops its slot.
    pub(crate) fn hidden_temporary(&mut self, ty: TypeId, span: Span) -> (String, IdentId) {
        let name = format!("$tmp{}", self.module.hidden_counter);
        self.module.hidden_counter += 1;
        let mut ident = Identifier::new(name.clone(), ty, span);
        ident.flags.is_hidden = true;
        ident.function_depth = self.depth();
        ident.use_count = 3;
        (name, self.module.idents.alloc(ident))
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, ExprKind, StmtKind};
    use crate::types::TypeId;
    use crate::unit::{CompilationUnit, ModuleOutcome};

    fn analyzed_init(source: &str, name: &str) -> (ModuleOutcome, Expr) {
        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("test", source);
        let module = unit.module("test").expect("module is kept");
        let init = module
            .stmts
            .iter()
            .find_map(|s| match &s.kind {
                StmtKind::Let(decl) if decl.name == name => decl.init.clone(),
                _ => None,
            })
            .expect("declaration present");
        (outcome, init)
    }

    #[test]
    fn test_static_constructor_rewrite() {
        let source = "
            type Foo {
                a = 0;
                b = 0;
                function $construct(a, b) { this.a = a; this.b = b; }
            }
            let foo = new Foo(1, 2);
        ";
        let (outcome, init) = analyzed_init(source, "foo");
        assert!(outcome.errors().next().is_none(), "{:?}", outcome.diagnostics);
        let ExprKind::Call {
            callee,
            args,
            yields_receiver,
            ..
        } = &init.kind
        else {
            panic!("expected a call, got {:?}", init.kind);
        };
        assert!(*yields_receiver);
        assert_eq!(args.len(), 2);
        assert!(matches!(&callee.kind, ExprKind::Member { name, .. } if name == "$construct"));

        let unit_ty = init.ty.expect("typed");
        assert_ne!(unit_ty, TypeId::ANY);
    }

    #[test]
    fn test_dynamic_constructor_rewrite() {
        let source = "
            let proto: any = {};
            let made = new proto(1, 2);
            made;
        ";
        let (_, init) = analyzed_init(source, "made");
        let ExprKind::Bind { body, value, .. } = &init.kind else {
            panic!("expected a bind, got {:?}", init.kind);
        };
        assert!(matches!(value.kind, ExprKind::New { args: None, .. }));
        let ExprKind::Ternary {
            cond,
            then_expr,
            else_expr,
        } = &body.kind
        else {
            panic!("expected a ternary");
        };
        assert!(matches!(cond.kind, ExprKind::Has { .. }));
        assert_eq!(then_expr.ty, else_expr.ty);
        assert_eq!(init.ty, Some(TypeId::ANY));
    }

    #[test]
    fn test_bare_new_is_not_rewritten() {
        let (outcome, init) = analyzed_init("type P { x = 1; } let p = new P; p;", "p");
        assert!(outcome.errors().next().is_none());
        assert!(matches!(init.kind, ExprKind::New { .. }));
    }

    #[test]
    fn test_arguments_without_constructor() {
        let (outcome, _) = analyzed_init("type P { x = 1; } let p = new P(1); p;", "p");
        let codes: Vec<_> = outcome.errors().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["E3006"]);
    }

    #[test]
    fn test_new_of_number_has_no_prototype() {
        let (outcome, _) = analyzed_init("let n: number = 1; let p = new n; p;", "p");
        let codes: Vec<_> = outcome.errors().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["E3003"]);
    }
}
