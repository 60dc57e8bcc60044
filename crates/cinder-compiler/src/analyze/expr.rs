//! Expression analysis.

use super::generic::TemplateDecl;
use super::{Analyzer, ExprVisit};
use crate::ast::{
    BinaryOp, Binding, Expr, ExprKind, FunctionDecl, TypeAnnotation, UnaryOp,
};
use crate::diagnostics::MessageCode;
use crate::token::Span;
use crate::types::{TypeClass, TypeId};

impl<'a> Analyzer<'a> {
    /// Analyze `expr`, replacing it when the visit rewrites it, and return
    /// its type.
    pub(crate) fn visit_expr(&mut self, expr: &mut Expr) -> TypeId {
        match self.visit_expr_kind(expr) {
            ExprVisit::Done(ty) => {
                expr.ty = Some(ty);
                ty
            }
            ExprVisit::Rewrite(replacement) => {
                let ty = replacement.ty.unwrap_or(TypeId::ERROR);
                *expr = replacement;
                ty
            }
        }
    }

    fn visit_expr_kind(&mut self, expr: &mut Expr) -> ExprVisit {
        let span = expr.span;
        let ty = match &mut expr.kind {
            ExprKind::Int(_) | ExprKind::Float(_) => TypeId::NUMBER,
            ExprKind::String(_) => TypeId::STRING,
            ExprKind::Bool(_) => TypeId::BOOL,
            ExprKind::Null => TypeId::NULL,
            ExprKind::Ident { name, binding } => {
                let name = name.clone();
                self.visit_ident(&name, binding, span)
            }
            ExprKind::This => match self.context().this_type {
                Some(ty) => ty,
                None => {
                    self.error(MessageCode::ThisOutsideMethod, span, Vec::new());
                    TypeId::ERROR
                }
            },
            ExprKind::Array(items) => {
                for item in items {
                    self.visit_expr(item);
                }
                TypeId::ARRAY
            }
            ExprKind::Object(props) => {
                for (_, value) in props {
                    self.visit_expr(value);
                }
                TypeId::OBJECT
            }
            ExprKind::Unary { op, operand } => {
                let operand_ty = self.visit_expr(operand);
                match op {
                    UnaryOp::Not => TypeId::BOOL,
                    UnaryOp::Typeof => TypeId::STRING,
                    _ if operand_ty.is_error() => TypeId::ERROR,
                    _ => TypeId::NUMBER,
                }
            }
            ExprKind::Binary { op, lhs, rhs } => {
                let op = *op;
                let lhs_ty = self.visit_expr(lhs);
                let rhs_ty = self.visit_expr(rhs);
                self.binary_result(op, lhs_ty, rhs_ty, span)
            }
            ExprKind::Logical { lhs, rhs, .. } => {
                let lhs_ty = self.visit_expr(lhs);
                let rhs_ty = self.visit_expr(rhs);
                self.join(lhs_ty, rhs_ty)
            }
            ExprKind::Assign { op, target, value } => {
                let op = *op;
                self.visit_assign(op, target, value, span)
            }
            ExprKind::Update { op, target, .. } => {
                let symbol = match op {
                    crate::ast::UpdateOp::Increment => "++",
                    crate::ast::UpdateOp::Decrement => "--",
                };
                match self.visit_target(target) {
                    Some(ty) if !self.is_numeric(ty) => {
                        let args = vec![symbol.to_string(), self.module.types.display(ty), "number".into()];
                        self.error(MessageCode::IncompatibleOperands, span, args);
                        TypeId::ERROR
                    }
                    Some(_) => TypeId::NUMBER,
                    None => TypeId::ERROR,
                }
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                self.visit_expr(cond);
                let then_ty = self.visit_expr(then_expr);
                let else_ty = self.visit_expr(else_expr);
                self.join(then_ty, else_ty)
            }
            ExprKind::Sequence(items) => {
                let mut last = TypeId::VOID;
                for item in items {
                    last = self.visit_expr(item);
                }
                last
            }
            ExprKind::Member { object, name } => {
                let name = name.clone();
                return self.visit_member(object, &name, span);
            }
            ExprKind::Index { object, index } => {
                self.visit_expr(object);
                self.visit_expr(index);
                TypeId::ANY
            }
            ExprKind::Call {
                callee,
                type_args,
                args,
                yields_receiver,
            } => {
                let yields_receiver = *yields_receiver;
                self.visit_call(callee, type_args, args, yields_receiver, span)
            }
            ExprKind::New { prototype, args } => return self.visit_new(prototype, args, span),
            ExprKind::Has { object, .. } => {
                self.visit_expr(object);
                TypeId::BOOL
            }
            ExprKind::Function(func) => self.visit_function_expr(func),
            ExprKind::TypeRef {
                name,
                args,
                binding,
            } => {
                let name = name.clone();
                self.visit_type_ref(&name, args, binding, span)
            }
            ExprKind::Bind { value, body, .. } => {
                self.visit_expr(value);
                self.visit_expr(body)
            }
            ExprKind::Typeof(operand) => {
                self.visit_expr(operand);
                TypeId::STRING
            }
        };
        ExprVisit::Done(ty)
    }

    // ========================================================================
    // Names
    // ========================================================================

    fn visit_ident(&mut self, name: &str, binding: &mut Option<Binding>, span: Span) -> TypeId {
        let Some(id) = self.module.scopes.lookup(name) else {
            self.error(MessageCode::UnresolvedIdentifier, span, vec![name.to_string()]);
            return TypeId::ERROR;
        };
        let ident = &self.module.idents[id];
        let (flags, ty, template) = (ident.flags, ident.symbol_type, ident.template);

        if let Some(template) = template {
            let arity = self.module.generics.template(template).arity();
            if flags.is_type {
                let args = vec![name.to_string(), arity.to_string(), "0".into()];
                self.error(MessageCode::GenericArityMismatch, span, args);
                return TypeId::ERROR;
            }
            // A generic function used as a value takes `any` for every
            // parameter.
            return match self.instantiate(template, vec![TypeId::ANY; arity], span) {
                Some(instance) => {
                    *binding = Some(Binding::Instance(instance));
                    self.module.generics.instance(instance).ty
                }
                None => TypeId::ERROR,
            };
        }

        if self.module.idents[id].namespace.is_some() {
            self.error(MessageCode::NotAValue, span, vec![name.to_string()]);
            return TypeId::ERROR;
        }
        if flags.is_type {
            let resolved = self.module.types.resolve_alias(ty);
            match self.module.types.class(resolved) {
                TypeClass::Error => return TypeId::ERROR,
                TypeClass::Object | TypeClass::Placeholder if !flags.is_enum => {}
                _ => {
                    self.error(MessageCode::NotAValue, span, vec![name.to_string()]);
                    return TypeId::ERROR;
                }
            }
        }
        if !self.check_capture(id, span) {
            return TypeId::ERROR;
        }

        self.module.idents[id].use_count += 1;
        *binding = Some(Binding::Ident(id));
        ty
    }

    /// Locals of an enclosing function are not reachable from a nested one.
    fn check_capture(&mut self, id: crate::scope::IdentId, span: Span) -> bool {
        let ident = &self.module.idents[id];
        if ident.is_stack_local() && ident.function_depth < self.depth() {
            let name = ident.name.clone();
            self.error(MessageCode::CaptureOfLocal, span, vec![name]);
            return false;
        }
        true
    }

    fn visit_member(&mut self, object: &mut Expr, name: &str, span: Span) -> ExprVisit {
        let named = match &object.kind {
            ExprKind::Ident { name: object_name, .. } => self
                .module
                .scopes
                .lookup(object_name)
                .map(|id| (id, object_name.clone())),
            _ => None,
        };

        if let Some((id, object_name)) = named {
            let ident = &self.module.idents[id];
            if let Some(import) = ident.namespace {
                return self.visit_namespace_member(import, id, &object_name, name, span);
            }
            if ident.flags.is_enum {
                let enum_ty = ident.symbol_type;
                self.module.idents[id].use_count += 1;
                object.ty = Some(enum_ty);
                if let ExprKind::Ident { binding, .. } = &mut object.kind {
                    *binding = Some(Binding::Ident(id));
                }
                if self.module.types.find_member(enum_ty, name).is_none() {
                    let args = vec![format!("{}.{}", object_name, name)];
                    self.error(MessageCode::UnresolvedIdentifier, span, args);
                    return ExprVisit::Done(TypeId::ERROR);
                }
                return ExprVisit::Done(enum_ty);
            }
        }

        let object_ty = self.visit_expr(object);
        ExprVisit::Done(self.member_type(object_ty, name))
    }

    /// `ns.name` becomes a direct reference to the import slot.
    fn visit_namespace_member(
        &mut self,
        import: u16,
        ns: crate::scope::IdentId,
        ns_name: &str,
        name: &str,
        span: Span,
    ) -> ExprVisit {
        self.module.idents[ns].use_count += 1;
        let entry = &self.module.imports[import as usize];
        let Some(symbol) = entry.interface.export(name).cloned() else {
            let module = entry.module.clone();
            self.error(
                MessageCode::UnresolvedExport,
                span,
                vec![module, name.to_string()],
            );
            return ExprVisit::Done(TypeId::ERROR);
        };
        let slot = self.module.imports[import as usize].slot(name);
        let ty = self.import_type(import, &symbol);
        ExprVisit::Rewrite(Expr::typed(
            ExprKind::Ident {
                name: format!("{}.{}", ns_name, name),
                binding: Some(Binding::Import {
                    module: import,
                    export: slot,
                }),
            },
            span,
            ty,
        ))
    }

    pub(crate) fn member_type(&self, object: TypeId, name: &str) -> TypeId {
        if object.is_error() {
            return TypeId::ERROR;
        }
        self.module
            .types
            .find_member(object, name)
            .map_or(TypeId::ANY, |m| m.ty)
    }

    // ========================================================================
    // Operators
    // ========================================================================

    fn is_numeric(&self, ty: TypeId) -> bool {
        self.module.types.is_assignable(TypeId::NUMBER, ty)
    }

    fn is_string(&self, ty: TypeId) -> bool {
        self.module.types.resolve_alias(ty) == TypeId::STRING
    }

    /// Common type of two alternatives.
    fn join(&self, a: TypeId, b: TypeId) -> TypeId {
        let types = &self.module.types;
        if a.is_error() || b.is_error() {
            TypeId::ERROR
        } else if a == b {
            a
        } else if a == TypeId::NULL && types.is_object_like(b) {
            b
        } else if b == TypeId::NULL && types.is_object_like(a) {
            a
        } else {
            TypeId::ANY
        }
    }

    pub(crate) fn binary_result(&mut self, op: BinaryOp, lhs: TypeId, rhs: TypeId, span: Span) -> TypeId {
        if lhs.is_error() || rhs.is_error() {
            return TypeId::ERROR;
        }
        let permissive = self.module.types.is_permissive(lhs) || self.module.types.is_permissive(rhs);
        let numeric = self.is_numeric(lhs) && self.is_numeric(rhs);
        let result = match op {
            BinaryOp::Add if self.is_string(lhs) || self.is_string(rhs) => Some(TypeId::STRING),
            BinaryOp::Add if permissive => Some(TypeId::ANY),
            BinaryOp::Eq | BinaryOp::Ne => Some(TypeId::BOOL),
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let strings = self.is_string(lhs) && self.is_string(rhs);
                (numeric || strings || permissive).then_some(TypeId::BOOL)
            }
            _ => numeric.then_some(TypeId::NUMBER),
        };
        match result {
            Some(ty) => ty,
            None => {
                let args = vec![
                    op.symbol().to_string(),
                    self.module.types.display(lhs),
                    self.module.types.display(rhs),
                ];
                self.error(MessageCode::IncompatibleOperands, span, args);
                TypeId::ERROR
            }
        }
    }

    fn visit_assign(
        &mut self,
        op: Option<BinaryOp>,
        target: &mut Expr,
        value: &mut Expr,
        span: Span,
    ) -> TypeId {
        let target_ty = self.visit_target(target);
        let value_ty = self.visit_expr(value);
        let Some(target_ty) = target_ty else {
            return TypeId::ERROR;
        };
        let result = match op {
            Some(op) => self.binary_result(op, target_ty, value_ty, span),
            None => value_ty,
        };
        if result.is_error() || !self.check_assignable(target_ty, result, value.span) {
            return TypeId::ERROR;
        }
        result
    }

    /// Analyze an assignment target and return the type stored into it, or
    /// `None` when the target is not assignable.
    fn visit_target(&mut self, target: &mut Expr) -> Option<TypeId> {
        let span = target.span;
        let ty = match &mut target.kind {
            ExprKind::Ident { name, binding } => {
                let Some(id) = self.module.scopes.lookup(name) else {
                    self.error(MessageCode::UnresolvedIdentifier, span, vec![name.clone()]);
                    target.ty = Some(TypeId::ERROR);
                    return None;
                };
                let ident = &self.module.idents[id];
                if ident.flags.is_type || ident.namespace.is_some() || ident.template.is_some() {
                    self.error(MessageCode::InvalidAssignmentTarget, span, Vec::new());
                    return None;
                }
                if ident.flags.is_const {
                    let name = ident.name.clone();
                    self.error(MessageCode::AssignToConst, span, vec![name]);
                    return None;
                }
                if !self.check_capture(id, span) {
                    return None;
                }
                let ident = &mut self.module.idents[id];
                ident.use_count += 1;
                *binding = Some(Binding::Ident(id));
                ident.symbol_type
            }
            ExprKind::Member { object, name } => {
                let object_ty = self.visit_expr(object);
                self.member_type(object_ty, name)
            }
            ExprKind::Index { object, index } => {
                self.visit_expr(object);
                self.visit_expr(index);
                TypeId::ANY
            }
            _ => {
                self.error(MessageCode::InvalidAssignmentTarget, span, Vec::new());
                return None;
            }
        };
        target.ty = Some(ty);
        Some(ty)
    }

    // ========================================================================
    // Calls and functions
    // ========================================================================

    fn visit_call(
        &mut self,
        callee: &mut Expr,
        type_args: &[TypeAnnotation],
        args: &mut [Expr],
        yields_receiver: bool,
        span: Span,
    ) -> TypeId {
        let template = match &callee.kind {
            ExprKind::Ident { name, .. } => self.module.scopes.lookup(name).and_then(|id| {
                let ident = &self.module.idents[id];
                if ident.flags.is_type {
                    None
                } else {
                    ident.template
                }
            }),
            _ => None,
        };

        if let Some(template) = template {
            let arg_types: Vec<TypeId> = args.iter_mut().map(|a| self.visit_expr(a)).collect();
            let bound = if type_args.is_empty() {
                self.infer_type_args(template, &arg_types)
            } else {
                type_args.iter().map(|a| self.resolve_annotation(a)).collect()
            };
            let Some(instance) = self.instantiate(template, bound, span) else {
                callee.ty = Some(TypeId::ERROR);
                return TypeId::ERROR;
            };
            let fn_ty = self.module.generics.instance(instance).ty;
            if let ExprKind::Ident { binding, .. } = &mut callee.kind {
                *binding = Some(Binding::Instance(instance));
            }
            callee.ty = Some(fn_ty);
            return self.call_result(fn_ty, &arg_types, args);
        }

        if !type_args.is_empty() {
            let name = match &callee.kind {
                ExprKind::Ident { name, .. } => name.clone(),
                _ => "callee".into(),
            };
            let args = vec![name, "0".into(), type_args.len().to_string()];
            self.error(MessageCode::GenericArityMismatch, span, args);
        }

        let callee_ty = self.visit_expr(callee);
        let arg_types: Vec<TypeId> = args.iter_mut().map(|a| self.visit_expr(a)).collect();
        if callee_ty.is_error() {
            return TypeId::ERROR;
        }
        let result = self.call_result(callee_ty, &arg_types, args);
        if yields_receiver {
            if let ExprKind::Member { object, .. } = &callee.kind {
                return object.ty.unwrap_or(TypeId::ANY);
            }
        }
        result
    }

    /// Return type of calling `fn_ty`, checking arguments against declared
    /// parameter types.
    pub(crate) fn call_result(&mut self, fn_ty: TypeId, arg_types: &[TypeId], args: &[Expr]) -> TypeId {
        let resolved = self.module.types.resolve_alias(fn_ty);
        let signature = self.module.types.get(resolved);
        if signature.class != TypeClass::Function || resolved == TypeId::FUNCTION {
            return TypeId::ANY;
        }
        let params = signature.params.clone();
        let ret = signature.ret.unwrap_or(TypeId::ANY);
        if params.len() == arg_types.len() {
            for ((param, arg), expr) in params.iter().zip(arg_types).zip(args) {
                self.check_assignable(*param, *arg, expr.span);
            }
        }
        ret
    }

    fn visit_function_expr(&mut self, func: &mut FunctionDecl) -> TypeId {
        if !func.generics.is_empty() {
            self.error(MessageCode::DeclarationNotAllowed, func.span, vec!["generic".into()]);
            return TypeId::ERROR;
        }
        self.visit_function(func, None)
    }

    /// `Box<number>` or `id<string>` in expression position.
    fn visit_type_ref(
        &mut self,
        name: &str,
        args: &[TypeAnnotation],
        binding: &mut Option<Binding>,
        span: Span,
    ) -> TypeId {
        let bound: Vec<TypeId> = args.iter().map(|a| self.resolve_annotation(a)).collect();
        let Some(id) = self.module.scopes.lookup(name) else {
            self.error(MessageCode::UnresolvedIdentifier, span, vec![name.to_string()]);
            return TypeId::ERROR;
        };
        let Some(template) = self.module.idents[id].template else {
            let args = vec![name.to_string(), "0".into(), bound.len().to_string()];
            self.error(MessageCode::GenericArityMismatch, span, args);
            return TypeId::ERROR;
        };

        if matches!(self.module.generics.template(template).decl, TemplateDecl::Alias(_)) {
            let aliased = self.resolve_generic_alias(template, bound, span);
            let resolved = self.module.types.resolve_alias(aliased);
            if resolved.is_error() {
                return TypeId::ERROR;
            }
            return match self.module.generics.instance_for_type(resolved) {
                Some(instance) => {
                    *binding = Some(Binding::Instance(instance));
                    resolved
                }
                None => {
                    self.error(MessageCode::NotAValue, span, vec![name.to_string()]);
                    TypeId::ERROR
                }
            };
        }

        match self.instantiate(template, bound, span) {
            Some(instance) => {
                *binding = Some(Binding::Instance(instance));
                self.module.generics.instance(instance).ty
            }
            None => TypeId::ERROR,
        }
    }
}
