//! Statement analysis and declarations.

use super::generic::TemplateDecl;
use super::Analyzer;
use crate::ast::{
    AliasDecl, Block, EnumDecl, ExprKind, FunctionDecl, ImportClause, Stmt, StmtKind, TryStmt,
    TypeDecl, UnaryOp, VarDecl,
};
use crate::diagnostics::MessageCode;
use crate::module::{literal_expr, ExportEntry, ExportedSymbol, ImportEntry};
use crate::optimize::constant_value;
use crate::scope::{IdentFlags, Identifier, ScopeKind};
use crate::token::Span;
use crate::types::{Member, SymbolType, TypeClass, TypeId};
use crate::value::ConstValue;
use cinder_bytecode::ExportKind;

impl<'a> Analyzer<'a> {
    pub(crate) fn visit_stmt(&mut self, stmt: &mut Stmt) {
        let span = stmt.span;
        match &mut stmt.kind {
            StmtKind::Let(decl) => self.visit_var_decl(decl, false),
            StmtKind::Const(decl) => self.visit_var_decl(decl, true),
            StmtKind::Function(func) => self.visit_function_decl(func),
            StmtKind::TypeDecl(decl) => self.visit_type_decl(decl),
            StmtKind::Alias(alias) => self.visit_alias(alias),
            StmtKind::Enum(decl) => {
                // Module-level enums are defined while hoisting.
                if decl.ty.is_none() {
                    self.error(MessageCode::DeclarationNotAllowed, span, vec!["enum".into()]);
                }
            }
            StmtKind::Expression(expr) => {
                self.visit_expr(expr);
            }
            StmtKind::Block(block) => self.visit_block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                self.visit_expr(cond);
                self.visit_branch(then_branch);
                if let Some(else_branch) = else_branch {
                    self.visit_branch(else_branch);
                }
            }
            StmtKind::While { cond, body, .. } => {
                self.visit_expr(cond);
                self.visit_loop_body(body);
            }
            StmtKind::DoWhile { body, cond, .. } => {
                self.visit_loop_body(body);
                self.visit_expr(cond);
            }
            StmtKind::For(for_stmt) => {
                self.open_scope(ScopeKind::Loop);
                if let Some(init) = &mut for_stmt.init {
                    self.visit_stmt(init);
                }
                if let Some(cond) = &mut for_stmt.cond {
                    self.visit_expr(cond);
                }
                if let Some(step) = &mut for_stmt.step {
                    self.visit_expr(step);
                }
                self.visit_loop_body(&mut for_stmt.body);
                for_stmt.scope_locals = self.close_scope();
            }
            StmtKind::Break => {
                if self.context().loop_depth == 0 {
                    self.error(MessageCode::BreakOutsideLoop, span, Vec::new());
                }
            }
            StmtKind::Continue => {
                if self.context().loop_depth == 0 {
                    self.error(MessageCode::ContinueOutsideLoop, span, Vec::new());
                }
            }
            StmtKind::Return(value) => {
                let value_ty = value.as_mut().map(|v| (self.visit_expr(v), v.span));
                if self.functions.len() == 1 {
                    self.error(MessageCode::ReturnOutsideFunction, span, Vec::new());
                } else if let (Some(expected), Some((actual, value_span))) =
                    (self.context().return_type, value_ty)
                {
                    if expected != TypeId::VOID {
                        self.check_assignable(expected, actual, value_span);
                    }
                }
            }
            StmtKind::Throw(expr) => {
                self.visit_expr(expr);
            }
            StmtKind::Try(try_stmt) => self.visit_try(try_stmt),
            StmtKind::Import { clause, module } => {
                let module = module.clone();
                self.visit_import(clause, &module, span);
            }
            StmtKind::Export(inner) => self.visit_export(inner, span),
            StmtKind::Empty => {}
        }
    }

    pub(crate) fn visit_block(&mut self, block: &mut Block) {
        self.open_scope(ScopeKind::Block);
        for stmt in &mut block.stmts {
            self.visit_stmt(stmt);
        }
        block.scope_locals = self.close_scope();
    }

    /// Branch or loop body. A bare declaration gets its own block so its
    /// slot is released with the branch.
    fn visit_branch(&mut self, stmt: &mut Stmt) {
        if matches!(
            stmt.kind,
            StmtKind::Let(_) | StmtKind::Const(_) | StmtKind::Function(_)
        ) {
            let span = stmt.span;
            let inner = std::mem::replace(stmt, Stmt::new(StmtKind::Empty, span));
            *stmt = Stmt::new(StmtKind::Block(Block::new(vec![inner], span)), span);
        }
        self.visit_stmt(stmt);
    }

    fn visit_loop_body(&mut self, body: &mut Stmt) {
        if let Some(ctx) = self.context_mut() {
            ctx.loop_depth += 1;
        }
        self.visit_branch(body);
        if let Some(ctx) = self.context_mut() {
            ctx.loop_depth -= 1;
        }
    }

    // ========================================================================
    // Variables and functions
    // ========================================================================

    fn visit_var_decl(&mut self, decl: &mut VarDecl, is_const: bool) {
        let declared = decl.annotation.as_ref().map(|a| self.resolve_annotation(a));
        let init_ty = match &mut decl.init {
            Some(init) => {
                let ty = self.visit_expr(init);
                if let Some(target) = declared {
                    self.check_assignable(target, ty, init.span);
                }
                Some(ty)
            }
            None => None,
        };

        // `let x: number;` starts out as the type's default value.
        if decl.init.is_none() {
            if let Some(target) = declared {
                let resolved = self.module.types.resolve_alias(target);
                if let Some(mut default) = self.module.types.get(resolved).default_value.clone() {
                    default.span = decl.name_span;
                    self.visit_expr(&mut default);
                    decl.init = Some(default);
                }
            }
        }

        let ty = match (declared, init_ty) {
            (Some(ty), _) => ty,
            (None, Some(ty)) if is_const => ty,
            _ => TypeId::ANY,
        };
        let flags = IdentFlags {
            is_const,
            ..IdentFlags::default()
        };
        let id = self.declare_variable(&decl.name, ty, flags, decl.name_span);
        if is_const {
            self.module.idents[id].current_value = decl.init.as_ref().and_then(constant_value);
        }
        decl.ident = Some(id);
    }

    fn visit_function_decl(&mut self, func: &mut FunctionDecl) {
        if !func.generics.is_empty() {
            // Templates are registered while hoisting module-level code.
            if !self.at_module_level() {
                self.error(MessageCode::DeclarationNotAllowed, func.span, vec!["generic".into()]);
            }
            return;
        }
        let id = match func.ident {
            Some(id) => id,
            None => {
                let name = func.name.clone().unwrap_or_default();
                let flags = IdentFlags {
                    is_function: true,
                    is_const: true,
                    ..IdentFlags::default()
                };
                let id = self.declare_variable(&name, TypeId::FUNCTION, flags, func.span);
                func.ident = Some(id);
                id
            }
        };
        let ty = self.visit_function(func, None);
        self.module.idents[id].symbol_type = ty;
    }

    /// Analyze a function body and return its function type. `this_type`
    /// is the receiver type for methods.
    pub(crate) fn visit_function(&mut self, func: &mut FunctionDecl, this_type: Option<TypeId>) -> TypeId {
        let params: Vec<TypeId> = func
            .params
            .iter()
            .map(|p| match &p.annotation {
                Some(annotation) => self.resolve_annotation(annotation),
                None => TypeId::ANY,
            })
            .collect();
        let declared_ret = func.return_type.as_ref().map(|a| self.resolve_annotation(a));
        let ty = self
            .module
            .types
            .function_type(&params, declared_ret.unwrap_or(TypeId::ANY));
        func.ty = Some(ty);

        let depth = self.depth() + 1;
        self.functions.push(super::FunctionContext {
            depth,
            this_type,
            return_type: declared_ret,
            loop_depth: 0,
        });
        self.open_scope(ScopeKind::Function);
        for (param, param_ty) in func.params.iter_mut().zip(params) {
            let mut ident = Identifier::new(param.name.clone(), param_ty, param.span);
            ident.flags.is_parameter = true;
            param.ident = Some(self.declare(ident, param.span));
        }
        self.visit_block(&mut func.body);
        self.close_scope();
        self.functions.pop();
        ty
    }

    fn visit_try(&mut self, try_stmt: &mut TryStmt) {
        self.visit_block(&mut try_stmt.body);
        self.open_scope(ScopeKind::Block);
        let ident = Identifier::new(try_stmt.param.clone(), TypeId::ANY, try_stmt.param_span);
        try_stmt.param_ident = Some(self.declare(ident, try_stmt.param_span));
        self.visit_block(&mut try_stmt.handler);
        self.close_scope();
    }

    // ========================================================================
    // Types
    // ========================================================================

    fn visit_type_decl(&mut self, decl: &mut TypeDecl) {
        let at_module_level = self.at_module_level();
        let hoisted = decl.ty;
        match hoisted {
            _ if !decl.generics.is_empty() && at_module_level => {}
            Some(ty) if at_module_level => self.define_object_type(decl, ty),
            _ => self.error(MessageCode::DeclarationNotAllowed, decl.span, vec!["type".into()]),
        }
    }

    fn visit_alias(&mut self, alias: &mut AliasDecl) {
        if !self.at_module_level() {
            self.error(MessageCode::DeclarationNotAllowed, alias.span, vec!["type".into()]);
            return;
        }
        if !alias.generics.is_empty() {
            let (name, span) = (alias.name.clone(), alias.span);
            self.declare_template(&name, TemplateDecl::Alias(alias.clone()), span);
            return;
        }
        let target = self.resolve_annotation(&alias.target);
        let mut ty = SymbolType::new(alias.name.clone(), TypeClass::Alias);
        ty.target = Some(target);
        let id = self.module.types.add(ty);
        let mut ident = Identifier::new(alias.name.clone(), id, alias.span);
        ident.flags.is_type = true;
        ident.flags.is_const = true;
        self.declare(ident, alias.span);
    }

    /// Fill in the object type `ty` from its declaration: prototype,
    /// members with constant defaults, then methods.
    pub(crate) fn define_object_type(&mut self, decl: &mut TypeDecl, ty: TypeId) {
        let parent = match &decl.prototype {
            None => None,
            Some(annotation) => {
                let declared = self.resolve_annotation(annotation);
                let resolved = self.module.types.resolve_alias(declared);
                match self.module.types.class(resolved) {
                    TypeClass::Error => None,
                    TypeClass::Object | TypeClass::Placeholder
                        if self.module.types.prototype_chain_reaches(resolved, ty) =>
                    {
                        let name = self.module.types.display(ty);
                        let through = self.module.types.display(declared);
                        self.error(MessageCode::CyclicPrototype, annotation.span, vec![name, through]);
                        None
                    }
                    TypeClass::Object | TypeClass::Placeholder => Some(resolved),
                    _ => {
                        let name = self.module.types.display(declared);
                        self.error(MessageCode::MissingPrototype, annotation.span, vec![name]);
                        None
                    }
                }
            }
        };

        let mut members: Vec<Member> = Vec::new();
        for member in &mut decl.members {
            if members.iter().any(|m| m.name == member.name) {
                self.error(MessageCode::DuplicateDeclaration, member.span, vec![member.name.clone()]);
                continue;
            }
            let declared = member.annotation.as_ref().map(|a| self.resolve_annotation(a));
            let (default, default_ty) = match &mut member.default {
                Some(expr) => {
                    let value_ty = self.visit_expr(expr);
                    if let Some(target) = declared {
                        self.check_assignable(target, value_ty, expr.span);
                    }
                    let value = constant_value(expr).or_else(|| self.module.enum_member_value(expr));
                    match value {
                        Some(value) => (Some(literal_expr(&value, expr.span)), value_ty),
                        None => {
                            self.error(MessageCode::NonConstantDefault, expr.span, vec![member.name.clone()]);
                            (None, value_ty)
                        }
                    }
                }
                None => {
                    let default = declared.and_then(|d| {
                        let resolved = self.module.types.resolve_alias(d);
                        self.module.types.get(resolved).default_value.clone()
                    });
                    (default, TypeId::ANY)
                }
            };
            let member_ty = match declared {
                Some(ty) => ty,
                None if default_ty == TypeId::NULL || default_ty.is_error() => TypeId::ANY,
                None => default_ty,
            };
            members.push(Member {
                name: member.name.clone(),
                ty: member_ty,
                default,
                is_method: false,
            });
        }

        for method in &decl.methods {
            let name = method.name.clone().unwrap_or_default();
            if members.iter().any(|m| m.name == name) {
                self.error(MessageCode::DuplicateDeclaration, method.span, vec![name]);
                continue;
            }
            members.push(Member {
                name,
                ty: TypeId::FUNCTION,
                default: None,
                is_method: true,
            });
        }

        let previous = self.module.types.get(ty);
        let mut symbol = SymbolType::new(previous.name.clone(), TypeClass::Object);
        symbol.bindings = previous.bindings.clone();
        symbol.members = members;
        symbol.prototype = parent;
        self.module.types.replace(ty, symbol);

        // Methods see the complete member list through `this`.
        for method in &mut decl.methods {
            let method_ty = self.visit_function(method, Some(ty));
            let name = method.name.as_deref().unwrap_or_default();
            if let Some(member) = self
                .module
                .types
                .get_mut(ty)
                .members
                .iter_mut()
                .find(|m| m.is_method && m.name == name)
            {
                member.ty = method_ty;
            }
        }
        decl.ty = Some(ty);
    }

    /// Define an enum type. Members are numbered from zero, or continue
    /// from the previous explicit value.
    pub(crate) fn define_enum(&mut self, decl: &mut EnumDecl) {
        let ty = self
            .module
            .types
            .add(SymbolType::new(decl.name.clone(), TypeClass::Enum));
        let mut members: Vec<Member> = Vec::new();
        let mut next = 0.0;
        for member in &mut decl.members {
            if members.iter().any(|m| m.name == member.name) {
                self.error(MessageCode::DuplicateDeclaration, member.span, vec![member.name.clone()]);
                continue;
            }
            let value = match &member.value {
                None => next,
                Some(expr) => match enum_value(&expr.kind) {
                    Some(value) => value,
                    None => {
                        self.error(MessageCode::NonConstantDefault, expr.span, vec![member.name.clone()]);
                        next
                    }
                },
            };
            members.push(Member {
                name: member.name.clone(),
                ty,
                default: Some(literal_expr(&ConstValue::Number(value), member.span)),
                is_method: false,
            });
            next = value + 1.0;
        }
        self.module.types.get_mut(ty).members = members;
        decl.ty = Some(ty);

        let mut ident = Identifier::new(decl.name.clone(), ty, decl.span);
        ident.flags = IdentFlags {
            is_type: true,
            is_enum: true,
            is_const: true,
            ..IdentFlags::default()
        };
        self.declare(ident, decl.span);
    }

    // ========================================================================
    // Modules
    // ========================================================================

    fn visit_import(&mut self, clause: &mut ImportClause, module: &str, span: Span) {
        if !self.at_module_level() {
            self.error(MessageCode::DeclarationNotAllowed, span, vec!["import".into()]);
            return;
        }
        let interface = self.resolver.resolve(module);
        if interface.is_none() {
            self.error(MessageCode::UnresolvedModule, span, vec![module.to_string()]);
        }

        let names = match clause {
            ImportClause::Named(names) => names,
            ImportClause::Namespace(ns) => {
                let mut ident = Identifier::new(ns.name.clone(), TypeId::ANY, ns.span);
                ident.flags.is_import = true;
                ident.flags.is_const = true;
                if let Some(interface) = interface {
                    ident.namespace = Some(self.import_index(module, interface));
                } else {
                    ident.symbol_type = TypeId::ERROR;
                }
                ns.ident = Some(self.declare(ident, ns.span));
                return;
            }
        };

        for name in names.iter_mut() {
            let mut ident = Identifier::new(name.name.clone(), TypeId::ERROR, name.span);
            ident.flags.is_import = true;
            ident.flags.is_const = true;

            let symbol = interface.as_ref().and_then(|i| i.export(&name.name).cloned());
            match (&interface, symbol) {
                (Some(interface), Some(symbol)) => {
                    let index = self.import_index(module, interface.clone());
                    let slot = self.module.imports[index as usize].slot(&name.name);
                    ident.symbol_type = self.import_type(index, &symbol);
                    ident.import_slot = Some((index, slot));
                    ident.current_value = symbol.value.clone();
                    ident.flags.is_type = symbol.kind == ExportKind::Type;
                    ident.flags.is_enum = symbol.is_enum;
                    ident.flags.is_function = symbol.kind == ExportKind::Function;
                }
                (Some(_), None) => {
                    self.error(
                        MessageCode::UnresolvedExport,
                        name.span,
                        vec![module.to_string(), name.name.clone()],
                    );
                }
                (None, _) => {}
            }
            name.ident = Some(self.declare(ident, name.span));
        }
    }

    /// Index of `module` in the import table, adding it on first use.
    pub(crate) fn import_index(
        &mut self,
        module: &str,
        interface: std::sync::Arc<crate::module::ModuleInterface>,
    ) -> u16 {
        match self.module.imports.iter().position(|i| i.module == module) {
            Some(index) => index as u16,
            None => {
                self.module.imports.push(ImportEntry {
                    module: module.to_string(),
                    interface,
                    names: Vec::new(),
                });
                (self.module.imports.len() - 1) as u16
            }
        }
    }

    /// Local type for an imported symbol.
    pub(crate) fn import_type(&mut self, import: u16, symbol: &ExportedSymbol) -> TypeId {
        let key = (import, symbol.name.clone());
        if let Some(ty) = self.import_types.get(&key) {
            return *ty;
        }
        let ty = match symbol.kind {
            ExportKind::Function => TypeId::FUNCTION,
            ExportKind::Variable | ExportKind::Constant => self.builtin_type(&symbol.type_name),
            ExportKind::Type => {
                let class = if symbol.is_enum {
                    TypeClass::Enum
                } else {
                    TypeClass::Object
                };
                let id = self
                    .module
                    .types
                    .add_anonymous(SymbolType::new(symbol.name.clone(), class));
                let members = symbol
                    .members
                    .iter()
                    .map(|m| Member {
                        name: m.name.clone(),
                        ty: if symbol.is_enum {
                            id
                        } else if m.is_method {
                            TypeId::FUNCTION
                        } else {
                            self.builtin_type(&m.type_name)
                        },
                        default: m.default.as_ref().map(|v| literal_expr(v, Span::default())),
                        is_method: m.is_method,
                    })
                    .collect();
                self.module.types.get_mut(id).members = members;
                let slot = self.module.imports[import as usize].slot(&symbol.name);
                self.module.type_imports.insert(id, (import, slot));
                id
            }
        };
        self.import_types.insert(key, ty);
        ty
    }

    fn builtin_type(&self, name: &str) -> TypeId {
        match self.module.types.lookup(name) {
            Some(ty) if ty.0 <= TypeId::ARRAY.0 => ty,
            _ => TypeId::ANY,
        }
    }

    fn visit_export(&mut self, inner: &mut Stmt, span: Span) {
        if !self.at_module_level() {
            self.error(MessageCode::DeclarationNotAllowed, span, vec!["export".into()]);
            return;
        }
        self.visit_stmt(inner);

        let entry = match &inner.kind {
            StmtKind::Let(decl) => decl
                .ident
                .map(|id| (decl.name.clone(), ExportKind::Variable, id)),
            StmtKind::Const(decl) => decl
                .ident
                .map(|id| (decl.name.clone(), ExportKind::Constant, id)),
            StmtKind::Function(func) if func.generics.is_empty() => func
                .ident
                .map(|id| (func.name.clone().unwrap_or_default(), ExportKind::Function, id)),
            StmtKind::TypeDecl(decl) if decl.generics.is_empty() => self
                .module
                .lookup(&decl.name)
                .map(|id| (decl.name.clone(), ExportKind::Type, id)),
            StmtKind::Enum(decl) => self
                .module
                .lookup(&decl.name)
                .map(|id| (decl.name.clone(), ExportKind::Type, id)),
            StmtKind::Function(FunctionDecl { name, .. }) => {
                let name = name.clone().unwrap_or_default();
                self.error(MessageCode::GenericExport, span, vec![name]);
                None
            }
            StmtKind::TypeDecl(TypeDecl { name, .. }) | StmtKind::Alias(AliasDecl { name, .. }) => {
                let name = name.clone();
                self.error(MessageCode::GenericExport, span, vec![name]);
                None
            }
            _ => None,
        };
        if let Some((name, kind, ident)) = entry {
            self.module.exports.push(ExportEntry { name, kind, ident });
        }
    }
}

/// Number written as an enum member value: a numeric literal, optionally
/// negated.
fn enum_value(kind: &ExprKind) -> Option<f64> {
    match kind {
        ExprKind::Int(v) => Some(*v as f64),
        ExprKind::Float(v) => Some(*v),
        ExprKind::Unary {
            op: UnaryOp::Neg,
            operand,
        } => enum_value(&operand.kind).map(|v| -v),
        _ => None,
    }
}
