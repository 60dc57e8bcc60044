//! Semantic analysis (the Visit pass).
//!
//! Resolves every identifier and type annotation, assigns a type to every
//! expression, declares identifiers into the scope stack, instantiates
//! generic templates on use and rewrites `new` expressions into constructor
//! calls. Problems are recorded as diagnostics; the offending node gets the
//! error type and analysis continues, so one pass reports everything.

mod construct;
mod expr;
pub mod generic;
mod stmt;

use crate::ast::{Expr, Stmt, StmtKind, TypeAnnotation};
use crate::diagnostics::{CompilerError, MessageCode};
use crate::module::{Module, ModuleResolver};
use crate::options::CompileOptions;
use crate::scope::{IdentFlags, IdentId, Identifier, ScopeKind};
use crate::token::Span;
use crate::types::{SymbolType, TypeClass, TypeId};
use generic::TemplateDecl;
use rustc_hash::FxHashMap;

/// Outcome of visiting an expression.
#[derive(Debug)]
pub enum ExprVisit {
    /// The node was analyzed in place and has this type
    Done(TypeId),
    /// The node must be replaced by this already-analyzed expression
    Rewrite(Expr),
}

/// Per-function analysis state.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FunctionContext {
    /// 0 for module code, incremented per nested function
    pub depth: u32,
    /// Receiver type inside methods
    pub this_type: Option<TypeId>,
    /// Declared return type
    pub return_type: Option<TypeId>,
    pub loop_depth: u32,
}

impl FunctionContext {
    pub(crate) fn module() -> Self {
        Self {
            depth: 0,
            this_type: None,
            return_type: None,
            loop_depth: 0,
        }
    }
}

pub struct Analyzer<'a> {
    pub(crate) module: &'a mut Module,
    options: &'a CompileOptions,
    resolver: &'a dyn ModuleResolver,
    diagnostics: &'a mut Vec<CompilerError>,
    pub(crate) functions: Vec<FunctionContext>,
    /// Local types created for imported symbols
    import_types: FxHashMap<(u16, String), TypeId>,
}

/// Run the Visit pass over a module's statements.
pub fn analyze_module(
    module: &mut Module,
    options: &CompileOptions,
    resolver: &dyn ModuleResolver,
    diagnostics: &mut Vec<CompilerError>,
) {
    let mut stmts = std::mem::take(&mut module.stmts);
    let mut analyzer = Analyzer::new(module, options, resolver, diagnostics);
    analyzer.analyze(&mut stmts);
    module.stmts = stmts;
}

impl<'a> Analyzer<'a> {
    pub fn new(
        module: &'a mut Module,
        options: &'a CompileOptions,
        resolver: &'a dyn ModuleResolver,
        diagnostics: &'a mut Vec<CompilerError>,
    ) -> Self {
        Self {
            module,
            options,
            resolver,
            diagnostics,
            functions: vec![FunctionContext::module()],
            import_types: FxHashMap::default(),
        }
    }

    /// Analyze a module's top-level statements.
    pub fn analyze(&mut self, stmts: &mut [Stmt]) {
        self.hoist(stmts);
        for stmt in stmts.iter_mut() {
            self.visit_stmt(stmt);
        }
        tracing::debug!(
            module = %self.module.name,
            idents = self.module.idents.len(),
            types = self.module.types.len(),
            instances = self.module.generics.instance_count(),
            "visit complete"
        );
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    pub(crate) fn error(&mut self, code: MessageCode, span: Span, args: Vec<String>) {
        self.diagnostics.push(CompilerError::new(code, span, args));
    }

    // ========================================================================
    // Function context
    // ========================================================================

    pub(crate) fn depth(&self) -> u32 {
        self.functions.last().map_or(0, |f| f.depth)
    }

    pub(crate) fn context(&self) -> FunctionContext {
        self.functions
            .last()
            .copied()
            .unwrap_or_else(FunctionContext::module)
    }

    pub(crate) fn context_mut(&mut self) -> Option<&mut FunctionContext> {
        self.functions.last_mut()
    }

    /// Module code outside any block or function.
    pub(crate) fn at_module_level(&self) -> bool {
        self.functions.len() == 1 && self.module.scopes.is_module_level()
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// Allocate `ident` and bind it in the innermost scope, reporting a
    /// duplicate declaration.
    pub(crate) fn declare(&mut self, mut ident: Identifier, span: Span) -> IdentId {
        ident.function_depth = self.depth();
        let name = ident.name.clone();
        let id = self.module.idents.alloc(ident);
        if self.module.scopes.declare(&name, id).is_err() {
            self.error(MessageCode::DuplicateDeclaration, span, vec![name]);
        }
        id
    }

    /// Bind without reporting duplicates (already reported by the parser).
    pub(crate) fn bind_quietly(&mut self, mut ident: Identifier) -> IdentId {
        ident.function_depth = self.depth();
        let name = ident.name.clone();
        let id = self.module.idents.alloc(ident);
        let _ = self.module.scopes.declare(&name, id);
        id
    }

    /// Declare a variable: a global slot at module level, a stack local
    /// elsewhere.
    pub(crate) fn declare_variable(
        &mut self,
        name: &str,
        ty: TypeId,
        flags: IdentFlags,
        span: Span,
    ) -> IdentId {
        let mut ident = Identifier::new(name, ty, span);
        ident.flags = flags;
        if self.at_module_level() {
            ident.flags.is_global = true;
            ident.global_index = Some(self.module.globals.len() as u32);
        }
        let is_global = ident.flags.is_global;
        let id = self.declare(ident, span);
        if is_global {
            self.module.globals.push(id);
        }
        id
    }

    pub(crate) fn open_scope(&mut self, kind: ScopeKind) {
        self.module.scopes.push(kind);
    }

    /// Close the innermost scope and return its identifiers in declaration
    /// order. Unused locals are reported when culling is on.
    pub(crate) fn close_scope(&mut self) -> Vec<IdentId> {
        let Some(scope) = self.module.scopes.pop() else {
            return Vec::new();
        };
        if self.options.cull_unused {
            for &id in &scope.declared {
                let ident = &self.module.idents[id];
                if ident.is_cullable() {
                    let (span, name) = (ident.span, ident.name.clone());
                    self.error(MessageCode::UnusedVariable, span, vec![name]);
                }
            }
        }
        scope.declared
    }

    // ========================================================================
    // Hoisting
    // ========================================================================

    /// Declare module-level types, enums and functions before visiting, so
    /// they can be referenced ahead of their declaration.
    fn hoist(&mut self, stmts: &mut [Stmt]) {
        fn unwrap_export(stmt: &mut Stmt) -> &mut StmtKind {
            match &mut stmt.kind {
                StmtKind::Export(inner) => &mut inner.kind,
                other => other,
            }
        }

        // Object types and enums first: signatures below may name them.
        for stmt in stmts.iter_mut() {
            match unwrap_export(stmt) {
                StmtKind::TypeDecl(decl) if decl.generics.is_empty() => {
                    let ty = self
                        .module
                        .types
                        .add(SymbolType::new(decl.name.clone(), TypeClass::Placeholder));
                    let mut ident = Identifier::new(decl.name.clone(), ty, decl.span);
                    ident.flags.is_type = true;
                    ident.flags.is_const = true;
                    self.declare(ident, decl.span);
                    decl.ty = Some(ty);
                }
                StmtKind::Enum(decl) => self.define_enum(decl),
                _ => {}
            }
        }

        for stmt in stmts.iter_mut() {
            if let StmtKind::TypeDecl(decl) = unwrap_export(stmt) {
                if !decl.generics.is_empty() {
                    let (name, span) = (decl.name.clone(), decl.span);
                    self.declare_template(&name, TemplateDecl::Type(decl.clone()), span);
                }
            }
        }

        for stmt in stmts.iter_mut() {
            if let StmtKind::Function(func) = unwrap_export(stmt) {
                let Some(name) = func.name.clone() else {
                    continue;
                };
                if !func.generics.is_empty() {
                    self.declare_template(&name, TemplateDecl::Function(func.clone()), func.span);
                    continue;
                }
                let flags = IdentFlags {
                    is_function: true,
                    is_const: true,
                    ..IdentFlags::default()
                };
                func.ident = Some(self.declare_variable(&name, TypeId::FUNCTION, flags, func.span));
            }
        }
    }

    // ========================================================================
    // Type annotations
    // ========================================================================

    /// Resolve a written type to a type id, reporting unknown names and
    /// arity mismatches.
    pub(crate) fn resolve_annotation(&mut self, annotation: &TypeAnnotation) -> TypeId {
        let args: Vec<TypeId> = annotation
            .args
            .iter()
            .map(|a| self.resolve_annotation(a))
            .collect();
        self.resolve_type_name(&annotation.name, args, annotation.span)
    }

    /// Resolve a type name applied to already-resolved arguments.
    pub(crate) fn resolve_type_name(&mut self, name: &str, args: Vec<TypeId>, span: Span) -> TypeId {
        if let Some(id) = self.module.scopes.lookup(name) {
            let ident = &self.module.idents[id];
            if !ident.flags.is_type {
                self.error(MessageCode::NotAType, span, vec![name.to_string()]);
                return TypeId::ERROR;
            }
            if let Some(template) = ident.template {
                let decl = &self.module.generics.template(template).decl;
                let (is_alias, is_function) = (
                    matches!(decl, TemplateDecl::Alias(_)),
                    matches!(decl, TemplateDecl::Function(_)),
                );
                if is_alias {
                    return self.resolve_generic_alias(template, args, span);
                }
                if is_function {
                    self.error(MessageCode::NotAType, span, vec![name.to_string()]);
                    return TypeId::ERROR;
                }
                return match self.instantiate(template, args, span) {
                    Some(instance) => self.module.generics.instance(instance).ty,
                    None => TypeId::ERROR,
                };
            }
            let ty = ident.symbol_type;
            if !args.is_empty() {
                let got = args.len().to_string();
                self.error(
                    MessageCode::GenericArityMismatch,
                    span,
                    vec![name.to_string(), "0".into(), got],
                );
                return TypeId::ERROR;
            }
            return ty;
        }

        match self.module.types.lookup(name) {
            Some(ty) if ty.0 <= TypeId::ARRAY.0 => {
                if !args.is_empty() {
                    let got = args.len().to_string();
                    self.error(
                        MessageCode::GenericArityMismatch,
                        span,
                        vec![name.to_string(), "0".into(), got],
                    );
                    return TypeId::ERROR;
                }
                ty
            }
            _ => {
                self.error(MessageCode::NotAType, span, vec![name.to_string()]);
                TypeId::ERROR
            }
        }
    }

    /// Whether `source` may be stored where `target` is expected; reports
    /// `E3001` when not.
    pub(crate) fn check_assignable(&mut self, target: TypeId, source: TypeId, span: Span) -> bool {
        if self.module.types.is_assignable(target, source) {
            return true;
        }
        let args = vec![
            self.module.types.display(target),
            self.module.types.display(source),
        ];
        self.error(MessageCode::IncompatibleAssignment, span, args);
        false
    }
}
