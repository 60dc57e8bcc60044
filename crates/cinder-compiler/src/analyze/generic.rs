//! Generic templates and their instantiations.
//!
//! A generic function or object type is stored once as a [`Template`]; its
//! body is never analyzed or built as written. Each use with concrete type
//! arguments clones the template, and the clone is analyzed inside a fresh
//! instantiation scope where every type parameter is bound to its argument.
//! The cache keyed by `(template, arguments)` makes sure each distinct
//! binding is analyzed and built exactly once.

use super::{Analyzer, FunctionContext};
use crate::ast::{AliasDecl, FunctionDecl, GenericParam, TypeDecl};
use crate::diagnostics::MessageCode;
use crate::scope::{IdentFlags, Identifier, ScopeKind};
use crate::token::Span;
use crate::types::{SymbolType, TypeClass, TypeId};
use rustc_hash::FxHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TemplateId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub u32);

/// Declaration a template was created from.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDecl {
    Function(FunctionDecl),
    Type(TypeDecl),
    Alias(AliasDecl),
}

impl TemplateDecl {
    pub fn generics(&self) -> &[GenericParam] {
        match self {
            TemplateDecl::Function(f) => &f.generics,
            TemplateDecl::Type(t) => &t.generics,
            TemplateDecl::Alias(a) => &a.generics,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Template {
    pub name: String,
    pub decl: TemplateDecl,
    pub span: Span,
}

impl Template {
    pub fn arity(&self) -> usize {
        self.decl.generics().len()
    }
}

/// Analyzed clone of a template.
#[derive(Debug, Clone, PartialEq)]
pub enum InstanceBody {
    /// Reserved while the clone is being analyzed
    Pending,
    Function(FunctionDecl),
    Type(TypeDecl),
}

#[derive(Debug, Clone)]
pub struct Instance {
    pub template: TemplateId,
    pub args: Vec<TypeId>,
    /// Display name, e.g. `Box<number>`
    pub name: String,
    pub body: InstanceBody,
    /// Function type or object type of the instance
    pub ty: TypeId,
}

/// Clone and build counts for one `(template, arguments)` binding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InstantiationStats {
    pub clones: u32,
    pub builds: u32,
}

type CacheKey = (TemplateId, Vec<TypeId>);

/// Templates, instances and the instantiation cache of one module.
#[derive(Debug, Clone, Default)]
pub struct GenericRegistry {
    templates: Vec<Template>,
    instances: Vec<Instance>,
    cache: FxHashMap<CacheKey, InstanceId>,
    stats: FxHashMap<CacheKey, InstantiationStats>,
}

impl GenericRegistry {
    pub fn add_template(&mut self, template: Template) -> TemplateId {
        let id = TemplateId(self.templates.len() as u32);
        self.templates.push(template);
        id
    }

    pub fn template(&self, id: TemplateId) -> &Template {
        &self.templates[id.0 as usize]
    }

    pub fn instance(&self, id: InstanceId) -> &Instance {
        &self.instances[id.0 as usize]
    }

    pub fn instance_mut(&mut self, id: InstanceId) -> &mut Instance {
        &mut self.instances[id.0 as usize]
    }

    pub fn instances(&self) -> impl Iterator<Item = (InstanceId, &Instance)> {
        self.instances
            .iter()
            .enumerate()
            .map(|(i, inst)| (InstanceId(i as u32), inst))
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Instance whose object type is `ty`.
    pub fn instance_for_type(&self, ty: TypeId) -> Option<InstanceId> {
        self.instances()
            .find(|(_, inst)| inst.ty == ty && matches!(inst.body, InstanceBody::Type(_) | InstanceBody::Pending))
            .map(|(id, _)| id)
    }

    pub fn cached(&self, template: TemplateId, args: &[TypeId]) -> Option<InstanceId> {
        self.cache.get(&(template, args.to_vec())).copied()
    }

    /// Register a new instance and cache it under its binding.
    pub fn insert_instance(
        &mut self,
        template: TemplateId,
        args: Vec<TypeId>,
        name: String,
        ty: TypeId,
    ) -> InstanceId {
        let id = InstanceId(self.instances.len() as u32);
        self.cache.insert((template, args.clone()), id);
        self.instances.push(Instance {
            template,
            args,
            name,
            body: InstanceBody::Pending,
            ty,
        });
        id
    }

    pub fn record_clone(&mut self, template: TemplateId, args: &[TypeId]) {
        self.stats
            .entry((template, args.to_vec()))
            .or_default()
            .clones += 1;
    }

    pub fn record_build(&mut self, id: InstanceId) {
        let inst = &self.instances[id.0 as usize];
        let key = (inst.template, inst.args.clone());
        self.stats.entry(key).or_default().builds += 1;
    }

    /// Counts for one binding.
    pub fn stats(&self, template: TemplateId, args: &[TypeId]) -> InstantiationStats {
        self.stats
            .get(&(template, args.to_vec()))
            .copied()
            .unwrap_or_default()
    }

    /// Counts summed over every binding.
    pub fn total_stats(&self) -> InstantiationStats {
        self.stats
            .values()
            .fold(InstantiationStats::default(), |acc, s| InstantiationStats {
                clones: acc.clones + s.clones,
                builds: acc.builds + s.builds,
            })
    }

    pub fn template_by_name(&self, name: &str) -> Option<TemplateId> {
        self.templates
            .iter()
            .position(|t| t.name == name)
            .map(|i| TemplateId(i as u32))
    }

    /// Move every instance body out, for code generation.
    pub fn take_bodies(&mut self) -> Vec<(InstanceId, InstanceBody)> {
        self.instances
            .iter_mut()
            .enumerate()
            .map(|(i, inst)| {
                let body = std::mem::replace(&mut inst.body, InstanceBody::Pending);
                (InstanceId(i as u32), body)
            })
            .collect()
    }

    pub fn restore_bodies(&mut self, bodies: Vec<(InstanceId, InstanceBody)>) {
        for (id, body) in bodies {
            self.instances[id.0 as usize].body = body;
        }
    }

    /// Mutable access to analyzed bodies, for optimization.
    pub fn bodies_mut(&mut self) -> impl Iterator<Item = &mut InstanceBody> {
        self.instances.iter_mut().map(|inst| &mut inst.body)
    }
}

impl<'a> Analyzer<'a> {
    /// Declare a template for a generic declaration: the signature is
    /// checked with unbound type parameters and the body is left untouched.
    pub(crate) fn declare_template(
        &mut self,
        name: &str,
        decl: TemplateDecl,
        span: Span,
    ) -> TemplateId {
        self.check_template_signature(&decl);
        let arity = decl.generics().len();
        let is_type = !matches!(decl, TemplateDecl::Function(_));
        let template = self.module.generics.add_template(Template {
            name: name.to_string(),
            decl,
            span,
        });

        let mut generic = SymbolType::new(name, TypeClass::Generic);
        generic.arity = arity;
        generic.template = Some(template);
        let ty = self.module.types.add_anonymous(generic);

        let mut ident = Identifier::new(name, ty, span);
        ident.flags = IdentFlags {
            is_generic: true,
            is_const: true,
            is_type,
            ..IdentFlags::default()
        };
        ident.template = Some(template);
        self.declare(ident, span);
        template
    }

    /// Resolve the annotations of a template under a scope flagged as an
    /// uninstantiated generic, so unknown names are reported once.
    fn check_template_signature(&mut self, decl: &TemplateDecl) {
        self.module.scopes.push(ScopeKind::Block);
        self.module.scopes.current_mut().flags.uninstantiated_generic = true;
        for param in decl.generics() {
            let ty = self
                .module
                .types
                .add_anonymous(SymbolType::new(param.name.clone(), TypeClass::GenericParameter));
            let mut ident = Identifier::new(param.name.clone(), ty, param.span);
            ident.flags.is_type = true;
            self.bind_quietly(ident);
        }

        match decl {
            TemplateDecl::Function(func) => {
                for param in &func.params {
                    if let Some(annotation) = &param.annotation {
                        self.resolve_annotation(annotation);
                    }
                }
                if let Some(ret) = &func.return_type {
                    self.resolve_annotation(ret);
                }
            }
            TemplateDecl::Type(decl) => {
                if let Some(proto) = &decl.prototype {
                    self.resolve_annotation(proto);
                }
                for member in &decl.members {
                    if let Some(annotation) = &member.annotation {
                        self.resolve_annotation(annotation);
                    }
                }
            }
            TemplateDecl::Alias(alias) => {
                self.resolve_annotation(&alias.target);
            }
        }
        self.module.scopes.pop();
    }

    fn check_arity(&mut self, template: TemplateId, got: usize, span: Span) -> bool {
        let tpl = self.module.generics.template(template);
        if tpl.arity() == got {
            return true;
        }
        let args = vec![tpl.name.clone(), tpl.arity().to_string(), got.to_string()];
        self.error(MessageCode::GenericArityMismatch, span, args);
        false
    }

    /// Instantiate a function or object-type template.
    ///
    /// Every call clones the template; the clone is only analyzed when the
    /// binding is not cached yet.
    pub(crate) fn instantiate(
        &mut self,
        template: TemplateId,
        args: Vec<TypeId>,
        span: Span,
    ) -> Option<InstanceId> {
        if !self.check_arity(template, args.len(), span) {
            return None;
        }

        let tpl = self.module.generics.template(template);
        let decl = tpl.decl.clone();
        let arg_names: Vec<String> = args
            .iter()
            .map(|a| self.module.types.display(*a))
            .collect();
        let name = format!("{}<{}>", tpl.name, arg_names.join(", "));
        self.module.generics.record_clone(template, &args);

        if let Some(id) = self.module.generics.cached(template, &args) {
            return Some(id);
        }
        tracing::debug!(instance = %name, "instantiating template");

        match decl {
            TemplateDecl::Function(mut func) => {
                let id = self.module.generics.insert_instance(
                    template,
                    args.clone(),
                    name.clone(),
                    TypeId::FUNCTION,
                );
                let generics = std::mem::take(&mut func.generics);
                let ty = self.with_bindings(&generics, &args, |a| a.visit_function(&mut func, None));
                func.name = Some(name);
                let inst = self.module.generics.instance_mut(id);
                inst.ty = ty;
                inst.body = InstanceBody::Function(func);
                Some(id)
            }
            TemplateDecl::Type(mut decl) => {
                let mut object = SymbolType::new(name.clone(), TypeClass::Object);
                object.bindings = args.clone();
                let ty = self.module.types.add(object);
                let id = self
                    .module
                    .generics
                    .insert_instance(template, args.clone(), name.clone(), ty);
                let generics = std::mem::take(&mut decl.generics);
                self.with_bindings(&generics, &args, |a| a.define_object_type(&mut decl, ty));
                decl.name = name;
                self.module.generics.instance_mut(id).body = InstanceBody::Type(decl);
                Some(id)
            }
            TemplateDecl::Alias(_) => None,
        }
    }

    /// Resolve a generic alias with its parameters bound to `args`.
    pub(crate) fn resolve_generic_alias(
        &mut self,
        template: TemplateId,
        args: Vec<TypeId>,
        span: Span,
    ) -> TypeId {
        if !self.check_arity(template, args.len(), span) {
            return TypeId::ERROR;
        }
        let TemplateDecl::Alias(alias) = self.module.generics.template(template).decl.clone() else {
            return TypeId::ERROR;
        };
        self.module.scopes.push(ScopeKind::GenericInstantiation);
        self.bind_type_params(&alias.generics, &args);
        let ty = self.resolve_annotation(&alias.target);
        self.module.scopes.pop();
        ty
    }

    fn bind_type_params(&mut self, generics: &[GenericParam], args: &[TypeId]) {
        for (param, arg) in generics.iter().zip(args) {
            let mut ident = Identifier::new(param.name.clone(), *arg, param.span);
            ident.flags.is_type = true;
            self.bind_quietly(ident);
        }
    }

    /// Run `f` in a clean environment: only module-level names are visible,
    /// plus the type parameters bound to `args`.
    fn with_bindings<T>(
        &mut self,
        generics: &[GenericParam],
        args: &[TypeId],
        f: impl FnOnce(&mut Self) -> T,
    ) -> T {
        let nested = self.module.scopes.split_off_nested();
        let functions = std::mem::replace(&mut self.functions, vec![FunctionContext::module()]);

        self.module.scopes.push(ScopeKind::GenericInstantiation);
        self.bind_type_params(generics, args);
        let result = f(self);
        self.module.scopes.pop();

        self.module.scopes.restore_nested(nested);
        self.functions = functions;
        result
    }

    /// Type arguments for a generic function call without explicit ones:
    /// a parameter annotated exactly `T` binds `T` to its argument's type.
    pub(crate) fn infer_type_args(&self, template: TemplateId, arg_types: &[TypeId]) -> Vec<TypeId> {
        let TemplateDecl::Function(func) = &self.module.generics.template(template).decl else {
            return Vec::new();
        };
        func.generics
            .iter()
            .map(|g| {
                func.params
                    .iter()
                    .zip(arg_types)
                    .find(|(p, _)| {
                        p.annotation
                            .as_ref()
                            .is_some_and(|a| a.name == g.name && a.args.is_empty())
                    })
                    .map(|(_, ty)| *ty)
                    .unwrap_or(TypeId::ANY)
            })
            .collect()
    }
}
