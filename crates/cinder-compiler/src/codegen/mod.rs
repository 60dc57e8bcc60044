//! Code Generation (the Build pass)
//!
//! Lowers an analyzed and optimized [`Module`] into a
//! [`CompiledModule`](cinder_bytecode::CompiledModule).
//!
//! # Layout
//!
//! - Expression temporaries live in registers, allocated as a stack by
//!   [`CodegenContext`]; every node releases what it allocated.
//! - Declared locals live in value-stack slots. A scope pushes one slot per
//!   surviving local and pops them all when it closes; the count must match
//!   the identifiers the scope recorded.
//! - Module-level variables and functions live in global slots.
//! - Object types and enums become prototype objects in the static pool;
//!   methods are entries of the function table referenced from them.
//! - Jumps target labels, resolved when each function is finalized.

mod context;
mod expr;
mod loops;
mod stmt;

pub use context::{CodegenContext, Frame, RegisterMark};

use crate::analyze::generic::{InstanceBody, InstanceId};
use crate::ast::{FunctionDecl, StmtKind, TypeDecl};
use crate::error::InternalError;
use crate::module::{literal_value, Module};
use crate::options::CompileOptions;
use crate::scope::IdentId;
use crate::types::TypeId;
use crate::value::ConstValue;
use cinder_bytecode::{
    verify_module, Chunk, CompiledModule, Export, ExportKind, FunctionProto, Import, Instruction,
    LabelAllocator, PrototypeObject, Reg, StaticMember, StaticPool,
};
use rustc_hash::FxHashMap;

pub type BuildResult<T> = Result<T, InternalError>;

/// Build a module. Records one build per generic instance in the module's
/// instantiation statistics.
pub fn build_module(module: &mut Module, options: &CompileOptions) -> BuildResult<CompiledModule> {
    let (compiled, built) = {
        let mut emitter = Emitter::new(module, options);
        let compiled = emitter.build()?;
        (compiled, emitter.built_instances)
    };
    for id in built {
        module.generics.record_build(id);
    }
    verify_module(&compiled)?;
    tracing::debug!(
        module = %compiled.name,
        functions = compiled.functions.len(),
        statics = compiled.statics.len(),
        "build complete"
    );
    Ok(compiled)
}

// ============================================================================
// Module-wide state
// ============================================================================

pub(crate) struct Emitter<'m> {
    module: &'m Module,
    options: &'m CompileOptions,
    labels: LabelAllocator,
    statics: StaticPool,
    functions: Vec<Option<FunctionProto>>,
    /// Static index of each prototype object
    prototypes: FxHashMap<TypeId, u32>,
    /// Function table index of each generic function instance
    instance_functions: FxHashMap<InstanceId, u32>,
    built_instances: Vec<InstanceId>,
}

impl<'m> Emitter<'m> {
    fn new(module: &'m Module, options: &'m CompileOptions) -> Self {
        Self {
            module,
            options,
            labels: LabelAllocator::new(),
            statics: StaticPool::new(),
            functions: Vec::new(),
            prototypes: FxHashMap::default(),
            instance_functions: FxHashMap::default(),
            built_instances: Vec::new(),
        }
    }

    fn build(&mut self) -> BuildResult<CompiledModule> {
        let module = self.module;
        self.build_prototypes()?;
        self.build_instances()?;

        let mut main = FunctionBuilder::new(self, "<main>".to_string(), 0, false);
        main.build_prologue()?;
        for stmt in &module.stmts {
            main.build_stmt(stmt)?;
        }
        let main = main.finish()?;

        let functions = std::mem::take(&mut self.functions)
            .into_iter()
            .enumerate()
            .map(|(i, f)| f.ok_or(InternalError::UnbuiltFunction(i as u32)))
            .collect::<BuildResult<Vec<_>>>()?;

        let exports = module
            .exports
            .iter()
            .map(|entry| {
                let ident = &module.idents[entry.ident];
                let index = match entry.kind {
                    ExportKind::Type => {
                        let ty = module.types.resolve_alias(ident.symbol_type);
                        self.prototypes.get(&ty).copied()
                    }
                    _ => ident.global_index,
                };
                index
                    .map(|index| Export {
                        name: entry.name.clone(),
                        kind: entry.kind,
                        index,
                    })
                    .ok_or_else(|| InternalError::Unallocated {
                        name: entry.name.clone(),
                    })
            })
            .collect::<BuildResult<Vec<_>>>()?;

        Ok(CompiledModule {
            name: module.name.clone(),
            main,
            functions,
            statics: std::mem::take(&mut self.statics),
            globals: module
                .globals
                .iter()
                .map(|id| module.idents[*id].name.clone())
                .collect(),
            exports,
            imports: module
                .imports
                .iter()
                .map(|entry| Import {
                    module: entry.module.clone(),
                    names: entry.names.clone(),
                })
                .collect(),
        })
    }

    /// Reserve a prototype for every object type and enum, then fill them
    /// in, so prototypes and methods can refer to each other.
    fn build_prototypes(&mut self) -> BuildResult<()> {
        let module = self.module;
        let mut declared: Vec<(TypeId, Option<&'m TypeDecl>)> = Vec::new();
        for stmt in &module.stmts {
            let kind = match &stmt.kind {
                StmtKind::Export(inner) => &inner.kind,
                kind => kind,
            };
            match kind {
                StmtKind::TypeDecl(decl) if decl.generics.is_empty() => {
                    if let Some(ty) = decl.ty {
                        declared.push((ty, Some(decl)));
                    }
                }
                StmtKind::Enum(decl) => {
                    if let Some(ty) = decl.ty {
                        declared.push((ty, None));
                    }
                }
                _ => {}
            }
        }
        for (_, instance) in module.generics.instances() {
            if let InstanceBody::Type(decl) = &instance.body {
                declared.push((instance.ty, Some(decl)));
            }
        }

        for (ty, _) in &declared {
            let index = self.statics.reserve_prototype(module.types.name(*ty));
            self.prototypes.insert(*ty, index);
        }
        for (ty, decl) in declared {
            self.define_prototype(ty, decl)?;
        }
        Ok(())
    }

    fn define_prototype(&mut self, ty: TypeId, decl: Option<&'m TypeDecl>) -> BuildResult<()> {
        let module = self.module;
        let symbol = module.types.get(ty);
        let mut members = Vec::with_capacity(symbol.members.len());
        for member in &symbol.members {
            let value = if member.is_method {
                let method = decl
                    .and_then(|d| d.methods.iter().find(|m| m.name.as_deref() == Some(member.name.as_str())))
                    .ok_or_else(|| InternalError::MissingPrototype(member.name.clone()))?;
                let name = format!("{}.{}", symbol.name, member.name);
                StaticMember::Function(self.build_function(method, name, true)?)
            } else {
                match member.default.as_ref().and_then(literal_value) {
                    None | Some(ConstValue::Null) => StaticMember::Null,
                    Some(ConstValue::Bool(b)) => StaticMember::Bool(b),
                    Some(ConstValue::Number(n)) => StaticMember::Number(n),
                    Some(ConstValue::String(s)) => StaticMember::String(s),
                }
            };
            members.push((member.name.clone(), value));
        }

        let parent = symbol
            .prototype
            .map(|p| module.types.resolve_alias(p))
            .and_then(|p| self.prototypes.get(&p).copied());
        let index = self
            .prototypes
            .get(&ty)
            .copied()
            .ok_or_else(|| InternalError::MissingPrototype(symbol.name.clone()))?;
        self.statics.set_prototype(
            index,
            PrototypeObject {
                type_name: symbol.name.clone(),
                parent,
                members,
            },
        );
        Ok(())
    }

    /// Build every generic function instance exactly once.
    fn build_instances(&mut self) -> BuildResult<()> {
        let module = self.module;
        for (id, instance) in module.generics.instances() {
            if let InstanceBody::Function(_) = instance.body {
                let index = self.reserve_function();
                self.instance_functions.insert(id, index);
            }
        }
        for (id, instance) in module.generics.instances() {
            match &instance.body {
                InstanceBody::Function(func) => {
                    let index = self.instance_functions[&id];
                    let proto = self.compile_function(func, instance.name.clone(), false)?;
                    self.functions[index as usize] = Some(proto);
                    self.built_instances.push(id);
                }
                InstanceBody::Type(_) => self.built_instances.push(id),
                InstanceBody::Pending => {}
            }
        }
        Ok(())
    }

    fn reserve_function(&mut self) -> u32 {
        self.functions.push(None);
        (self.functions.len() - 1) as u32
    }

    /// Build `func` into a new function table entry.
    fn build_function(&mut self, func: &FunctionDecl, name: String, is_method: bool) -> BuildResult<u32> {
        let index = self.reserve_function();
        let proto = self.compile_function(func, name, is_method)?;
        self.functions[index as usize] = Some(proto);
        Ok(index)
    }

    fn compile_function(&mut self, func: &FunctionDecl, name: String, is_method: bool) -> BuildResult<FunctionProto> {
        let param_count = u8::try_from(func.params.len()).map_err(|_| InternalError::TooManyOperands {
            what: "parameter",
            count: func.params.len(),
        })?;
        let mut builder = FunctionBuilder::new(self, name, param_count, is_method);
        for (slot, param) in func.params.iter().enumerate() {
            let id = param.ident.ok_or(InternalError::UnvisitedNode { span: param.span })?;
            builder.slots.insert(id, slot as u16);
        }
        builder.build_block(&func.body)?;
        builder.finish()
    }
}

// ============================================================================
// Per-function state
// ============================================================================

pub(crate) struct FunctionBuilder<'e, 'm> {
    emitter: &'e mut Emitter<'m>,
    chunk: Chunk,
    ctx: CodegenContext,
    frames: Vec<Frame>,
    /// Stack slot of each live local
    slots: FxHashMap<IdentId, u16>,
    name: String,
    param_count: u8,
    is_method: bool,
}

impl<'e, 'm> FunctionBuilder<'e, 'm> {
    fn new(emitter: &'e mut Emitter<'m>, name: String, param_count: u8, is_method: bool) -> Self {
        let ctx = CodegenContext::new(emitter.options.max_registers, param_count as u32);
        Self {
            emitter,
            chunk: Chunk::new(),
            ctx,
            frames: Vec::new(),
            slots: FxHashMap::default(),
            name,
            param_count,
            is_method,
        }
    }

    fn module(&self) -> &'m Module {
        self.emitter.module
    }

    fn emit(&mut self, instr: Instruction) {
        self.chunk.emit(instr);
    }

    fn alloc(&mut self) -> BuildResult<Reg> {
        self.ctx.alloc()
    }

    fn label(&mut self) -> cinder_bytecode::LabelId {
        self.emitter.labels.make()
    }

    fn string(&mut self, s: &str) -> u32 {
        self.emitter.statics.add_string(s)
    }

    /// Whether a declared local gets no slot: culling is on and nothing
    /// reads or writes it.
    fn is_culled(&self, id: IdentId) -> bool {
        self.emitter.options.cull_unused && self.module().idents[id].is_cullable()
    }

    /// Store module-level functions into their globals before any other
    /// code runs, so calls may precede the declaration.
    fn build_prologue(&mut self) -> BuildResult<()> {
        let module = self.module();
        for stmt in &module.stmts {
            let kind = match &stmt.kind {
                StmtKind::Export(inner) => &inner.kind,
                kind => kind,
            };
            let StmtKind::Function(func) = kind else {
                continue;
            };
            if !func.generics.is_empty() {
                continue;
            }
            let id = func.ident.ok_or(InternalError::UnvisitedNode { span: func.span })?;
            let ident = &module.idents[id];
            let global = ident.global_index.ok_or_else(|| InternalError::Unallocated {
                name: ident.name.clone(),
            })?;
            let index = self.emitter.build_function(func, ident.name.clone(), false)?;
            let mark = self.ctx.mark();
            let reg = self.alloc()?;
            self.emit(Instruction::LoadFunction { dst: reg, index });
            self.emit(Instruction::StoreGlobal { index: global, src: reg });
            self.ctx.release(mark);
        }
        Ok(())
    }

    fn finish(mut self) -> BuildResult<FunctionProto> {
        self.emit(Instruction::ReturnNull);
        let generation = self.emitter.labels.generation();
        let code = self.chunk.finalize(generation)?;
        tracing::trace!(
            function = %self.name,
            instructions = code.len(),
            registers = self.ctx.max_register,
            max_stack = self.ctx.max_stack,
            "function built"
        );
        Ok(FunctionProto {
            name: self.name,
            param_count: self.param_count,
            register_count: self.ctx.max_register,
            max_stack: self.ctx.max_stack,
            is_method: self.is_method,
            code,
        })
    }

    /// Load the prototype object of an object type or enum.
    fn load_type(&mut self, ty: TypeId, dst: Reg) -> BuildResult<()> {
        let module = self.module();
        let ty = module.types.resolve_alias(ty);
        if let Some(&index) = self.emitter.prototypes.get(&ty) {
            self.emit(Instruction::LoadConst { dst, index });
            return Ok(());
        }
        if let Some(&(module_index, export)) = module.type_imports.get(&ty) {
            self.emit(Instruction::LoadImport {
                dst,
                module: module_index,
                export,
            });
            return Ok(());
        }
        Err(InternalError::MissingPrototype(module.types.display(ty)))
    }
}

#[cfg(test)]
mod tests {
    use crate::options::CompileOptions;
    use crate::unit::CompilationUnit;
    use cinder_bytecode::{Instruction, StaticMember, Target};

    fn build(source: &str) -> cinder_bytecode::CompiledModule {
        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("test", source);
        outcome
            .compiled
            .unwrap_or_else(|| panic!("compile failed: {:?}", outcome.diagnostics))
    }

    #[test]
    fn test_every_function_ends_in_return() {
        let module = build("function f(a) { if (a) { return 1; } } f(1);");
        for function in module.all_functions() {
            assert!(matches!(
                function.code.code.last(),
                Some(Instruction::ReturnNull)
            ));
        }
    }

    #[test]
    fn test_labels_resolved_in_range() {
        let module = build(
            "let n = 0; for (let i = 0; i < 10; i++) { if (i == 3) continue; if (i > 7) break; n += i; }",
        );
        for function in module.all_functions() {
            for instr in &function.code.code {
                if let Some(target) = instr.target() {
                    let Target::Offset(offset) = target else {
                        panic!("unresolved label in {:?}", instr);
                    };
                    assert!((offset as usize) < function.code.len());
                }
            }
        }
    }

    #[test]
    fn test_prototype_with_method() {
        let module = build("type Point { x = 1; y: number; function len() { return this.x; } } let p = new Point;");
        let proto = module
            .statics
            .entries()
            .iter()
            .find_map(|e| match e {
                cinder_bytecode::StaticValue::Prototype(p) if p.type_name == "Point" => Some(p),
                _ => None,
            })
            .expect("prototype emitted");
        assert_eq!(proto.member("x"), Some(&StaticMember::Number(1.0)));
        assert_eq!(proto.member("y"), Some(&StaticMember::Number(0.0)));
        let Some(StaticMember::Function(index)) = proto.member("len") else {
            panic!("method missing");
        };
        assert!(module.functions[*index as usize].is_method);
    }

    fn pushes_in(module: &cinder_bytecode::CompiledModule, name: &str) -> usize {
        let function = module
            .all_functions()
            .find(|f| f.name == name)
            .unwrap_or_else(|| panic!("no function `{}`", name));
        function
            .code
            .code
            .iter()
            .filter(|i| matches!(i, Instruction::Push { .. }))
            .count()
    }

    #[test]
    fn test_unused_locals_are_culled() {
        let module = build("function f() { let unused = 1; let y = 2; return y; } f();");
        assert_eq!(pushes_in(&module, "f"), 1);
    }

    #[test]
    fn test_underscore_locals_are_kept() {
        let module = build("function f() { let _keep = 1; let y = 2; return y; } f();");
        assert_eq!(pushes_in(&module, "f"), 2);

        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("test", "function f() { let _keep = 1; return 0; } f();");
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
    }

    #[test]
    fn test_register_budget_is_enforced() {
        let options = CompileOptions {
            max_registers: 2,
            ..CompileOptions::default()
        };
        let mut unit = CompilationUnit::new(options);
        let outcome = unit.compile_module("test", "let a = [1, 2, 3, 4];");
        assert!(outcome.compiled.is_none());
        assert!(outcome.internal_error.is_some());
    }
}
