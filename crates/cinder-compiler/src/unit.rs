//! Compilation unit: the driver that runs every pass.
//!
//! A [`CompilationUnit`] owns the modules compiled through it, the interfaces
//! of modules that later imports may refer to, and the diagnostics of every
//! compile. One call to [`CompilationUnit::compile_module`] runs
//! parse → Visit → Optimize → Build over one source file.

use crate::analyze::analyze_module;
use crate::analyze::generic::InstantiationStats;
use crate::codegen::build_module;
use crate::diagnostics::CompilerError;
use crate::error::InternalError;
use crate::module::{InterfaceRegistry, Module, ModuleInterface};
use crate::optimize::{optimize_module, OptimizeStats};
use crate::options::CompileOptions;
use crate::parser::parse_source;
use crate::types::TypeId;
use cinder_bytecode::CompiledModule;
use rustc_hash::FxHashMap;

/// Name used by [`CompilationUnit::compile`] when the options carry none.
pub const DEFAULT_MODULE_NAME: &str = "main";

/// Result of compiling one module.
#[derive(Debug)]
pub struct ModuleOutcome {
    pub name: String,
    /// Present when the compile succeeded
    pub compiled: Option<CompiledModule>,
    /// Parse and semantic diagnostics, in the order they were found
    pub diagnostics: Vec<CompilerError>,
    /// Fatal error that aborted code generation
    pub internal_error: Option<InternalError>,
    /// Optimizer counters, when the optimizer ran
    pub optimized: Option<OptimizeStats>,
}

impl ModuleOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &CompilerError> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &CompilerError> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }

    pub fn is_success(&self) -> bool {
        self.compiled.is_some()
    }
}

#[derive(Debug, Default)]
pub struct CompilationUnit {
    options: CompileOptions,
    interfaces: InterfaceRegistry,
    modules: FxHashMap<String, Module>,
    diagnostics: Vec<CompilerError>,
}

impl CompilationUnit {
    pub fn new(options: CompileOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &CompileOptions {
        &self.options
    }

    /// Make `interface` importable by modules compiled afterwards.
    pub fn register_interface(&mut self, interface: ModuleInterface) {
        self.interfaces.insert(interface);
    }

    /// Compile `source` under the configured module name.
    pub fn compile(&mut self, source: &str) -> ModuleOutcome {
        let name = self
            .options
            .module_name
            .clone()
            .unwrap_or_else(|| DEFAULT_MODULE_NAME.to_string());
        self.compile_module(&name, source)
    }

    /// Compile one module. The module is kept afterwards whether or not the
    /// compile succeeded; its interface is registered only on success.
    #[tracing::instrument(level = "debug", skip(self, source), fields(bytes = source.len()))]
    pub fn compile_module(&mut self, name: &str, source: &str) -> ModuleOutcome {
        let (stmts, parse_errors) = parse_source(source);
        let mut diagnostics: Vec<CompilerError> = parse_errors.iter().map(CompilerError::from).collect();
        tracing::debug!(statements = stmts.len(), errors = diagnostics.len(), "parse complete");

        let mut module = Module::new(name, stmts);
        analyze_module(&mut module, &self.options, &self.interfaces, &mut diagnostics);

        let failed = diagnostics
            .iter()
            .any(|d| d.is_error() || self.options.warnings_as_errors);
        let mut outcome = ModuleOutcome {
            name: name.to_string(),
            compiled: None,
            diagnostics,
            internal_error: None,
            optimized: None,
        };

        if failed {
            tracing::debug!(errors = outcome.errors().count(), "compile failed");
        } else {
            if self.options.optimize {
                outcome.optimized = Some(optimize_module(&mut module));
            }
            match build_module(&mut module, &self.options) {
                Ok(compiled) => {
                    self.interfaces.insert(module.interface());
                    outcome.compiled = Some(compiled);
                }
                Err(error) => {
                    tracing::error!(%error, module = name, "internal compiler error");
                    outcome.internal_error = Some(error);
                }
            }
        }

        self.diagnostics.extend(outcome.diagnostics.iter().cloned());
        self.modules.insert(name.to_string(), module);
        outcome
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.get(name)
    }

    pub fn take_module(&mut self, name: &str) -> Option<Module> {
        self.modules.remove(name)
    }

    /// Every diagnostic reported by this unit so far.
    pub fn diagnostics(&self) -> &[CompilerError] {
        &self.diagnostics
    }

    /// Clone and build counts for `template<args>` in `module`.
    pub fn instantiation_stats(&self, module: &str, template: &str, args: &[TypeId]) -> InstantiationStats {
        self.module(module)
            .and_then(|m| {
                let id = m.generics.template_by_name(template)?;
                Some(m.generics.stats(id, args))
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MessageCode;

    #[test]
    fn test_successful_compile_registers_interface() {
        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("lib", "export const answer = 42; export function twice(x) { return x * 2; }");
        assert!(outcome.is_success(), "{:?}", outcome.diagnostics);

        let outcome = unit.compile_module(
            "app",
            "import { answer, twice } from \"lib\"; let v = twice(answer);",
        );
        assert!(outcome.is_success(), "{:?}", outcome.diagnostics);
        let compiled = outcome.compiled.unwrap();
        assert_eq!(compiled.imports.len(), 1);
        assert_eq!(compiled.imports[0].module, "lib");
    }

    #[test]
    fn test_failed_compile_keeps_module() {
        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("bad", "let x = y;");
        assert!(!outcome.is_success());
        assert!(outcome.internal_error.is_none());
        let codes: Vec<_> = outcome.errors().map(|e| e.code).collect();
        assert_eq!(codes, vec![MessageCode::UnresolvedIdentifier]);
        assert!(unit.module("bad").is_some());
        assert_eq!(unit.diagnostics().len(), 1);
    }

    #[test]
    fn test_warnings_as_errors() {
        let source = "function f() { let unused = 1; } f();";

        let mut unit = CompilationUnit::default();
        let outcome = unit.compile_module("m", source);
        assert!(outcome.is_success());
        assert_eq!(outcome.warnings().count(), 1);

        let mut strict = CompilationUnit::new(CompileOptions {
            warnings_as_errors: true,
            ..CompileOptions::default()
        });
        assert!(!strict.compile_module("m", source).is_success());
    }

    #[test]
    fn test_compile_uses_configured_name() {
        let mut unit = CompilationUnit::new(CompileOptions {
            module_name: Some("script".into()),
            ..CompileOptions::default()
        });
        let outcome = unit.compile("let a = 1;");
        assert_eq!(outcome.compiled.map(|c| c.name), Some("script".to_string()));
    }
}
