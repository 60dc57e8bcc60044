//! Subcommands.

pub mod build;
pub mod check;
pub mod disasm;

use crate::output::Reporter;
use anyhow::Context;
use cinder_compiler::{CompilationUnit, CompileOptions, ModuleOutcome};
use std::path::{Path, PathBuf};

/// Module name of a source file: its stem.
pub fn module_name(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .with_context(|| format!("no module name in {}", path.display()))
}

/// One compiled source file.
pub struct CompiledFile {
    pub path: PathBuf,
    pub outcome: ModuleOutcome,
}

/// Compile `files` in order through one unit, reporting diagnostics as
/// each file finishes.
pub fn compile_files(
    files: &[PathBuf],
    options: CompileOptions,
    out: &mut Reporter,
) -> anyhow::Result<Vec<CompiledFile>> {
    let mut unit = CompilationUnit::new(options);
    let mut compiled = Vec::with_capacity(files.len());
    for path in files {
        let source = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let name = module_name(path)?;
        let outcome = unit.compile_module(&name, &source);
        out.diagnostics(path, &source, &outcome.diagnostics)?;
        if let Some(error) = &outcome.internal_error {
            anyhow::bail!("internal compiler error in {}: {}", path.display(), error);
        }

        let warnings = outcome.warnings().count();
        let detail = match warnings {
            0 => path.display().to_string(),
            1 => format!("{} (1 warning)", path.display()),
            n => format!("{} ({} warnings)", path.display(), n),
        };
        out.status(outcome.is_success(), "compiled", &detail);
        compiled.push(CompiledFile {
            path: path.clone(),
            outcome,
        });
    }
    Ok(compiled)
}
