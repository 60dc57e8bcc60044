//! `cinderc disasm`: human-readable dump of a module.

use super::build::MODULE_EXTENSION;
use super::compile_files;
use crate::output::Reporter;
use anyhow::Context;
use cinder_bytecode::{disassemble, CompiledModule};
use cinder_compiler::CompileOptions;
use std::io::Write;
use std::path::Path;

pub fn execute(file: &Path, options: CompileOptions, out: &mut Reporter) -> anyhow::Result<bool> {
    let module = if file.extension().is_some_and(|e| e == MODULE_EXTENSION) {
        let bytes = std::fs::read(file).with_context(|| format!("reading {}", file.display()))?;
        CompiledModule::decode(&bytes).with_context(|| format!("decoding {}", file.display()))?
    } else {
        let compiled = compile_files(&[file.to_path_buf()], options, out)?;
        match compiled.into_iter().next().and_then(|f| f.outcome.compiled) {
            Some(module) => module,
            None => return Ok(false),
        }
    };
    write!(out.stdout(), "{}", disassemble(&module))?;
    Ok(true)
}
