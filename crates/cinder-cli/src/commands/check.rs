//! `cinderc check`: compile without writing output.

use super::compile_files;
use crate::output::Reporter;
use cinder_compiler::CompileOptions;
use std::path::PathBuf;

pub fn execute(files: &[PathBuf], options: CompileOptions, out: &mut Reporter) -> anyhow::Result<bool> {
    let compiled = compile_files(files, options, out)?;
    Ok(compiled.iter().all(|f| f.outcome.is_success()))
}
