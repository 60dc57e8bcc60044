//! `cinderc build`: compile to `.cnb` modules.

use super::{compile_files, module_name};
use crate::output::Reporter;
use anyhow::Context;
use cinder_compiler::CompileOptions;
use std::path::{Path, PathBuf};

/// Extension of the binary module container.
pub const MODULE_EXTENSION: &str = "cnb";

pub fn execute(
    files: &[PathBuf],
    out_dir: &Path,
    json: bool,
    options: CompileOptions,
    out: &mut Reporter,
) -> anyhow::Result<bool> {
    let compiled = compile_files(files, options, out)?;
    if !compiled.iter().all(|f| f.outcome.is_success()) {
        return Ok(false);
    }

    std::fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for file in &compiled {
        let Some(module) = &file.outcome.compiled else {
            continue;
        };
        let name = module_name(&file.path)?;
        let (target, bytes) = if json {
            (out_dir.join(format!("{}.json", name)), serde_json::to_vec_pretty(module)?)
        } else {
            (out_dir.join(format!("{}.{}", name, MODULE_EXTENSION)), module.encode())
        };
        std::fs::write(&target, &bytes).with_context(|| format!("writing {}", target.display()))?;
        tracing::debug!(path = %target.display(), bytes = bytes.len(), "wrote module");
        out.status(true, "wrote", &target.display().to_string());
    }
    Ok(true)
}
