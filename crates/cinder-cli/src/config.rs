//! `cinder.toml` loading.

use anyhow::Context;
use cinder_compiler::CompileOptions;
use serde::Deserialize;
use std::path::Path;

/// Default configuration file, looked up in the working directory.
pub const CONFIG_FILE: &str = "cinder.toml";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ProjectConfig {
    compile: CompileOptions,
}

/// Load compile options. An explicitly named file must exist; the default
/// file is optional.
pub fn load(path: Option<&Path>) -> anyhow::Result<CompileOptions> {
    let (path, required) = match path {
        Some(path) => (path, true),
        None => (Path::new(CONFIG_FILE), false),
    };
    if !required && !path.exists() {
        return Ok(CompileOptions::default());
    }
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&text).with_context(|| format!("parsing {}", path.display()))
}

fn parse(text: &str) -> anyhow::Result<CompileOptions> {
    let config: ProjectConfig = toml::from_str(text)?;
    Ok(config.compile)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let options = parse("[compile]\noptimize = false\nmodule-name = \"app\"\n").unwrap();
        assert!(!options.optimize);
        assert!(options.cull_unused);
        assert_eq!(options.module_name.as_deref(), Some("app"));
    }

    #[test]
    fn test_empty_file() {
        assert_eq!(parse("").unwrap(), CompileOptions::default());
    }

    #[test]
    fn test_unknown_type_is_rejected() {
        assert!(parse("[compile]\nmax-registers = \"many\"\n").is_err());
    }
}
