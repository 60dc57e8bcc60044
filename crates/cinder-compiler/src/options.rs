//! Compile options.

use serde::Deserialize;

/// Options controlling a compilation unit.
///
/// Deserializable from the `[compile]` table of a `cinder.toml`; missing
/// keys take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CompileOptions {
    /// Drop unused locals and report them as warnings
    pub cull_unused: bool,
    /// Run the optimizer between analysis and code generation
    pub optimize: bool,
    /// Register budget per function frame
    pub max_registers: u16,
    /// Treat warnings as errors when deciding whether a compile succeeded
    pub warnings_as_errors: bool,
    /// Name for modules compiled without an explicit one
    pub module_name: Option<String>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            cull_unused: true,
            optimize: true,
            max_registers: 250,
            warnings_as_errors: false,
            module_name: None,
        }
    }
}
