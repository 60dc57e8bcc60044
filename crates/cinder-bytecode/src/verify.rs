//! Bytecode verification
//!
//! Checks the structural guarantees the VM relies on: every jump resolved
//! and in range, register and table references in bounds, and no function
//! that can run off its end.

use crate::instruction::{Instruction, Target};
use crate::module::{CompiledModule, FunctionProto};
use crate::statics::StaticValue;

/// Bytecode verification errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    /// Jump still carries a label
    #[error("Unresolved label in `{function}` at offset {offset}")]
    UnresolvedLabel { function: String, offset: usize },

    /// Jump outside the function
    #[error("Invalid jump target {target} in `{function}` at offset {offset}")]
    InvalidJumpTarget {
        function: String,
        target: u32,
        offset: usize,
    },

    /// Register beyond the frame
    #[error("Register r{register} exceeds frame size {max} in `{function}` at offset {offset}")]
    InvalidRegister {
        function: String,
        register: u16,
        max: u16,
        offset: usize,
    },

    /// Static pool index out of range or of the wrong kind
    #[error("Invalid static reference {index} in `{function}` at offset {offset}")]
    InvalidStaticRef {
        function: String,
        index: u32,
        offset: usize,
    },

    /// Function table index out of range
    #[error("Invalid function reference {index} in `{function}` at offset {offset}")]
    InvalidFunctionRef {
        function: String,
        index: u32,
        offset: usize,
    },

    /// Global slot out of range
    #[error("Invalid global reference {index} in `{function}` at offset {offset}")]
    InvalidGlobalRef {
        function: String,
        index: u32,
        offset: usize,
    },

    /// Import table reference out of range
    #[error("Invalid import reference {module}:{export} in `{function}` at offset {offset}")]
    InvalidImportRef {
        function: String,
        module: u16,
        export: u16,
        offset: usize,
    },

    /// Execution falls off end
    #[error("Execution falls off end of `{0}`")]
    FallOffEnd(String),
}

/// Verify every function of a module
pub fn verify_module(module: &CompiledModule) -> Result<(), VerifyError> {
    for function in module.all_functions() {
        verify_function(function, module)?;
    }
    Ok(())
}

fn verify_function(function: &FunctionProto, module: &CompiledModule) -> Result<(), VerifyError> {
    let code = &function.code.code;
    let name = || function.name.clone();

    match code.last() {
        Some(last) if last.opcode().is_terminator() => {}
        _ => return Err(VerifyError::FallOffEnd(name())),
    }

    for (offset, instr) in code.iter().enumerate() {
        if let Some(target) = instr.target() {
            match target {
                Target::Label(_) => {
                    return Err(VerifyError::UnresolvedLabel {
                        function: name(),
                        offset,
                    })
                }
                Target::Offset(target) if target as usize >= code.len() => {
                    return Err(VerifyError::InvalidJumpTarget {
                        function: name(),
                        target,
                        offset,
                    })
                }
                Target::Offset(_) => {}
            }
        }

        for register in instr.registers() {
            if register as u16 >= function.register_count {
                return Err(VerifyError::InvalidRegister {
                    function: name(),
                    register: register as u16,
                    max: function.register_count,
                    offset,
                });
            }
        }

        let bad_static = |index: u32| VerifyError::InvalidStaticRef {
            function: name(),
            index,
            offset,
        };
        match *instr {
            Instruction::LoadConst { index, .. } => {
                if module.statics.get(index).is_none() {
                    return Err(bad_static(index));
                }
            }
            Instruction::GetMember { name: index, .. }
            | Instruction::SetMember { name: index, .. }
            | Instruction::HasMember { name: index, .. }
            | Instruction::CallMethod { name: index, .. } => {
                if !matches!(module.statics.get(index), Some(StaticValue::String(_))) {
                    return Err(bad_static(index));
                }
            }
            Instruction::LoadFunction { index, .. } => {
                if index as usize >= module.functions.len() {
                    return Err(VerifyError::InvalidFunctionRef {
                        function: name(),
                        index,
                        offset,
                    });
                }
            }
            Instruction::LoadGlobal { index, .. } | Instruction::StoreGlobal { index, .. } => {
                if index as usize >= module.globals.len() {
                    return Err(VerifyError::InvalidGlobalRef {
                        function: name(),
                        index,
                        offset,
                    });
                }
            }
            Instruction::LoadImport {
                module: m, export, ..
            } => {
                let known = module
                    .imports
                    .get(m as usize)
                    .is_some_and(|import| (export as usize) < import.names.len());
                if !known {
                    return Err(VerifyError::InvalidImportRef {
                        function: name(),
                        module: m,
                        export,
                        offset,
                    });
                }
            }
            _ => {}
        }
    }

    Ok(())
}
