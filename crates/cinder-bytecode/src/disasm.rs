//! Human-readable listing of compiled modules

use crate::instruction::Instruction;
use crate::module::{CompiledModule, FunctionProto};
use crate::statics::{StaticMember, StaticValue};
use std::fmt::{self, Write};

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self.opcode().name();
        match *self {
            Instruction::Nop | Instruction::ReturnNull | Instruction::ExitTry => {
                write!(f, "{}", name)
            }
            Instruction::Move { dst, src } => write!(f, "{:<15} r{}, r{}", name, dst, src),
            Instruction::LoadNull { dst }
            | Instruction::LoadThis { dst }
            | Instruction::NewObject { dst }
            | Instruction::Instantiate { dst }
            | Instruction::LoadException { dst } => write!(f, "{:<15} r{}", name, dst),
            Instruction::LoadBool { dst, value } => write!(f, "{:<15} r{}, {}", name, dst, value),
            Instruction::LoadInt { dst, value } => write!(f, "{:<15} r{}, {}", name, dst, value),
            Instruction::LoadConst { dst, index } => write!(f, "{:<15} r{}, k{}", name, dst, index),
            Instruction::LoadGlobal { dst, index } => write!(f, "{:<15} r{}, g{}", name, dst, index),
            Instruction::StoreGlobal { index, src } => write!(f, "{:<15} g{}, r{}", name, index, src),
            Instruction::LoadImport {
                dst,
                module,
                export,
            } => write!(f, "{:<15} r{}, m{}:{}", name, dst, module, export),
            Instruction::LoadFunction { dst, index } => {
                write!(f, "{:<15} r{}, f{}", name, dst, index)
            }
            Instruction::Push { src }
            | Instruction::Return { src }
            | Instruction::Throw { src } => write!(f, "{:<15} r{}", name, src),
            Instruction::Pop { count } => write!(f, "{:<15} {}", name, count),
            Instruction::LoadStack { dst, slot } => write!(f, "{:<15} r{}, s{}", name, dst, slot),
            Instruction::StoreStack { slot, src } => write!(f, "{:<15} s{}, r{}", name, slot, src),
            Instruction::Unary { op, dst, src } => {
                write!(f, "{:<15} r{}, {} r{}", name, dst, op.symbol(), src)
            }
            Instruction::Binary { op, dst, lhs, rhs } => write!(
                f,
                "{:<15} r{}, r{} {} r{}",
                name,
                dst,
                lhs,
                op.symbol(),
                rhs
            ),
            Instruction::Jump { target } => write!(f, "{:<15} {}", name, target),
            Instruction::JumpIfFalse { cond, target } | Instruction::JumpIfTrue { cond, target } => {
                write!(f, "{:<15} r{}, {}", name, cond, target)
            }
            Instruction::EnterTry { handler } => write!(f, "{:<15} {}", name, handler),
            Instruction::Call { base, argc } => write!(f, "{:<15} r{}, argc={}", name, base, argc),
            Instruction::CallMethod {
                base,
                name: method,
                argc,
                yields_receiver,
            } => {
                write!(f, "{:<15} r{}, k{}, argc={}", name, base, method, argc)?;
                if yields_receiver {
                    write!(f, ", receiver")?;
                }
                Ok(())
            }
            Instruction::NewArray { dst, start, count } => {
                write!(f, "{:<15} r{}, r{}..+{}", name, dst, start, count)
            }
            Instruction::GetMember {
                dst,
                object,
                name: member,
            }
            | Instruction::HasMember {
                dst,
                object,
                name: member,
            } => write!(f, "{:<15} r{}, r{}.k{}", name, dst, object, member),
            Instruction::SetMember {
                object,
                name: member,
                src,
            } => write!(f, "{:<15} r{}.k{}, r{}", name, object, member, src),
            Instruction::GetIndex { dst, object, index } => {
                write!(f, "{:<15} r{}, r{}[r{}]", name, dst, object, index)
            }
            Instruction::SetIndex { object, index, src } => {
                write!(f, "{:<15} r{}[r{}], r{}", name, object, index, src)
            }
        }
    }
}

/// Render a module listing: statics, globals, then every function
pub fn disassemble(module: &CompiledModule) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_module(&mut out, module);
    out
}

fn write_module(out: &mut String, module: &CompiledModule) -> fmt::Result {
    writeln!(out, "module {}", module.name)?;

    if !module.statics.is_empty() {
        writeln!(out, "\nstatics:")?;
        for (index, entry) in module.statics.entries().iter().enumerate() {
            match entry {
                StaticValue::Number(n) => writeln!(out, "  k{:<4} number {}", index, n)?,
                StaticValue::String(s) => writeln!(out, "  k{:<4} string {:?}", index, s)?,
                StaticValue::Prototype(proto) => {
                    write!(out, "  k{:<4} prototype {}", index, proto.type_name)?;
                    if let Some(parent) = proto.parent {
                        write!(out, " : k{}", parent)?;
                    }
                    writeln!(out)?;
                    for (name, member) in &proto.members {
                        let value = match member {
                            StaticMember::Null => "null".to_string(),
                            StaticMember::Bool(b) => b.to_string(),
                            StaticMember::Number(n) => n.to_string(),
                            StaticMember::String(s) => format!("{:?}", s),
                            StaticMember::Function(i) => format!("f{}", i),
                            StaticMember::Static(i) => format!("k{}", i),
                        };
                        writeln!(out, "         .{} = {}", name, value)?;
                    }
                }
            }
        }
    }

    if !module.globals.is_empty() {
        writeln!(out, "\nglobals:")?;
        for (index, global) in module.globals.iter().enumerate() {
            writeln!(out, "  g{:<4} {}", index, global)?;
        }
    }

    for import in &module.imports {
        writeln!(out, "\nimport {:?} {{ {} }}", import.module, import.names.join(", "))?;
    }

    write_function(out, "main", &module.main)?;
    for (index, function) in module.functions.iter().enumerate() {
        write_function(out, &format!("f{}", index), function)?;
    }
    Ok(())
}

fn write_function(out: &mut String, id: &str, function: &FunctionProto) -> fmt::Result {
    writeln!(
        out,
        "\n{} {}(params={}, registers={}, stack={}){}:",
        id,
        function.name,
        function.param_count,
        function.register_count,
        function.max_stack,
        if function.is_method { " method" } else { "" }
    )?;
    for (offset, instr) in function.code.code.iter().enumerate() {
        writeln!(out, "  {:04}  {}", offset, instr)?;
    }
    Ok(())
}
