//! Compiled module container
//!
//! Layout of the binary form:
//!
//! ```text
//! magic "CNDR" | version u32 | flags u32 | crc32 u32 | payload
//! ```
//!
//! The checksum covers everything after the 16-byte header.

use crate::chunk::FinalizedChunk;
use crate::encoder::{BytecodeReader, BytecodeWriter, DecodeError};
use crate::statics::{PrototypeObject, StaticMember, StaticPool, StaticValue};
use serde::{Deserialize, Serialize};

/// Container magic bytes
pub const MAGIC: [u8; 4] = *b"CNDR";

/// Current container version
pub const VERSION: u32 = 1;

const HEADER_LEN: usize = 16;

/// A compiled function
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionProto {
    /// Function name (`<main>` for module top-level code)
    pub name: String,
    /// Declared parameter count; parameters occupy stack slots `0..param_count`
    pub param_count: u8,
    /// Registers required by the frame
    pub register_count: u16,
    /// Peak value-stack depth relative to the frame base
    pub max_stack: u32,
    /// Whether the function expects a `this` receiver
    pub is_method: bool,
    /// Finalized instructions
    pub code: FinalizedChunk,
}

/// What an export refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportKind {
    /// Mutable global (`index` is a global slot)
    Variable,
    /// Constant global (`index` is a global slot)
    Constant,
    /// Function global (`index` is a global slot)
    Function,
    /// Type prototype (`index` is a static pool entry)
    Type,
}

/// Exported symbol
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    /// Exported name
    pub name: String,
    /// Export kind
    pub kind: ExportKind,
    /// Global slot or static index, depending on `kind`
    pub index: u32,
}

/// Imported module and the names referenced from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    /// Module specifier
    pub module: String,
    /// Export names, addressed by position from `LoadImport`
    pub names: Vec<String>,
}

/// Output of one module compile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledModule {
    /// Module name
    pub name: String,
    /// Top-level code
    pub main: FunctionProto,
    /// Function table referenced by `LoadFunction`
    pub functions: Vec<FunctionProto>,
    /// Static pool
    pub statics: StaticPool,
    /// Global slot names, by index
    pub globals: Vec<String>,
    /// Exports
    pub exports: Vec<Export>,
    /// Imports referenced by `LoadImport`
    pub imports: Vec<Import>,
}

impl CompiledModule {
    /// Look up a global slot by name
    pub fn global_index(&self, name: &str) -> Option<u32> {
        self.globals.iter().position(|g| g == name).map(|i| i as u32)
    }

    /// Look up an export by name
    pub fn export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }

    /// Every function including `main`
    pub fn all_functions(&self) -> impl Iterator<Item = &FunctionProto> {
        std::iter::once(&self.main).chain(self.functions.iter())
    }

    /// Encode into the binary container
    pub fn encode(&self) -> Vec<u8> {
        let mut writer = BytecodeWriter::new();

        let header_start = writer.offset();
        writer.buffer.extend_from_slice(&MAGIC);
        writer.emit_u32(VERSION);
        writer.emit_u32(0);
        let checksum_offset = writer.offset();
        writer.emit_u32(0);

        writer.emit_string(&self.name);

        writer.emit_u32(self.statics.len() as u32);
        for entry in self.statics.entries() {
            encode_static(&mut writer, entry);
        }

        writer.emit_u32(self.globals.len() as u32);
        for global in &self.globals {
            writer.emit_string(global);
        }

        encode_function(&mut writer, &self.main);
        writer.emit_u32(self.functions.len() as u32);
        for function in &self.functions {
            encode_function(&mut writer, function);
        }

        writer.emit_u32(self.exports.len() as u32);
        for export in &self.exports {
            writer.emit_string(&export.name);
            writer.emit_u8(match export.kind {
                ExportKind::Variable => 0,
                ExportKind::Constant => 1,
                ExportKind::Function => 2,
                ExportKind::Type => 3,
            });
            writer.emit_u32(export.index);
        }

        writer.emit_u32(self.imports.len() as u32);
        for import in &self.imports {
            writer.emit_string(&import.module);
            writer.emit_u32(import.names.len() as u32);
            for name in &import.names {
                writer.emit_string(name);
            }
        }

        let payload = &writer.buffer[header_start + HEADER_LEN..];
        let checksum = crc32fast::hash(payload);
        writer.patch_u32(checksum_offset, checksum);

        writer.into_bytes()
    }

    /// Decode from the binary container
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = BytecodeReader::new(bytes);

        let magic = [
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
            reader.read_u8()?,
        ];
        if magic != MAGIC {
            return Err(DecodeError::InvalidMagic);
        }
        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(DecodeError::UnsupportedVersion(version));
        }
        let _flags = reader.read_u32()?;
        let expected = reader.read_u32()?;
        let actual = crc32fast::hash(&bytes[HEADER_LEN..]);
        if expected != actual {
            return Err(DecodeError::ChecksumMismatch { expected, actual });
        }

        let name = reader.read_string()?;

        let static_count = reader.read_u32()?;
        let mut entries = Vec::with_capacity(static_count as usize);
        for _ in 0..static_count {
            entries.push(decode_static(&mut reader)?);
        }

        let global_count = reader.read_u32()?;
        let mut globals = Vec::with_capacity(global_count as usize);
        for _ in 0..global_count {
            globals.push(reader.read_string()?);
        }

        let main = decode_function(&mut reader)?;
        let function_count = reader.read_u32()?;
        let mut functions = Vec::with_capacity(function_count as usize);
        for _ in 0..function_count {
            functions.push(decode_function(&mut reader)?);
        }

        let export_count = reader.read_u32()?;
        let mut exports = Vec::with_capacity(export_count as usize);
        for _ in 0..export_count {
            let name = reader.read_string()?;
            let at = reader.position();
            let kind = match reader.read_u8()? {
                0 => ExportKind::Variable,
                1 => ExportKind::Constant,
                2 => ExportKind::Function,
                3 => ExportKind::Type,
                other => return Err(DecodeError::InvalidTag(other, at)),
            };
            let index = reader.read_u32()?;
            exports.push(Export { name, kind, index });
        }

        let import_count = reader.read_u32()?;
        let mut imports = Vec::with_capacity(import_count as usize);
        for _ in 0..import_count {
            let module = reader.read_string()?;
            let name_count = reader.read_u32()?;
            let mut names = Vec::with_capacity(name_count as usize);
            for _ in 0..name_count {
                names.push(reader.read_string()?);
            }
            imports.push(Import { module, names });
        }

        Ok(Self {
            name,
            main,
            functions,
            statics: StaticPool::from_entries(entries),
            globals,
            exports,
            imports,
        })
    }
}

fn encode_function(writer: &mut BytecodeWriter, function: &FunctionProto) {
    writer.emit_string(&function.name);
    writer.emit_u8(function.param_count);
    writer.emit_u16(function.register_count);
    writer.emit_u32(function.max_stack);
    writer.emit_bool(function.is_method);
    writer.emit_u32(function.code.code.len() as u32);
    for instr in &function.code.code {
        writer.emit_instruction(instr);
    }
}

fn decode_function(reader: &mut BytecodeReader<'_>) -> Result<FunctionProto, DecodeError> {
    let name = reader.read_string()?;
    let param_count = reader.read_u8()?;
    let register_count = reader.read_u16()?;
    let max_stack = reader.read_u32()?;
    let is_method = reader.read_bool()?;
    let len = reader.read_u32()?;
    let mut code = Vec::with_capacity(len as usize);
    for _ in 0..len {
        code.push(reader.read_instruction()?);
    }
    Ok(FunctionProto {
        name,
        param_count,
        register_count,
        max_stack,
        is_method,
        code: FinalizedChunk { code },
    })
}

fn encode_static(writer: &mut BytecodeWriter, entry: &StaticValue) {
    match entry {
        StaticValue::Number(n) => {
            writer.emit_u8(0);
            writer.emit_f64(*n);
        }
        StaticValue::String(s) => {
            writer.emit_u8(1);
            writer.emit_string(s);
        }
        StaticValue::Prototype(proto) => {
            writer.emit_u8(2);
            writer.emit_string(&proto.type_name);
            match proto.parent {
                Some(parent) => {
                    writer.emit_bool(true);
                    writer.emit_u32(parent);
                }
                None => writer.emit_bool(false),
            }
            writer.emit_u32(proto.members.len() as u32);
            for (name, member) in &proto.members {
                writer.emit_string(name);
                match member {
                    StaticMember::Null => writer.emit_u8(0),
                    StaticMember::Bool(b) => {
                        writer.emit_u8(1);
                        writer.emit_bool(*b);
                    }
                    StaticMember::Number(n) => {
                        writer.emit_u8(2);
                        writer.emit_f64(*n);
                    }
                    StaticMember::String(s) => {
                        writer.emit_u8(3);
                        writer.emit_string(s);
                    }
                    StaticMember::Function(index) => {
                        writer.emit_u8(4);
                        writer.emit_u32(*index);
                    }
                    StaticMember::Static(index) => {
                        writer.emit_u8(5);
                        writer.emit_u32(*index);
                    }
                }
            }
        }
    }
}

fn decode_static(reader: &mut BytecodeReader<'_>) -> Result<StaticValue, DecodeError> {
    let at = reader.position();
    match reader.read_u8()? {
        0 => Ok(StaticValue::Number(reader.read_f64()?)),
        1 => Ok(StaticValue::String(reader.read_string()?)),
        2 => {
            let type_name = reader.read_string()?;
            let parent = if reader.read_bool()? {
                Some(reader.read_u32()?)
            } else {
                None
            };
            let count = reader.read_u32()?;
            let mut members = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let name = reader.read_string()?;
                let tag_at = reader.position();
                let member = match reader.read_u8()? {
                    0 => StaticMember::Null,
                    1 => StaticMember::Bool(reader.read_bool()?),
                    2 => StaticMember::Number(reader.read_f64()?),
                    3 => StaticMember::String(reader.read_string()?),
                    4 => StaticMember::Function(reader.read_u32()?),
                    5 => StaticMember::Static(reader.read_u32()?),
                    other => return Err(DecodeError::InvalidTag(other, tag_at)),
                };
                members.push((name, member));
            }
            Ok(StaticValue::Prototype(PrototypeObject {
                type_name,
                parent,
                members,
            }))
        }
        other => Err(DecodeError::InvalidTag(other, at)),
    }
}
