//! Binary encoding and decoding of instructions
//!
//! Every instruction is one opcode byte followed by its operands in
//! little-endian order. Jump targets are encoded as absolute `u32` offsets;
//! an unresolved label is written as `u32::MAX`, which the verifier rejects.

use crate::instruction::{BinaryOp, Instruction, Opcode, Target, UnaryOp};
use thiserror::Error;

/// Errors that can occur during bytecode decoding
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// Unexpected end of bytecode stream
    #[error("Unexpected end of bytecode at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#04x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// Invalid operator operand
    #[error("Invalid operator {0} at offset {1}")]
    InvalidOperator(u8, usize),

    /// Invalid tag byte in a container section
    #[error("Invalid tag {0} at offset {1}")]
    InvalidTag(u8, usize),

    /// Magic bytes do not match
    #[error("Invalid magic number: expected CNDR")]
    InvalidMagic,

    /// Unsupported container version
    #[error("Unsupported bytecode version {0}")]
    UnsupportedVersion(u32),

    /// Payload checksum does not match the header
    #[error("Checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum recorded in the header
        expected: u32,
        /// Checksum of the payload as read
        actual: u32,
    },
}

/// Bytecode writer
///
/// Provides methods for emitting instructions and raw operands into a binary
/// buffer.
#[derive(Debug, Default)]
pub struct BytecodeWriter {
    pub(crate) buffer: Vec<u8>,
}

impl BytecodeWriter {
    /// Create a new bytecode writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Get the current bytecode buffer
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the bytecode buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Get the current offset (length of bytecode)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Basic Emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit a bool as one byte
    pub fn emit_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Emit a 16-bit unsigned integer (little-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer (little-endian)
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer (little-endian)
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float (little-endian)
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a length-prefixed UTF-8 string
    pub fn emit_string(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Overwrite a previously emitted u32
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn emit_target(&mut self, target: Target) {
        self.emit_u32(target.offset().unwrap_or(u32::MAX));
    }

    // ===== Instruction Emission =====

    /// Emit one instruction
    pub fn emit_instruction(&mut self, instr: &Instruction) {
        self.emit_u8(instr.opcode().to_u8());
        match *instr {
            Instruction::Nop
            | Instruction::ReturnNull
            | Instruction::ExitTry => {}
            Instruction::Move { dst, src } => {
                self.emit_u8(dst);
                self.emit_u8(src);
            }
            Instruction::LoadNull { dst }
            | Instruction::LoadThis { dst }
            | Instruction::NewObject { dst }
            | Instruction::Instantiate { dst }
            | Instruction::LoadException { dst } => self.emit_u8(dst),
            Instruction::LoadBool { dst, value } => {
                self.emit_u8(dst);
                self.emit_bool(value);
            }
            Instruction::LoadInt { dst, value } => {
                self.emit_u8(dst);
                self.emit_i32(value);
            }
            Instruction::LoadConst { dst, index }
            | Instruction::LoadGlobal { dst, index }
            | Instruction::LoadFunction { dst, index } => {
                self.emit_u8(dst);
                self.emit_u32(index);
            }
            Instruction::StoreGlobal { index, src } => {
                self.emit_u32(index);
                self.emit_u8(src);
            }
            Instruction::LoadImport {
                dst,
                module,
                export,
            } => {
                self.emit_u8(dst);
                self.emit_u16(module);
                self.emit_u16(export);
            }
            Instruction::Push { src }
            | Instruction::Return { src }
            | Instruction::Throw { src } => self.emit_u8(src),
            Instruction::Pop { count } => self.emit_u16(count),
            Instruction::LoadStack { dst, slot } => {
                self.emit_u8(dst);
                self.emit_u16(slot);
            }
            Instruction::StoreStack { slot, src } => {
                self.emit_u16(slot);
                self.emit_u8(src);
            }
            Instruction::Unary { op, dst, src } => {
                self.emit_u8(op as u8);
                self.emit_u8(dst);
                self.emit_u8(src);
            }
            Instruction::Binary { op, dst, lhs, rhs } => {
                self.emit_u8(op as u8);
                self.emit_u8(dst);
                self.emit_u8(lhs);
                self.emit_u8(rhs);
            }
            Instruction::Jump { target } => self.emit_target(target),
            Instruction::JumpIfFalse { cond, target } | Instruction::JumpIfTrue { cond, target } => {
                self.emit_u8(cond);
                self.emit_target(target);
            }
            Instruction::EnterTry { handler } => self.emit_target(handler),
            Instruction::Call { base, argc } => {
                self.emit_u8(base);
                self.emit_u8(argc);
            }
            Instruction::CallMethod {
                base,
                name,
                argc,
                yields_receiver,
            } => {
                self.emit_u8(base);
                self.emit_u32(name);
                self.emit_u8(argc);
                self.emit_bool(yields_receiver);
            }
            Instruction::NewArray { dst, start, count } => {
                self.emit_u8(dst);
                self.emit_u8(start);
                self.emit_u8(count);
            }
            Instruction::GetMember { dst, object, name }
            | Instruction::HasMember { dst, object, name } => {
                self.emit_u8(dst);
                self.emit_u8(object);
                self.emit_u32(name);
            }
            Instruction::SetMember { object, name, src } => {
                self.emit_u8(object);
                self.emit_u32(name);
                self.emit_u8(src);
            }
            Instruction::GetIndex { dst, object, index } => {
                self.emit_u8(dst);
                self.emit_u8(object);
                self.emit_u8(index);
            }
            Instruction::SetIndex { object, index, src } => {
                self.emit_u8(object);
                self.emit_u8(index);
                self.emit_u8(src);
            }
        }
    }
}

/// Bytecode reader
pub struct BytecodeReader<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a new bytecode reader
    pub fn new(buffer: &'a [u8]) -> Self {
        Self {
            buffer,
            position: 0,
        }
    }

    /// Get the current position in the buffer
    pub fn position(&self) -> usize {
        self.position
    }

    /// Check if there are more bytes to read
    pub fn has_more(&self) -> bool {
        self.position < self.buffer.len()
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.position + N;
        let bytes = self
            .buffer
            .get(self.position..end)
            .ok_or(DecodeError::UnexpectedEnd(self.position))?;
        let mut out = [0u8; N];
        out.copy_from_slice(bytes);
        self.position = end;
        Ok(out)
    }

    // ===== Basic Reading =====

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    /// Read a bool byte
    pub fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take()?))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take()?))
    }

    /// Read a 32-bit signed integer (little-endian)
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.take()?))
    }

    /// Read a 64-bit float (little-endian)
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        Ok(f64::from_le_bytes(self.take()?))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let start = self.position;
        let bytes = self
            .buffer
            .get(start..start + len)
            .ok_or(DecodeError::UnexpectedEnd(start))?;
        let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(start))?;
        self.position = start + len;
        Ok(s.to_string())
    }

    fn read_target(&mut self) -> Result<Target, DecodeError> {
        Ok(Target::Offset(self.read_u32()?))
    }

    // ===== Instruction Decoding =====

    /// Read one instruction
    pub fn read_instruction(&mut self) -> Result<Instruction, DecodeError> {
        let at = self.position;
        let byte = self.read_u8()?;
        let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, at))?;
        let instr = match opcode {
            Opcode::Nop => Instruction::Nop,
            Opcode::Move => Instruction::Move {
                dst: self.read_u8()?,
                src: self.read_u8()?,
            },
            Opcode::LoadNull => Instruction::LoadNull { dst: self.read_u8()? },
            Opcode::LoadBool => Instruction::LoadBool {
                dst: self.read_u8()?,
                value: self.read_bool()?,
            },
            Opcode::LoadInt => Instruction::LoadInt {
                dst: self.read_u8()?,
                value: self.read_i32()?,
            },
            Opcode::LoadConst => Instruction::LoadConst {
                dst: self.read_u8()?,
                index: self.read_u32()?,
            },
            Opcode::LoadGlobal => Instruction::LoadGlobal {
                dst: self.read_u8()?,
                index: self.read_u32()?,
            },
            Opcode::StoreGlobal => Instruction::StoreGlobal {
                index: self.read_u32()?,
                src: self.read_u8()?,
            },
            Opcode::LoadImport => Instruction::LoadImport {
                dst: self.read_u8()?,
                module: self.read_u16()?,
                export: self.read_u16()?,
            },
            Opcode::LoadFunction => Instruction::LoadFunction {
                dst: self.read_u8()?,
                index: self.read_u32()?,
            },
            Opcode::LoadThis => Instruction::LoadThis { dst: self.read_u8()? },
            Opcode::Push => Instruction::Push { src: self.read_u8()? },
            Opcode::Pop => Instruction::Pop {
                count: self.read_u16()?,
            },
            Opcode::LoadStack => Instruction::LoadStack {
                dst: self.read_u8()?,
                slot: self.read_u16()?,
            },
            Opcode::StoreStack => Instruction::StoreStack {
                slot: self.read_u16()?,
                src: self.read_u8()?,
            },
            Opcode::Unary => {
                let op_at = self.position;
                let raw = self.read_u8()?;
                let op = UnaryOp::from_u8(raw).ok_or(DecodeError::InvalidOperator(raw, op_at))?;
                Instruction::Unary {
                    op,
                    dst: self.read_u8()?,
                    src: self.read_u8()?,
                }
            }
            Opcode::Binary => {
                let op_at = self.position;
                let raw = self.read_u8()?;
                let op = BinaryOp::from_u8(raw).ok_or(DecodeError::InvalidOperator(raw, op_at))?;
                Instruction::Binary {
                    op,
                    dst: self.read_u8()?,
                    lhs: self.read_u8()?,
                    rhs: self.read_u8()?,
                }
            }
            Opcode::Jump => Instruction::Jump {
                target: self.read_target()?,
            },
            Opcode::JumpIfFalse => Instruction::JumpIfFalse {
                cond: self.read_u8()?,
                target: self.read_target()?,
            },
            Opcode::JumpIfTrue => Instruction::JumpIfTrue {
                cond: self.read_u8()?,
                target: self.read_target()?,
            },
            Opcode::Call => Instruction::Call {
                base: self.read_u8()?,
                argc: self.read_u8()?,
            },
            Opcode::CallMethod => Instruction::CallMethod {
                base: self.read_u8()?,
                name: self.read_u32()?,
                argc: self.read_u8()?,
                yields_receiver: self.read_bool()?,
            },
            Opcode::Return => Instruction::Return { src: self.read_u8()? },
            Opcode::ReturnNull => Instruction::ReturnNull,
            Opcode::NewObject => Instruction::NewObject { dst: self.read_u8()? },
            Opcode::NewArray => Instruction::NewArray {
                dst: self.read_u8()?,
                start: self.read_u8()?,
                count: self.read_u8()?,
            },
            Opcode::Instantiate => Instruction::Instantiate { dst: self.read_u8()? },
            Opcode::GetMember => Instruction::GetMember {
                dst: self.read_u8()?,
                object: self.read_u8()?,
                name: self.read_u32()?,
            },
            Opcode::SetMember => Instruction::SetMember {
                object: self.read_u8()?,
                name: self.read_u32()?,
                src: self.read_u8()?,
            },
            Opcode::HasMember => Instruction::HasMember {
                dst: self.read_u8()?,
                object: self.read_u8()?,
                name: self.read_u32()?,
            },
            Opcode::GetIndex => Instruction::GetIndex {
                dst: self.read_u8()?,
                object: self.read_u8()?,
                index: self.read_u8()?,
            },
            Opcode::SetIndex => Instruction::SetIndex {
                object: self.read_u8()?,
                index: self.read_u8()?,
                src: self.read_u8()?,
            },
            Opcode::EnterTry => Instruction::EnterTry {
                handler: self.read_target()?,
            },
            Opcode::ExitTry => Instruction::ExitTry,
            Opcode::LoadException => Instruction::LoadException { dst: self.read_u8()? },
            Opcode::Throw => Instruction::Throw { src: self.read_u8()? },
        };
        Ok(instr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_stream_roundtrip() {
        let code = vec![
            Instruction::LoadInt { dst: 0, value: -7 },
            Instruction::Binary {
                op: BinaryOp::Mul,
                dst: 0,
                lhs: 0,
                rhs: 1,
            },
            Instruction::CallMethod {
                base: 2,
                name: 9,
                argc: 3,
                yields_receiver: true,
            },
            Instruction::JumpIfFalse {
                cond: 0,
                target: Target::Offset(12),
            },
            Instruction::ReturnNull,
        ];

        let mut writer = BytecodeWriter::new();
        for instr in &code {
            writer.emit_instruction(instr);
        }
        let bytes = writer.into_bytes();

        let mut reader = BytecodeReader::new(&bytes);
        let mut decoded = Vec::new();
        while reader.has_more() {
            decoded.push(reader.read_instruction().unwrap());
        }
        assert_eq!(decoded, code);
    }

    #[test]
    fn test_invalid_opcode() {
        let mut reader = BytecodeReader::new(&[0xEE]);
        assert_eq!(
            reader.read_instruction(),
            Err(DecodeError::InvalidOpcode(0xEE, 0))
        );
    }

    #[test]
    fn test_truncated_operand() {
        let bytes = [Opcode::LoadInt.to_u8(), 0, 1];
        let mut reader = BytecodeReader::new(&bytes);
        assert!(matches!(
            reader.read_instruction(),
            Err(DecodeError::UnexpectedEnd(_))
        ));
    }

    #[test]
    fn test_string_roundtrip_and_patch() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u32(0);
        writer.emit_string("héllo");
        writer.patch_u32(0, 42);
        let bytes = writer.into_bytes();

        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_u32().unwrap(), 42);
        assert_eq!(reader.read_string().unwrap(), "héllo");
    }
}
