//! Cinder Bytecode Definitions
//!
//! This crate defines the instruction set consumed by the Cinder VM, the
//! label-carrying [`Chunk`] the compiler emits into, the static-object pool,
//! and the [`CompiledModule`] container with its binary encoding.
//!
//! # Architecture
//!
//! - **Instructions**: register/stack hybrid. Expression temporaries live in
//!   registers, declared locals live in stack slots.
//! - **Labels**: jumps carry [`Target::Label`] while code is being assembled.
//!   [`Chunk::finalize`] rewrites every label into an absolute
//!   [`Target::Offset`], failing on dangling or stale labels.
//! - **Statics**: strings, numbers and type prototype objects are hoisted into
//!   a [`StaticPool`] and referenced by index.
//! - **Container**: `CNDR` magic, format version and a crc32 checksum of the
//!   payload.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod chunk;
pub mod disasm;
pub mod encoder;
pub mod instruction;
pub mod module;
pub mod statics;
pub mod verify;

pub use chunk::{Chunk, ChunkError, FinalizedChunk, LabelAllocator, LabelId};
pub use disasm::disassemble;
pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use instruction::{BinaryOp, Instruction, Opcode, Reg, Target, UnaryOp};
pub use module::{CompiledModule, Export, ExportKind, FunctionProto, Import};
pub use statics::{PrototypeObject, StaticMember, StaticPool, StaticValue};
pub use verify::{verify_module, VerifyError};
