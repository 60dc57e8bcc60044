//! Instruction set for the Cinder VM
//!
//! Expression temporaries are held in registers (`Reg`). Declared locals are
//! pushed onto the frame's value stack and addressed by slot, relative to the
//! frame base. Module-level declarations live in the module's global table.

use crate::chunk::LabelId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Register index within a function frame
pub type Reg = u8;

/// Jump destination
///
/// Jumps are emitted against labels; finalization rewrites them into absolute
/// instruction offsets within the owning chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Target {
    /// Unresolved label
    Label(LabelId),
    /// Resolved absolute instruction index
    Offset(u32),
}

impl Target {
    /// Resolved offset, if finalized
    pub fn offset(self) -> Option<u32> {
        match self {
            Target::Offset(offset) => Some(offset),
            Target::Label(_) => None,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum UnaryOp {
    /// Arithmetic negation
    Neg = 0,
    /// Numeric conversion (`+x`)
    Plus = 1,
    /// Logical not
    Not = 2,
    /// Bitwise not
    BitNot = 3,
    /// Type name as string
    Typeof = 4,
}

impl UnaryOp {
    /// Decode from the encoded operand byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Neg,
            1 => Self::Plus,
            2 => Self::Not,
            3 => Self::BitNot,
            4 => Self::Typeof,
            _ => return None,
        })
    }

    /// Source-level symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Neg => "-",
            Self::Plus => "+",
            Self::Not => "!",
            Self::BitNot => "~",
            Self::Typeof => "typeof",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BinaryOp {
    /// `+` (numeric add or string concatenation)
    Add = 0,
    /// `-`
    Sub = 1,
    /// `*`
    Mul = 2,
    /// `/`
    Div = 3,
    /// `%`
    Mod = 4,
    /// `**`
    Pow = 5,
    /// `==`
    Eq = 6,
    /// `!=`
    Ne = 7,
    /// `<`
    Lt = 8,
    /// `<=`
    Le = 9,
    /// `>`
    Gt = 10,
    /// `>=`
    Ge = 11,
    /// `&`
    BitAnd = 12,
    /// `|`
    BitOr = 13,
    /// `^`
    BitXor = 14,
    /// `<<`
    Shl = 15,
    /// `>>`
    Shr = 16,
}

impl BinaryOp {
    /// Decode from the encoded operand byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Add,
            1 => Self::Sub,
            2 => Self::Mul,
            3 => Self::Div,
            4 => Self::Mod,
            5 => Self::Pow,
            6 => Self::Eq,
            7 => Self::Ne,
            8 => Self::Lt,
            9 => Self::Le,
            10 => Self::Gt,
            11 => Self::Ge,
            12 => Self::BitAnd,
            13 => Self::BitOr,
            14 => Self::BitXor,
            15 => Self::Shl,
            16 => Self::Shr,
            _ => return None,
        })
    }

    /// Source-level symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Mod => "%",
            Self::Pow => "**",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::BitAnd => "&",
            Self::BitOr => "|",
            Self::BitXor => "^",
            Self::Shl => "<<",
            Self::Shr => ">>",
        }
    }

    /// Whether the result is always a boolean
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge
        )
    }
}

/// Opcode byte for each instruction form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Opcode {
    // ===== Constants & moves (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Copy register
    Move = 0x01,
    /// Load null
    LoadNull = 0x02,
    /// Load boolean
    LoadBool = 0x03,
    /// Load small integer
    LoadInt = 0x04,
    /// Load static pool entry
    LoadConst = 0x05,
    /// Load module global
    LoadGlobal = 0x06,
    /// Store module global
    StoreGlobal = 0x07,
    /// Load imported export
    LoadImport = 0x08,
    /// Load function object
    LoadFunction = 0x09,
    /// Load method receiver
    LoadThis = 0x0A,

    // ===== Stack slots (0x10-0x1F) =====
    /// Push register onto the value stack
    Push = 0x10,
    /// Pop value stack slots
    Pop = 0x11,
    /// Load stack slot
    LoadStack = 0x12,
    /// Store stack slot
    StoreStack = 0x13,

    // ===== Operators (0x20-0x2F) =====
    /// Unary operator
    Unary = 0x20,
    /// Binary operator
    Binary = 0x21,

    // ===== Control flow (0x30-0x3F) =====
    /// Unconditional jump
    Jump = 0x30,
    /// Jump if falsy
    JumpIfFalse = 0x31,
    /// Jump if truthy
    JumpIfTrue = 0x32,
    /// Call value
    Call = 0x33,
    /// Call method by name
    CallMethod = 0x34,
    /// Return register
    Return = 0x35,
    /// Return null
    ReturnNull = 0x36,

    // ===== Objects (0x40-0x4F) =====
    /// Create empty object
    NewObject = 0x40,
    /// Create array from registers
    NewArray = 0x41,
    /// Instantiate from prototype
    Instantiate = 0x42,
    /// Read member
    GetMember = 0x43,
    /// Write member
    SetMember = 0x44,
    /// Test member presence
    HasMember = 0x45,
    /// Read element
    GetIndex = 0x46,
    /// Write element
    SetIndex = 0x47,

    // ===== Exceptions (0x50-0x5F) =====
    /// Install handler
    EnterTry = 0x50,
    /// Remove innermost handler
    ExitTry = 0x51,
    /// Load caught exception
    LoadException = 0x52,
    /// Throw register
    Throw = 0x53,
}

impl Opcode {
    /// Convert byte to opcode
    ///
    /// Returns None if the byte does not correspond to a valid opcode.
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Self::Nop,
            0x01 => Self::Move,
            0x02 => Self::LoadNull,
            0x03 => Self::LoadBool,
            0x04 => Self::LoadInt,
            0x05 => Self::LoadConst,
            0x06 => Self::LoadGlobal,
            0x07 => Self::StoreGlobal,
            0x08 => Self::LoadImport,
            0x09 => Self::LoadFunction,
            0x0A => Self::LoadThis,
            0x10 => Self::Push,
            0x11 => Self::Pop,
            0x12 => Self::LoadStack,
            0x13 => Self::StoreStack,
            0x20 => Self::Unary,
            0x21 => Self::Binary,
            0x30 => Self::Jump,
            0x31 => Self::JumpIfFalse,
            0x32 => Self::JumpIfTrue,
            0x33 => Self::Call,
            0x34 => Self::CallMethod,
            0x35 => Self::Return,
            0x36 => Self::ReturnNull,
            0x40 => Self::NewObject,
            0x41 => Self::NewArray,
            0x42 => Self::Instantiate,
            0x43 => Self::GetMember,
            0x44 => Self::SetMember,
            0x45 => Self::HasMember,
            0x46 => Self::GetIndex,
            0x47 => Self::SetIndex,
            0x50 => Self::EnterTry,
            0x51 => Self::ExitTry,
            0x52 => Self::LoadException,
            0x53 => Self::Throw,
            _ => return None,
        })
    }

    /// Convert opcode to byte
    #[inline]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Get the human-readable name of the opcode
    pub fn name(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Move => "MOVE",
            Self::LoadNull => "LOAD_NULL",
            Self::LoadBool => "LOAD_BOOL",
            Self::LoadInt => "LOAD_INT",
            Self::LoadConst => "LOAD_CONST",
            Self::LoadGlobal => "LOAD_GLOBAL",
            Self::StoreGlobal => "STORE_GLOBAL",
            Self::LoadImport => "LOAD_IMPORT",
            Self::LoadFunction => "LOAD_FUNCTION",
            Self::LoadThis => "LOAD_THIS",
            Self::Push => "PUSH",
            Self::Pop => "POP",
            Self::LoadStack => "LOAD_STACK",
            Self::StoreStack => "STORE_STACK",
            Self::Unary => "UNARY",
            Self::Binary => "BINARY",
            Self::Jump => "JUMP",
            Self::JumpIfFalse => "JUMP_IF_FALSE",
            Self::JumpIfTrue => "JUMP_IF_TRUE",
            Self::Call => "CALL",
            Self::CallMethod => "CALL_METHOD",
            Self::Return => "RETURN",
            Self::ReturnNull => "RETURN_NULL",
            Self::NewObject => "NEW_OBJECT",
            Self::NewArray => "NEW_ARRAY",
            Self::Instantiate => "INSTANTIATE",
            Self::GetMember => "GET_MEMBER",
            Self::SetMember => "SET_MEMBER",
            Self::HasMember => "HAS_MEMBER",
            Self::GetIndex => "GET_INDEX",
            Self::SetIndex => "SET_INDEX",
            Self::EnterTry => "ENTER_TRY",
            Self::ExitTry => "EXIT_TRY",
            Self::LoadException => "LOAD_EXCEPTION",
            Self::Throw => "THROW",
        }
    }

    /// Check if this opcode is a jump instruction
    pub fn is_jump(self) -> bool {
        matches!(self, Self::Jump | Self::JumpIfFalse | Self::JumpIfTrue)
    }

    /// Check if this opcode terminates a basic block
    pub fn is_terminator(self) -> bool {
        matches!(
            self,
            Self::Jump | Self::Return | Self::ReturnNull | Self::Throw
        )
    }
}

/// A single VM instruction
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation
    Nop,
    /// `dst = src`
    Move { dst: Reg, src: Reg },
    /// `dst = null`
    LoadNull { dst: Reg },
    /// `dst = value`
    LoadBool { dst: Reg, value: bool },
    /// `dst = value`
    LoadInt { dst: Reg, value: i32 },
    /// `dst = statics[index]`
    LoadConst { dst: Reg, index: u32 },
    /// `dst = globals[index]`
    LoadGlobal { dst: Reg, index: u32 },
    /// `globals[index] = src`
    StoreGlobal { index: u32, src: Reg },
    /// `dst = imports[module].exports[export]`
    LoadImport { dst: Reg, module: u16, export: u16 },
    /// `dst = functions[index]`
    LoadFunction { dst: Reg, index: u32 },
    /// `dst = this`
    LoadThis { dst: Reg },

    /// Push `src` onto the value stack
    Push { src: Reg },
    /// Discard `count` value stack slots
    Pop { count: u16 },
    /// `dst = stack[base + slot]`
    LoadStack { dst: Reg, slot: u16 },
    /// `stack[base + slot] = src`
    StoreStack { slot: u16, src: Reg },

    /// `dst = op src`
    Unary { op: UnaryOp, dst: Reg, src: Reg },
    /// `dst = lhs op rhs`
    Binary {
        op: BinaryOp,
        dst: Reg,
        lhs: Reg,
        rhs: Reg,
    },

    /// Unconditional jump
    Jump { target: Target },
    /// Jump when `cond` is falsy
    JumpIfFalse { cond: Reg, target: Target },
    /// Jump when `cond` is truthy
    JumpIfTrue { cond: Reg, target: Target },

    /// Call the value in `base` with arguments `base+1 ..= base+argc`.
    /// The result replaces `base`.
    Call { base: Reg, argc: u8 },
    /// Call method `name` on the receiver in `base` with arguments
    /// `base+1 ..= base+argc`. When `yields_receiver` is set the receiver is
    /// left in `base` instead of the call's result.
    CallMethod {
        base: Reg,
        name: u32,
        argc: u8,
        yields_receiver: bool,
    },
    /// Return `src` to the caller
    Return { src: Reg },
    /// Return null to the caller
    ReturnNull,

    /// `dst = {}`
    NewObject { dst: Reg },
    /// `dst = [start, start+1, ..]`
    NewArray { dst: Reg, start: Reg, count: u8 },
    /// Replace the prototype in `dst` with a fresh instance derived from it
    Instantiate { dst: Reg },
    /// `dst = object.name`
    GetMember { dst: Reg, object: Reg, name: u32 },
    /// `object.name = src`
    SetMember { object: Reg, name: u32, src: Reg },
    /// `dst = object has name`
    HasMember { dst: Reg, object: Reg, name: u32 },
    /// `dst = object[index]`
    GetIndex { dst: Reg, object: Reg, index: Reg },
    /// `object[index] = src`
    SetIndex { object: Reg, index: Reg, src: Reg },

    /// Install an exception handler
    EnterTry { handler: Target },
    /// Remove the innermost exception handler
    ExitTry,
    /// `dst = current exception`
    LoadException { dst: Reg },
    /// Throw `src`
    Throw { src: Reg },
}

impl Instruction {
    /// Opcode for this instruction
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::Move { .. } => Opcode::Move,
            Self::LoadNull { .. } => Opcode::LoadNull,
            Self::LoadBool { .. } => Opcode::LoadBool,
            Self::LoadInt { .. } => Opcode::LoadInt,
            Self::LoadConst { .. } => Opcode::LoadConst,
            Self::LoadGlobal { .. } => Opcode::LoadGlobal,
            Self::StoreGlobal { .. } => Opcode::StoreGlobal,
            Self::LoadImport { .. } => Opcode::LoadImport,
            Self::LoadFunction { .. } => Opcode::LoadFunction,
            Self::LoadThis { .. } => Opcode::LoadThis,
            Self::Push { .. } => Opcode::Push,
            Self::Pop { .. } => Opcode::Pop,
            Self::LoadStack { .. } => Opcode::LoadStack,
            Self::StoreStack { .. } => Opcode::StoreStack,
            Self::Unary { .. } => Opcode::Unary,
            Self::Binary { .. } => Opcode::Binary,
            Self::Jump { .. } => Opcode::Jump,
            Self::JumpIfFalse { .. } => Opcode::JumpIfFalse,
            Self::JumpIfTrue { .. } => Opcode::JumpIfTrue,
            Self::Call { .. } => Opcode::Call,
            Self::CallMethod { .. } => Opcode::CallMethod,
            Self::Return { .. } => Opcode::Return,
            Self::ReturnNull => Opcode::ReturnNull,
            Self::NewObject { .. } => Opcode::NewObject,
            Self::NewArray { .. } => Opcode::NewArray,
            Self::Instantiate { .. } => Opcode::Instantiate,
            Self::GetMember { .. } => Opcode::GetMember,
            Self::SetMember { .. } => Opcode::SetMember,
            Self::HasMember { .. } => Opcode::HasMember,
            Self::GetIndex { .. } => Opcode::GetIndex,
            Self::SetIndex { .. } => Opcode::SetIndex,
            Self::EnterTry { .. } => Opcode::EnterTry,
            Self::ExitTry => Opcode::ExitTry,
            Self::LoadException { .. } => Opcode::LoadException,
            Self::Throw { .. } => Opcode::Throw,
        }
    }

    /// Jump target carried by this instruction, if any
    pub fn target(&self) -> Option<Target> {
        match self {
            Self::Jump { target }
            | Self::JumpIfFalse { target, .. }
            | Self::JumpIfTrue { target, .. } => Some(*target),
            Self::EnterTry { handler } => Some(*handler),
            _ => None,
        }
    }

    /// Mutable access to the jump target, if any
    pub fn target_mut(&mut self) -> Option<&mut Target> {
        match self {
            Self::Jump { target }
            | Self::JumpIfFalse { target, .. }
            | Self::JumpIfTrue { target, .. } => Some(target),
            Self::EnterTry { handler } => Some(handler),
            _ => None,
        }
    }

    /// Registers read or written by this instruction
    ///
    /// For calls this covers the whole argument window.
    pub fn registers(&self) -> Vec<Reg> {
        match *self {
            Self::Nop
            | Self::Pop { .. }
            | Self::Jump { .. }
            | Self::ReturnNull
            | Self::EnterTry { .. }
            | Self::ExitTry => Vec::new(),
            Self::Move { dst, src } | Self::Unary { dst, src, .. } => vec![dst, src],
            Self::LoadNull { dst }
            | Self::LoadBool { dst, .. }
            | Self::LoadInt { dst, .. }
            | Self::LoadConst { dst, .. }
            | Self::LoadGlobal { dst, .. }
            | Self::LoadImport { dst, .. }
            | Self::LoadFunction { dst, .. }
            | Self::LoadThis { dst }
            | Self::LoadStack { dst, .. }
            | Self::NewObject { dst }
            | Self::Instantiate { dst }
            | Self::LoadException { dst } => vec![dst],
            Self::StoreGlobal { src, .. }
            | Self::Push { src }
            | Self::StoreStack { src, .. }
            | Self::Return { src }
            | Self::Throw { src } => vec![src],
            Self::Binary { dst, lhs, rhs, .. } => vec![dst, lhs, rhs],
            Self::JumpIfFalse { cond, .. } | Self::JumpIfTrue { cond, .. } => vec![cond],
            Self::Call { base, argc } | Self::CallMethod { base, argc, .. } => {
                (0..=argc as u16).map(|i| (base as u16 + i) as Reg).collect()
            }
            Self::NewArray { dst, start, count } => {
                let mut regs = vec![dst];
                regs.extend((0..count as u16).map(|i| (start as u16 + i) as Reg));
                regs
            }
            Self::GetMember { dst, object, .. } | Self::HasMember { dst, object, .. } => {
                vec![dst, object]
            }
            Self::SetMember { object, src, .. } => vec![object, src],
            Self::GetIndex { dst, object, index } => vec![dst, object, index],
            Self::SetIndex { object, index, src } => vec![object, index, src],
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Label(label) => write!(f, "{}", label),
            Target::Offset(offset) => write!(f, "@{:04}", offset),
        }
    }
}
