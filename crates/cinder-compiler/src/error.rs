//! Fatal compiler errors.
//!
//! These indicate a bug in the compiler rather than in the program being
//! compiled, and abort the compile immediately. Problems in user code are
//! reported as [`CompilerError`](crate::diagnostics::CompilerError)s instead.

use crate::token::Span;
use cinder_bytecode::{ChunkError, VerifyError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum InternalError {
    #[error("node at {span} reached code generation without being analyzed")]
    UnvisitedNode { span: Span },

    #[error("stack mismatch closing scope: {expected} slot(s) recorded, {actual} pushed")]
    StackMismatch { expected: usize, actual: usize },

    #[error("register limit of {limit} exceeded")]
    RegisterOverflow { limit: u16 },

    #[error("stack slot {0} is out of range")]
    SlotOverflow(u32),

    #[error("{what} count {count} exceeds 255")]
    TooManyOperands { what: &'static str, count: usize },

    #[error("`{name}` has no storage assigned")]
    Unallocated { name: String },

    #[error("no prototype object for type `{0}`")]
    MissingPrototype(String),

    #[error("`{0}` outside of a loop reached code generation")]
    NoEnclosingLoop(&'static str),

    #[error("function slot {0} was reserved but never built")]
    UnbuiltFunction(u32),

    #[error(transparent)]
    Label(#[from] ChunkError),

    #[error("generated module failed verification: {0}")]
    Verify(#[from] VerifyError),
}
