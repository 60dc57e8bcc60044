//! Register and stack accounting for one function frame.

use crate::error::InternalError;
use cinder_bytecode::{LabelId, Reg};

/// Registers hold expression temporaries and are allocated as a stack:
/// a node takes registers above `current_register` and releases them before
/// returning. Stack slots hold declared locals; parameters occupy the first
/// `param_count` slots.
#[derive(Debug, Clone)]
pub struct CodegenContext {
    pub current_register: u16,
    pub max_register: u16,
    pub stack_size: u32,
    pub max_stack: u32,
    limit: u16,
}

/// Saved register position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterMark(u16);

impl CodegenContext {
    pub fn new(register_limit: u16, param_count: u32) -> Self {
        Self {
            current_register: 0,
            max_register: 0,
            stack_size: param_count,
            max_stack: param_count,
            limit: register_limit.min(256),
        }
    }

    pub fn alloc(&mut self) -> Result<Reg, InternalError> {
        if self.current_register >= self.limit {
            return Err(InternalError::RegisterOverflow { limit: self.limit });
        }
        let reg = self.current_register as Reg;
        self.current_register += 1;
        self.max_register = self.max_register.max(self.current_register);
        Ok(reg)
    }

    pub fn mark(&self) -> RegisterMark {
        RegisterMark(self.current_register)
    }

    pub fn release(&mut self, mark: RegisterMark) {
        self.current_register = mark.0;
    }

    /// Account for one pushed value and return its slot.
    pub fn push_slot(&mut self) -> Result<u16, InternalError> {
        let slot = self.stack_size;
        if slot > u16::MAX as u32 {
            return Err(InternalError::SlotOverflow(slot));
        }
        self.stack_size += 1;
        self.max_stack = self.max_stack.max(self.stack_size);
        Ok(slot as u16)
    }

    pub fn pop_slots(&mut self, count: u32) {
        self.stack_size = self.stack_size.saturating_sub(count);
    }
}

/// Enclosing construct that `break`, `continue` and `return` must unwind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame {
    Loop {
        break_label: LabelId,
        continue_label: LabelId,
        /// Stack size when the loop body starts
        stack_depth: u32,
    },
    Try {
        stack_depth: u32,
    },
}
