//! Loop lowering.
//!
//! Loops whose condition the optimizer proved constant skip the test:
//! an always-true loop only leaves through `break`, an always-false
//! `while`/`for` never runs its body and an always-false `do` runs it
//! once. A condition with side effects is still evaluated where the test
//! would have run.

use super::{BuildResult, Frame, FunctionBuilder};
use crate::ast::{Expr, ForStmt, LoopMode, Stmt};
use cinder_bytecode::{Instruction, LabelId, Target};

impl<'e, 'm> FunctionBuilder<'e, 'm> {
    /// Evaluate a constant condition only when it has effects.
    fn effects_of(&mut self, cond: &Expr) -> BuildResult<()> {
        if cond.has_side_effects() {
            self.discard(cond)?;
        }
        Ok(())
    }

    /// Jump to `target` when `cond` is false.
    fn exit_unless(&mut self, cond: &Expr, target: LabelId) -> BuildResult<()> {
        let mark = self.ctx.mark();
        let reg = self.alloc()?;
        self.build_expr(cond, reg)?;
        self.emit(Instruction::JumpIfFalse {
            cond: reg,
            target: Target::Label(target),
        });
        self.ctx.release(mark);
        Ok(())
    }

    fn build_loop_body(&mut self, body: &Stmt, break_label: LabelId, continue_label: LabelId) -> BuildResult<()> {
        self.frames.push(Frame::Loop {
            break_label,
            continue_label,
            stack_depth: self.ctx.stack_size,
        });
        let result = self.build_stmt(body);
        self.frames.pop();
        result
    }

    pub(crate) fn build_while(&mut self, cond: &Expr, body: &Stmt, mode: LoopMode) -> BuildResult<()> {
        if mode == LoopMode::AlwaysFalse {
            return self.effects_of(cond);
        }
        let (top, exit) = (self.label(), self.label());
        self.chunk.place(top);
        match mode {
            LoopMode::Indeterminate => self.exit_unless(cond, exit)?,
            _ => self.effects_of(cond)?,
        }
        self.build_loop_body(body, exit, top)?;
        self.emit(Instruction::Jump {
            target: Target::Label(top),
        });
        self.chunk.place(exit);
        Ok(())
    }

    pub(crate) fn build_do_while(&mut self, body: &Stmt, cond: &Expr, mode: LoopMode) -> BuildResult<()> {
        let (top, next, exit) = (self.label(), self.label(), self.label());
        self.chunk.place(top);
        self.build_loop_body(body, exit, next)?;
        self.chunk.place(next);
        match mode {
            LoopMode::Indeterminate => {
                let mark = self.ctx.mark();
                let reg = self.alloc()?;
                self.build_expr(cond, reg)?;
                self.emit(Instruction::JumpIfTrue {
                    cond: reg,
                    target: Target::Label(top),
                });
                self.ctx.release(mark);
            }
            LoopMode::AlwaysTrue => {
                self.effects_of(cond)?;
                self.emit(Instruction::Jump {
                    target: Target::Label(top),
                });
            }
            LoopMode::AlwaysFalse => self.effects_of(cond)?,
        }
        self.chunk.place(exit);
        Ok(())
    }

    /// ```text
    ///     <init>
    /// top:
    ///     <cond>; JumpIfFalse exit
    ///     <body>
    /// next:
    ///     <step>
    ///     Jump top
    /// exit:
    ///     Pop <init locals>
    /// ```
    pub(crate) fn build_for(&mut self, for_stmt: &ForStmt) -> BuildResult<()> {
        let entry = self.ctx.stack_size;
        if let Some(init) = &for_stmt.init {
            self.build_stmt(init)?;
        }

        if for_stmt.mode == LoopMode::AlwaysFalse {
            if let Some(cond) = &for_stmt.cond {
                self.effects_of(cond)?;
            }
        } else {
            let (top, next, exit) = (self.label(), self.label(), self.label());
            self.chunk.place(top);
            if let Some(cond) = &for_stmt.cond {
                match for_stmt.mode {
                    LoopMode::Indeterminate => self.exit_unless(cond, exit)?,
                    _ => self.effects_of(cond)?,
                }
            }
            self.build_loop_body(&for_stmt.body, exit, next)?;
            self.chunk.place(next);
            if let Some(step) = &for_stmt.step {
                self.discard(step)?;
            }
            self.emit(Instruction::Jump {
                target: Target::Label(top),
            });
            self.chunk.place(exit);
        }

        self.close_locals(&for_stmt.scope_locals, entry)
    }
}
