//! Statement lowering and local slot bookkeeping.

use super::{BuildResult, Frame, FunctionBuilder};
use crate::ast::{Block, Expr, FunctionDecl, Stmt, StmtKind, TryStmt, VarDecl};
use crate::error::InternalError;
use crate::scope::IdentId;
use cinder_bytecode::{Instruction, LabelId, Target};

impl<'e, 'm> FunctionBuilder<'e, 'm> {
    pub(crate) fn build_stmt(&mut self, stmt: &Stmt) -> BuildResult<()> {
        match &stmt.kind {
            StmtKind::Let(decl) | StmtKind::Const(decl) => self.build_var_decl(decl, stmt),
            StmtKind::Function(func) => self.build_local_function(func),
            StmtKind::TypeDecl(_)
            | StmtKind::Alias(_)
            | StmtKind::Enum(_)
            | StmtKind::Import { .. }
            | StmtKind::Empty => Ok(()),
            StmtKind::Export(inner) => self.build_stmt(inner),
            StmtKind::Expression(expr) => self.discard(expr),
            StmtKind::Block(block) => self.build_block(block),
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => {
                let (otherwise, end) = (self.label(), self.label());
                let mark = self.ctx.mark();
                let reg = self.alloc()?;
                self.build_expr(cond, reg)?;
                self.emit(Instruction::JumpIfFalse {
                    cond: reg,
                    target: Target::Label(otherwise),
                });
                self.ctx.release(mark);
                self.build_stmt(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.emit(Instruction::Jump {
                        target: Target::Label(end),
                    });
                    self.chunk.place(otherwise);
                    self.build_stmt(else_branch)?;
                } else {
                    self.chunk.place(otherwise);
                }
                self.chunk.place(end);
                Ok(())
            }
            StmtKind::While { cond, body, mode } => self.build_while(cond, body, *mode),
            StmtKind::DoWhile { body, cond, mode } => self.build_do_while(body, cond, *mode),
            StmtKind::For(for_stmt) => self.build_for(for_stmt),
            StmtKind::Break => self.build_loop_exit(true),
            StmtKind::Continue => self.build_loop_exit(false),
            StmtKind::Return(value) => self.build_return(value.as_ref()),
            StmtKind::Throw(value) => {
                let mark = self.ctx.mark();
                let reg = self.alloc()?;
                self.build_expr(value, reg)?;
                self.emit(Instruction::Throw { src: reg });
                self.ctx.release(mark);
                Ok(())
            }
            StmtKind::Try(try_stmt) => self.build_try(try_stmt),
        }
    }

    /// Build a block and pop the slots of its locals.
    pub(crate) fn build_block(&mut self, block: &Block) -> BuildResult<()> {
        let entry = self.ctx.stack_size;
        for stmt in &block.stmts {
            self.build_stmt(stmt)?;
        }
        self.close_locals(&block.scope_locals, entry)
    }

    /// Pop everything pushed since `entry`. The number of slots must equal
    /// the surviving locals the scope declared.
    pub(crate) fn close_locals(&mut self, locals: &[IdentId], entry: u32) -> BuildResult<()> {
        let module = self.module();
        let expected = locals
            .iter()
            .filter(|id| module.idents[**id].is_stack_local() && !self.is_culled(**id))
            .count() as u32;
        let actual = self.ctx.stack_size.saturating_sub(entry);
        if expected != actual {
            return Err(InternalError::StackMismatch {
                expected: expected as usize,
                actual: actual as usize,
            });
        }
        self.pop(actual)?;
        self.ctx.pop_slots(actual);
        for id in locals {
            self.slots.remove(id);
        }
        Ok(())
    }

    fn pop(&mut self, count: u32) -> BuildResult<()> {
        if count > 0 {
            let count = u16::try_from(count).map_err(|_| InternalError::SlotOverflow(count))?;
            self.emit(Instruction::Pop { count });
        }
        Ok(())
    }

    /// Evaluate `expr` for its effects only.
    pub(crate) fn discard(&mut self, expr: &Expr) -> BuildResult<()> {
        let mark = self.ctx.mark();
        let reg = self.alloc()?;
        self.build_expr(expr, reg)?;
        self.ctx.release(mark);
        Ok(())
    }

    /// Push the value in a fresh register as the slot of `id`.
    fn push_local(&mut self, id: IdentId, load: impl FnOnce(&mut Self, u8) -> BuildResult<()>) -> BuildResult<()> {
        let mark = self.ctx.mark();
        let reg = self.alloc()?;
        load(self, reg)?;
        self.emit(Instruction::Push { src: reg });
        self.ctx.release(mark);
        let slot = self.ctx.push_slot()?;
        self.slots.insert(id, slot);
        Ok(())
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    fn build_var_decl(&mut self, decl: &VarDecl, stmt: &Stmt) -> BuildResult<()> {
        let id = decl.ident.ok_or(InternalError::UnvisitedNode { span: stmt.span })?;
        let load = |this: &mut Self, reg| match &decl.init {
            Some(init) => this.build_expr(init, reg),
            None => {
                this.emit(Instruction::LoadNull { dst: reg });
                Ok(())
            }
        };

        if let Some(index) = self.module().idents[id].global_index {
            let mark = self.ctx.mark();
            let reg = self.alloc()?;
            load(self, reg)?;
            self.emit(Instruction::StoreGlobal { index, src: reg });
            self.ctx.release(mark);
            return Ok(());
        }
        if self.is_culled(id) {
            return match &decl.init {
                Some(init) if init.has_side_effects() => self.discard(init),
                _ => Ok(()),
            };
        }
        self.push_local(id, load)
    }

    /// Module-level functions are stored by the prologue; nested ones get a
    /// slot like any other local.
    fn build_local_function(&mut self, func: &FunctionDecl) -> BuildResult<()> {
        if !func.generics.is_empty() {
            return Ok(());
        }
        let id = func.ident.ok_or(InternalError::UnvisitedNode { span: func.span })?;
        if self.module().idents[id].global_index.is_some() || self.is_culled(id) {
            return Ok(());
        }
        let name = func.name.clone().unwrap_or_default();
        let index = self.emitter.build_function(func, name, false)?;
        self.push_local(id, |this, reg| {
            this.emit(Instruction::LoadFunction { dst: reg, index });
            Ok(())
        })
    }

    // ========================================================================
    // Control transfer
    // ========================================================================

    /// `break` / `continue`: leave every `try` inside the loop, drop the
    /// slots pushed since the loop body started and jump.
    fn build_loop_exit(&mut self, is_break: bool) -> BuildResult<()> {
        let mut tries = 0;
        let mut target: Option<(LabelId, u32)> = None;
        for frame in self.frames.iter().rev() {
            match *frame {
                Frame::Try { .. } => tries += 1,
                Frame::Loop {
                    break_label,
                    continue_label,
                    stack_depth,
                } => {
                    let label = if is_break { break_label } else { continue_label };
                    target = Some((label, stack_depth));
                    break;
                }
            }
        }
        let (label, depth) = target.ok_or(InternalError::NoEnclosingLoop(if is_break {
            "break"
        } else {
            "continue"
        }))?;
        for _ in 0..tries {
            self.emit(Instruction::ExitTry);
        }
        self.pop(self.ctx.stack_size.saturating_sub(depth))?;
        self.emit(Instruction::Jump {
            target: Target::Label(label),
        });
        Ok(())
    }

    fn build_return(&mut self, value: Option<&Expr>) -> BuildResult<()> {
        let tries = self
            .frames
            .iter()
            .filter(|f| matches!(f, Frame::Try { .. }))
            .count();
        match value {
            Some(value) => {
                let mark = self.ctx.mark();
                let reg = self.alloc()?;
                self.build_expr(value, reg)?;
                for _ in 0..tries {
                    self.emit(Instruction::ExitTry);
                }
                self.emit(Instruction::Return { src: reg });
                self.ctx.release(mark);
            }
            None => {
                for _ in 0..tries {
                    self.emit(Instruction::ExitTry);
                }
                self.emit(Instruction::ReturnNull);
            }
        }
        Ok(())
    }

    /// ```text
    ///     EnterTry handler
    ///     <body>
    ///     ExitTry
    ///     Jump end
    /// handler:
    ///     LoadException; Push        (unless the parameter is culled)
    ///     <handler body>
    ///     Pop 1
    /// end:
    /// ```
    ///
    /// The runtime restores the stack to its height at `EnterTry` before
    /// entering the handler.
    fn build_try(&mut self, try_stmt: &TryStmt) -> BuildResult<()> {
        let (handler, end) = (self.label(), self.label());
        self.emit(Instruction::EnterTry {
            handler: Target::Label(handler),
        });
        self.frames.push(Frame::Try {
            stack_depth: self.ctx.stack_size,
        });
        self.build_block(&try_stmt.body)?;
        self.frames.pop();
        self.emit(Instruction::ExitTry);
        self.emit(Instruction::Jump {
            target: Target::Label(end),
        });

        self.chunk.place(handler);
        let param = try_stmt
            .param_ident
            .ok_or(InternalError::UnvisitedNode { span: try_stmt.param_span })?;
        let bound = !self.is_culled(param);
        if bound {
            self.push_local(param, |this, reg| {
                this.emit(Instruction::LoadException { dst: reg });
                Ok(())
            })?;
        }
        self.build_block(&try_stmt.handler)?;
        if bound {
            self.pop(1)?;
            self.ctx.pop_slots(1);
            self.slots.remove(&param);
        }
        self.chunk.place(end);
        Ok(())
    }
}
