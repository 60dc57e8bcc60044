//! Expression lowering.
//!
//! `build_expr(expr, dst)` leaves the value of `expr` in `dst`. Temporaries
//! are taken above the current register and released before returning.

use super::{BuildResult, FunctionBuilder};
use crate::analyze::generic::InstanceBody;
use crate::ast::{BinaryOp, Binding, Expr, ExprKind, LogicalOp, UnaryOp, UpdateOp};
use crate::error::InternalError;
use crate::scope::IdentId;
use cinder_bytecode::{Instruction, Reg, Target};

impl<'e, 'm> FunctionBuilder<'e, 'm> {
    pub(crate) fn build_expr(&mut self, expr: &Expr, dst: Reg) -> BuildResult<()> {
        if expr.ty.is_none() {
            return Err(InternalError::UnvisitedNode { span: expr.span });
        }
        let mark = self.ctx.mark();
        match &expr.kind {
            ExprKind::Int(value) => match i32::try_from(*value) {
                Ok(value) => self.emit(Instruction::LoadInt { dst, value }),
                Err(_) => {
                    let index = self.emitter.statics.add_number(*value as f64);
                    self.emit(Instruction::LoadConst { dst, index });
                }
            },
            ExprKind::Float(value) => {
                let index = self.emitter.statics.add_number(*value);
                self.emit(Instruction::LoadConst { dst, index });
            }
            ExprKind::String(value) => {
                let index = self.string(value);
                self.emit(Instruction::LoadConst { dst, index });
            }
            ExprKind::Bool(value) => self.emit(Instruction::LoadBool { dst, value: *value }),
            ExprKind::Null => self.emit(Instruction::LoadNull { dst }),
            ExprKind::Ident { binding, .. } => {
                let binding = binding.ok_or(InternalError::UnvisitedNode { span: expr.span })?;
                self.load_binding(binding, dst)?;
            }
            ExprKind::This => self.emit(Instruction::LoadThis { dst }),
            ExprKind::Array(items) => {
                let count = u8::try_from(items.len()).map_err(|_| InternalError::TooManyOperands {
                    what: "array element",
                    count: items.len(),
                })?;
                let start = self.build_consecutive(items)?.unwrap_or(dst);
                self.emit(Instruction::NewArray { dst, start, count });
            }
            ExprKind::Object(props) => {
                self.emit(Instruction::NewObject { dst });
                let value = self.alloc()?;
                for (name, expr) in props {
                    self.build_expr(expr, value)?;
                    let name = self.string(name);
                    self.emit(Instruction::SetMember {
                        object: dst,
                        name,
                        src: value,
                    });
                }
            }
            ExprKind::Unary { op, operand } => {
                self.build_expr(operand, dst)?;
                self.emit(Instruction::Unary {
                    op: *op,
                    dst,
                    src: dst,
                });
            }
            ExprKind::Typeof(operand) => {
                self.build_expr(operand, dst)?;
                self.emit(Instruction::Unary {
                    op: UnaryOp::Typeof,
                    dst,
                    src: dst,
                });
            }
            ExprKind::Binary { op, lhs, rhs } => {
                self.build_expr(lhs, dst)?;
                let rhs_reg = self.alloc()?;
                self.build_expr(rhs, rhs_reg)?;
                self.emit(Instruction::Binary {
                    op: *op,
                    dst,
                    lhs: dst,
                    rhs: rhs_reg,
                });
            }
            ExprKind::Logical { op, lhs, rhs } => {
                let end = self.label();
                self.build_expr(lhs, dst)?;
                let target = Target::Label(end);
                self.emit(match op {
                    LogicalOp::And => Instruction::JumpIfFalse { cond: dst, target },
                    LogicalOp::Or => Instruction::JumpIfTrue { cond: dst, target },
                });
                self.build_expr(rhs, dst)?;
                self.chunk.place(end);
            }
            ExprKind::Ternary {
                cond,
                then_expr,
                else_expr,
            } => {
                let (otherwise, end) = (self.label(), self.label());
                self.build_expr(cond, dst)?;
                self.emit(Instruction::JumpIfFalse {
                    cond: dst,
                    target: Target::Label(otherwise),
                });
                self.build_expr(then_expr, dst)?;
                self.emit(Instruction::Jump {
                    target: Target::Label(end),
                });
                self.chunk.place(otherwise);
                self.build_expr(else_expr, dst)?;
                self.chunk.place(end);
            }
            ExprKind::Sequence(items) => {
                for item in items {
                    self.build_expr(item, dst)?;
                }
            }
            ExprKind::Member { object, name } => {
                self.build_expr(object, dst)?;
                let name = self.string(name);
                self.emit(Instruction::GetMember {
                    dst,
                    object: dst,
                    name,
                });
            }
            ExprKind::Index { object, index } => {
                self.build_expr(object, dst)?;
                let index_reg = self.alloc()?;
                self.build_expr(index, index_reg)?;
                self.emit(Instruction::GetIndex {
                    dst,
                    object: dst,
                    index: index_reg,
                });
            }
            ExprKind::Has { object, name } => {
                self.build_expr(object, dst)?;
                let name = self.string(name);
                self.emit(Instruction::HasMember {
                    dst,
                    object: dst,
                    name,
                });
            }
            ExprKind::New { prototype, .. } => {
                self.build_expr(prototype, dst)?;
                self.emit(Instruction::Instantiate { dst });
            }
            ExprKind::Call {
                callee,
                args,
                yields_receiver,
                ..
            } => self.build_call(callee, args, *yields_receiver, dst)?,
            ExprKind::Function(func) => {
                let name = func.name.clone().unwrap_or_else(|| "<anonymous>".to_string());
                let index = self.emitter.build_function(func, name, false)?;
                self.emit(Instruction::LoadFunction { dst, index });
            }
            ExprKind::TypeRef { binding, .. } => {
                let binding = binding.ok_or(InternalError::UnvisitedNode { span: expr.span })?;
                self.load_binding(binding, dst)?;
            }
            ExprKind::Bind {
                ident, value, body, ..
            } => {
                let ident = ident.ok_or(InternalError::UnvisitedNode { span: expr.span })?;
                self.build_expr(value, dst)?;
                self.emit(Instruction::Push { src: dst });
                let slot = self.ctx.push_slot()?;
                self.slots.insert(ident, slot);
                self.build_expr(body, dst)?;
                self.slots.remove(&ident);
                self.emit(Instruction::Pop { count: 1 });
                self.ctx.pop_slots(1);
            }
            ExprKind::Assign { op, target, value } => self.build_assign(*op, target, value, dst)?,
            ExprKind::Update { op, prefix, target } => {
                let op = match op {
                    UpdateOp::Increment => BinaryOp::Add,
                    UpdateOp::Decrement => BinaryOp::Sub,
                };
                self.build_update(op, *prefix, target, dst)?;
            }
        }
        self.ctx.release(mark);
        Ok(())
    }

    /// Evaluate `items` into freshly allocated consecutive registers and
    /// return the first, or `None` when there are no items.
    fn build_consecutive(&mut self, items: &[Expr]) -> BuildResult<Option<Reg>> {
        let mut start = None;
        for item in items {
            let reg = self.alloc()?;
            start.get_or_insert(reg);
            let mark = self.ctx.mark();
            self.build_expr(item, reg)?;
            self.ctx.release(mark);
        }
        Ok(start)
    }

    // ========================================================================
    // Names
    // ========================================================================

    pub(crate) fn load_binding(&mut self, binding: Binding, dst: Reg) -> BuildResult<()> {
        match binding {
            Binding::Ident(id) => self.load_ident(id, dst),
            Binding::Import { module, export } => {
                self.emit(Instruction::LoadImport { dst, module, export });
                Ok(())
            }
            Binding::Instance(instance) => {
                if let Some(&index) = self.emitter.instance_functions.get(&instance) {
                    self.emit(Instruction::LoadFunction { dst, index });
                    return Ok(());
                }
                let instance = self.module().generics.instance(instance);
                match instance.body {
                    InstanceBody::Type(_) => self.load_type(instance.ty, dst),
                    _ => Err(InternalError::Unallocated {
                        name: instance.name.clone(),
                    }),
                }
            }
        }
    }

    fn load_ident(&mut self, id: IdentId, dst: Reg) -> BuildResult<()> {
        let ident = &self.module().idents[id];
        if let Some((module, export)) = ident.import_slot {
            self.emit(Instruction::LoadImport { dst, module, export });
        } else if ident.flags.is_type || ident.flags.is_enum {
            self.load_type(ident.symbol_type, dst)?;
        } else if let Some(index) = ident.global_index {
            self.emit(Instruction::LoadGlobal { dst, index });
        } else {
            let slot = self.slot_of(id)?;
            self.emit(Instruction::LoadStack { dst, slot });
        }
        Ok(())
    }

    fn store_ident(&mut self, id: IdentId, src: Reg) -> BuildResult<()> {
        if let Some(index) = self.module().idents[id].global_index {
            self.emit(Instruction::StoreGlobal { index, src });
        } else {
            let slot = self.slot_of(id)?;
            self.emit(Instruction::StoreStack { slot, src });
        }
        Ok(())
    }

    fn slot_of(&self, id: IdentId) -> BuildResult<u16> {
        self.slots.get(&id).copied().ok_or_else(|| InternalError::Unallocated {
            name: self.module().idents[id].name.clone(),
        })
    }

    fn ident_of(target: &Expr) -> BuildResult<IdentId> {
        match &target.kind {
            ExprKind::Ident {
                binding: Some(Binding::Ident(id)),
                ..
            } => Ok(*id),
            _ => Err(InternalError::UnvisitedNode { span: target.span }),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn build_call(&mut self, callee: &Expr, args: &[Expr], yields_receiver: bool, dst: Reg) -> BuildResult<()> {
        let argc = u8::try_from(args.len()).map_err(|_| InternalError::TooManyOperands {
            what: "argument",
            count: args.len(),
        })?;
        let base = self.alloc()?;
        match &callee.kind {
            ExprKind::Member { object, name } => {
                self.build_expr(object, base)?;
                self.build_consecutive(args)?;
                let name = self.string(name);
                self.emit(Instruction::CallMethod {
                    base,
                    name,
                    argc,
                    yields_receiver,
                });
            }
            _ => {
                self.build_expr(callee, base)?;
                self.build_consecutive(args)?;
                self.emit(Instruction::Call { base, argc });
            }
        }
        self.emit(Instruction::Move { dst, src: base });
        Ok(())
    }

    // ========================================================================
    // Assignment
    // ========================================================================

    fn build_assign(&mut self, op: Option<BinaryOp>, target: &Expr, value: &Expr, dst: Reg) -> BuildResult<()> {
        let combine = |this: &mut Self, dst: Reg| -> BuildResult<()> {
            match op {
                Some(op) => {
                    let rhs = this.alloc()?;
                    this.build_expr(value, rhs)?;
                    this.emit(Instruction::Binary {
                        op,
                        dst,
                        lhs: dst,
                        rhs,
                    });
                }
                None => this.build_expr(value, dst)?,
            }
            Ok(())
        };

        match &target.kind {
            ExprKind::Ident { .. } => {
                let id = Self::ident_of(target)?;
                if op.is_some() {
                    self.load_ident(id, dst)?;
                }
                combine(self, dst)?;
                self.store_ident(id, dst)
            }
            ExprKind::Member { object, name } => {
                let object_reg = self.alloc()?;
                self.build_expr(object, object_reg)?;
                let name = self.string(name);
                if op.is_some() {
                    self.emit(Instruction::GetMember {
                        dst,
                        object: object_reg,
                        name,
                    });
                }
                combine(self, dst)?;
                self.emit(Instruction::SetMember {
                    object: object_reg,
                    name,
                    src: dst,
                });
                Ok(())
            }
            ExprKind::Index { object, index } => {
                let object_reg = self.alloc()?;
                self.build_expr(object, object_reg)?;
                let index_reg = self.alloc()?;
                self.build_expr(index, index_reg)?;
                if op.is_some() {
                    self.emit(Instruction::GetIndex {
                        dst,
                        object: object_reg,
                        index: index_reg,
                    });
                }
                combine(self, dst)?;
                self.emit(Instruction::SetIndex {
                    object: object_reg,
                    index: index_reg,
                    src: dst,
                });
                Ok(())
            }
            _ => Err(InternalError::UnvisitedNode { span: target.span }),
        }
    }

    /// `++x` / `x--`. The old value is converted to a number first, so the
    /// postfix form yields a number too.
    fn build_update(&mut self, op: BinaryOp, prefix: bool, target: &Expr, dst: Reg) -> BuildResult<()> {
        enum Place {
            Ident(IdentId),
            Member { object: Reg, name: u32 },
            Index { object: Reg, index: Reg },
        }

        let place = match &target.kind {
            ExprKind::Ident { .. } => {
                let id = Self::ident_of(target)?;
                self.load_ident(id, dst)?;
                Place::Ident(id)
            }
            ExprKind::Member { object, name } => {
                let object_reg = self.alloc()?;
                self.build_expr(object, object_reg)?;
                let name = self.string(name);
                self.emit(Instruction::GetMember {
                    dst,
                    object: object_reg,
                    name,
                });
                Place::Member {
                    object: object_reg,
                    name,
                }
            }
            ExprKind::Index { object, index } => {
                let object_reg = self.alloc()?;
                self.build_expr(object, object_reg)?;
                let index_reg = self.alloc()?;
                self.build_expr(index, index_reg)?;
                self.emit(Instruction::GetIndex {
                    dst,
                    object: object_reg,
                    index: index_reg,
                });
                Place::Index {
                    object: object_reg,
                    index: index_reg,
                }
            }
            _ => return Err(InternalError::UnvisitedNode { span: target.span }),
        };

        self.emit(Instruction::Unary {
            op: UnaryOp::Plus,
            dst,
            src: dst,
        });
        let one = self.alloc()?;
        self.emit(Instruction::LoadInt { dst: one, value: 1 });
        let updated = if prefix { dst } else { self.alloc()? };
        self.emit(Instruction::Binary {
            op,
            dst: updated,
            lhs: dst,
            rhs: one,
        });

        match place {
            Place::Ident(id) => self.store_ident(id, updated)?,
            Place::Member { object, name } => self.emit(Instruction::SetMember {
                object,
                name,
                src: updated,
            }),
            Place::Index { object, index } => self.emit(Instruction::SetIndex {
                object,
                index,
                src: updated,
            }),
        }
        Ok(())
    }
}
